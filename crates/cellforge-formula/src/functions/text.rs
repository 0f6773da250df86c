//! String functions: length, substrings, case, trimming, and concatenation.

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "LEN", arity: Arity::Exact(1), volatile: false, eval: fn_len });
    reg.register(FunctionSpec { name: "LEFT", arity: Arity::Range(1, 2), volatile: false, eval: fn_left });
    reg.register(FunctionSpec { name: "RIGHT", arity: Arity::Range(1, 2), volatile: false, eval: fn_right });
    reg.register(FunctionSpec { name: "MID", arity: Arity::Exact(3), volatile: false, eval: fn_mid });
    reg.register(FunctionSpec { name: "LOWER", arity: Arity::Exact(1), volatile: false, eval: fn_lower });
    reg.register(FunctionSpec { name: "UPPER", arity: Arity::Exact(1), volatile: false, eval: fn_upper });
    reg.register(FunctionSpec { name: "TRIM", arity: Arity::Exact(1), volatile: false, eval: fn_trim });
    reg.register(FunctionSpec { name: "CONCAT", arity: Arity::AtLeast(1), volatile: false, eval: fn_concat });
    reg.register(FunctionSpec { name: "CONCATENATE", arity: Arity::AtLeast(1), volatile: false, eval: fn_concat });
    reg.register(FunctionSpec { name: "TEXTJOIN", arity: Arity::AtLeast(3), volatile: false, eval: fn_textjoin });
    reg.register(FunctionSpec { name: "FIND", arity: Arity::Range(2, 3), volatile: false, eval: fn_find });
    reg.register(FunctionSpec { name: "SEARCH", arity: Arity::Range(2, 3), volatile: false, eval: fn_search });
    reg.register(FunctionSpec { name: "REPLACE", arity: Arity::Exact(4), volatile: false, eval: fn_replace });
    reg.register(FunctionSpec { name: "SUBSTITUTE", arity: Arity::Range(3, 4), volatile: false, eval: fn_substitute });
    reg.register(FunctionSpec { name: "REPT", arity: Arity::Exact(2), volatile: false, eval: fn_rept });
    reg.register(FunctionSpec { name: "CHAR", arity: Arity::Exact(1), volatile: false, eval: fn_char });
    reg.register(FunctionSpec { name: "CODE", arity: Arity::Exact(1), volatile: false, eval: fn_code });
    reg.register(FunctionSpec { name: "CLEAN", arity: Arity::Exact(1), volatile: false, eval: fn_clean });
    reg.register(FunctionSpec { name: "VALUE", arity: Arity::Exact(1), volatile: false, eval: fn_value });
    reg.register(FunctionSpec { name: "T", arity: Arity::Exact(1), volatile: false, eval: fn_t });
    reg.register(FunctionSpec { name: "N", arity: Arity::Exact(1), volatile: false, eval: fn_n });
    reg.register(FunctionSpec { name: "TEXT", arity: Arity::Exact(2), volatile: false, eval: fn_text });
    reg.register(FunctionSpec { name: "EXACT", arity: Arity::Exact(2), volatile: false, eval: fn_exact });
    reg.register(FunctionSpec { name: "PROPER", arity: Arity::Exact(1), volatile: false, eval: fn_proper });
}

fn text_of(v: &Value) -> Result<String, CellError> {
    match v {
        Value::Error(e) => Err(*e),
        other => Ok(other.as_string()),
    }
}

fn fn_len(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match text_of(&args[0]) {
        Ok(s) => Ok(Value::from_f64(s.chars().count() as f64)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_left(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let n = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0).max(0.0) as usize;
    Ok(Value::Text(s.chars().take(n).collect()))
}

fn fn_right(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let n = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0).max(0.0) as usize;
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    Ok(Value::Text(chars[start..].iter().collect()))
}

fn fn_mid(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let start = args[1].as_f64().unwrap_or(1.0).max(1.0) as usize;
    let len = args[2].as_f64().unwrap_or(0.0).max(0.0) as usize;
    let chars: Vec<char> = s.chars().collect();
    if start > chars.len() {
        return Ok(Value::Text(String::new()));
    }
    let from = start - 1;
    let to = (from + len).min(chars.len());
    Ok(Value::Text(chars[from..to].iter().collect()))
}

fn fn_lower(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match text_of(&args[0]) {
        Ok(s) => Ok(Value::Text(s.to_lowercase())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_upper(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match text_of(&args[0]) {
        Ok(s) => Ok(Value::Text(s.to_uppercase())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_trim(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match text_of(&args[0]) {
        Ok(s) => {
            let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
            Ok(Value::Text(collapsed))
        }
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_concat(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut out = String::new();
    for arg in args {
        for v in arg.flatten() {
            match text_of(&v) {
                Ok(s) => out.push_str(&s),
                Err(e) => return Ok(Value::Error(e)),
            }
        }
    }
    Ok(Value::Text(out))
}

fn fn_textjoin(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let delim = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let ignore_empty = args[1].as_bool().unwrap_or(false);
    let mut parts = Vec::new();
    for arg in &args[2..] {
        for v in arg.flatten() {
            match text_of(&v) {
                Ok(s) => {
                    if !(ignore_empty && s.is_empty()) {
                        parts.push(s);
                    }
                }
                Err(e) => return Ok(Value::Error(e)),
            }
        }
    }
    Ok(Value::Text(parts.join(&delim)))
}

fn fn_find(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let needle = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let haystack = match text_of(&args[1]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let start = args.get(2).and_then(|v| v.as_f64()).unwrap_or(1.0).max(1.0) as usize - 1;
    let chars: Vec<char> = haystack.chars().collect();
    if start > chars.len() {
        return Ok(Value::Error(CellError::Value));
    }
    let rest: String = chars[start..].iter().collect();
    match rest.find(&needle) {
        Some(byte_idx) => {
            let char_idx = rest[..byte_idx].chars().count();
            Ok(Value::from_f64((start + char_idx + 1) as f64))
        }
        None => Ok(Value::Error(CellError::Value)),
    }
}

fn fn_search(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let needle = match text_of(&args[0]) {
        Ok(s) => s.to_lowercase(),
        Err(e) => return Ok(Value::Error(e)),
    };
    let haystack = match text_of(&args[1]) {
        Ok(s) => s.to_lowercase(),
        Err(e) => return Ok(Value::Error(e)),
    };
    fn_find(&[Value::Text(needle), Value::Text(haystack), args.get(2).cloned().unwrap_or(Value::from_f64(1.0))], ctx)
}

fn fn_replace(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let start = args[1].as_f64().unwrap_or(1.0).max(1.0) as usize - 1;
    let len = args[2].as_f64().unwrap_or(0.0).max(0.0) as usize;
    let new_text = match text_of(&args[3]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let chars: Vec<char> = s.chars().collect();
    let start = start.min(chars.len());
    let end = (start + len).min(chars.len());
    let mut out: String = chars[..start].iter().collect();
    out.push_str(&new_text);
    out.extend(chars[end..].iter());
    Ok(Value::Text(out))
}

fn fn_substitute(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let old = match text_of(&args[1]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let new = match text_of(&args[2]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    match args.get(3).and_then(|v| v.as_f64()) {
        None => Ok(Value::Text(s.replace(&old, &new))),
        Some(occurrence) => {
            let occurrence = occurrence as usize;
            if occurrence == 0 || old.is_empty() {
                return Ok(Value::Text(s));
            }
            let mut count = 0;
            let mut result = String::new();
            let mut rest = s.as_str();
            while let Some(idx) = rest.find(&old) {
                count += 1;
                if count == occurrence {
                    result.push_str(&rest[..idx]);
                    result.push_str(&new);
                    result.push_str(&rest[idx + old.len()..]);
                    return Ok(Value::Text(result));
                }
                result.push_str(&rest[..idx + old.len()]);
                rest = &rest[idx + old.len()..];
            }
            result.push_str(rest);
            Ok(Value::Text(result))
        }
    }
}

fn fn_rept(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let n = args[1].as_f64().unwrap_or(0.0);
    if n < 0.0 {
        return Ok(Value::Error(CellError::Value));
    }
    Ok(Value::Text(s.repeat(n as usize)))
}

fn fn_char(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let code = args[0].as_f64().unwrap_or(0.0) as u32;
    match char::from_u32(code) {
        Some(c) => Ok(Value::Text(c.to_string())),
        None => Ok(Value::Error(CellError::Value)),
    }
}

fn fn_code(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    match s.chars().next() {
        Some(c) => Ok(Value::from_f64(c as u32 as f64)),
        None => Ok(Value::Error(CellError::Value)),
    }
}

fn fn_clean(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match text_of(&args[0]) {
        Ok(s) => Ok(Value::Text(s.chars().filter(|c| !c.is_control()).collect())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_value(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match &args[0] {
        Value::Error(e) => Ok(Value::Error(*e)),
        Value::Number(n) => Ok(Value::Number(n.clone())),
        other => match other.as_string().trim().parse() {
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => Ok(Value::Error(CellError::Value)),
        },
    }
}

fn fn_t(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match &args[0] {
        Value::Text(s) => Ok(Value::Text(s.clone())),
        Value::Error(e) => Ok(Value::Error(*e)),
        _ => Ok(Value::Text(String::new())),
    }
}

fn fn_n(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match &args[0] {
        Value::Error(e) => Ok(Value::Error(*e)),
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::Bool(true) => Ok(Value::from_f64(1.0)),
        Value::Bool(false) => Ok(Value::from_f64(0.0)),
        _ => Ok(Value::from_f64(0.0)),
    }
}

fn fn_exact(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let a = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let b = match text_of(&args[1]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    Ok(Value::Bool(a == b))
}

fn fn_proper(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let s = match text_of(&args[0]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    let mut out = String::with_capacity(s.len());
    let mut start_of_word = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            out.extend(if start_of_word { c.to_uppercase().collect::<Vec<_>>() } else { c.to_lowercase().collect() });
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    Ok(Value::Text(out))
}

fn fn_text(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match &args[0] {
        Value::Error(e) => return Ok(Value::Error(*e)),
        v => match v.as_f64() {
            Some(n) => n,
            None => return Ok(Value::Text(v.as_string())),
        },
    };
    let format = match text_of(&args[1]) {
        Ok(s) => s,
        Err(e) => return Ok(Value::Error(e)),
    };
    Ok(Value::Text(apply_number_format(n, &format)))
}

/// A pragmatic subset of Excel number-format codes: the digit/thousands/
/// percent/decimal patterns that cover the overwhelming majority of
/// `TEXT()` calls seen in the wild. Anything else falls back to a plain
/// decimal render rather than failing.
fn apply_number_format(n: f64, format: &str) -> String {
    let (body, is_percent) = match format.strip_suffix('%') {
        Some(body) => (body, true),
        None => (format, false),
    };
    let value = if is_percent { n * 100.0 } else { n };
    let grouped = body.contains(',');
    let decimals = body.split('.').nth(1).map(|d| d.chars().filter(|c| *c == '0' || *c == '#').count());

    let rendered = match decimals {
        Some(d) => format!("{value:.*}", d),
        None => format!("{value:.0}", value = value.round()),
    };

    let rendered = if grouped {
        group_thousands(&rendered)
    } else {
        rendered
    };

    if is_percent {
        format!("{rendered}%")
    } else {
        rendered
    }
}

fn group_thousands(s: &str) -> String {
    let negative = s.starts_with('-');
    let s = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    #[test]
    fn left_right_mid() {
        let wb = Workbook::new();
        let s = Value::Text("Hello, world".into());
        assert_eq!(fn_left(&[s.clone(), Value::from_f64(5.0)], &ctx(&wb)).unwrap(), Value::Text("Hello".into()));
        assert_eq!(fn_right(&[s.clone(), Value::from_f64(5.0)], &ctx(&wb)).unwrap(), Value::Text("world".into()));
        assert_eq!(fn_mid(&[s, Value::from_f64(8.0), Value::from_f64(5.0)], &ctx(&wb)).unwrap(), Value::Text("world".into()));
    }

    #[test]
    fn substitute_nth_occurrence() {
        let wb = Workbook::new();
        let args = vec![
            Value::Text("a-b-c-b".into()),
            Value::Text("b".into()),
            Value::Text("X".into()),
            Value::from_f64(2.0),
        ];
        assert_eq!(fn_substitute(&args, &ctx(&wb)).unwrap(), Value::Text("a-b-c-X".into()));
    }

    #[test]
    fn trim_collapses_internal_whitespace() {
        let wb = Workbook::new();
        let result = fn_trim(&[Value::Text("  a   b  ".into())], &ctx(&wb)).unwrap();
        assert_eq!(result, Value::Text("a b".into()));
    }

    #[test]
    fn text_applies_thousands_and_decimals() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(12345.678), Value::Text("#,##0.00".into())];
        assert_eq!(fn_text(&args, &ctx(&wb)).unwrap(), Value::Text("12,345.68".into()));
    }

    #[test]
    fn text_percent_format() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(0.256), Value::Text("0.0%".into())];
        assert_eq!(fn_text(&args, &ctx(&wb)).unwrap(), Value::Text("25.6%".into()));
    }

    #[test]
    fn proper_capitalizes_each_word() {
        let wb = Workbook::new();
        let result = fn_proper(&[Value::Text("mcdonald's farm".into())], &ctx(&wb)).unwrap();
        assert_eq!(result, Value::Text("Mcdonald'S Farm".into()));
    }

    #[test]
    fn exact_is_case_sensitive() {
        let wb = Workbook::new();
        let args = vec![Value::Text("ABC".into()), Value::Text("abc".into())];
        assert_eq!(fn_exact(&args, &ctx(&wb)).unwrap(), Value::Bool(false));
    }
}
