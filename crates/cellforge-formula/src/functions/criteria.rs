//! Criteria matching for `COUNTIF`, `SUMIF`, `AVERAGEIF` and their multi-
//! criteria siblings.
//!
//! Excel criteria can be:
//! - a number: exact match (`5`)
//! - a text string: case-insensitive match (`"apple"`)
//! - a comparison expression: `">5"`, `">=10"`, `"<100"`, `"<=50"`, `"<>0"`, `"=5"`
//! - wildcards: `*` matches any run of characters, `?` matches exactly one
//! - an empty string: matches empty cells

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "COUNTIF", arity: Arity::Exact(2), volatile: false, eval: fn_countif });
    reg.register(FunctionSpec { name: "SUMIF", arity: Arity::Range(2, 3), volatile: false, eval: fn_sumif });
    reg.register(FunctionSpec { name: "AVERAGEIF", arity: Arity::Range(2, 3), volatile: false, eval: fn_averageif });
    reg.register(FunctionSpec { name: "COUNTIFS", arity: Arity::AtLeast(2), volatile: false, eval: fn_countifs });
    reg.register(FunctionSpec { name: "SUMIFS", arity: Arity::AtLeast(3), volatile: false, eval: fn_sumifs });
    reg.register(FunctionSpec { name: "AVERAGEIFS", arity: Arity::AtLeast(3), volatile: false, eval: fn_averageifs });
}

/// A criteria matcher built from one `COUNTIF`-style criteria argument.
#[derive(Debug)]
struct CriteriaMatcher {
    kind: CriteriaKind,
}

#[derive(Debug)]
enum CriteriaKind {
    Number(f64),
    Comparison(ComparisonOp, f64),
    Text(String),
    Empty,
    /// The criteria argument was itself an error; nothing ever matches.
    Never,
}

#[derive(Debug, Clone, Copy)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl CriteriaMatcher {
    fn new(criteria: &Value) -> Self {
        let kind = match criteria {
            Value::Number(n) => {
                use bigdecimal::ToPrimitive;
                CriteriaKind::Number(n.to_f64().unwrap_or(0.0))
            }
            Value::Bool(b) => CriteriaKind::Number(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => Self::parse_string(s),
            Value::Empty => CriteriaKind::Empty,
            Value::Error(_) | Value::Array(_) => CriteriaKind::Never,
        };
        CriteriaMatcher { kind }
    }

    fn parse_string(s: &str) -> CriteriaKind {
        let s = s.trim();
        if s.is_empty() {
            return CriteriaKind::Empty;
        }
        if let Some(kind) = Self::try_parse_comparison(s) {
            return kind;
        }
        if let Ok(n) = s.parse::<f64>() {
            return CriteriaKind::Number(n);
        }
        CriteriaKind::Text(s.to_lowercase())
    }

    fn try_parse_comparison(s: &str) -> Option<CriteriaKind> {
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return None;
        };
        rest.trim().parse::<f64>().ok().map(|n| CriteriaKind::Comparison(op, n))
    }

    fn matches(&self, value: &Value) -> bool {
        match &self.kind {
            CriteriaKind::Never => false,
            CriteriaKind::Number(criteria) => match value.as_f64_strict() {
                Some(n) => (n - criteria).abs() < 1e-10,
                None => false,
            },
            CriteriaKind::Comparison(op, criteria) => match value.as_f64_strict() {
                Some(n) => match op {
                    ComparisonOp::Equal => (n - criteria).abs() < 1e-10,
                    ComparisonOp::NotEqual => (n - criteria).abs() >= 1e-10,
                    ComparisonOp::LessThan => n < *criteria,
                    ComparisonOp::LessEqual => n <= *criteria,
                    ComparisonOp::GreaterThan => n > *criteria,
                    ComparisonOp::GreaterEqual => n >= *criteria,
                },
                None => false,
            },
            CriteriaKind::Text(pattern) => wildcard_match(pattern, &value.as_string().to_lowercase()),
            CriteriaKind::Empty => {
                matches!(value, Value::Empty) || matches!(value, Value::Text(s) if s.is_empty())
            }
        }
    }
}

/// A strict numeric read: unlike [`Value::as_number`], a string never
/// coerces, matching Excel's `SUMIF(A:A, 5)` not counting the text `"5"`.
trait StrictNumber {
    fn as_f64_strict(&self) -> Option<f64>;
}

impl StrictNumber for Value {
    fn as_f64_strict(&self) -> Option<f64> {
        match self {
            Value::Number(_) | Value::Bool(_) => self.as_f64(),
            _ => None,
        }
    }
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return pattern == text;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    wildcard_match_impl(&pattern, &text)
}

/// Iterative backtracking glob match: `*` records a resume point and is
/// retried against one more character of `text` on each mismatch.
fn wildcard_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(sp) = star_pi {
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

fn rows_of(v: &Value) -> Vec<Value> {
    v.flatten()
}

fn fn_countif(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let matcher = CriteriaMatcher::new(&args[1]);
    let count = rows_of(&args[0]).iter().filter(|v| matcher.matches(v)).count();
    Ok(Value::from_f64(count as f64))
}

fn fn_sumif(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let range = rows_of(&args[0]);
    let matcher = CriteriaMatcher::new(&args[1]);
    let sum_range = args.get(2).map(rows_of).unwrap_or_else(|| range.clone());
    let mut total = 0.0;
    for (cond, sum) in range.iter().zip(sum_range.iter()) {
        if matcher.matches(cond) {
            total += sum.as_f64().unwrap_or(0.0);
        }
    }
    Ok(Value::from_f64(total))
}

fn fn_averageif(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let range = rows_of(&args[0]);
    let matcher = CriteriaMatcher::new(&args[1]);
    let avg_range = args.get(2).map(rows_of).unwrap_or_else(|| range.clone());
    let mut total = 0.0;
    let mut count = 0usize;
    for (cond, val) in range.iter().zip(avg_range.iter()) {
        if matcher.matches(cond) {
            total += val.as_f64().unwrap_or(0.0);
            count += 1;
        }
    }
    if count == 0 {
        Ok(Value::Error(CellError::Div0))
    } else {
        Ok(Value::from_f64(total / count as f64))
    }
}

/// Shared machinery for the `*IFS` variants: `pairs` are
/// `(range, criteria)` arguments; every row index must satisfy every pair's
/// criteria to be selected.
fn selected_rows(pairs: &[(&Value, &Value)]) -> Vec<usize> {
    let ranges: Vec<Vec<Value>> = pairs.iter().map(|(r, _)| rows_of(r)).collect();
    let matchers: Vec<CriteriaMatcher> = pairs.iter().map(|(_, c)| CriteriaMatcher::new(c)).collect();
    let len = ranges.first().map(|r| r.len()).unwrap_or(0);
    (0..len)
        .filter(|&i| {
            ranges
                .iter()
                .zip(matchers.iter())
                .all(|(range, matcher)| range.get(i).is_some_and(|v| matcher.matches(v)))
        })
        .collect()
}

fn fn_countifs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let pairs: Vec<(&Value, &Value)> = args.chunks_exact(2).map(|c| (&c[0], &c[1])).collect();
    Ok(Value::from_f64(selected_rows(&pairs).len() as f64))
}

fn fn_sumifs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let sum_range = rows_of(&args[0]);
    let pairs: Vec<(&Value, &Value)> = args[1..].chunks_exact(2).map(|c| (&c[0], &c[1])).collect();
    let total: f64 = selected_rows(&pairs)
        .into_iter()
        .filter_map(|i| sum_range.get(i))
        .filter_map(|v| v.as_f64())
        .sum();
    Ok(Value::from_f64(total))
}

fn fn_averageifs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let avg_range = rows_of(&args[0]);
    let pairs: Vec<(&Value, &Value)> = args[1..].chunks_exact(2).map(|c| (&c[0], &c[1])).collect();
    let rows = selected_rows(&pairs);
    if rows.is_empty() {
        return Ok(Value::Error(CellError::Div0));
    }
    let total: f64 = rows.iter().filter_map(|&i| avg_range.get(i)).filter_map(|v| v.as_f64()).sum();
    Ok(Value::from_f64(total / rows.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    fn arr(vs: Vec<Value>) -> Value {
        Value::Array(vec![vs])
    }

    #[test]
    fn countif_comparison_operator() {
        let wb = Workbook::new();
        let range = arr(vec![Value::from_f64(1.0), Value::from_f64(5.0), Value::from_f64(9.0)]);
        let args = vec![range, Value::Text(">4".into())];
        assert_eq!(fn_countif(&args, &ctx(&wb)).unwrap(), Value::from_f64(2.0));
    }

    #[test]
    fn countif_number_does_not_match_text() {
        let wb = Workbook::new();
        let range = arr(vec![Value::from_f64(5.0), Value::Text("5".into())]);
        let args = vec![range, Value::from_f64(5.0)];
        assert_eq!(fn_countif(&args, &ctx(&wb)).unwrap(), Value::from_f64(1.0));
    }

    #[test]
    fn sumif_with_separate_sum_range() {
        let wb = Workbook::new();
        let cond = arr(vec![Value::Text("a".into()), Value::Text("b".into()), Value::Text("a".into())]);
        let sums = arr(vec![Value::from_f64(10.0), Value::from_f64(20.0), Value::from_f64(30.0)]);
        let args = vec![cond, Value::Text("a".into()), sums];
        assert_eq!(fn_sumif(&args, &ctx(&wb)).unwrap(), Value::from_f64(40.0));
    }

    #[test]
    fn wildcard_matches_prefix() {
        let wb = Workbook::new();
        let range = arr(vec![Value::Text("apple".into()), Value::Text("banana".into())]);
        let args = vec![range, Value::Text("a*".into())];
        assert_eq!(fn_countif(&args, &ctx(&wb)).unwrap(), Value::from_f64(1.0));
    }

    #[test]
    fn countifs_requires_every_criteria() {
        let wb = Workbook::new();
        let names = arr(vec![Value::Text("a".into()), Value::Text("a".into()), Value::Text("b".into())]);
        let amounts = arr(vec![Value::from_f64(10.0), Value::from_f64(1.0), Value::from_f64(10.0)]);
        let args = vec![names, Value::Text("a".into()), amounts, Value::Text(">5".into())];
        assert_eq!(fn_countifs(&args, &ctx(&wb)).unwrap(), Value::from_f64(1.0));
    }

    #[test]
    fn averageif_empty_selection_is_div0() {
        let wb = Workbook::new();
        let range = arr(vec![Value::Text("a".into())]);
        let args = vec![range, Value::Text("z".into())];
        assert_eq!(fn_averageif(&args, &ctx(&wb)).unwrap(), Value::Error(CellError::Div0));
    }
}
