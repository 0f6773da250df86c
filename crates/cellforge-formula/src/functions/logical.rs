//! Boolean logic: `IF`, `AND`, `OR`, `NOT`, `XOR`, `IFERROR`, `IFNA`, and the
//! `TRUE`/`FALSE` literals-as-functions Excel exposes for compatibility.

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "IF", arity: Arity::Range(2, 3), volatile: false, eval: fn_if });
    reg.register(FunctionSpec { name: "AND", arity: Arity::AtLeast(1), volatile: false, eval: fn_and });
    reg.register(FunctionSpec { name: "OR", arity: Arity::AtLeast(1), volatile: false, eval: fn_or });
    reg.register(FunctionSpec { name: "NOT", arity: Arity::Exact(1), volatile: false, eval: fn_not });
    reg.register(FunctionSpec { name: "XOR", arity: Arity::AtLeast(1), volatile: false, eval: fn_xor });
    reg.register(FunctionSpec { name: "TRUE", arity: Arity::Exact(0), volatile: false, eval: fn_true });
    reg.register(FunctionSpec { name: "FALSE", arity: Arity::Exact(0), volatile: false, eval: fn_false });
    reg.register(FunctionSpec { name: "IFERROR", arity: Arity::Exact(2), volatile: false, eval: fn_iferror });
    reg.register(FunctionSpec { name: "IFNA", arity: Arity::Exact(2), volatile: false, eval: fn_ifna });
    reg.register(FunctionSpec { name: "IFS", arity: Arity::AtLeast(2), volatile: false, eval: fn_ifs });
    reg.register(FunctionSpec { name: "SWITCH", arity: Arity::AtLeast(3), volatile: false, eval: fn_switch });
}

fn truthy(v: &Value) -> Result<bool, CellError> {
    match v {
        Value::Error(e) => Err(*e),
        other => other.as_bool().ok_or(CellError::Value),
    }
}

fn fn_if(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match truthy(&args[0]) {
        Ok(true) => Ok(args[1].clone()),
        Ok(false) => Ok(args.get(2).cloned().unwrap_or(Value::Bool(false))),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_and(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut all = true;
    for arg in args {
        for v in arg.flatten() {
            match truthy(&v) {
                Ok(b) => all &= b,
                Err(e) => return Ok(Value::Error(e)),
            }
        }
    }
    Ok(Value::Bool(all))
}

fn fn_or(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut any = false;
    for arg in args {
        for v in arg.flatten() {
            match truthy(&v) {
                Ok(b) => any |= b,
                Err(e) => return Ok(Value::Error(e)),
            }
        }
    }
    Ok(Value::Bool(any))
}

fn fn_not(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match truthy(&args[0]) {
        Ok(b) => Ok(Value::Bool(!b)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_xor(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut count = 0;
    for arg in args {
        for v in arg.flatten() {
            match truthy(&v) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => return Ok(Value::Error(e)),
            }
        }
    }
    Ok(Value::Bool(count % 2 == 1))
}

fn fn_true(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(true))
}

fn fn_false(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(false))
}

fn fn_iferror(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    if args[0].is_error() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn fn_ifna(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    if args[0].get_error() == Some(CellError::NA) {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn fn_ifs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    for pair in args.chunks(2) {
        let [cond, result] = pair else {
            return Ok(Value::Error(CellError::NA));
        };
        match truthy(cond) {
            Ok(true) => return Ok(result.clone()),
            Ok(false) => {}
            Err(e) => return Ok(Value::Error(e)),
        }
    }
    Ok(Value::Error(CellError::NA))
}

fn fn_switch(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let target = &args[0];
    let rest = &args[1..];
    let mut cases = rest.chunks_exact(2);
    for case in cases.by_ref() {
        if values_equal(target, &case[0]) {
            return Ok(case[1].clone());
        }
    }
    match cases.remainder() {
        [default] => Ok(default.clone()),
        _ => Ok(Value::Error(CellError::NA)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Text(x), Value::Text(y)) => x.eq_ignore_ascii_case(y),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    #[test]
    fn if_picks_branch() {
        let wb = Workbook::new();
        let args = vec![Value::Bool(true), Value::Text("yes".into()), Value::Text("no".into())];
        assert_eq!(fn_if(&args, &ctx(&wb)).unwrap(), Value::Text("yes".into()));
    }

    #[test]
    fn if_without_else_is_false() {
        let wb = Workbook::new();
        let args = vec![Value::Bool(false), Value::Text("yes".into())];
        assert_eq!(fn_if(&args, &ctx(&wb)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn iferror_passes_through_non_error() {
        let wb = Workbook::new();
        let args = vec![Value::Bool(true), Value::Text("fallback".into())];
        assert_eq!(fn_iferror(&args, &ctx(&wb)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn xor_counts_true_values() {
        let wb = Workbook::new();
        let args = vec![Value::Bool(true), Value::Bool(true), Value::Bool(true)];
        assert_eq!(fn_xor(&args, &ctx(&wb)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn ifs_picks_first_true_branch() {
        let wb = Workbook::new();
        let args = vec![
            Value::Bool(false),
            Value::Text("no".into()),
            Value::Bool(true),
            Value::Text("yes".into()),
        ];
        assert_eq!(fn_ifs(&args, &ctx(&wb)).unwrap(), Value::Text("yes".into()));
    }

    #[test]
    fn switch_falls_back_to_default() {
        let wb = Workbook::new();
        let args = vec![
            Value::from_f64(3.0),
            Value::from_f64(1.0),
            Value::Text("one".into()),
            Value::Text("other".into()),
        ];
        assert_eq!(fn_switch(&args, &ctx(&wb)).unwrap(), Value::Text("other".into()));
    }
}
