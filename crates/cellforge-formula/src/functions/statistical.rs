//! Counting and dispersion functions beyond the basic aggregates in
//! `math.rs`: `COUNTA`/`COUNTBLANK`, `MEDIAN`, `STDEV`/`VAR` (sample and
//! population forms).

use bigdecimal::ToPrimitive;
use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "COUNTA", arity: Arity::AtLeast(1), volatile: false, eval: fn_counta });
    reg.register(FunctionSpec { name: "COUNTBLANK", arity: Arity::Exact(1), volatile: false, eval: fn_countblank });
    reg.register(FunctionSpec { name: "MEDIAN", arity: Arity::AtLeast(1), volatile: false, eval: fn_median });
    reg.register(FunctionSpec { name: "STDEV", arity: Arity::AtLeast(1), volatile: false, eval: fn_stdev });
    reg.register(FunctionSpec { name: "STDEVP", arity: Arity::AtLeast(1), volatile: false, eval: fn_stdevp });
    reg.register(FunctionSpec { name: "VAR", arity: Arity::AtLeast(1), volatile: false, eval: fn_var });
    reg.register(FunctionSpec { name: "VARP", arity: Arity::AtLeast(1), volatile: false, eval: fn_varp });
}

fn fn_counta(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut count = 0;
    for arg in args {
        for v in arg.flatten() {
            if !matches!(v, Value::Empty) {
                count += 1;
            }
        }
    }
    Ok(Value::from_f64(count as f64))
}

fn fn_countblank(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let count = args[0]
        .flatten()
        .into_iter()
        .filter(|v| match v {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        })
        .count();
    Ok(Value::from_f64(count as f64))
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        for v in arg.flatten() {
            match v {
                Value::Number(n) => out.push(n.to_f64().unwrap_or(0.0)),
                Value::Error(e) => return Err(e),
                _ => {}
            }
        }
    }
    Ok(out)
}

fn fn_median(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut ns = match numbers(args) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    if ns.is_empty() {
        return Ok(Value::Error(CellError::Num));
    }
    ns.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = ns.len() / 2;
    let median = if ns.len() % 2 == 0 {
        (ns[mid - 1] + ns[mid]) / 2.0
    } else {
        ns[mid]
    };
    Ok(Value::from_f64(median))
}

fn mean(ns: &[f64]) -> f64 {
    ns.iter().sum::<f64>() / ns.len() as f64
}

fn variance(ns: &[f64], sample: bool) -> Option<f64> {
    let n = ns.len();
    let divisor = if sample { n.checked_sub(1)? } else { n };
    if divisor == 0 {
        return None;
    }
    let m = mean(ns);
    let sum_sq: f64 = ns.iter().map(|x| (x - m).powi(2)).sum();
    Some(sum_sq / divisor as f64)
}

fn fn_var(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(args) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    match variance(&ns, true) {
        Some(v) => Ok(Value::from_f64(v)),
        None => Ok(Value::Error(CellError::Div0)),
    }
}

fn fn_varp(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(args) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    match variance(&ns, false) {
        Some(v) => Ok(Value::from_f64(v)),
        None => Ok(Value::Error(CellError::Div0)),
    }
}

fn fn_stdev(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(args) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    match variance(&ns, true) {
        Some(v) => Ok(Value::from_f64(v.sqrt())),
        None => Ok(Value::Error(CellError::Div0)),
    }
}

fn fn_stdevp(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(args) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    match variance(&ns, false) {
        Some(v) => Ok(Value::from_f64(v.sqrt())),
        None => Ok(Value::Error(CellError::Div0)),
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
    fn median_odd_and_even() {
        let wb = Workbook::new();
        let odd = vec![Value::from_f64(1.0), Value::from_f64(2.0), Value::from_f64(3.0)];
        assert_eq!(fn_median(&odd, &ctx(&wb)).unwrap(), Value::from_f64(2.0));
        let even = vec![Value::from_f64(1.0), Value::from_f64(2.0), Value::from_f64(3.0), Value::from_f64(4.0)];
        assert_eq!(fn_median(&even, &ctx(&wb)).unwrap(), Value::from_f64(2.5));
    }

    #[test]
    fn counta_ignores_empty() {
        let wb = Workbook::new();
        let args = vec![Value::Array(vec![vec![Value::from_f64(1.0), Value::Empty, Value::Text("x".into())]])];
        assert_eq!(fn_counta(&args, &ctx(&wb)).unwrap(), Value::from_f64(2.0));
    }

    #[test]
    fn stdev_single_value_is_div0() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(5.0)];
        assert_eq!(fn_stdev(&args, &ctx(&wb)).unwrap(), Value::Error(CellError::Div0));
    }
}
