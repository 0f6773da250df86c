//! Arithmetic, rounding, and trigonometric functions.
//!
//! Scalar math happens in `f64`: `BigDecimal` has no trig/log/exp support,
//! and Excel's own math functions are documented and tested against IEEE
//! double precision anyway. `SUM`/`AVERAGE` stay in `BigDecimal` since
//! they're pure addition and users do notice decimal drift there.

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "SUM", arity: Arity::AtLeast(1), volatile: false, eval: fn_sum });
    reg.register(FunctionSpec { name: "AVERAGE", arity: Arity::AtLeast(1), volatile: false, eval: fn_average });
    reg.register(FunctionSpec { name: "MIN", arity: Arity::AtLeast(1), volatile: false, eval: fn_min });
    reg.register(FunctionSpec { name: "MAX", arity: Arity::AtLeast(1), volatile: false, eval: fn_max });
    reg.register(FunctionSpec { name: "PRODUCT", arity: Arity::AtLeast(1), volatile: false, eval: fn_product });
    reg.register(FunctionSpec { name: "ABS", arity: Arity::Exact(1), volatile: false, eval: fn_abs });
    reg.register(FunctionSpec { name: "ROUND", arity: Arity::Exact(2), volatile: false, eval: fn_round });
    reg.register(FunctionSpec { name: "ROUNDUP", arity: Arity::Exact(2), volatile: false, eval: fn_roundup });
    reg.register(FunctionSpec { name: "ROUNDDOWN", arity: Arity::Exact(2), volatile: false, eval: fn_rounddown });
    reg.register(FunctionSpec { name: "INT", arity: Arity::Exact(1), volatile: false, eval: fn_int });
    reg.register(FunctionSpec { name: "TRUNC", arity: Arity::Range(1, 2), volatile: false, eval: fn_trunc });
    reg.register(FunctionSpec { name: "MOD", arity: Arity::Exact(2), volatile: false, eval: fn_mod });
    reg.register(FunctionSpec { name: "SQRT", arity: Arity::Exact(1), volatile: false, eval: fn_sqrt });
    reg.register(FunctionSpec { name: "POWER", arity: Arity::Exact(2), volatile: false, eval: fn_power });
    reg.register(FunctionSpec { name: "EXP", arity: Arity::Exact(1), volatile: false, eval: fn_exp });
    reg.register(FunctionSpec { name: "LN", arity: Arity::Exact(1), volatile: false, eval: fn_ln });
    reg.register(FunctionSpec { name: "LOG", arity: Arity::Range(1, 2), volatile: false, eval: fn_log });
    reg.register(FunctionSpec { name: "LOG10", arity: Arity::Exact(1), volatile: false, eval: fn_log10 });
    reg.register(FunctionSpec { name: "PI", arity: Arity::Exact(0), volatile: false, eval: fn_pi });
    reg.register(FunctionSpec { name: "SIN", arity: Arity::Exact(1), volatile: false, eval: fn_sin });
    reg.register(FunctionSpec { name: "COS", arity: Arity::Exact(1), volatile: false, eval: fn_cos });
    reg.register(FunctionSpec { name: "TAN", arity: Arity::Exact(1), volatile: false, eval: fn_tan });
    reg.register(FunctionSpec { name: "ASIN", arity: Arity::Exact(1), volatile: false, eval: fn_asin });
    reg.register(FunctionSpec { name: "ACOS", arity: Arity::Exact(1), volatile: false, eval: fn_acos });
    reg.register(FunctionSpec { name: "ATAN", arity: Arity::Exact(1), volatile: false, eval: fn_atan });
    reg.register(FunctionSpec { name: "ATAN2", arity: Arity::Exact(2), volatile: false, eval: fn_atan2 });
    reg.register(FunctionSpec { name: "DEGREES", arity: Arity::Exact(1), volatile: false, eval: fn_degrees });
    reg.register(FunctionSpec { name: "RADIANS", arity: Arity::Exact(1), volatile: false, eval: fn_radians });
    reg.register(FunctionSpec { name: "CEILING.MATH", arity: Arity::Range(1, 2), volatile: false, eval: fn_ceiling_math });
    reg.register(FunctionSpec { name: "FLOOR.MATH", arity: Arity::Range(1, 2), volatile: false, eval: fn_floor_math });
    reg.register(FunctionSpec { name: "ODD", arity: Arity::Exact(1), volatile: false, eval: fn_odd });
    reg.register(FunctionSpec { name: "EVEN", arity: Arity::Exact(1), volatile: false, eval: fn_even });
    reg.register(FunctionSpec { name: "SIGN", arity: Arity::Exact(1), volatile: false, eval: fn_sign });
    reg.register(FunctionSpec { name: "COUNT", arity: Arity::AtLeast(1), volatile: false, eval: fn_count });
    reg.register(FunctionSpec { name: "FLOOR", arity: Arity::Exact(2), volatile: false, eval: fn_floor });
    reg.register(FunctionSpec { name: "CEILING", arity: Arity::Exact(2), volatile: false, eval: fn_ceiling });
    reg.register(FunctionSpec { name: "SUMPRODUCT", arity: Arity::AtLeast(1), volatile: false, eval: fn_sumproduct });
    reg.register(FunctionSpec { name: "LARGE", arity: Arity::Exact(2), volatile: false, eval: fn_large });
    reg.register(FunctionSpec { name: "SMALL", arity: Arity::Exact(2), volatile: false, eval: fn_small });
    reg.register(FunctionSpec { name: "RAND", arity: Arity::Exact(0), volatile: true, eval: fn_rand });
    reg.register(FunctionSpec { name: "RANDBETWEEN", arity: Arity::Exact(2), volatile: true, eval: fn_randbetween });
}

/// Flatten args (scalars and arrays alike) into numbers, short-circuiting
/// on the first propagated error.
fn numbers(args: &[Value]) -> Result<Vec<bigdecimal::BigDecimal>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        for v in arg.flatten() {
            match v {
                Value::Number(n) => out.push(n),
                Value::Error(e) => return Err(e),
                Value::Bool(_) | Value::Text(_) | Value::Empty | Value::Array(_) => {}
            }
        }
    }
    Ok(out)
}

fn fn_sum(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match numbers(args) {
        Ok(ns) => Ok(Value::Number(ns.into_iter().sum())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_average(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match numbers(args) {
        Ok(ns) if ns.is_empty() => Ok(Value::Error(CellError::Div0)),
        Ok(ns) => {
            let count = ns.len();
            let sum: bigdecimal::BigDecimal = ns.into_iter().sum();
            Ok(Value::Number(sum / bigdecimal::BigDecimal::from(count as i64)))
        }
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_min(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match numbers(args) {
        Ok(ns) => Ok(Value::Number(ns.into_iter().min().unwrap_or_default())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_max(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match numbers(args) {
        Ok(ns) => Ok(Value::Number(ns.into_iter().max().unwrap_or_default())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_product(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match numbers(args) {
        Ok(ns) if ns.is_empty() => Ok(Value::Number(bigdecimal::BigDecimal::from(0))),
        Ok(ns) => {
            let mut acc = bigdecimal::BigDecimal::from(1);
            for n in ns {
                acc *= n;
            }
            Ok(Value::Number(acc))
        }
        Err(e) => Ok(Value::Error(e)),
    }
}

fn arg0_f64(args: &[Value]) -> FormulaResult<Result<f64, CellError>> {
    Ok(match args.first() {
        Some(Value::Error(e)) => Err(*e),
        Some(v) => v.as_f64().ok_or(CellError::Value),
        None => Err(CellError::Value),
    })
}

fn fn_abs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.abs())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_round(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let digits = args[1].as_f64().unwrap_or(0.0) as i32;
    Ok(Value::from_f64(round_half_away_from_zero(n, digits)))
}

fn fn_roundup(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let digits = args[1].as_f64().unwrap_or(0.0) as i32;
    let factor = 10f64.powi(digits);
    let scaled = n * factor;
    let rounded = if scaled >= 0.0 { scaled.ceil() } else { scaled.floor() };
    Ok(Value::from_f64(rounded / factor))
}

fn fn_rounddown(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let digits = args[1].as_f64().unwrap_or(0.0) as i32;
    let factor = 10f64.powi(digits);
    let scaled = n * factor;
    let truncated = if scaled >= 0.0 { scaled.floor() } else { scaled.ceil() };
    Ok(Value::from_f64(truncated / factor))
}

fn round_half_away_from_zero(n: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    let scaled = n * factor;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    rounded / factor
}

fn fn_int(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.floor())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_trunc(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let digits = args.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0) as i32;
    let factor = 10f64.powi(digits);
    let truncated = (n * factor).trunc() / factor;
    Ok(Value::from_f64(truncated))
}

fn fn_mod(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let d = match args[1].as_f64() {
        Some(d) => d,
        None => return Ok(Value::Error(CellError::Value)),
    };
    if d == 0.0 {
        return Ok(Value::Error(CellError::Div0));
    }
    let result = n - d * (n / d).floor();
    Ok(Value::from_f64(result))
}

fn fn_sqrt(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if n < 0.0 => Ok(Value::Error(CellError::Num)),
        Ok(n) => Ok(Value::from_f64(n.sqrt())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_power(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let base = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let exp = match args[1].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    Ok(Value::from_f64(base.powf(exp)))
}

fn fn_exp(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.exp())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_ln(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if n <= 0.0 => Ok(Value::Error(CellError::Num)),
        Ok(n) => Ok(Value::from_f64(n.ln())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_log(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    if n <= 0.0 {
        return Ok(Value::Error(CellError::Num));
    }
    let base = args.get(1).and_then(|v| v.as_f64()).unwrap_or(10.0);
    Ok(Value::from_f64(n.log(base)))
}

fn fn_log10(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if n <= 0.0 => Ok(Value::Error(CellError::Num)),
        Ok(n) => Ok(Value::from_f64(n.log10())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_pi(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::from_f64(std::f64::consts::PI))
}

fn fn_sin(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.sin())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_cos(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.cos())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_tan(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.tan())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_asin(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if !(-1.0..=1.0).contains(&n) => Ok(Value::Error(CellError::Num)),
        Ok(n) => Ok(Value::from_f64(n.asin())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_acos(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if !(-1.0..=1.0).contains(&n) => Ok(Value::Error(CellError::Num)),
        Ok(n) => Ok(Value::from_f64(n.acos())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_atan(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.atan())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_atan2(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let y = match args[1].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    Ok(Value::from_f64(y.atan2(x)))
}

fn fn_degrees(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.to_degrees())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_radians(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => Ok(Value::from_f64(n.to_radians())),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_ceiling_math(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let significance = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0);
    if significance == 0.0 {
        return Ok(Value::from_f64(0.0));
    }
    Ok(Value::from_f64((n / significance).ceil() * significance))
}

fn fn_floor_math(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let significance = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0);
    if significance == 0.0 {
        return Ok(Value::from_f64(0.0));
    }
    Ok(Value::from_f64((n / significance).floor() * significance))
}

fn fn_odd(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => {
            let rounded = if n >= 0.0 { n.ceil() } else { n.floor() };
            let rounded = rounded as i64;
            let odd = if rounded % 2 == 0 {
                if n >= 0.0 { rounded + 1 } else { rounded - 1 }
            } else {
                rounded
            };
            Ok(Value::from_f64(odd as f64))
        }
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_even(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) => {
            let rounded = if n >= 0.0 { n.ceil() } else { n.floor() } as i64;
            let even = if rounded % 2 != 0 {
                if n >= 0.0 { rounded + 1 } else { rounded - 1 }
            } else {
                rounded
            };
            Ok(Value::from_f64(even as f64))
        }
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_sign(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    match arg0_f64(args)? {
        Ok(n) if n > 0.0 => Ok(Value::from_f64(1.0)),
        Ok(n) if n < 0.0 => Ok(Value::from_f64(-1.0)),
        Ok(_) => Ok(Value::from_f64(0.0)),
        Err(e) => Ok(Value::Error(e)),
    }
}

/// Unlike [`numbers`], counts only cells that are actually numeric —
/// `COUNT` ignores text and booleans, where `SUM` would flatten past them.
fn fn_count(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut count = 0;
    for arg in args {
        for v in arg.flatten() {
            match v {
                Value::Number(_) => count += 1,
                Value::Error(e) => return Ok(Value::Error(e)),
                _ => {}
            }
        }
    }
    Ok(Value::from_f64(count as f64))
}

fn fn_floor(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let significance = match args[1].as_f64() {
        Some(s) => s,
        None => return Ok(Value::Error(CellError::Value)),
    };
    if significance == 0.0 {
        return Ok(if n == 0.0 { Value::from_f64(0.0) } else { Value::Error(CellError::Div0) });
    }
    if (n < 0.0) != (significance < 0.0) {
        return Ok(Value::Error(CellError::Num));
    }
    Ok(Value::from_f64((n / significance).floor() * significance))
}

fn fn_ceiling(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = match arg0_f64(args)? {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let significance = match args[1].as_f64() {
        Some(s) => s,
        None => return Ok(Value::Error(CellError::Value)),
    };
    if significance == 0.0 {
        return Ok(if n == 0.0 { Value::from_f64(0.0) } else { Value::Error(CellError::Div0) });
    }
    if (n < 0.0) != (significance < 0.0) {
        return Ok(Value::Error(CellError::Num));
    }
    Ok(Value::from_f64((n / significance).ceil() * significance))
}

fn fn_sumproduct(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let arrays: Vec<Vec<Value>> = args.iter().map(|a| a.flatten()).collect();
    let Some(len) = arrays.first().map(|a| a.len()) else {
        return Ok(Value::from_f64(0.0));
    };
    if arrays.iter().any(|a| a.len() != len) {
        return Ok(Value::Error(CellError::Value));
    }
    let mut total = 0.0;
    for i in 0..len {
        let mut product = 1.0;
        for arr in &arrays {
            match &arr[i] {
                Value::Error(e) => return Ok(Value::Error(*e)),
                v => product *= v.as_f64().unwrap_or(0.0),
            }
        }
        total += product;
    }
    Ok(Value::from_f64(total))
}

fn fn_large(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(&args[..1]) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    let k = match args[1].as_f64() {
        Some(k) if k >= 1.0 => k as usize,
        _ => return Ok(Value::Error(CellError::Num)),
    };
    let mut sorted = ns;
    sorted.sort_by(|a, b| b.cmp(a));
    match sorted.get(k - 1) {
        Some(n) => Ok(Value::Number(n.clone())),
        None => Ok(Value::Error(CellError::Num)),
    }
}

fn fn_small(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ns = match numbers(&args[..1]) {
        Ok(ns) => ns,
        Err(e) => return Ok(Value::Error(e)),
    };
    let k = match args[1].as_f64() {
        Some(k) if k >= 1.0 => k as usize,
        _ => return Ok(Value::Error(CellError::Num)),
    };
    let mut sorted = ns;
    sorted.sort();
    match sorted.get(k - 1) {
        Some(n) => Ok(Value::Number(n.clone())),
        None => Ok(Value::Error(CellError::Num)),
    }
}

/// The only two genuinely non-deterministic, non-date functions in the
/// registry — volatile so the evaluator always recomputes them rather than
/// trusting a cached value.
fn fn_rand(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    Ok(Value::from_f64(rng.gen::<f64>()))
}

fn fn_randbetween(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    use rand::Rng;
    let bottom = match arg0_f64(args)? {
        Ok(n) => n.ceil() as i64,
        Err(e) => return Ok(Value::Error(e)),
    };
    let top = match args[1].as_f64() {
        Some(n) => n.floor() as i64,
        None => return Ok(Value::Error(CellError::Value)),
    };
    if bottom > top {
        return Ok(Value::Error(CellError::Num));
    }
    let mut rng = rand::thread_rng();
    Ok(Value::from_f64(rng.gen_range(bottom..=top) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    #[test]
    fn sum_flattens_arrays_and_scalars() {
        let wb = Workbook::new();
        let args = vec![
            Value::Number(BigDecimal::from(1)),
            Value::Array(vec![vec![Value::Number(BigDecimal::from(2)), Value::Number(BigDecimal::from(3))]]),
        ];
        let result = fn_sum(&args, &ctx(&wb)).unwrap();
        assert_eq!(result, Value::Number(BigDecimal::from(6)));
    }

    #[test]
    fn average_of_empty_is_div0() {
        let wb = Workbook::new();
        let result = fn_average(&[Value::Text("x".into())], &ctx(&wb)).unwrap();
        assert_eq!(result, Value::Error(CellError::Div0));
    }

    #[test]
    fn round_half_away_from_zero_behavior() {
        assert_eq!(round_half_away_from_zero(2.5, 0), 3.0);
        assert_eq!(round_half_away_from_zero(-2.5, 0), -3.0);
        assert_eq!(round_half_away_from_zero(3.14159, 2), 3.14);
    }

    #[test]
    fn sqrt_of_negative_is_num_error() {
        let wb = Workbook::new();
        let result = fn_sqrt(&[Value::Number(BigDecimal::from(-1))], &ctx(&wb)).unwrap();
        assert_eq!(result, Value::Error(CellError::Num));
    }
}
