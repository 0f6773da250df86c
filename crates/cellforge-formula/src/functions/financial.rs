//! Time-value-of-money functions: `NPV`, `IRR`, `XNPV`, `XIRR`, `PMT`, `FV`,
//! `PV`, `NPER`, `RATE`.
//!
//! Everything here works in `f64`, same rationale as `math.rs`'s trig
//! functions: these are iterative numerical methods, not exact decimal
//! arithmetic, so there is nothing for `BigDecimal` to buy us. The three
//! iterative solvers (`IRR`, `XIRR`, `RATE`) all go through [`newton_solve`]
//! with a starting guess of 0.1 and fail with an `EvalFailed` formula error
//! (not a cell-level `#NUM!`) when the iteration cap is hit or the
//! derivative collapses, since a solver's non-convergence is a different
//! kind of failure than a bad argument.

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "NPV", arity: Arity::AtLeast(2), volatile: false, eval: fn_npv });
    reg.register(FunctionSpec { name: "IRR", arity: Arity::Range(1, 2), volatile: false, eval: fn_irr });
    reg.register(FunctionSpec { name: "XNPV", arity: Arity::Exact(3), volatile: false, eval: fn_xnpv });
    reg.register(FunctionSpec { name: "XIRR", arity: Arity::Range(2, 3), volatile: false, eval: fn_xirr });
    reg.register(FunctionSpec { name: "PMT", arity: Arity::Range(3, 5), volatile: false, eval: fn_pmt });
    reg.register(FunctionSpec { name: "FV", arity: Arity::Range(3, 5), volatile: false, eval: fn_fv });
    reg.register(FunctionSpec { name: "PV", arity: Arity::Range(3, 5), volatile: false, eval: fn_pv });
    reg.register(FunctionSpec { name: "NPER", arity: Arity::Range(3, 5), volatile: false, eval: fn_nper });
    reg.register(FunctionSpec { name: "RATE", arity: Arity::Range(3, 6), volatile: false, eval: fn_rate });
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        for v in arg.flatten() {
            match v {
                Value::Error(e) => return Err(e),
                Value::Number(_) | Value::Bool(_) => {
                    out.push(v.as_f64().ok_or(CellError::Value)?)
                }
                Value::Empty => {}
                Value::Text(_) | Value::Array(_) => {}
            }
        }
    }
    Ok(out)
}

fn arg_f64(args: &[Value], i: usize, default: Option<f64>) -> Result<f64, CellError> {
    match args.get(i) {
        Some(Value::Error(e)) => Err(*e),
        Some(v) => v.as_f64().ok_or(CellError::Value),
        None => default.ok_or(CellError::Value),
    }
}

/// Newton's method over `f`, stopping when consecutive guesses are within
/// `tol` or after `max_iter` iterations. The derivative is estimated by
/// central difference since the financial recurrences aren't all cheaply
/// differentiable by hand at the call site.
fn newton_solve(
    guess: f64,
    max_iter: u32,
    tol: f64,
    deriv_floor: f64,
    f: impl Fn(f64) -> f64,
) -> Result<f64, String> {
    let mut x = guess;
    const H: f64 = 1e-6;
    for _ in 0..max_iter {
        let fx = f(x);
        let deriv = (f(x + H) - f(x - H)) / (2.0 * H);
        if deriv.abs() < deriv_floor {
            log::debug!("newton_solve: derivative collapsed near {x}");
            return Err(format!("derivative too small near {x} to continue iterating"));
        }
        let next = x - fx / deriv;
        if (next - x).abs() < tol {
            return Ok(next);
        }
        x = next;
    }
    log::debug!("newton_solve: no convergence within {max_iter} iterations from guess {guess}");
    Err(format!("did not converge after {max_iter} iterations"))
}

fn fn_npv(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let values = match numbers(&args[1..]) {
        Ok(vs) => vs,
        Err(e) => return Ok(Value::Error(e)),
    };
    let npv: f64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| v / (1.0 + rate).powi(i as i32 + 1))
        .sum();
    Ok(Value::from_f64(npv))
}

fn irr_npv(rate: f64, values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| v / (1.0 + rate).powi(i as i32))
        .sum()
}

fn fn_irr(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let values = match numbers(&args[..1]) {
        Ok(vs) => vs,
        Err(e) => return Ok(Value::Error(e)),
    };
    // A sign change is a precondition for Newton's method to have any hope
    // of converging (the implied NPV curve has no root otherwise) — the
    // same kind of failure as the solver itself not converging, not a bad
    // argument, so it's an evaluation error rather than a `#NUM!` value.
    if values.len() < 2 || !values.iter().any(|v| *v > 0.0) || !values.iter().any(|v| *v < 0.0) {
        return Err(FormulaError::eval_failed(
            "IRR requires at least one positive and one negative cash flow",
        ));
    }
    let guess = args.get(1).and_then(|v| v.as_f64()).unwrap_or(0.1);
    match newton_solve(guess, 50, 1e-7, 1e-10, |r| irr_npv(r, &values)) {
        Ok(r) => Ok(Value::from_f64(r)),
        Err(reason) => Err(FormulaError::eval_failed(format!("IRR {reason}"))),
    }
}

fn fn_xnpv(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let values = match numbers(&args[1..2]) {
        Ok(vs) => vs,
        Err(e) => return Ok(Value::Error(e)),
    };
    let dates = match numbers(&args[2..3]) {
        Ok(ds) => ds,
        Err(e) => return Ok(Value::Error(e)),
    };
    if values.len() != dates.len() || values.is_empty() {
        return Ok(Value::Error(CellError::Num));
    }
    let d0 = dates[0];
    let xnpv: f64 = values
        .iter()
        .zip(dates.iter())
        .map(|(v, d)| v / (1.0 + rate).powf((d - d0) / 365.0))
        .sum();
    Ok(Value::from_f64(xnpv))
}

fn fn_xirr(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let values = match numbers(&args[..1]) {
        Ok(vs) => vs,
        Err(e) => return Ok(Value::Error(e)),
    };
    let dates = match numbers(&args[1..2]) {
        Ok(ds) => ds,
        Err(e) => return Ok(Value::Error(e)),
    };
    if values.len() != dates.len() || values.is_empty() {
        return Ok(Value::Error(CellError::Num));
    }
    if !values.iter().any(|v| *v > 0.0) || !values.iter().any(|v| *v < 0.0) {
        return Err(FormulaError::eval_failed(
            "XIRR requires at least one positive and one negative cash flow",
        ));
    }
    let d0 = dates[0];
    let guess = args.get(2).and_then(|v| v.as_f64()).unwrap_or(0.1);
    let f = |rate: f64| -> f64 {
        values
            .iter()
            .zip(dates.iter())
            .map(|(v, d)| v / (1.0 + rate).powf((d - d0) / 365.0))
            .sum()
    };
    match newton_solve(guess, 100, 1e-7, 1e-10, f) {
        Ok(r) => Ok(Value::from_f64(r)),
        Err(reason) => Err(FormulaError::eval_failed(format!("XIRR {reason}"))),
    }
}

fn due_flag(args: &[Value], index: usize) -> f64 {
    if args.get(index).and_then(|v| v.as_f64()).unwrap_or(0.0) != 0.0 {
        1.0
    } else {
        0.0
    }
}

fn fn_pmt(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let nper = match arg_f64(args, 1, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pv = match arg_f64(args, 2, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let fv = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let due = due_flag(args, 4);

    let pmt = if rate == 0.0 {
        -(pv + fv) / nper
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(pv * growth + fv) * rate / ((1.0 + rate * due) * (growth - 1.0))
    };
    Ok(Value::from_f64(pmt))
}

fn fn_fv(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let nper = match arg_f64(args, 1, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pmt = match arg_f64(args, 2, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pv = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let due = due_flag(args, 4);

    let fv = if rate == 0.0 {
        -(pv + pmt * nper)
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(pv * growth + pmt * (1.0 + rate * due) * (growth - 1.0) / rate)
    };
    Ok(Value::from_f64(fv))
}

fn fn_pv(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let nper = match arg_f64(args, 1, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pmt = match arg_f64(args, 2, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let fv = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let due = due_flag(args, 4);

    let pv = if rate == 0.0 {
        -(fv + pmt * nper)
    } else {
        let growth = (1.0 + rate).powf(nper);
        -(fv + pmt * (1.0 + rate * due) * (growth - 1.0) / rate) / growth
    };
    Ok(Value::from_f64(pv))
}

fn fn_nper(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = match arg_f64(args, 0, None) {
        Ok(r) => r,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pmt = match arg_f64(args, 1, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pv = match arg_f64(args, 2, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let fv = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let due = due_flag(args, 4);

    if rate == 0.0 {
        if pmt == 0.0 {
            return Ok(Value::Error(CellError::Div0));
        }
        return Ok(Value::from_f64(-(pv + fv) / pmt));
    }
    let adj_pmt = pmt * (1.0 + rate * due);
    let numerator = adj_pmt - fv * rate;
    let denominator = adj_pmt + pv * rate;
    if numerator <= 0.0 || denominator <= 0.0 {
        return Ok(Value::Error(CellError::Num));
    }
    Ok(Value::from_f64((numerator / denominator).ln() / (1.0 + rate).ln()))
}

fn fn_rate(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let nper = match arg_f64(args, 0, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pmt = match arg_f64(args, 1, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let pv = match arg_f64(args, 2, None) {
        Ok(n) => n,
        Err(e) => return Ok(Value::Error(e)),
    };
    let fv = args.get(3).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let due = due_flag(args, 4);
    let guess = args.get(5).and_then(|v| v.as_f64()).unwrap_or(0.1);

    let f = |rate: f64| -> f64 {
        if rate == 0.0 {
            pv + pmt * nper + fv
        } else {
            let growth = (1.0 + rate).powf(nper);
            pv * growth + pmt * (1.0 + rate * due) * (growth - 1.0) / rate + fv
        }
    };
    match newton_solve(guess, 100, 1e-7, 1e-14, f) {
        Ok(r) => Ok(Value::from_f64(r)),
        Err(reason) => Err(FormulaError::eval_failed(format!("RATE {reason}"))),
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
    fn pmt_matches_known_loan() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(0.05 / 12.0), Value::from_f64(60.0), Value::from_f64(10000.0)];
        let result = fn_pmt(&args, &ctx(&wb)).unwrap();
        let pmt = result.as_f64().unwrap();
        assert!((pmt - (-188.71)).abs() < 0.01, "got {pmt}");
    }

    #[test]
    fn fv_zero_rate_is_linear() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(0.0), Value::from_f64(10.0), Value::from_f64(-100.0), Value::from_f64(0.0)];
        assert_eq!(fn_fv(&args, &ctx(&wb)).unwrap(), Value::from_f64(1000.0));
    }

    #[test]
    fn irr_of_simple_project() {
        let wb = Workbook::new();
        let values = Value::Array(vec![vec![
            Value::from_f64(-100.0),
            Value::from_f64(39.0),
            Value::from_f64(59.0),
            Value::from_f64(55.0),
            Value::from_f64(20.0),
        ]]);
        let result = fn_irr(&[values], &ctx(&wb)).unwrap();
        let rate = result.as_f64().unwrap();
        assert!((rate - 0.28095).abs() < 1e-3, "got {rate}");
    }

    #[test]
    fn irr_requires_sign_change() {
        let wb = Workbook::new();
        let values = Value::Array(vec![vec![Value::from_f64(100.0), Value::from_f64(50.0)]]);
        let err = fn_irr(&[values], &ctx(&wb)).unwrap_err();
        assert!(matches!(err, FormulaError::EvalFailed { .. }));
    }

    #[test]
    fn npv_discounts_future_cash_flows() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(0.1), Value::from_f64(110.0)];
        let result = fn_npv(&args, &ctx(&wb)).unwrap();
        assert_eq!(result, Value::from_f64(100.0));
    }
}
