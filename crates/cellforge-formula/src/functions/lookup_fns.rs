//! `VLOOKUP`, `HLOOKUP`, `INDEX`, and `MATCH`.
//!
//! These all operate on the `Value::Array` shape the evaluator already
//! expands a range reference into before calling a function — no argument
//! here ever needs to re-resolve a cell reference itself.

use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "VLOOKUP", arity: Arity::Range(3, 4), volatile: false, eval: fn_vlookup });
    reg.register(FunctionSpec { name: "HLOOKUP", arity: Arity::Range(3, 4), volatile: false, eval: fn_hlookup });
    reg.register(FunctionSpec { name: "INDEX", arity: Arity::Range(2, 3), volatile: false, eval: fn_index });
    reg.register(FunctionSpec { name: "MATCH", arity: Arity::Range(2, 3), volatile: false, eval: fn_match });
    reg.register(FunctionSpec { name: "ROW", arity: Arity::Exact(0), volatile: false, eval: fn_row });
    reg.register(FunctionSpec { name: "COLUMN", arity: Arity::Exact(0), volatile: false, eval: fn_column });
    reg.register(FunctionSpec { name: "ROWS", arity: Arity::Exact(1), volatile: false, eval: fn_rows });
    reg.register(FunctionSpec { name: "COLUMNS", arity: Arity::Exact(1), volatile: false, eval: fn_columns });
    reg.register(FunctionSpec { name: "CHOOSE", arity: Arity::AtLeast(2), volatile: false, eval: fn_choose });
    reg.register(FunctionSpec { name: "SEQUENCE", arity: Arity::Range(1, 4), volatile: false, eval: fn_sequence });
}

fn as_rows(v: &Value) -> Vec<Vec<Value>> {
    match v {
        Value::Array(rows) => rows.clone(),
        other => vec![vec![other.clone()]],
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

/// Ordering used by the approximate-match branches of `MATCH`/`VLOOKUP`:
/// numbers order numerically, text lexically, and the two never compare
/// equal across kinds, matching Excel's type-segregated ordering.
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn fn_vlookup(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let key = &args[0];
    let table = as_rows(&args[1]);
    let col_index = match args[2].as_f64() {
        Some(n) if n >= 1.0 => n as usize - 1,
        _ => return Ok(Value::Error(CellError::Value)),
    };
    let approximate = args.get(3).map(|v| v.as_bool().unwrap_or(true)).unwrap_or(true);

    if approximate {
        let mut best: Option<&Vec<Value>> = None;
        for row in &table {
            if let Some(first) = row.first() {
                if let Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal) = compare(first, key) {
                    best = Some(row);
                } else {
                    break;
                }
            }
        }
        match best.and_then(|row| row.get(col_index)) {
            Some(v) => Ok(v.clone()),
            None => Ok(Value::Error(CellError::NA)),
        }
    } else {
        for row in &table {
            if row.first().is_some_and(|first| values_equal(first, key)) {
                return Ok(row.get(col_index).cloned().unwrap_or(Value::Error(CellError::NA)));
            }
        }
        Ok(Value::Error(CellError::NA))
    }
}

fn fn_hlookup(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let key = &args[0];
    let table = as_rows(&args[1]);
    let row_index = match args[2].as_f64() {
        Some(n) if n >= 1.0 => n as usize - 1,
        _ => return Ok(Value::Error(CellError::Value)),
    };
    let Some(header) = table.first() else {
        return Ok(Value::Error(CellError::NA));
    };
    let approximate = args.get(3).map(|v| v.as_bool().unwrap_or(true)).unwrap_or(true);

    let col = if approximate {
        let mut best = None;
        for (i, cell) in header.iter().enumerate() {
            if let Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal) = compare(cell, key) {
                best = Some(i);
            } else {
                break;
            }
        }
        best
    } else {
        header.iter().position(|cell| values_equal(cell, key))
    };

    match col.and_then(|c| table.get(row_index).and_then(|row| row.get(c))) {
        Some(v) => Ok(v.clone()),
        None => Ok(Value::Error(CellError::NA)),
    }
}

fn fn_index(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let table = as_rows(&args[0]);
    let row_num = args.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0) as i64;
    let col_num = args.get(2).and_then(|v| v.as_f64()).unwrap_or(0.0) as i64;

    if row_num == 0 && col_num == 0 {
        return Ok(Value::Array(table));
    }
    if row_num == 0 {
        let col = (col_num - 1).max(0) as usize;
        let column: Vec<Vec<Value>> = table
            .iter()
            .map(|row| vec![row.get(col).cloned().unwrap_or(Value::Empty)])
            .collect();
        return Ok(Value::Array(column));
    }
    let row = (row_num - 1).max(0) as usize;
    let Some(row_values) = table.get(row) else {
        return Ok(Value::Error(CellError::Ref));
    };
    if col_num == 0 {
        return Ok(Value::Array(vec![row_values.clone()]));
    }
    let col = (col_num - 1).max(0) as usize;
    match row_values.get(col) {
        Some(v) => Ok(v.clone()),
        None => Ok(Value::Error(CellError::Ref)),
    }
}

fn fn_match(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let key = &args[0];
    let items: Vec<Value> = as_rows(&args[1]).into_iter().flatten().collect();
    let match_type = args.get(2).and_then(|v| v.as_f64()).unwrap_or(1.0) as i32;

    match match_type {
        0 => {
            for (i, item) in items.iter().enumerate() {
                if values_equal(item, key) {
                    return Ok(Value::from_f64((i + 1) as f64));
                }
            }
            Ok(Value::Error(CellError::NA))
        }
        1 => {
            let mut best = None;
            for (i, item) in items.iter().enumerate() {
                match compare(item, key) {
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal) => best = Some(i),
                    _ => break,
                }
            }
            match best {
                Some(i) => Ok(Value::from_f64((i + 1) as f64)),
                None => Ok(Value::Error(CellError::NA)),
            }
        }
        -1 => {
            let mut best = None;
            for (i, item) in items.iter().enumerate() {
                match compare(item, key) {
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal) => best = Some(i),
                    _ => break,
                }
            }
            match best {
                Some(i) => Ok(Value::from_f64((i + 1) as f64)),
                None => Ok(Value::Error(CellError::NA)),
            }
        }
        _ => Ok(Value::Error(CellError::Value)),
    }
}

/// `ROW()`/`COLUMN()` take no argument here: a `Call` argument has already
/// been evaluated to a plain `Value` by the time a function body runs, so
/// there is no `ARef` left to recover a reference argument's position from.
/// The zero-argument form — "the row/column of the cell this formula is
/// in" — is exactly what Excel itself returns for a bare `ROW()`, so this
/// is a narrowing, not a reinterpretation.
fn fn_row(_args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::from_f64((ctx.current_cell().row.index() + 1) as f64))
}

fn fn_column(_args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::from_f64((ctx.current_cell().col.index() + 1) as f64))
}

fn fn_rows(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::from_f64(as_rows(&args[0]).len() as f64))
}

fn fn_columns(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rows = as_rows(&args[0]);
    Ok(Value::from_f64(rows.first().map(|r| r.len()).unwrap_or(0) as f64))
}

fn fn_choose(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let index = match args[0].as_f64() {
        Some(n) if n >= 1.0 => n as usize,
        _ => return Ok(Value::Error(CellError::Value)),
    };
    match args.get(index) {
        Some(v) => Ok(v.clone()),
        None => Ok(Value::Error(CellError::Value)),
    }
}

fn fn_sequence(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rows = match args[0].as_f64() {
        Some(n) if n >= 1.0 => n as usize,
        _ => return Ok(Value::Error(CellError::Value)),
    };
    let cols = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0).max(1.0) as usize;
    let start = args.get(2).and_then(|v| v.as_f64()).unwrap_or(1.0);
    let step = args.get(3).and_then(|v| v.as_f64()).unwrap_or(1.0);

    let mut out = Vec::with_capacity(rows);
    let mut n = start;
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for _ in 0..cols {
            row.push(Value::from_f64(n));
            n += step;
        }
        out.push(row);
    }
    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    fn table() -> Value {
        Value::Array(vec![
            vec![Value::from_f64(1.0), Value::Text("one".into())],
            vec![Value::from_f64(2.0), Value::Text("two".into())],
            vec![Value::from_f64(3.0), Value::Text("three".into())],
        ])
    }

    #[test]
    fn vlookup_exact_match() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(2.0), table(), Value::from_f64(2.0), Value::Bool(false)];
        assert_eq!(fn_vlookup(&args, &ctx(&wb)).unwrap(), Value::Text("two".into()));
    }

    #[test]
    fn vlookup_no_match_is_na() {
        let wb = Workbook::new();
        let args = vec![Value::from_f64(9.0), table(), Value::from_f64(2.0), Value::Bool(false)];
        assert_eq!(fn_vlookup(&args, &ctx(&wb)).unwrap(), Value::Error(CellError::NA));
    }

    #[test]
    fn match_exact_position() {
        let wb = Workbook::new();
        let items = Value::Array(vec![vec![Value::from_f64(1.0), Value::from_f64(2.0), Value::from_f64(3.0)]]);
        let args = vec![Value::from_f64(3.0), items, Value::from_f64(0.0)];
        assert_eq!(fn_match(&args, &ctx(&wb)).unwrap(), Value::from_f64(3.0));
    }

    #[test]
    fn index_returns_cell() {
        let wb = Workbook::new();
        let args = vec![table(), Value::from_f64(2.0), Value::from_f64(1.0)];
        assert_eq!(fn_index(&args, &ctx(&wb)).unwrap(), Value::from_f64(2.0));
    }
}
