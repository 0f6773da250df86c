//! The formula evaluator: turns a parsed [`crate::ast::TExpr`] into a
//! [`crate::value::Value`], and drives whole-sheet recalculation in
//! dependency order.
//!
//! `evaluate_formula`/`evaluate_cell` each build a throwaway single-sheet
//! [`Workbook`] around the sheet they're given so [`EvaluationContext`] (which
//! is written in terms of a workbook, to serve cross-sheet formulas too) has
//! something to borrow; the sheet itself is never mutated by these two
//! entry points. `evaluate_with_dependency_check` is the one entry point
//! that folds evaluated values back into an accumulator sheet as it goes,
//! so a later cell in the topological order sees its precedents' fresh
//! values rather than their stale cached ones.

use std::cmp::Ordering;

use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;

use cellforge_core::{ARef, CellValue, QualifiedRef, Sheet, Workbook};

use crate::ast::{BinaryOp, TExpr, UnaryOp};
use crate::context::{Clock, EvaluationContext};
use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::parser;
use crate::value::Value;

/// Wrap `sheet` in a fresh, single-sheet workbook. Both steps are
/// infallible by construction: the workbook starts empty (so `add_sheet`
/// can't collide with an existing name) and the sheet is placed at the
/// index `add_sheet` just created.
fn wrap_single_sheet(sheet: &Sheet) -> Workbook {
    Workbook::new()
        .add_sheet(sheet.name().clone())
        .expect("a freshly created workbook accepts any valid sheet name")
        .with_sheet(0, sheet.clone())
        .expect("index 0 exists immediately after add_sheet")
}

/// Evaluate `expr` against `ctx`, producing the dynamically-typed
/// [`Value`] the AST node denotes.
pub fn eval(expr: &TExpr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    match expr {
        TExpr::Number(n) => Ok(Value::Number(n.clone())),
        TExpr::Text(s) => Ok(Value::Text(s.clone())),
        TExpr::Bool(b) => Ok(Value::Bool(*b)),
        TExpr::ErrorLit(e) => Ok(Value::Error(*e)),

        TExpr::Name(name) => eval_name(name, ctx),

        TExpr::Ref(r) => resolve_cell(ctx, ctx.current_sheet_index(), *r),
        TExpr::SheetRef(sheet, r) => eval_sheet_ref(sheet.as_str(), *r, ctx),

        TExpr::RangeRef(range) => {
            Ok(Value::Array(resolve_range(ctx, ctx.current_sheet_index(), *range)?))
        }
        TExpr::SheetRange(sheet, range) => eval_sheet_range(sheet.as_str(), *range, ctx),

        TExpr::Unary(op, inner) => eval_unary(*op, inner, ctx),
        TExpr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),

        TExpr::Call { spec, args } => {
            if !spec.arity.accepts(args.len()) {
                return Err(FormulaError::ArgumentCount {
                    function: spec.name.to_string(),
                    expected: spec.arity.describe(),
                    actual: args.len(),
                });
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, ctx)?);
            }
            (spec.eval)(&values, ctx)
        }

        TExpr::Array(rows) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let mut out_row = Vec::with_capacity(row.len());
                for cell in row {
                    out_row.push(eval(cell, ctx)?);
                }
                out.push(out_row);
            }
            Ok(Value::Array(out))
        }
    }
}

fn eval_name(name: &str, ctx: &EvaluationContext) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    let Some(defined) = ctx.named_range(name) else {
        return Err(FormulaError::UnknownName(name.to_string()));
    };
    let expr = match parser::parse_formula(defined.expression()) {
        Ok(expr) => expr,
        Err(_) => return Ok(Value::Error(CellError::Name)),
    };
    eval(&expr, ctx)
}

fn eval_sheet_ref(sheet: &str, r: ARef, ctx: &EvaluationContext) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    match ctx.sheet_index_by_name(sheet) {
        Some(idx) => resolve_cell(ctx, idx, r),
        None => Ok(Value::Error(CellError::Ref)),
    }
}

fn eval_sheet_range(
    sheet: &str,
    range: cellforge_core::CellRange,
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    match ctx.sheet_index_by_name(sheet) {
        Some(idx) => Ok(Value::Array(resolve_range(ctx, idx, range)?)),
        None => Ok(Value::Error(CellError::Ref)),
    }
}

/// Resolve the cell at `r` on `sheet_index` to a [`Value`]: a plain cell's
/// stored value converts directly, but a `Formula` cell is parsed and
/// evaluated right here — its `cached` field is advisory (per the data
/// model's invariants) and is never read. `ctx`'s re-entrancy guard turns a
/// direct cycle reached purely by following references (distinct from a
/// whole-sheet cycle the dependency graph would have caught first) into a
/// `#CIRC!` value instead of unbounded recursion.
fn resolve_cell(ctx: &EvaluationContext, sheet_index: usize, r: ARef) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    let (Some(sheet_name), Some(cell_value)) =
        (ctx.sheet_name_at(sheet_index), ctx.raw_cell_value(sheet_index, r))
    else {
        return Ok(Value::Error(CellError::Ref));
    };

    match cell_value {
        CellValue::Formula { expression, .. } => {
            let qref = QualifiedRef::new(sheet_name.clone(), r);
            if !ctx.enter(qref.clone()) {
                return Ok(Value::Error(CellError::Circular));
            }
            let expr = parser::parse_formula(&expression)?;
            let nested = ctx.at(sheet_index, r);
            let result = eval(&expr, &nested);
            ctx.exit(&qref);
            result
        }
        other => Ok(Value::from(other)),
    }
}

/// Resolve every cell reference in the clipped range denoted by `range` on
/// `sheet_index`, row-major, through [`resolve_cell`] so a range element
/// that happens to be an uncached formula cell is evaluated rather than
/// read as `Empty`.
fn resolve_range(
    ctx: &EvaluationContext,
    sheet_index: usize,
    range: cellforge_core::CellRange,
) -> FormulaResult<Vec<Vec<Value>>> {
    let grid = ctx.clipped_range_cells(sheet_index, range);
    let mut out = Vec::with_capacity(grid.len());
    for row in grid {
        let mut out_row = Vec::with_capacity(row.len());
        for r in row {
            out_row.push(resolve_cell(ctx, sheet_index, r)?);
        }
        out.push(out_row);
    }
    Ok(out)
}

fn eval_unary(op: UnaryOp, inner: &TExpr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    let val = eval(inner, ctx)?;
    if let Some(e) = val.get_error() {
        return Ok(Value::Error(e));
    }
    let Some(n) = val.as_number() else {
        return Ok(Value::Error(CellError::Value));
    };
    match op {
        UnaryOp::Neg => Ok(Value::Number(-n)),
        UnaryOp::Plus => Ok(Value::Number(n)),
    }
}

fn eval_binary(op: BinaryOp, lhs: &TExpr, rhs: &TExpr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    let l = eval(lhs, ctx)?;
    let r = eval(rhs, ctx)?;
    if let Some(e) = l.get_error() {
        return Ok(Value::Error(e));
    }
    if let Some(e) = r.get_error() {
        return Ok(Value::Error(e));
    }

    match op {
        BinaryOp::Add => numeric_op(&l, &r, |a, b| Ok(Value::Number(a + b))),
        BinaryOp::Sub => numeric_op(&l, &r, |a, b| Ok(Value::Number(a - b))),
        BinaryOp::Mul => numeric_op(&l, &r, |a, b| Ok(Value::Number(a * b))),
        BinaryOp::Div => numeric_op(&l, &r, |a, b| {
            if b.is_zero() {
                Ok(Value::Error(CellError::Div0))
            } else {
                Ok(Value::Number(a / b))
            }
        }),
        BinaryOp::Pow => {
            let (Some(base), Some(exp)) = (l.as_f64(), r.as_f64()) else {
                return Ok(Value::Error(CellError::Value));
            };
            Ok(Value::from_f64(base.powf(exp)))
        }
        BinaryOp::Concat => Ok(Value::Text(l.as_string() + &r.as_string())),
        BinaryOp::Eq => Ok(Value::Bool(compare_values(&l, &r) == Ordering::Equal)),
        BinaryOp::Neq => Ok(Value::Bool(compare_values(&l, &r) != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Bool(compare_values(&l, &r) == Ordering::Less)),
        BinaryOp::Lte => Ok(Value::Bool(compare_values(&l, &r) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare_values(&l, &r) == Ordering::Greater)),
        BinaryOp::Gte => Ok(Value::Bool(compare_values(&l, &r) != Ordering::Less)),
    }
}

fn numeric_op(
    l: &Value,
    r: &Value,
    f: impl FnOnce(BigDecimal, BigDecimal) -> FormulaResult<Value>,
) -> FormulaResult<Value> {
    use cellforge_core::CellError;

    let (Some(a), Some(b)) = (l.as_number(), r.as_number()) else {
        return Ok(Value::Error(CellError::Value));
    };
    f(a, b)
}

/// Excel-style loose ordering across value kinds: numbers compare
/// numerically, text compares case-insensitively, booleans compare
/// `FALSE < TRUE`, and across kinds numbers < text < booleans. Errors and
/// arrays never reach here in practice (binary ops short-circuit on
/// [`Value::is_error`] first, and arrays are only ever compared elementwise
/// by the functions that expand them) — both fall back to `Equal`.
fn compare_values(l: &Value, r: &Value) -> Ordering {
    let norm = |v: &Value| -> Value {
        match v {
            Value::Empty => Value::Number(BigDecimal::zero()),
            other => other.clone(),
        }
    };
    match (norm(l), norm(r)) {
        (Value::Number(a), Value::Number(b)) => a.cmp(&b),
        (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(&b),
        (Value::Number(_), Value::Text(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        (Value::Number(_), Value::Bool(_)) => Ordering::Less,
        (Value::Bool(_), Value::Number(_)) => Ordering::Greater,
        (Value::Text(_), Value::Bool(_)) => Ordering::Less,
        (Value::Bool(_), Value::Text(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Parse and evaluate `expression` against `sheet` as if it were typed into
/// the formula bar of an unrelated, scratch cell (`A1`). Cross-sheet
/// references fail with `#REF!` since no workbook is available; use
/// [`evaluate_cell`] or [`evaluate_with_dependency_check`] when a formula
/// lives at a real address and might need one.
pub fn evaluate_formula(sheet: &Sheet, expression: &str, clock: Clock) -> FormulaResult<CellValue> {
    let scratch = ARef::parse("A1").expect("A1 is always a valid reference");
    evaluate_formula_at(sheet, scratch, expression, clock)
}

fn evaluate_formula_at(
    sheet: &Sheet,
    current_cell: ARef,
    expression: &str,
    clock: Clock,
) -> FormulaResult<CellValue> {
    let expr = parser::parse_formula(expression)?;
    let workbook = wrap_single_sheet(sheet);
    let ctx = EvaluationContext::new(&workbook, 0, current_cell).with_clock(clock);
    let value = eval(&expr, &ctx)?;
    Ok(CellValue::from(value))
}

/// Evaluate the cell at `r`: if it holds a formula, evaluate its
/// expression with `r` as the current cell; otherwise return the stored
/// value unchanged.
pub fn evaluate_cell(sheet: &Sheet, r: ARef, clock: Clock) -> FormulaResult<CellValue> {
    let cell = sheet.get(r);
    match cell.value {
        CellValue::Formula { expression, .. } => evaluate_formula_at(sheet, r, &expression, clock),
        other => Ok(other),
    }
}

/// Recalculate every formula cell in `sheet` in dependency order.
///
/// Builds the single-sheet dependency graph, checks for cycles, and folds
/// over Kahn's topological order: each cell is evaluated against an
/// accumulator sheet that already holds the fresh values of everything it
/// depends on. A failure at any cell aborts the whole recalculation — no
/// partial result map is ever returned.
pub fn evaluate_with_dependency_check(
    sheet: &Sheet,
    clock: Clock,
) -> FormulaResult<IndexMap<ARef, CellValue>> {
    let graph = DependencyGraph::from_sheet(sheet)?;
    graph.detect_cycles()?;
    let order = graph.topological_order()?;
    log::trace!("recalculating {} cell(s) in dependency order", order.len());

    let mut acc = sheet.clone();
    let mut results: IndexMap<ARef, CellValue> = IndexMap::new();

    for r in order {
        if !graph.is_formula_cell(r) {
            continue;
        }
        let CellValue::Formula { expression, .. } = acc.get(r).value else {
            continue;
        };
        let value = evaluate_formula_at(&acc, r, &expression, clock)?;
        // Fold the plain evaluated value into the accumulator (rather than
        // leaving a `Formula{cached}` cell behind) so a later cell in the
        // order that references `r` resolves it in O(1) instead of
        // re-parsing and re-evaluating the whole chain of precedents behind
        // it — `resolve_cell` only recurses when it finds an actual
        // `Formula` cell, and by now this one no longer is.
        acc = acc.put(r, value.clone());
        results.insert(r, value);
    }

    Ok(results)
}

/// Convenience alias for [`evaluate_with_dependency_check`] — every formula
/// in the sheet, recalculated in dependency order.
pub fn evaluate_all_formulas(sheet: &Sheet, clock: Clock) -> FormulaResult<IndexMap<ARef, CellValue>> {
    evaluate_with_dependency_check(sheet, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{CellValue, SheetName};

    fn a1(s: &str) -> ARef {
        ARef::parse(s).unwrap()
    }

    fn sheet() -> Sheet {
        Sheet::new(SheetName::new("Sheet1").unwrap())
    }

    #[test]
    fn acyclic_evaluation_sums_precedents() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1+C1"))
            .put(a1("B1"), CellValue::number(10))
            .put(a1("C1"), CellValue::number(20));
        let result = evaluate_formula(&s, "=A1", Clock::system()).unwrap();
        assert_eq!(result, CellValue::number(30));
    }

    #[test]
    fn unbounded_range_clips_before_summing() {
        let s = sheet()
            .put(a1("A1"), CellValue::number(1))
            .put(a1("A2"), CellValue::number(2))
            .put(a1("A3"), CellValue::number(3))
            .put(a1("D1"), CellValue::formula("=SUM(A:A)"));
        let result = evaluate_formula(&s, "=D1", Clock::system()).unwrap();
        assert_eq!(result, CellValue::number(6));
    }

    #[test]
    fn dependency_check_orders_and_recalculates_whole_sheet() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1+C1"))
            .put(a1("B1"), CellValue::number(10))
            .put(a1("C1"), CellValue::number(20));
        let map = evaluate_with_dependency_check(&s, Clock::system()).unwrap();
        assert_eq!(map.get(&a1("A1")), Some(&CellValue::number(30)));
    }

    #[test]
    fn circular_reference_is_rejected() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1"))
            .put(a1("B1"), CellValue::formula("=C1"))
            .put(a1("C1"), CellValue::formula("=A1"));
        let err = evaluate_with_dependency_check(&s, Clock::system()).unwrap_err();
        assert!(matches!(err, FormulaError::CircularRef(_)));
    }

    #[test]
    fn formula_error_is_absorbed_by_iferror() {
        let s = sheet()
            .put(a1("A1"), CellValue::number(0))
            .put(a1("B1"), CellValue::formula("=10/A1"))
            .put(a1("C1"), CellValue::formula("=IFERROR(B1, -1)"));
        let map = evaluate_with_dependency_check(&s, Clock::system()).unwrap();
        assert_eq!(map.get(&a1("B1")), Some(&CellValue::Error(cellforge_core::CellError::Div0)));
        assert_eq!(map.get(&a1("C1")), Some(&CellValue::number(-1)));
    }

    #[test]
    fn idempotent_on_unchanged_sheet() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1*2"))
            .put(a1("B1"), CellValue::number(21));
        let first = evaluate_with_dependency_check(&s, Clock::system()).unwrap();
        let second = evaluate_with_dependency_check(&s, Clock::system()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn evaluate_cell_passes_through_non_formula_values() {
        let s = sheet().put(a1("A1"), CellValue::text("hello"));
        let value = evaluate_cell(&s, a1("A1"), Clock::system()).unwrap();
        assert_eq!(value, CellValue::text("hello"));
    }

    #[test]
    fn unknown_name_is_a_formula_error() {
        let s = sheet();
        let err = evaluate_formula(&s, "=NoSuchName", Clock::system()).unwrap_err();
        assert!(matches!(err, FormulaError::UnknownName(_)));
    }

    #[test]
    fn comparison_operators_are_case_insensitive_for_text() {
        let s = sheet();
        let result = evaluate_formula(&s, "=\"Apple\"=\"apple\"", Clock::system()).unwrap();
        assert_eq!(result, CellValue::Bool(true));
    }

    #[test]
    fn ref_to_uncached_formula_cell_evaluates_it() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1+1"))
            .put(a1("B1"), CellValue::formula("=C1*2"))
            .put(a1("C1"), CellValue::number(5));
        let result = evaluate_formula(&s, "=A1", Clock::system()).unwrap();
        assert_eq!(result, CellValue::number(11));
    }

    #[test]
    fn range_containing_uncached_formula_cell_evaluates_it() {
        let s = sheet()
            .put(a1("A1"), CellValue::number(1))
            .put(a1("A2"), CellValue::formula("=A1+1"))
            .put(a1("A3"), CellValue::number(3));
        let result = evaluate_formula(&s, "=SUM(A1:A3)", Clock::system()).unwrap();
        assert_eq!(result, CellValue::number(6));
    }

    #[test]
    fn direct_ref_cycle_reports_circular_without_standalone_dependency_check() {
        let s = sheet()
            .put(a1("A1"), CellValue::formula("=B1"))
            .put(a1("B1"), CellValue::formula("=A1"));
        let result = evaluate_formula(&s, "=A1", Clock::system()).unwrap();
        assert_eq!(result, CellValue::Error(cellforge_core::CellError::Circular));
    }
}
