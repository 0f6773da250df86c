//! Type-inspection predicates: `ISBLANK`, `ISNUMBER`, `ISTEXT`, `ISERROR`,
//! `ISNA`, `ISLOGICAL`.

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "ISBLANK", arity: Arity::Exact(1), volatile: false, eval: fn_isblank });
    reg.register(FunctionSpec { name: "ISNUMBER", arity: Arity::Exact(1), volatile: false, eval: fn_isnumber });
    reg.register(FunctionSpec { name: "ISTEXT", arity: Arity::Exact(1), volatile: false, eval: fn_istext });
    reg.register(FunctionSpec { name: "ISLOGICAL", arity: Arity::Exact(1), volatile: false, eval: fn_islogical });
    reg.register(FunctionSpec { name: "ISERROR", arity: Arity::Exact(1), volatile: false, eval: fn_iserror });
    reg.register(FunctionSpec { name: "ISERR", arity: Arity::Exact(1), volatile: false, eval: fn_iserr });
    reg.register(FunctionSpec { name: "ISNA", arity: Arity::Exact(1), volatile: false, eval: fn_isna });
    reg.register(FunctionSpec { name: "NA", arity: Arity::Exact(0), volatile: false, eval: fn_na });
}

fn fn_isblank(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Empty)))
}

fn fn_isnumber(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Number(_))))
}

fn fn_istext(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Text(_))))
}

fn fn_islogical(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn fn_iserror(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(args[0].is_error()))
}

fn fn_iserr(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(
        args[0].is_error() && args[0].get_error() != Some(cellforge_core::CellError::NA),
    ))
}

fn fn_isna(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Bool(args[0].get_error() == Some(cellforge_core::CellError::NA)))
}

fn fn_na(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Error(cellforge_core::CellError::NA))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, CellError, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    #[test]
    fn iserr_excludes_na() {
        let wb = Workbook::new();
        assert_eq!(fn_iserr(&[Value::Error(CellError::NA)], &ctx(&wb)).unwrap(), Value::Bool(false));
        assert_eq!(fn_iserr(&[Value::Error(CellError::Div0)], &ctx(&wb)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn isblank_only_for_empty() {
        let wb = Workbook::new();
        assert_eq!(fn_isblank(&[Value::Empty], &ctx(&wb)).unwrap(), Value::Bool(true));
        assert_eq!(fn_isblank(&[Value::Text(String::new())], &ctx(&wb)).unwrap(), Value::Bool(false));
    }
}
