//! `TExpr`: the parsed, typed formula expression tree.
//!
//! Reference nodes carry no resolved value — decoding a `Ref`/`RangeRef`
//! into a concrete [`crate::value::Value`] (including the type-mismatch
//! checks a polymorphic reference implies) is the evaluator's job, not the
//! parser's. There is no separate `ToInt`/`DateToSerial`/`DateTimeToSerial`
//! coercion node: every leaf already evaluates to a dynamically-typed
//! `Value`, so a coercion is just a runtime conversion (`Value::as_f64`,
//! `CellValue::from`, ...) the consuming operator applies, not a distinct
//! tree shape.

use bigdecimal::BigDecimal;

use cellforge_core::{ARef, CellError, CellRange, SheetName};

use crate::functions::FunctionSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

/// A parsed formula. Every reference variant comes in a same-sheet and a
/// sheet-qualified form; aggregating functions (`SUM(A1:A3)`) don't need a
/// dedicated node because a range argument is just another `TExpr` a
/// `Call`'s eager argument evaluation expands into `Value::Array`.
#[derive(Debug, Clone, PartialEq)]
pub enum TExpr {
    Number(BigDecimal),
    Text(String),
    Bool(bool),
    ErrorLit(CellError),
    /// A bare name the parser could not resolve to a cell/range reference —
    /// a defined name, resolved against the workbook at evaluation time.
    Name(String),
    Ref(ARef),
    SheetRef(SheetName, ARef),
    RangeRef(CellRange),
    SheetRange(SheetName, CellRange),
    Unary(UnaryOp, Box<TExpr>),
    Binary(BinaryOp, Box<TExpr>, Box<TExpr>),
    Call {
        spec: &'static FunctionSpec,
        args: Vec<TExpr>,
    },
    Array(Vec<Vec<TExpr>>),
}

impl TExpr {
    /// Walk the tree collecting every same-sheet cell/range reference it
    /// contains, without expanding ranges into individual cells. Used by the
    /// dependency graph's structural helpers and by `contains_*` queries.
    pub fn same_sheet_refs(&self) -> Vec<RefSite> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<RefSite>) {
        match self {
            TExpr::Ref(r) => out.push(RefSite::Cell(*r)),
            TExpr::RangeRef(r) => out.push(RefSite::Range(*r)),
            TExpr::SheetRef(sheet, r) => out.push(RefSite::SheetCell(sheet.clone(), *r)),
            TExpr::SheetRange(sheet, r) => out.push(RefSite::SheetRange(sheet.clone(), *r)),
            TExpr::Unary(_, inner) => inner.collect_refs(out),
            TExpr::Binary(_, lhs, rhs) => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
            TExpr::Call { args, .. } => {
                for a in args {
                    a.collect_refs(out);
                }
            }
            TExpr::Array(rows) => {
                for row in rows {
                    for cell in row {
                        cell.collect_refs(out);
                    }
                }
            }
            TExpr::Number(_)
            | TExpr::Text(_)
            | TExpr::Bool(_)
            | TExpr::ErrorLit(_)
            | TExpr::Name(_) => {}
        }
    }

    /// True if this expression contains at least one cell or range reference
    /// (same-sheet or cross-sheet), without expanding any range.
    pub fn contains_cell_references(&self) -> bool {
        !self.same_sheet_refs().is_empty()
    }

    /// True if this expression contains at least one same-sheet (not
    /// explicitly sheet-qualified) cell or range reference.
    pub fn contains_unqualified_cell_references(&self) -> bool {
        self.same_sheet_refs()
            .iter()
            .any(|r| matches!(r, RefSite::Cell(_) | RefSite::Range(_)))
    }
}

/// One reference site found while walking a [`TExpr`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefSite {
    Cell(ARef),
    Range(CellRange),
    SheetCell(SheetName, ARef),
    SheetRange(SheetName, CellRange),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_sheet_refs_ignores_sheet_qualified() {
        let expr = TExpr::Binary(
            BinaryOp::Add,
            Box::new(TExpr::Ref(ARef::parse("A1").unwrap())),
            Box::new(TExpr::SheetRef(
                SheetName::new("Other").unwrap(),
                ARef::parse("B1").unwrap(),
            )),
        );
        assert!(expr.contains_cell_references());
        assert!(expr.contains_unqualified_cell_references());

        let qualified_only = TExpr::SheetRef(SheetName::new("Other").unwrap(), ARef::parse("B1").unwrap());
        assert!(qualified_only.contains_cell_references());
        assert!(!qualified_only.contains_unqualified_cell_references());
    }

    #[test]
    fn collects_refs_inside_call_args() {
        use crate::functions::lookup;
        let spec = lookup("SUM").unwrap();
        let expr = TExpr::Call {
            spec,
            args: vec![TExpr::RangeRef(CellRange::parse("A1:A3").unwrap())],
        };
        assert_eq!(expr.same_sheet_refs().len(), 1);
    }
}
