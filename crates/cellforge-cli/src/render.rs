//! Plain-text rendering of cell values for terminal output.
//!
//! Structured output formats (`--format json|csv|markdown`) belong to a
//! renderer collaborator outside this workspace; this shell only ever prints
//! text, matching the core's `Cell`/`CellValue`-only output contract.

use cellforge_core::CellValue;
use cellforge_formula::Value;

/// The displayed value of a cell: a formula's cached result if it has one,
/// otherwise the stored value rendered the way a formula bar would show it.
pub fn display_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Formula { cached, .. } => match cached.as_deref() {
            Some(v) => display_value(v),
            None => String::new(),
        },
        other => Value::from(other.clone()).as_string(),
    }
}

/// The formula text of a cell, or its displayed value if it isn't a formula.
pub fn display_formula_or_value(value: &CellValue) -> String {
    match value {
        CellValue::Formula { expression, .. } => expression.clone(),
        other => display_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    #[test]
    fn formula_without_cache_displays_empty() {
        let v = CellValue::formula("=1+1");
        assert_eq!(display_value(&v), "");
    }

    #[test]
    fn formula_with_cache_displays_cached_value() {
        let v = CellValue::Formula {
            expression: "=1+1".to_string(),
            cached: Some(Box::new(CellValue::Number(BigDecimal::from(2)))),
        };
        assert_eq!(display_value(&v), "2");
    }

    #[test]
    fn formula_or_value_prefers_expression_text() {
        let v = CellValue::formula("=A1+B1");
        assert_eq!(display_formula_or_value(&v), "=A1+B1");
    }
}
