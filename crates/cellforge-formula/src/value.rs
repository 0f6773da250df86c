//! `Value`: the in-flight value type used while evaluating a [`crate::ast::TExpr`].
//!
//! Distinct from [`cellforge_core::CellValue`] because evaluation needs an
//! `Array` shape (the result of expanding a range reference) that a
//! persisted cell never holds.

use bigdecimal::{BigDecimal, Zero};
use cellforge_core::{CellError, CellValue};

use crate::error::{FormulaError, FormulaResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(BigDecimal),
    Bool(bool),
    Text(String),
    Error(CellError),
    Array(Vec<Vec<Value>>),
}

impl Value {
    pub fn number(n: impl Into<BigDecimal>) -> Self {
        Value::Number(n.into())
    }

    pub fn as_number(&self) -> Option<BigDecimal> {
        match self {
            Value::Number(n) => Some(n.clone()),
            Value::Bool(true) => Some(BigDecimal::from(1)),
            Value::Bool(false) => Some(BigDecimal::zero()),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Empty => Some(BigDecimal::zero()),
            _ => None,
        }
    }

    pub fn to_number(&self) -> FormulaResult<BigDecimal> {
        self.as_number()
            .ok_or_else(|| FormulaError::eval_failed(format!("cannot convert {self:?} to a number")))
    }

    pub fn as_f64(&self) -> Option<f64> {
        use num_traits::ToPrimitive;
        self.as_number().and_then(|n| n.to_f64())
    }

    /// Build a `Number` from an `f64` result, the currency of most math and
    /// statistical function bodies (`BigDecimal` has no trig/log/exp
    /// support). Non-finite results become `#NUM!`, matching Excel.
    pub fn from_f64(f: f64) -> Value {
        if !f.is_finite() {
            return Value::Error(CellError::Num);
        }
        match BigDecimal::try_from(f) {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Error(CellError::Num),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(!n.is_zero()),
            Value::Text(s) => match s.to_uppercase().as_str() {
                "TRUE" => Some(true),
                "FALSE" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::Number(n) => n.normalized().to_string(),
            Value::Text(s) => s.clone(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Error(e) => e.to_excel().to_string(),
            Value::Empty => String::new(),
            Value::Array(_) => CellError::Value.to_excel().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn get_error(&self) -> Option<CellError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Flatten this value into a sequence of scalars, expanding `Array` in
    /// row-major order; a scalar yields itself.
    pub fn flatten(&self) -> Vec<Value> {
        match self {
            Value::Array(rows) => rows.iter().flatten().cloned().collect(),
            other => vec![other.clone()],
        }
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Empty,
            CellValue::Number(n) => Value::Number(n),
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Text(s) => Value::Text(s),
            CellValue::RichText(runs) => {
                Value::Text(runs.into_iter().map(|r| r.text).collect())
            }
            CellValue::DateTime(dt) => {
                match cellforge_core::value::datetime_to_excel_serial(dt) {
                    Ok(serial) => Value::Number(
                        BigDecimal::try_from(serial).unwrap_or_else(|_| BigDecimal::zero()),
                    ),
                    Err(_) => Value::Error(CellError::Value),
                }
            }
            CellValue::Error(e) => Value::Error(e),
            CellValue::Formula { cached, .. } => {
                cached.map(|v| (*v).into()).unwrap_or(Value::Empty)
            }
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Empty => CellValue::Empty,
            Value::Number(n) => CellValue::Number(n),
            Value::Bool(b) => CellValue::Bool(b),
            Value::Text(s) => CellValue::Text(s),
            Value::Error(e) => CellValue::Error(e),
            Value::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_as_number() {
        assert_eq!(Value::Bool(true).as_number(), Some(BigDecimal::from(1)));
        assert_eq!(Value::Bool(false).as_number(), Some(BigDecimal::zero()));
    }

    #[test]
    fn flatten_array() {
        let v = Value::Array(vec![
            vec![Value::number(1), Value::number(2)],
            vec![Value::number(3), Value::number(4)],
        ]);
        assert_eq!(v.flatten().len(), 4);
    }
}
