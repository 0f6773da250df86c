//! The cell value sum type, cell errors, rich text, and Excel-serial
//! date/time conversion.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A spreadsheet error code. Each variant has a canonical Excel string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    Div0,
    Name,
    Num,
    Ref,
    Value,
    Null,
    NA,
    /// Non-standard; used only when the evaluator has propagated a cycle
    /// into a cached value. Never written to a file (see DESIGN.md).
    Circular,
    GettingData,
    CalcSpill,
}

impl CellError {
    pub fn to_excel(self) -> &'static str {
        match self {
            CellError::Div0 => "#DIV/0!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Ref => "#REF!",
            CellError::Value => "#VALUE!",
            CellError::Null => "#NULL!",
            CellError::NA => "#N/A",
            CellError::Circular => "#CIRC!",
            CellError::GettingData => "#GETTING_DATA",
            CellError::CalcSpill => "#CALC!",
        }
    }

    pub fn parse(code: &str) -> Result<Self, Error> {
        Ok(match code {
            "#DIV/0!" => CellError::Div0,
            "#NAME?" => CellError::Name,
            "#NUM!" => CellError::Num,
            "#REF!" => CellError::Ref,
            "#VALUE!" => CellError::Value,
            "#NULL!" => CellError::Null,
            "#N/A" => CellError::NA,
            "#CIRC!" => CellError::Circular,
            "#GETTING_DATA" => CellError::GettingData,
            "#CALC!" => CellError::CalcSpill,
            other => return Err(Error::InvalidError(other.to_string())),
        })
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_excel())
    }
}

/// A run of text within a [`CellValue::RichText`] value, carrying optional
/// font metadata for writers that care about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: Option<String>,
    /// Raw, unparsed `<rPr>`-equivalent markup, preserved for writers that
    /// round-trip byte-for-byte; the core never interprets this field.
    pub raw_rpr_xml: Option<String>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        TextRun {
            text: text.into(),
            font: None,
            raw_rpr_xml: None,
        }
    }
}

/// The value held by a single cell. Exactly one variant applies at a time;
/// a `Formula` cell's `cached` slot is advisory only (see the workbook-level
/// invariants in SPEC_FULL.md).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(BigDecimal),
    Bool(bool),
    Text(String),
    RichText(Vec<TextRun>),
    DateTime(NaiveDateTime),
    Error(CellError),
    Formula {
        expression: String,
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn number(n: impl Into<BigDecimal>) -> Self {
        CellValue::Number(n.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn formula(expression: impl Into<String>) -> Self {
        CellValue::Formula {
            expression: expression.into(),
            cached: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn as_error(&self) -> Option<CellError> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Concatenate all runs of a `RichText` value with no separator; plain
    /// `Text` values return their text unchanged; any other variant returns
    /// `None`.
    pub fn to_plain_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::RichText(runs) => {
                Some(runs.iter().map(|r| r.text.as_str()).collect::<String>())
            }
            _ => None,
        }
    }

    /// True if a text value would be interpreted as the start of a formula
    /// or a number by a naive reader and therefore needs a `'` escape prefix
    /// when a writer's `escape_formulas` configuration flag is set.
    pub fn needs_formula_escape(&self) -> bool {
        matches!(
            self.to_plain_text().as_deref().and_then(|s| s.chars().next()),
            Some('=') | Some('+') | Some('-') | Some('@')
        )
    }
}

/// The historical Excel epoch under the 1900 date system: day 1 is
/// 1900-01-01, but day 60 is the fictitious 1900-02-29 (the leap-year bug).
/// Using 1899-12-31 as the zero point reproduces Excel's count for dates
/// before the bug threshold; dates on or after 1900-03-01 get one extra
/// day added to skip over the fictitious leap day.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 31);

/// Convert a civil date to its Excel serial number under the 1900 date
/// system, reproducing the historical Feb-29-1900 leap bug: dates on or
/// after 1900-03-01 are offset by one extra day relative to a true Julian
/// day count from the epoch.
pub fn date_to_excel_serial(date: NaiveDate) -> Result<i64, Error> {
    let epoch = NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2)
        .expect("valid epoch date");
    let mut serial = (date - epoch).num_days();
    let march_1_1900 = NaiveDate::from_ymd_opt(1900, 3, 1).expect("valid date");
    if date >= march_1_1900 {
        serial += 1;
    }
    Ok(serial)
}

/// Inverse of [`date_to_excel_serial`].
pub fn excel_serial_to_date(serial: i64) -> Result<NaiveDate, Error> {
    let epoch = NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2)
        .expect("valid epoch date");
    let bug_threshold = 61; // serial of 1900-03-01 under the buggy scheme
    let days = if serial >= bug_threshold {
        serial - 1
    } else {
        serial
    };
    epoch
        .checked_add_signed(chrono::Duration::days(days))
        .ok_or_else(|| Error::InvalidError(format!("serial {serial} out of range")))
}

/// Convert a civil date-time to its fractional Excel serial (integer part is
/// the date, fractional part is the time of day).
pub fn datetime_to_excel_serial(dt: NaiveDateTime) -> Result<f64, Error> {
    let date_serial = date_to_excel_serial(dt.date())?;
    let seconds_in_day = dt.time().num_seconds_from_midnight() as f64;
    Ok(date_serial as f64 + seconds_in_day / 86_400.0)
}

/// Inverse of [`datetime_to_excel_serial`].
pub fn excel_serial_to_datetime(serial: f64) -> Result<NaiveDateTime, Error> {
    let day_part = serial.floor() as i64;
    let frac = serial - serial.floor();
    let date = excel_serial_to_date(day_part)?;
    let total_seconds = (frac * 86_400.0).round() as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(total_seconds.min(86_399), 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"));
    Ok(NaiveDateTime::new(date, time))
}

impl FromStr for CellError {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellError::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    #[test]
    fn cell_error_round_trip() {
        for e in [
            CellError::Div0,
            CellError::Name,
            CellError::Num,
            CellError::Ref,
            CellError::Value,
            CellError::Null,
            CellError::NA,
            CellError::Circular,
            CellError::GettingData,
            CellError::CalcSpill,
        ] {
            let code = e.to_excel();
            assert_eq!(CellError::parse(code).unwrap(), e);
        }
    }

    #[test]
    fn rich_text_plain_concat() {
        let v = CellValue::RichText(vec![
            TextRun::plain("Hello, "),
            TextRun::plain("world!"),
        ]);
        assert_eq!(v.to_plain_text().unwrap(), "Hello, world!");
    }

    #[test]
    fn excel_serial_date_round_trip_sample() {
        // 1900-03-01 is serial 61 under Excel's scheme (accounting for the
        // fictitious 1900-02-29 at serial 60).
        let d = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();
        let serial = date_to_excel_serial(d).unwrap();
        assert_eq!(serial, 61);
        assert_eq!(excel_serial_to_date(serial).unwrap(), d);
    }

    #[test]
    fn excel_serial_date_round_trip_modern() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let serial = date_to_excel_serial(d).unwrap();
        assert_eq!(excel_serial_to_date(serial).unwrap(), d);
    }

    #[test]
    fn needs_formula_escape() {
        let v = CellValue::text("=SUM(A1)");
        assert!(v.needs_formula_escape());
        let v = CellValue::text("plain");
        assert!(!v.needs_formula_escape());
    }

    #[test]
    fn number_wraps_bigdecimal() {
        let n = BigDecimal::from(42);
        let v = CellValue::number(n.clone());
        assert_eq!(v, CellValue::Number(n));
    }
}
