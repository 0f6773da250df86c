//! Number format codes: general, built-in numeric ID, or a custom pattern.

/// A cell's number display format.
///
/// `num_fmt_id` on [`super::CellStyle`] carries the raw built-in ID when a
/// writer needs to round-trip it independently of the parsed [`NumberFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    #[default]
    General,
    BuiltIn(u32),
    Custom(String),
}

impl NumberFormat {
    pub const ID_GENERAL: u32 = 0;
    pub const ID_NUMBER_INT: u32 = 1;
    pub const ID_NUMBER_DEC2: u32 = 2;
    pub const ID_NUMBER_SEP: u32 = 3;
    pub const ID_NUMBER_SEP_DEC2: u32 = 4;
    pub const ID_PERCENT_INT: u32 = 9;
    pub const ID_PERCENT_DEC2: u32 = 10;
    pub const ID_SCIENTIFIC: u32 = 11;
    pub const ID_FRACTION: u32 = 12;
    pub const ID_FRACTION2: u32 = 13;
    pub const ID_DATE_SHORT: u32 = 14;
    pub const ID_DATE_MEDIUM: u32 = 15;
    pub const ID_DATE_DAY_MONTH: u32 = 16;
    pub const ID_DATE_MONTH_YEAR: u32 = 17;
    pub const ID_TIME_AMPM: u32 = 18;
    pub const ID_TIME_AMPM_SEC: u32 = 19;
    pub const ID_TIME_24H: u32 = 20;
    pub const ID_TIME_24H_SEC: u32 = 21;
    pub const ID_DATETIME: u32 = 22;
    pub const ID_ACCOUNTING_INT: u32 = 37;
    pub const ID_ACCOUNTING_INT_RED: u32 = 38;
    pub const ID_ACCOUNTING_DEC2: u32 = 39;
    pub const ID_ACCOUNTING_DEC2_RED: u32 = 40;
    pub const ID_TEXT: u32 = 49;

    pub fn from_string<S: Into<String>>(format: S) -> Self {
        NumberFormat::Custom(format.into())
    }

    pub fn from_id(id: u32) -> Self {
        NumberFormat::BuiltIn(id)
    }

    pub fn integer() -> Self {
        NumberFormat::BuiltIn(Self::ID_NUMBER_INT)
    }

    pub fn decimal() -> Self {
        NumberFormat::BuiltIn(Self::ID_NUMBER_DEC2)
    }

    pub fn thousands() -> Self {
        NumberFormat::BuiltIn(Self::ID_NUMBER_SEP)
    }

    pub fn percent() -> Self {
        NumberFormat::BuiltIn(Self::ID_PERCENT_INT)
    }

    pub fn percent_decimal() -> Self {
        NumberFormat::BuiltIn(Self::ID_PERCENT_DEC2)
    }

    pub fn date_short() -> Self {
        NumberFormat::BuiltIn(Self::ID_DATE_SHORT)
    }

    pub fn datetime() -> Self {
        NumberFormat::BuiltIn(Self::ID_DATETIME)
    }

    pub fn text() -> Self {
        NumberFormat::BuiltIn(Self::ID_TEXT)
    }

    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => Self::builtin_format_string(*id),
            NumberFormat::Custom(s) => s,
        }
    }

    fn builtin_format_string(id: u32) -> &'static str {
        match id {
            0 => "General",
            1 => "0",
            2 => "0.00",
            3 => "#,##0",
            4 => "#,##0.00",
            9 => "0%",
            10 => "0.00%",
            11 => "0.00E+00",
            12 => "# ?/?",
            13 => "# ??/??",
            14 => "mm-dd-yy",
            15 => "d-mmm-yy",
            16 => "d-mmm",
            17 => "mmm-yy",
            18 => "h:mm AM/PM",
            19 => "h:mm:ss AM/PM",
            20 => "h:mm",
            21 => "h:mm:ss",
            22 => "m/d/yy h:mm",
            37 => "#,##0 ;(#,##0)",
            38 => "#,##0 ;[Red](#,##0)",
            39 => "#,##0.00;(#,##0.00)",
            40 => "#,##0.00;[Red](#,##0.00)",
            49 => "@",
            _ => "General",
        }
    }

    /// True for any of the built-in date/time IDs or a custom pattern that
    /// looks date-ish (contains y/m/d/h/s placeholders and no quoted text).
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => matches!(id, 14..=22),
            NumberFormat::Custom(s) => {
                let lower = s.to_lowercase();
                (lower.contains('y')
                    || lower.contains('m')
                    || lower.contains('d')
                    || lower.contains('h')
                    || lower.contains('s'))
                    && !lower.contains('"')
            }
            NumberFormat::General => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_format_strings() {
        assert_eq!(NumberFormat::percent().format_string(), "0%");
        assert_eq!(NumberFormat::date_short().format_string(), "mm-dd-yy");
    }

    #[test]
    fn date_format_detection() {
        assert!(NumberFormat::date_short().is_date_format());
        assert!(!NumberFormat::percent().is_date_format());
        assert!(NumberFormat::from_string("yyyy-mm-dd").is_date_format());
        assert!(!NumberFormat::from_string("\"m\" 0.00").is_date_format());
    }
}
