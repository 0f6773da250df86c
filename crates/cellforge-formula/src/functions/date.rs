//! Date/time functions. Dates live as Excel serials in `Value::Number`;
//! `ctx.date_1904()` decides which epoch a serial is read against, so every
//! conversion to/from a civil date routes through
//! [`EvaluationContext::adjust_serial_for_date_system`]/
//! [`EvaluationContext::serial_to_1900`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use cellforge_core::value::{date_to_excel_serial, excel_serial_to_date};
use cellforge_core::CellError;

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::Value;

use super::{Arity, FunctionRegistry, FunctionSpec};

pub(super) fn register(reg: &mut FunctionRegistry) {
    reg.register(FunctionSpec { name: "DATE", arity: Arity::Exact(3), volatile: false, eval: fn_date });
    reg.register(FunctionSpec { name: "YEAR", arity: Arity::Exact(1), volatile: false, eval: fn_year });
    reg.register(FunctionSpec { name: "MONTH", arity: Arity::Exact(1), volatile: false, eval: fn_month });
    reg.register(FunctionSpec { name: "DAY", arity: Arity::Exact(1), volatile: false, eval: fn_day });
    reg.register(FunctionSpec { name: "WEEKDAY", arity: Arity::Range(1, 2), volatile: false, eval: fn_weekday });
    reg.register(FunctionSpec { name: "EOMONTH", arity: Arity::Exact(2), volatile: false, eval: fn_eomonth });
    reg.register(FunctionSpec { name: "EDATE", arity: Arity::Exact(2), volatile: false, eval: fn_edate });
    reg.register(FunctionSpec { name: "DATEDIF", arity: Arity::Exact(3), volatile: false, eval: fn_datedif });
    reg.register(FunctionSpec { name: "TODAY", arity: Arity::Exact(0), volatile: true, eval: fn_today });
    reg.register(FunctionSpec { name: "NOW", arity: Arity::Exact(0), volatile: true, eval: fn_now });
}

fn serial_to_date(ctx: &EvaluationContext, serial: f64) -> Result<NaiveDate, CellError> {
    let serial_1900 = ctx.serial_to_1900(serial);
    excel_serial_to_date(serial_1900.round() as i64).map_err(|_| CellError::Num)
}

fn date_to_serial(ctx: &EvaluationContext, date: NaiveDate) -> Result<f64, CellError> {
    let serial_1900 = date_to_excel_serial(date).map_err(|_| CellError::Num)?;
    Ok(ctx.adjust_serial_for_date_system(serial_1900 as f64))
}

fn fn_date(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let year = args[0].as_f64().unwrap_or(0.0) as i32;
    let month = args[1].as_f64().unwrap_or(0.0) as i32;
    let day = args[2].as_f64().unwrap_or(0.0) as i32;

    // Excel folds out-of-range month/day into adjacent years/months; model
    // that by building the date from a days-from-anchor offset.
    let anchor = match NaiveDate::from_ymd_opt(year, 1, 1) {
        Some(d) => d,
        None => return Ok(Value::Error(CellError::Num)),
    };
    let months_offset = month - 1;
    let base_year = year + months_offset.div_euclid(12);
    let base_month = months_offset.rem_euclid(12) + 1;
    let Some(first_of_month) = NaiveDate::from_ymd_opt(base_year, base_month as u32, 1) else {
        return Ok(Value::Error(CellError::Num));
    };
    let date = first_of_month + chrono::Duration::days((day - 1) as i64);
    let _ = anchor;

    match date_to_serial(ctx, date) {
        Ok(serial) => Ok(Value::from_f64(serial)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_year(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    match serial_to_date(ctx, serial) {
        Ok(d) => Ok(Value::from_f64(d.year() as f64)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_month(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    match serial_to_date(ctx, serial) {
        Ok(d) => Ok(Value::from_f64(d.month() as f64)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_day(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    match serial_to_date(ctx, serial) {
        Ok(d) => Ok(Value::from_f64(d.day() as f64)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_weekday(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    let date = match serial_to_date(ctx, serial) {
        Ok(d) => d,
        Err(e) => return Ok(Value::Error(e)),
    };
    let return_type = args.get(1).and_then(|v| v.as_f64()).unwrap_or(1.0) as i32;
    // Sunday = 0 in chrono's num_days_from_sunday.
    let from_sunday = date.weekday().num_days_from_sunday() as i32;
    let result = match return_type {
        1 => from_sunday + 1,          // 1 (Sun) .. 7 (Sat)
        2 => (from_sunday + 6) % 7 + 1, // 1 (Mon) .. 7 (Sun)
        3 => (from_sunday + 6) % 7,     // 0 (Mon) .. 6 (Sun)
        _ => return Ok(Value::Error(CellError::Num)),
    };
    Ok(Value::from_f64(result as f64))
}

fn fn_eomonth(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    let months = args[1].as_f64().unwrap_or(0.0) as i32;
    let date = match serial_to_date(ctx, serial) {
        Ok(d) => d,
        Err(e) => return Ok(Value::Error(e)),
    };
    let total_months = date.year() * 12 + (date.month() as i32 - 1) + months + 1;
    let target_year = total_months.div_euclid(12);
    let target_month = total_months.rem_euclid(12) + 1;
    let Some(first_of_next) = NaiveDate::from_ymd_opt(target_year, target_month as u32, 1) else {
        return Ok(Value::Error(CellError::Num));
    };
    let last_day = first_of_next - chrono::Duration::days(1);
    match date_to_serial(ctx, last_day) {
        Ok(s) => Ok(Value::from_f64(s)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_edate(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    let months = args[1].as_f64().unwrap_or(0.0) as i32;
    let date = match serial_to_date(ctx, serial) {
        Ok(d) => d,
        Err(e) => return Ok(Value::Error(e)),
    };
    let total_months = date.year() * 12 + (date.month() as i32 - 1) + months;
    let target_year = total_months.div_euclid(12);
    let target_month = (total_months.rem_euclid(12) + 1) as u32;
    let day = date.day();
    let Some(mut result) = NaiveDate::from_ymd_opt(target_year, target_month, day) else {
        // day doesn't exist in target month (e.g. Jan 31 + 1 month); clamp
        // to the last day of the target month.
        let Some(first_of_next) =
            NaiveDate::from_ymd_opt(target_year, target_month % 12 + 1, 1)
                .or_else(|| NaiveDate::from_ymd_opt(target_year + 1, 1, 1))
        else {
            return Ok(Value::Error(CellError::Num));
        };
        let clamped = first_of_next - chrono::Duration::days(1);
        return match date_to_serial(ctx, clamped) {
            Ok(s) => Ok(Value::from_f64(s)),
            Err(e) => Ok(Value::Error(e)),
        };
    };
    let _ = &mut result;
    match date_to_serial(ctx, result) {
        Ok(s) => Ok(Value::from_f64(s)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_datedif(args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let start_serial = match args[0].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    let end_serial = match args[1].as_f64() {
        Some(n) => n,
        None => return Ok(Value::Error(CellError::Value)),
    };
    let unit = match &args[2] {
        Value::Text(s) => s.to_uppercase(),
        _ => return Ok(Value::Error(CellError::Value)),
    };
    let start = match serial_to_date(ctx, start_serial) {
        Ok(d) => d,
        Err(e) => return Ok(Value::Error(e)),
    };
    let end = match serial_to_date(ctx, end_serial) {
        Ok(d) => d,
        Err(e) => return Ok(Value::Error(e)),
    };
    if start > end {
        return Ok(Value::Error(CellError::Num));
    }
    let result = match unit.as_str() {
        "D" => (end - start).num_days() as f64,
        "M" => {
            ((end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
                - if end.day() < start.day() { 1 } else { 0 }) as f64
        }
        "Y" => {
            (end.year() - start.year()
                - if (end.month(), end.day()) < (start.month(), start.day()) { 1 } else { 0 })
                as f64
        }
        _ => return Ok(Value::Error(CellError::Num)),
    };
    Ok(Value::from_f64(result))
}

fn fn_today(_args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let date = ctx.clock().now().date();
    match date_to_serial(ctx, date) {
        Ok(s) => Ok(Value::from_f64(s)),
        Err(e) => Ok(Value::Error(e)),
    }
}

fn fn_now(_args: &[Value], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let dt: NaiveDateTime = ctx.clock().now();
    let serial_1900 = match cellforge_core::value::datetime_to_excel_serial(dt) {
        Ok(s) => s,
        Err(_) => return Ok(Value::Error(CellError::Num)),
    };
    Ok(Value::from_f64(ctx.adjust_serial_for_date_system(serial_1900)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{ARef, Workbook};

    fn ctx(wb: &Workbook) -> EvaluationContext<'_> {
        EvaluationContext::new(wb, 0, ARef::parse("A1").unwrap())
    }

    #[test]
    fn date_year_month_day_round_trip() {
        let wb = Workbook::new();
        let c = ctx(&wb);
        let serial = fn_date(&[Value::from_f64(2024.0), Value::from_f64(6.0), Value::from_f64(15.0)], &c).unwrap();
        assert_eq!(fn_year(&[serial.clone()], &c).unwrap(), Value::from_f64(2024.0));
        assert_eq!(fn_month(&[serial.clone()], &c).unwrap(), Value::from_f64(6.0));
        assert_eq!(fn_day(&[serial], &c).unwrap(), Value::from_f64(15.0));
    }

    #[test]
    fn weekday_default_sunday_start() {
        let wb = Workbook::new();
        let c = ctx(&wb);
        // 2024-06-15 is a Saturday.
        let serial = fn_date(&[Value::from_f64(2024.0), Value::from_f64(6.0), Value::from_f64(15.0)], &c).unwrap();
        assert_eq!(fn_weekday(&[serial], &c).unwrap(), Value::from_f64(7.0));
    }

    #[test]
    fn eomonth_clamps_to_last_day() {
        let wb = Workbook::new();
        let c = ctx(&wb);
        let jan31 = fn_date(&[Value::from_f64(2024.0), Value::from_f64(1.0), Value::from_f64(31.0)], &c).unwrap();
        let feb_end = fn_eomonth(&[jan31, Value::from_f64(1.0)], &c).unwrap();
        assert_eq!(fn_day(&[feb_end.clone()], &c).unwrap(), Value::from_f64(29.0)); // 2024 is a leap year
        assert_eq!(fn_month(&[feb_end], &c).unwrap(), Value::from_f64(2.0));
    }
}
