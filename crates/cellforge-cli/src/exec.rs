//! Execution of one parsed [`Command`] against the live [`Session`].

use std::cmp::Ordering;

use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use regex::Regex;

use cellforge_core::io::{WorkbookReader, WorkbookWriter, WriterConfig};
use cellforge_core::{ARef, Cell, CellRange, CellStyle, CellValue, Column, Row, Sheet, Workbook};
use cellforge_formula::{evaluate_formula, Clock, Value};

use crate::commands::{parse_with_pair, Command, SortKey};
use crate::render::{display_formula_or_value, display_value};
use crate::session::{DumpFormat, Session};

/// Run `command` against `session`, printing its output to stdout.
pub fn dispatch(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Open { path, readonly } => {
            let workbook = DumpFormat
                .read(&path)
                .with_context(|| format!("failed to open '{}'", path.display()))?;
            println!("opened '{}' ({} sheet(s))", path.display(), workbook.sheets().len());
            session.workbook = Some(workbook);
            session.path = Some(path);
            session.readonly = readonly;
            session.dirty = false;
            Ok(())
        }

        Command::Create { sheets } => {
            let mut workbook = Workbook::new();
            for name in &sheets {
                workbook = workbook.add_sheet(cellforge_core::SheetName::new(name.clone())?)?;
            }
            println!("created workbook with {} sheet(s)", sheets.len());
            session.workbook = Some(workbook);
            session.path = None;
            session.readonly = false;
            session.dirty = false;
            Ok(())
        }

        Command::Close { discard } => {
            if session.workbook.is_none() {
                bail!("no workbook open");
            }
            if session.dirty && !discard {
                bail!("session has unsaved changes; `save` first or pass --discard");
            }
            session.workbook = None;
            session.path = None;
            session.readonly = false;
            session.dirty = false;
            println!("closed");
            Ok(())
        }

        Command::Sheets => {
            let workbook = session.require_open()?;
            for (i, sheet) in workbook.sheets().iter().enumerate() {
                let marker = if i == workbook.active_sheet_index() { "*" } else { " " };
                println!("{marker} {i}\t{}", sheet.name());
            }
            Ok(())
        }

        Command::Select { name } => {
            let idx = session.sheet_index(Some(&name))?;
            navigate(session, |workbook| Ok(workbook.select(idx)?))?;
            println!("active sheet: {name}");
            Ok(())
        }

        Command::Bounds { sheet } => {
            let idx = session.sheet_index(sheet.as_deref())?;
            let workbook = session.require_open()?;
            let sheet = workbook.sheet(idx).expect("sheet_index returned a valid index");
            match sheet.used_range() {
                Some(r) => println!("{}", r.to_a1()),
                None => println!("(empty)"),
            }
            Ok(())
        }

        Command::View { range, formulas, limit } => {
            let workbook = session.require_open()?;
            let idx = workbook.active_sheet_index();
            let sheet = workbook.sheet(idx).expect("active sheet index is always valid");
            let range = CellRange::parse(&range)?;
            let clipped = clip_to_content(sheet, range);
            print_view(sheet, clipped, formulas, limit);
            Ok(())
        }

        Command::Cell { r#ref } => {
            let workbook = session.require_open()?;
            let idx = workbook.active_sheet_index();
            let sheet = workbook.sheet(idx).expect("active sheet index is always valid");
            let r = ARef::parse(&r#ref)?;
            print_cell_detail(sheet, r);
            Ok(())
        }

        Command::Search { pattern, limit } => {
            let workbook = session.require_open()?;
            let idx = workbook.active_sheet_index();
            let sheet = workbook.sheet(idx).expect("active sheet index is always valid");
            let re = Regex::new(&pattern).context("invalid search pattern")?;
            let mut shown = 0usize;
            for cell in sheet.cells() {
                let text = display_formula_or_value(&cell.value);
                if !re.is_match(&text) {
                    continue;
                }
                println!("{}\t{text}", cell.r#ref.to_a1());
                shown += 1;
                if limit.is_some_and(|l| shown >= l) {
                    println!("... (more matches not shown)");
                    break;
                }
            }
            Ok(())
        }

        Command::Eval { formula, with } => {
            let workbook = session.require_open()?;
            let idx = workbook.active_sheet_index();
            let mut scratch = workbook.sheet(idx).expect("active sheet index is always valid").clone();
            for entry in &with {
                let (r, v) = parse_with_pair(entry)?;
                scratch = scratch.put(ARef::parse(&r)?, parse_literal(&v));
            }
            let result = evaluate_formula(&scratch, &formula, Clock::system())?;
            println!("{}", display_value(&result));
            Ok(())
        }

        Command::Put { r#ref, value } => {
            let r = ARef::parse(&r#ref)?;
            let literal = parse_literal(&value);
            mutate(session, |workbook| {
                let idx = workbook.active_sheet_index();
                let sheet = workbook.sheet(idx).expect("active sheet index is always valid").clone();
                let sheet = sheet.put(r, literal);
                Ok(workbook.with_sheet(idx, sheet)?)
            })?;
            println!("ok");
            Ok(())
        }

        Command::Putf { r#ref, formula } => {
            let r = ARef::parse(&r#ref)?;
            let expr = if formula.starts_with('=') { formula } else { format!("={formula}") };
            mutate(session, |workbook| {
                let idx = workbook.active_sheet_index();
                let sheet = workbook.sheet(idx).expect("active sheet index is always valid").clone();
                let sheet = sheet.put(r, CellValue::formula(expr));
                Ok(workbook.with_sheet(idx, sheet)?)
            })?;
            println!("ok");
            Ok(())
        }

        Command::Sort { range, by, header } => {
            let keys: Vec<SortKey> = by.iter().map(|s| SortKey::parse(s)).collect::<Result<_>>()?;
            let range = CellRange::parse(&range)?;
            mutate(session, |workbook| {
                let idx = workbook.active_sheet_index();
                let sheet = workbook.sheet(idx).expect("active sheet index is always valid").clone();
                let sheet = sort_range(sheet, range, &keys, header)?;
                Ok(workbook.with_sheet(idx, sheet)?)
            })?;
            println!("ok");
            Ok(())
        }

        Command::Clear { range, all, styles, comments } => {
            let range = CellRange::parse(&range)?;
            mutate(session, |workbook| {
                let idx = workbook.active_sheet_index();
                let sheet = workbook.sheet(idx).expect("active sheet index is always valid").clone();
                let sheet = clear_range(sheet, range, all, styles, comments);
                Ok(workbook.with_sheet(idx, sheet)?)
            })?;
            println!("ok");
            Ok(())
        }

        Command::Save => {
            let path = session
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("session has no path yet; use `saveas` first"))?;
            let workbook = session.require_open()?;
            DumpFormat
                .write(workbook, &path, WriterConfig::default())
                .with_context(|| format!("failed to save '{}'", path.display()))?;
            session.dirty = false;
            println!("saved '{}'", path.display());
            Ok(())
        }

        Command::Saveas { path } => {
            let workbook = session.require_open()?;
            DumpFormat
                .write(workbook, &path, WriterConfig::default())
                .with_context(|| format!("failed to save '{}'", path.display()))?;
            session.path = Some(path.clone());
            session.dirty = false;
            println!("saved '{}'", path.display());
            Ok(())
        }

        Command::Quit => Ok(()),
    }
}

/// Replace the session's workbook with the result of a content-mutating
/// operation. Refuses on a read-only session; marks the session dirty.
fn mutate<F>(session: &mut Session, f: F) -> Result<()>
where
    F: FnOnce(Workbook) -> Result<Workbook>,
{
    session.require_writable()?;
    let workbook = session
        .workbook
        .take()
        .ok_or_else(|| anyhow::anyhow!("no workbook open; use `open` or `create` first"))?;
    session.workbook = Some(f(workbook)?);
    session.dirty = true;
    Ok(())
}

/// Like [`mutate`], but for operations that only change session navigation
/// state (the active sheet) rather than workbook content: allowed on a
/// read-only session and does not mark the session dirty.
fn navigate<F>(session: &mut Session, f: F) -> Result<()>
where
    F: FnOnce(Workbook) -> Result<Workbook>,
{
    let workbook = session
        .workbook
        .take()
        .ok_or_else(|| anyhow::anyhow!("no workbook open; use `open` or `create` first"))?;
    session.workbook = Some(f(workbook)?);
    Ok(())
}

/// Interpret a `put` value: a leading `=` makes it a formula, `TRUE`/`FALSE`
/// (case-insensitive) a boolean, anything parseable as a decimal a number,
/// and everything else plain text.
fn parse_literal(s: &str) -> CellValue {
    if let Some(rest) = s.strip_prefix('=') {
        return CellValue::formula(format!("={rest}"));
    }
    match s.to_ascii_uppercase().as_str() {
        "TRUE" => return CellValue::Bool(true),
        "FALSE" => return CellValue::Bool(false),
        _ => {}
    }
    match s.parse::<BigDecimal>() {
        Ok(n) => CellValue::Number(n),
        Err(_) => CellValue::Text(s.to_string()),
    }
}

/// Clip a (possibly unbounded) range to `sheet`'s used range so a command
/// like `view A:Z` doesn't walk the full column extent.
fn clip_to_content(sheet: &Sheet, range: CellRange) -> CellRange {
    let bound = sheet.used_range().unwrap_or(CellRange::single(range.start));
    range.clip(&bound).unwrap_or(CellRange::single(range.start))
}

fn print_view(sheet: &Sheet, range: CellRange, formulas: bool, limit: Option<usize>) {
    let start_row = range.start.row.index();
    let end_row = range.end.row.index();
    let start_col = range.start.col.index();
    let end_col = range.end.col.index();
    let total_rows = (end_row - start_row + 1) as usize;

    let mut shown = 0usize;
    for row_idx in start_row..=end_row {
        if limit.is_some_and(|l| shown >= l) {
            println!("... ({} more row(s) not shown)", total_rows - shown);
            break;
        }
        let mut out = Vec::with_capacity((end_col - start_col + 1) as usize);
        for col_idx in start_col..=end_col {
            let r = ARef::new(Column::new(col_idx).expect("within range"), Row::new(row_idx).expect("within range"));
            let cell = sheet.get(r);
            out.push(if formulas { display_formula_or_value(&cell.value) } else { display_value(&cell.value) });
        }
        println!("{}", out.join("\t"));
        shown += 1;
    }
}

fn print_cell_detail(sheet: &Sheet, r: ARef) {
    let cell = sheet.get(r);
    println!("ref: {}", r.to_a1());
    match &cell.value {
        CellValue::Formula { expression, cached } => {
            println!("formula: {expression}");
            match cached.as_deref() {
                Some(v) => println!("cached: {}", display_value(v)),
                None => println!("cached: (none)"),
            }
        }
        other => println!("value: {}", display_value(other)),
    }
    if let Some(style_id) = cell.style_id {
        println!("style: #{}", style_id.index());
    }
    if let Some(comment) = sheet.comment(r) {
        match &comment.author {
            Some(author) => println!("comment: {} (by {author})", comment.text),
            None => println!("comment: {}", comment.text),
        }
    }
}

fn compare_cell_values(a: &CellValue, b: &CellValue, numeric: bool) -> Ordering {
    let va = Value::from(a.clone());
    let vb = Value::from(b.clone());
    if numeric {
        match (va.as_number(), vb.as_number()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    } else {
        va.as_string().to_lowercase().cmp(&vb.as_string().to_lowercase())
    }
}

/// Sort the data rows of `range` on `sheet` by `keys`, moving each row's
/// values and styles together. `header` excludes the range's first row from
/// reordering.
fn sort_range(sheet: Sheet, range: CellRange, keys: &[SortKey], header: bool) -> Result<Sheet> {
    let range = clip_to_content(&sheet, range);
    let start_row = range.start.row.index();
    let end_row = range.end.row.index();
    let start_col = range.start.col.index();
    let end_col = range.end.col.index();
    let data_start = if header { start_row + 1 } else { start_row };
    if data_start > end_row {
        return Ok(sheet);
    }

    let mut key_cols = Vec::with_capacity(keys.len());
    for k in keys {
        let col = Column::from_letter(&k.column)?;
        if col.index() < start_col || col.index() > end_col {
            bail!("sort key column {} is outside the range", k.column);
        }
        key_cols.push((col, k.descending, k.numeric));
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for row_idx in data_start..=end_row {
        let mut row = Vec::with_capacity((end_col - start_col + 1) as usize);
        for col_idx in start_col..=end_col {
            let r = ARef::new(Column::new(col_idx)?, Row::new(row_idx)?);
            row.push(sheet.get(r));
        }
        rows.push(row);
    }

    rows.sort_by(|a, b| {
        for (col, descending, numeric) in &key_cols {
            let offset = (col.index() - start_col) as usize;
            let ordering = compare_cell_values(&a[offset].value, &b[offset].value, *numeric);
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    let mut sheet = sheet;
    for (offset, row) in rows.into_iter().enumerate() {
        let row_idx = data_start + offset as u32;
        for (col_offset, cell) in row.into_iter().enumerate() {
            let col_idx = start_col + col_offset as u16;
            let r = ARef::new(Column::new(col_idx)?, Row::new(row_idx)?);
            sheet = sheet.put(r, cell.value);
            if let Some(style_id) = cell.style_id {
                if let Some(style) = sheet.style_registry().get(style_id).cloned() {
                    sheet = sheet.set_style(r, style);
                }
            }
        }
    }
    Ok(sheet)
}

fn clear_range(sheet: Sheet, range: CellRange, all: bool, styles_only: bool, comments_only: bool) -> Sheet {
    let range = clip_to_content(&sheet, range);
    let clear_values = all || (!styles_only && !comments_only);
    let clear_styles = all || styles_only;
    let clear_comments = all || comments_only;

    let mut sheet = sheet;
    for r in range.cells() {
        if clear_values {
            sheet = sheet.put(r, CellValue::Empty);
        }
        if clear_styles {
            sheet = sheet.set_style(r, CellStyle::default());
        }
        if clear_comments {
            sheet = sheet.remove_comment(r);
        }
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::SheetName;

    fn session_with_sheet() -> Session {
        let mut session = Session::new();
        session.workbook = Some(Workbook::new().add_sheet(SheetName::new("Sheet1").unwrap()).unwrap());
        session
    }

    #[test]
    fn put_then_cell_round_trips_a_number() {
        let mut session = session_with_sheet();
        dispatch(&mut session, Command::Put { r#ref: "A1".into(), value: "42".into() }).unwrap();
        let workbook = session.require_open().unwrap();
        let sheet = workbook.sheet(0).unwrap();
        assert_eq!(sheet.get(ARef::parse("A1").unwrap()).value, CellValue::number(42));
    }

    #[test]
    fn put_with_leading_equals_creates_a_formula() {
        let mut session = session_with_sheet();
        dispatch(&mut session, Command::Put { r#ref: "A1".into(), value: "=1+1".into() }).unwrap();
        let workbook = session.require_open().unwrap();
        let sheet = workbook.sheet(0).unwrap();
        assert!(matches!(sheet.get(ARef::parse("A1").unwrap()).value, CellValue::Formula { .. }));
    }

    #[test]
    fn readonly_session_rejects_put() {
        let mut session = session_with_sheet();
        session.readonly = true;
        let err = dispatch(&mut session, Command::Put { r#ref: "A1".into(), value: "1".into() }).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn close_without_discard_refuses_when_dirty() {
        let mut session = session_with_sheet();
        dispatch(&mut session, Command::Put { r#ref: "A1".into(), value: "1".into() }).unwrap();
        let err = dispatch(&mut session, Command::Close { discard: false }).unwrap_err();
        assert!(err.to_string().contains("unsaved"));
        dispatch(&mut session, Command::Close { discard: true }).unwrap();
        assert!(session.workbook.is_none());
    }

    #[test]
    fn sort_reorders_rows_by_numeric_key() {
        let mut session = session_with_sheet();
        for (row, n) in [(1, 3), (2, 1), (3, 2)] {
            dispatch(
                &mut session,
                Command::Put { r#ref: format!("A{row}"), value: n.to_string() },
            )
            .unwrap();
        }
        dispatch(
            &mut session,
            Command::Sort { range: "A1:A3".into(), by: vec!["A:asc:num".into()], header: false },
        )
        .unwrap();
        let workbook = session.require_open().unwrap();
        let sheet = workbook.sheet(0).unwrap();
        assert_eq!(sheet.get(ARef::parse("A1").unwrap()).value, CellValue::number(1));
        assert_eq!(sheet.get(ARef::parse("A2").unwrap()).value, CellValue::number(2));
        assert_eq!(sheet.get(ARef::parse("A3").unwrap()).value, CellValue::number(3));
    }

    #[test]
    fn clear_removes_values_but_keeps_styles_by_default() {
        let mut session = session_with_sheet();
        dispatch(&mut session, Command::Put { r#ref: "A1".into(), value: "1".into() }).unwrap();
        dispatch(
            &mut session,
            Command::Clear { range: "A1:A1".into(), all: false, styles: false, comments: false },
        )
        .unwrap();
        let workbook = session.require_open().unwrap();
        let sheet = workbook.sheet(0).unwrap();
        assert_eq!(sheet.get(ARef::parse("A1").unwrap()).value, CellValue::Empty);
    }
}
