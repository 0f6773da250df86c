//! In-memory session state and the tiny line-oriented dump format this CLI
//! reads and writes instead of an OOXML container.
//!
//! `open`/`create`/`save`/`saveas` never touch a spreadsheet package — they
//! round-trip this format, which exists only so the shell is runnable end to
//! end without pulling in an out-of-scope container reader/writer. It drops
//! row/column properties, tables, and styles on the floor (documented in
//! DESIGN.md); cell values, merges, and comments round-trip exactly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use cellforge_core::io::{WorkbookReader, WorkbookWriter, WriterConfig};
use cellforge_core::{
    ARef, CellError, CellRange, CellValue, Comment, Error, Result, Sheet, SheetName, Workbook,
    WorkbookSettings,
};

const DUMP_HEADER: &str = "CELLFORGE-DUMP 1";

fn escape_field(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\t', "\\t").replace('\n', "\\n")
}

fn unescape_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn io_err(e: std::io::Error) -> Error {
    Error::IoError(e.to_string())
}

fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Error {
    Error::ParseError {
        location: location.into(),
        reason: reason.into(),
    }
}

fn encode_value(value: &CellValue) -> (&'static str, String) {
    match value {
        CellValue::Empty => ("EMPTY", String::new()),
        CellValue::Number(n) => ("NUMBER", n.to_string()),
        CellValue::Bool(b) => ("BOOL", if *b { "1" } else { "0" }.to_string()),
        CellValue::Text(s) => ("TEXT", escape_field(s)),
        CellValue::RichText(_) => ("TEXT", escape_field(&value.to_plain_text().unwrap_or_default())),
        CellValue::DateTime(dt) => ("DATETIME", dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        CellValue::Error(e) => ("ERROR", e.to_excel().to_string()),
        CellValue::Formula { expression, .. } => ("FORMULA", escape_field(expression)),
    }
}

fn decode_value(kind: &str, payload: &str) -> Result<CellValue> {
    Ok(match kind {
        "EMPTY" => CellValue::Empty,
        "NUMBER" => CellValue::Number(
            payload.parse().map_err(|_| malformed(payload, "not a number"))?,
        ),
        "BOOL" => CellValue::Bool(payload == "1"),
        "TEXT" => CellValue::Text(unescape_field(payload)),
        "DATETIME" => {
            let dt = NaiveDateTime::parse_from_str(payload, "%Y-%m-%dT%H:%M:%S")
                .map_err(|_| malformed(payload, "not a datetime"))?;
            CellValue::DateTime(dt)
        }
        "ERROR" => CellValue::Error(CellError::parse(payload)?),
        "FORMULA" => CellValue::formula(unescape_field(payload)),
        other => return Err(malformed(other, "unknown cell kind in dump")),
    })
}

/// Reads and writes the tiny line-oriented workbook dump this workspace uses
/// in place of an OOXML container.
pub struct DumpFormat;

impl WorkbookWriter for DumpFormat {
    fn write(&self, workbook: &Workbook, path: &Path, _config: WriterConfig) -> Result<()> {
        let mut out = String::new();
        out.push_str(DUMP_HEADER);
        out.push('\n');
        out.push_str(&format!("ACTIVE\t{}\n", workbook.active_sheet_index()));
        out.push_str(&format!("SETTINGS\tdate_1904={}\n", workbook.settings().date_1904 as u8));

        for sheet in workbook.sheets() {
            out.push_str(&format!("SHEET\t{}\n", escape_field(sheet.name().as_str())));
            for cell in sheet.cells() {
                let (kind, payload) = encode_value(&cell.value);
                out.push_str(&format!("CELL\t{}\t{}\t{}\n", cell.r#ref.to_a1(), kind, payload));
            }
            for range in sheet.merged_ranges() {
                out.push_str(&format!("MERGE\t{}\n", range.to_a1()));
            }
            for (r, comment) in sheet.comments() {
                let author = comment
                    .author
                    .as_deref()
                    .map(escape_field)
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!(
                    "COMMENT\t{}\t{}\t{}\t{}\n",
                    r.to_a1(),
                    author,
                    comment.visible as u8,
                    escape_field(&comment.text),
                ));
            }
        }

        fs::write(path, out).map_err(io_err)
    }
}

impl WorkbookReader for DumpFormat {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let text = fs::read_to_string(path).map_err(io_err)?;
        let mut lines = text.lines();

        if lines.next() != Some(DUMP_HEADER) {
            return Err(malformed(path.display().to_string(), "missing cellforge dump header"));
        }

        let mut workbook = Workbook::new();
        let mut active = 0usize;
        let mut current: Option<Sheet> = None;
        let mut current_index: Option<usize> = None;

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(5, '\t');
            let tag = parts.next().unwrap_or_default();
            match tag {
                "ACTIVE" => active = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0),
                "SETTINGS" => {
                    let date_1904 = parts
                        .next()
                        .map(|kv| kv.trim_start_matches("date_1904=") == "1")
                        .unwrap_or(false);
                    workbook = workbook.with_settings(WorkbookSettings { date_1904 });
                }
                "SHEET" => {
                    if let (Some(sheet), Some(idx)) = (current.take(), current_index.take()) {
                        workbook = workbook.with_sheet(idx, sheet)?;
                    }
                    let name = SheetName::new(unescape_field(parts.next().unwrap_or_default()))?;
                    workbook = workbook.add_sheet(name)?;
                    let idx = workbook.sheets().len() - 1;
                    current = workbook.sheet(idx).cloned();
                    current_index = Some(idx);
                }
                "CELL" => {
                    let r = ARef::parse(parts.next().unwrap_or_default())?;
                    let kind = parts.next().unwrap_or_default();
                    let payload = parts.next().unwrap_or_default();
                    let value = decode_value(kind, payload)?;
                    current = current.map(|s| s.put(r, value));
                }
                "MERGE" => {
                    let range = CellRange::parse(parts.next().unwrap_or_default())?;
                    current = match current {
                        Some(s) => Some(s.merge(range)?),
                        None => None,
                    };
                }
                "COMMENT" => {
                    let r = ARef::parse(parts.next().unwrap_or_default())?;
                    let author = parts.next().unwrap_or("-").to_string();
                    let visible = parts.next().map(|s| s == "1").unwrap_or(false);
                    let text = unescape_field(parts.next().unwrap_or_default());
                    let mut comment = Comment::new(text).with_visible(visible);
                    if author != "-" {
                        comment = comment.with_author(unescape_field(&author));
                    }
                    current = current.map(|s| s.set_comment(r, comment));
                }
                _ => {}
            }
        }

        if let (Some(sheet), Some(idx)) = (current.take(), current_index.take()) {
            workbook = workbook.with_sheet(idx, sheet)?;
        }

        if workbook.sheets().is_empty() {
            return Ok(workbook);
        }
        workbook.select(active.min(workbook.sheets().len() - 1))
    }
}

/// The live session a sequence of CLI commands operates against: at most one
/// open workbook, the path it round-trips to, and whether edits are allowed.
pub struct Session {
    pub workbook: Option<Workbook>,
    pub path: Option<PathBuf>,
    pub readonly: bool,
    /// True once a content-mutating command has run since the last
    /// `open`/`create`/`save`/`saveas`; `close` without `--discard` refuses
    /// while this is set.
    pub dirty: bool,
}

impl Session {
    pub fn new() -> Self {
        Session {
            workbook: None,
            path: None,
            readonly: false,
            dirty: false,
        }
    }

    pub fn require_open(&self) -> anyhow::Result<&Workbook> {
        self.workbook
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no workbook open; use `open` or `create` first"))
    }

    pub fn require_writable(&self) -> anyhow::Result<()> {
        if self.readonly {
            anyhow::bail!("session is read-only; re-open without --readonly to make changes");
        }
        Ok(())
    }

    pub fn sheet_index(&self, name: Option<&str>) -> anyhow::Result<usize> {
        let workbook = self.require_open()?;
        match name {
            Some(n) => workbook
                .sheet_index(n)
                .ok_or_else(|| anyhow::anyhow!("no such sheet: '{n}'")),
            None => Ok(workbook.active_sheet_index()),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn wb() -> Workbook {
        Workbook::new()
            .add_sheet(SheetName::new("Sheet1").unwrap())
            .unwrap()
    }

    #[test]
    fn round_trips_cells_merges_and_comments() {
        let sheet = wb().sheet(0).unwrap().clone();
        let sheet = sheet
            .put(ARef::parse("A1").unwrap(), CellValue::number(42))
            .put(ARef::parse("A2").unwrap(), CellValue::text("hi\tthere"))
            .put(ARef::parse("A3").unwrap(), CellValue::formula("=A1+1"))
            .merge(CellRange::parse("B1:C1").unwrap())
            .unwrap()
            .set_comment(ARef::parse("A1").unwrap(), Comment::new("note").with_author("me"));
        let workbook = wb().with_sheet(0, sheet).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("book.cfd");
        DumpFormat.write(&workbook, &path, WriterConfig::default()).unwrap();
        let loaded = DumpFormat.read(&path).unwrap();

        let sheet = loaded.sheet(0).unwrap();
        assert_eq!(sheet.get(ARef::parse("A1").unwrap()).value, CellValue::number(42));
        assert_eq!(sheet.get(ARef::parse("A2").unwrap()).value, CellValue::text("hi\tthere"));
        assert_eq!(sheet.merged_ranges(), &[CellRange::parse("B1:C1").unwrap()]);
        assert_eq!(sheet.comment(ARef::parse("A1").unwrap()).unwrap().text, "note");
    }

    #[test]
    fn rejects_file_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-dump.cfd");
        fs::write(&path, "garbage\n").unwrap();
        assert!(DumpFormat.read(&path).is_err());
    }

    #[test]
    fn preserves_active_sheet_and_multiple_sheets() {
        let workbook = wb().add_sheet(SheetName::new("Sheet2").unwrap()).unwrap().select(1).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("book.cfd");
        DumpFormat.write(&workbook, &path, WriterConfig::default()).unwrap();
        let loaded = DumpFormat.read(&path).unwrap();

        assert_eq!(loaded.sheets().len(), 2);
        assert_eq!(loaded.active_sheet_index(), 1);
    }
}
