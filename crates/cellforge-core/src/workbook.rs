//! Workbook: an ordered list of sheets, defined names, and the shared
//! style registry.

use std::rc::Rc;

use log::debug;

use crate::addr::SheetName;
use crate::error::{Error, Result};
use crate::sheet::Sheet;
use crate::style::StyleRegistry;

/// Where a [`DefinedName`] is visible from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    Workbook,
    Sheet(usize),
}

/// A named range or constant, à la Excel's defined names.
///
/// `refers_to` holds the raw text: `Sheet1!$A$1` for a cell, `0.0725` for a
/// constant, `=SUM(Sales)` for a formula expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedName {
    pub name: String,
    pub scope: NameScope,
    pub refers_to: String,
    pub comment: Option<String>,
    pub hidden: bool,
}

impl DefinedName {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        DefinedName {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
            comment: None,
            hidden: false,
        }
    }

    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_formula(&self) -> bool {
        self.refers_to.starts_with('=')
    }

    pub fn expression(&self) -> &str {
        self.refers_to.strip_prefix('=').unwrap_or(&self.refers_to)
    }
}

/// Workbook-wide settings. Trimmed down from the source workspace's
/// `WorkbookSettings` (which also carried protection/password/theme/
/// calc-on-open fields belonging to the OOXML container format this
/// workspace doesn't read or write) to just the one flag that changes core
/// evaluation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkbookSettings {
    /// When true, day 0 is 1904-01-01 instead of the 1900 system's
    /// 1899-12-31 epoch, and the Feb-29-1900 leap bug does not apply.
    pub date_1904: bool,
}

/// A workbook: an ordered list of sheets, defined names, and a style
/// registry shared across every sheet. Value-typed: every mutation returns
/// a new `Workbook`.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    names: Vec<DefinedName>,
    settings: WorkbookSettings,
    active_sheet: usize,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook {
            sheets: Vec::new(),
            names: Vec::new(),
            settings: WorkbookSettings::default(),
            active_sheet: 0,
        }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn settings(&self) -> WorkbookSettings {
        self.settings
    }

    pub fn with_settings(mut self, settings: WorkbookSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name().eq_ignore_case(name))
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).and_then(|i| self.sheet(i))
    }

    /// The style registry shared by every sheet in this workbook, taken
    /// from the first sheet (or a fresh one if there are no sheets yet).
    pub fn style_registry(&self) -> Rc<StyleRegistry> {
        self.sheets
            .first()
            .map(|s| s.style_registry().clone())
            .unwrap_or_else(|| Rc::new(StyleRegistry::new()))
    }

    /// Append a new, empty sheet named `name`, sharing this workbook's
    /// style registry. Fails with [`Error::DuplicateSheet`] on a
    /// case-insensitive name collision.
    pub fn add_sheet(mut self, name: SheetName) -> Result<Self> {
        if self.sheet_index(name.as_str()).is_some() {
            return Err(Error::DuplicateSheet(name.as_str().to_string()));
        }
        let registry = self.style_registry();
        self.sheets.push(Sheet::with_style_registry(name, registry));
        debug!("added sheet, workbook now has {} sheet(s)", self.sheets.len());
        Ok(self)
    }

    /// Replace the sheet at `index` with `sheet` (e.g. after one of its
    /// pure mutators ran).
    pub fn with_sheet(mut self, index: usize, sheet: Sheet) -> Result<Self> {
        if index >= self.sheets.len() {
            return Err(Error::SheetNotFound(format!("index {index}")));
        }
        self.sheets[index] = sheet;
        Ok(self)
    }

    pub fn remove_sheet(mut self, index: usize) -> Result<Self> {
        if index >= self.sheets.len() {
            return Err(Error::SheetNotFound(format!("index {index}")));
        }
        self.sheets.remove(index);
        if self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.sheets.len().saturating_sub(1);
        }
        Ok(self)
    }

    pub fn rename_sheet(mut self, index: usize, name: SheetName) -> Result<Self> {
        if let Some(existing) = self.sheet_index(name.as_str()) {
            if existing != index {
                return Err(Error::DuplicateSheet(name.as_str().to_string()));
            }
        }
        let sheet = self
            .sheets
            .get(index)
            .cloned()
            .ok_or_else(|| Error::SheetNotFound(format!("index {index}")))?;
        self.sheets[index] = sheet.renamed(name);
        Ok(self)
    }

    pub fn select(mut self, index: usize) -> Result<Self> {
        if index >= self.sheets.len() {
            return Err(Error::SheetNotFound(format!("index {index}")));
        }
        self.active_sheet = index;
        Ok(self)
    }

    pub fn names(&self) -> &[DefinedName] {
        &self.names
    }

    pub fn define_name(mut self, name: DefinedName) -> Self {
        self.names.retain(|n| !(n.name.eq_ignore_ascii_case(&name.name) && n.scope == name.scope));
        self.names.push(name);
        self
    }

    /// Resolve a name visible from `current_sheet` (sheet-scoped names take
    /// priority over workbook-scoped ones of the same spelling).
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&DefinedName> {
        self.names
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name) && n.scope == NameScope::Sheet(current_sheet))
            .or_else(|| {
                self.names
                    .iter()
                    .find(|n| n.name.eq_ignore_ascii_case(name) && n.scope == NameScope::Workbook)
            })
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    fn name(s: &str) -> SheetName {
        SheetName::new(s).unwrap()
    }

    #[test]
    fn add_sheet_rejects_duplicate_case_insensitive() {
        let wb = Workbook::new().add_sheet(name("Sheet1")).unwrap();
        let err = wb.add_sheet(name("sheet1")).unwrap_err();
        assert_eq!(err, Error::DuplicateSheet("sheet1".to_string()));
    }

    #[test]
    fn sheets_share_style_registry() {
        let wb = Workbook::new()
            .add_sheet(name("Sheet1"))
            .unwrap()
            .add_sheet(name("Sheet2"))
            .unwrap();
        assert!(Rc::ptr_eq(
            wb.sheet(0).unwrap().style_registry(),
            wb.sheet(1).unwrap().style_registry()
        ));
    }

    #[test]
    fn with_sheet_replaces_pure_mutation_result() {
        let wb = Workbook::new().add_sheet(name("Sheet1")).unwrap();
        let sheet = wb.sheet(0).unwrap().clone().put(
            crate::addr::ARef::parse("A1").unwrap(),
            CellValue::number(1),
        );
        let wb = wb.with_sheet(0, sheet).unwrap();
        assert_eq!(
            wb.sheet(0).unwrap().get(crate::addr::ARef::parse("A1").unwrap()).value,
            CellValue::number(1)
        );
    }

    #[test]
    fn named_range_sheet_scope_shadows_workbook_scope() {
        let wb = Workbook::new()
            .add_sheet(name("Sheet1"))
            .unwrap()
            .define_name(DefinedName::workbook_scope("Rate", "0.05"))
            .define_name(DefinedName::sheet_scope("Rate", "0.08", 0));
        assert_eq!(wb.get_named_range("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(wb.get_named_range("Rate", 1).unwrap().refers_to, "0.05");
    }
}
