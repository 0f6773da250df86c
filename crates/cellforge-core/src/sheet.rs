//! Sheet: the in-memory grid of cells, row/column metadata, merges,
//! comments, and tables for a single worksheet.

use std::rc::Rc;

use indexmap::IndexMap;
use log::trace;

use crate::addr::{ARef, CellRange, Column, Row, SheetName};
use crate::error::{Error, Result};
use crate::style::{CellStyle, StyleId, StyleRegistry};
use crate::value::CellValue;

/// A single cell: its address, value, and (optional) style.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub r#ref: ARef,
    pub value: CellValue,
    pub style_id: Option<StyleId>,
}

impl Cell {
    pub fn empty(r#ref: ARef) -> Self {
        Cell {
            r#ref,
            value: CellValue::Empty,
            style_id: None,
        }
    }
}

/// Per-row display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowProperties {
    pub height: Option<f64>,
    pub hidden: bool,
    pub outline_level: u8,
    pub collapsed: bool,
}

/// Per-column display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnProperties {
    pub width: Option<f64>,
    pub hidden: bool,
    pub outline_level: u8,
    pub collapsed: bool,
    pub style_id: Option<StyleId>,
}

/// A cell comment/annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub author: Option<String>,
    pub text: String,
    pub visible: bool,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Comment {
            author: None,
            text: text.into(),
            visible: false,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// A named table region within a sheet.
///
/// Not present in the source workspace (no `TableSpec`/`Table` type exists
/// there); this is a from-scratch minimal design following ordinary
/// spreadsheet table conventions — a name, a backing range, whether the
/// first row holds headers, and the column names themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub range: CellRange,
    pub header_row: bool,
    pub columns: Vec<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, range: CellRange) -> Self {
        TableSpec {
            name: name.into(),
            range,
            header_row: true,
            columns: Vec::new(),
        }
    }
}

/// A worksheet: cells, row/column metadata, merges, comments, and tables.
///
/// Every mutating method is pure: it consumes or borrows `self` and returns
/// a new `Sheet`. The style registry is shared via `Rc` so cloning a sheet
/// that hasn't changed its styles is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: SheetName,
    cells: IndexMap<ARef, Cell>,
    row_properties: IndexMap<Row, RowProperties>,
    column_properties: IndexMap<Column, ColumnProperties>,
    merged_ranges: Vec<CellRange>,
    comments: IndexMap<ARef, Comment>,
    tables: Vec<TableSpec>,
    style_registry: Rc<StyleRegistry>,
}

impl Sheet {
    pub fn new(name: SheetName) -> Self {
        Sheet {
            name,
            cells: IndexMap::new(),
            row_properties: IndexMap::new(),
            column_properties: IndexMap::new(),
            merged_ranges: Vec::new(),
            comments: IndexMap::new(),
            tables: Vec::new(),
            style_registry: Rc::new(StyleRegistry::new()),
        }
    }

    /// Construct a sheet sharing an existing (workbook-level) style
    /// registry, so styles set on this sheet are visible to siblings.
    pub fn with_style_registry(name: SheetName, registry: Rc<StyleRegistry>) -> Self {
        Sheet {
            name,
            cells: IndexMap::new(),
            row_properties: IndexMap::new(),
            column_properties: IndexMap::new(),
            merged_ranges: Vec::new(),
            comments: IndexMap::new(),
            tables: Vec::new(),
            style_registry: registry,
        }
    }

    pub fn name(&self) -> &SheetName {
        &self.name
    }

    pub fn renamed(mut self, name: SheetName) -> Self {
        self.name = name;
        self
    }

    pub fn style_registry(&self) -> &Rc<StyleRegistry> {
        &self.style_registry
    }

    /// Iterate over every non-empty cell, in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Look up a cell. Absent cells read back as `Cell::empty(r)`.
    pub fn get(&self, r: ARef) -> Cell {
        self.cells.get(&r).cloned().unwrap_or_else(|| Cell::empty(r))
    }

    pub fn style_of(&self, r: ARef) -> &CellStyle {
        self.get(r)
            .style_id
            .and_then(|id| self.style_registry.get(id))
            .unwrap_or_else(|| self.style_registry.default_style())
    }

    /// Set the value of a cell. Writing `CellValue::Empty` removes it from
    /// the map entirely (insertion order of the remaining cells is
    /// preserved).
    pub fn put(mut self, r: ARef, value: CellValue) -> Self {
        if value.is_empty() {
            self.cells.shift_remove(&r);
            trace!("cleared {r}");
            return self;
        }
        let style_id = self.cells.get(&r).and_then(|c| c.style_id);
        self.cells.insert(r, Cell { r#ref: r, value, style_id });
        self
    }

    pub fn remove(self, r: ARef) -> Self {
        self.put(r, CellValue::Empty)
    }

    /// Apply a style to a cell, interning it into the shared registry.
    pub fn set_style(mut self, r: ARef, style: CellStyle) -> Self {
        let (registry, id) = self.style_registry.insert(style);
        self.style_registry = Rc::new(registry);
        let existing = self.cells.get(&r).cloned().unwrap_or_else(|| Cell::empty(r));
        self.cells.insert(r, Cell { style_id: Some(id), ..existing });
        self
    }

    pub fn row_properties(&self, row: Row) -> RowProperties {
        self.row_properties.get(&row).copied().unwrap_or_default()
    }

    pub fn set_row_properties(mut self, row: Row, props: RowProperties) -> Self {
        self.row_properties.insert(row, props);
        self
    }

    pub fn column_properties(&self, col: Column) -> ColumnProperties {
        self.column_properties.get(&col).copied().unwrap_or_default()
    }

    pub fn set_column_properties(mut self, col: Column, props: ColumnProperties) -> Self {
        self.column_properties.insert(col, props);
        self
    }

    pub fn merged_ranges(&self) -> &[CellRange] {
        &self.merged_ranges
    }

    /// Merge a range of cells. Fails with [`Error::MergeOverlap`] if it
    /// overlaps any existing merge.
    pub fn merge(mut self, range: CellRange) -> Result<Self> {
        if self.merged_ranges.iter().any(|m| m.overlaps(&range)) {
            return Err(Error::MergeOverlap);
        }
        self.merged_ranges.push(range);
        Ok(self)
    }

    pub fn unmerge(mut self, range: CellRange) -> Self {
        self.merged_ranges.retain(|m| *m != range);
        self
    }

    pub fn comments(&self) -> impl Iterator<Item = (ARef, &Comment)> {
        self.comments.iter().map(|(r, c)| (*r, c))
    }

    pub fn comment(&self, r: ARef) -> Option<&Comment> {
        self.comments.get(&r)
    }

    pub fn set_comment(mut self, r: ARef, comment: Comment) -> Self {
        self.comments.insert(r, comment);
        self
    }

    pub fn remove_comment(mut self, r: ARef) -> Self {
        self.comments.shift_remove(&r);
        self
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn add_table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    /// The smallest range enclosing every non-empty cell and every row/
    /// column carrying explicit properties. `None` for a sheet with no
    /// content at all.
    ///
    /// Recomputed on every call rather than memoized: the source workspace
    /// caches this behind `&mut self`, which pure value semantics make
    /// awkward without a `RefCell`; at the scale this engine targets,
    /// recomputation is cheap enough that a cache would only add
    /// complexity.
    pub fn used_range(&self) -> Option<CellRange> {
        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        let mut min_row = u32::MAX;
        let mut max_row = 0u32;
        let mut any = false;

        for cell in self.cells.values() {
            any = true;
            min_col = min_col.min(cell.r#ref.col.index());
            max_col = max_col.max(cell.r#ref.col.index());
            min_row = min_row.min(cell.r#ref.row.index());
            max_row = max_row.max(cell.r#ref.row.index());
        }
        for row in self.row_properties.keys() {
            any = true;
            min_row = min_row.min(row.index());
            max_row = max_row.max(row.index());
        }
        for col in self.column_properties.keys() {
            any = true;
            min_col = min_col.min(col.index());
            max_col = max_col.max(col.index());
        }

        if !any {
            return None;
        }
        let range = CellRange::new(
            ARef::new(Column::new(min_col).ok()?, Row::new(min_row).ok()?),
            ARef::new(Column::new(max_col).ok()?, Row::new(max_row).ok()?),
        );
        trace!("used_range recomputed to {}", range.to_a1());
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Column;

    fn a1(text: &str) -> ARef {
        ARef::parse(text).unwrap()
    }

    fn sheet() -> Sheet {
        Sheet::new(SheetName::new("Sheet1").unwrap())
    }

    #[test]
    fn put_and_get() {
        let s = sheet().put(a1("A1"), CellValue::number(42));
        assert_eq!(s.get(a1("A1")).value, CellValue::number(42));
        assert_eq!(s.get(a1("B2")).value, CellValue::Empty);
    }

    #[test]
    fn put_empty_removes_cell() {
        let s = sheet().put(a1("A1"), CellValue::number(1));
        assert_eq!(s.cell_count(), 1);
        let s = s.put(a1("A1"), CellValue::Empty);
        assert_eq!(s.cell_count(), 0);
    }

    #[test]
    fn style_round_trip() {
        let s = sheet().set_style(a1("A1"), CellStyle::new().bold(true));
        assert!(s.style_of(a1("A1")).font.bold);
        assert!(!s.style_of(a1("B1")).font.bold);
    }

    #[test]
    fn merge_overlap_fails() {
        let s = sheet()
            .merge(CellRange::parse("A1:B2").unwrap())
            .unwrap();
        let err = s.merge(CellRange::parse("B2:C3").unwrap()).unwrap_err();
        assert_eq!(err, Error::MergeOverlap);
    }

    #[test]
    fn used_range_covers_cells_and_properties() {
        let s = sheet()
            .put(a1("B2"), CellValue::number(1))
            .set_column_properties(Column::new(5).unwrap(), ColumnProperties::default());
        let range = s.used_range().unwrap();
        assert_eq!(range.to_a1(), "B1:F2");
    }

    #[test]
    fn insertion_order_preserved() {
        let s = sheet()
            .put(a1("C1"), CellValue::number(1))
            .put(a1("A1"), CellValue::number(2))
            .put(a1("B1"), CellValue::number(3));
        let order: Vec<_> = s.cells().map(|c| c.r#ref.to_a1()).collect();
        assert_eq!(order, vec!["C1", "A1", "B1"]);
    }
}
