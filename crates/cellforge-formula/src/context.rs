//! Evaluation context: the read-only view of a workbook a formula sees
//! while it evaluates, plus the wall-clock source volatile date/time
//! functions consult.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use chrono::{NaiveDateTime, Utc};

use cellforge_core::{ARef, CellRange, QualifiedRef, SheetName, Workbook};

/// Where `NOW()`/`TODAY()` get the current time from. A fixed clock makes
/// volatile-function evaluation reproducible in tests.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn fixed(dt: NaiveDateTime) -> Self {
        Clock::Fixed(dt)
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Utc::now().naive_utc(),
            Clock::Fixed(dt) => *dt,
        }
    }
}

/// Day zero under the 1904 date system expressed as an offset, in days,
/// from the 1900 system's serial count for the same calendar date. Excel's
/// own documented constant; the 1900-system leap bug is already baked into
/// both sides so a flat subtraction is exact.
const DATE_1904_OFFSET: i64 = 1462;

/// Everything a function implementation or the evaluator needs to resolve
/// references and dates while evaluating one formula.
///
/// `visiting` is the re-entrancy guard the evaluator consults whenever a
/// `Ref`/`RangeRef` node points at another formula cell: it is shared (via
/// `Rc`) across every nested context spawned by [`Self::at`] during one
/// top-level evaluation, so a direct cycle reached by following references
/// (as opposed to a cycle caught up front by the dependency graph) is
/// reported as `#CIRC!` instead of recursing forever.
pub struct EvaluationContext<'a> {
    workbook: &'a Workbook,
    current_sheet: usize,
    current_cell: ARef,
    clock: Clock,
    visiting: Rc<RefCell<AHashSet<QualifiedRef>>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(workbook: &'a Workbook, current_sheet: usize, current_cell: ARef) -> Self {
        EvaluationContext {
            workbook,
            current_sheet,
            current_cell,
            clock: Clock::system(),
            visiting: Rc::new(RefCell::new(AHashSet::new())),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// A context identical to this one but pointed at a different cell —
    /// used when a `Ref`/`RangeRef` node needs to evaluate the formula a
    /// referenced cell holds. Shares this context's re-entrancy guard so
    /// the cycle check spans the whole recursive evaluation, not just one
    /// cell's worth of it.
    pub fn at(&self, sheet_index: usize, cell: ARef) -> Self {
        EvaluationContext {
            workbook: self.workbook,
            current_sheet: sheet_index,
            current_cell: cell,
            clock: self.clock,
            visiting: self.visiting.clone(),
        }
    }

    /// Record that `qref` is now being evaluated. Returns `false` (and
    /// leaves the set unchanged) if it already was, i.e. a cycle.
    pub fn enter(&self, qref: QualifiedRef) -> bool {
        self.visiting.borrow_mut().insert(qref)
    }

    /// Undo a prior [`Self::enter`] once that cell's evaluation returns.
    pub fn exit(&self, qref: &QualifiedRef) {
        self.visiting.borrow_mut().remove(qref);
    }

    pub fn workbook(&self) -> &'a Workbook {
        self.workbook
    }

    pub fn current_sheet_index(&self) -> usize {
        self.current_sheet
    }

    pub fn current_cell(&self) -> ARef {
        self.current_cell
    }

    pub fn date_1904(&self) -> bool {
        self.workbook.settings().date_1904
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Convert a 1900-system Excel serial (the only system [`cellforge_core`]
    /// natively produces) to the serial this context's date system expects.
    pub fn adjust_serial_for_date_system(&self, serial_1900: f64) -> f64 {
        if self.date_1904() {
            serial_1900 - DATE_1904_OFFSET as f64
        } else {
            serial_1900
        }
    }

    /// Inverse of [`Self::adjust_serial_for_date_system`].
    pub fn serial_to_1900(&self, serial: f64) -> f64 {
        if self.date_1904() {
            serial + DATE_1904_OFFSET as f64
        } else {
            serial
        }
    }

    /// The raw, unresolved value of a cell: `None` if `sheet_index` doesn't
    /// exist. Deliberately does not chase a `Formula` cell's expression —
    /// callers that need a referenced formula cell evaluated (rather than
    /// just its stored representation) go through the evaluator's
    /// `resolve_cell`/`resolve_range`, which use this as their base case
    /// and recurse with this context's re-entrancy guard.
    pub fn raw_cell_value(&self, sheet_index: usize, r: ARef) -> Option<cellforge_core::CellValue> {
        self.workbook.sheet(sheet_index).map(|s| s.get(r).value)
    }

    pub fn sheet_name_at(&self, sheet_index: usize) -> Option<&'a SheetName> {
        self.workbook.sheet(sheet_index).map(|s| s.name())
    }

    pub fn sheet_index_by_name(&self, name: &str) -> Option<usize> {
        self.workbook.sheet_index(name)
    }

    /// The grid of cell references inside `range` on `sheet_index`,
    /// row-major, clipped to the sheet's used range so an unbounded
    /// `A:A`-style range doesn't walk a million rows. References only —
    /// resolving each to a [`Value`] (and evaluating any formula cell
    /// among them) is the evaluator's job, not this context's.
    pub fn clipped_range_cells(&self, sheet_index: usize, range: CellRange) -> Vec<Vec<ARef>> {
        let Some(sheet) = self.workbook.sheet(sheet_index) else {
            return Vec::new();
        };
        let bound = sheet.used_range().unwrap_or(CellRange::single(range.start));
        let clipped = range.clip(&bound).unwrap_or(CellRange::single(range.start));

        let mut rows: Vec<Vec<ARef>> = Vec::new();
        let mut current_row = clipped.start.row;
        let mut row: Vec<ARef> = Vec::new();
        for r in clipped.cells() {
            if r.row != current_row {
                rows.push(std::mem::take(&mut row));
                current_row = r.row;
            }
            row.push(r);
        }
        if !row.is_empty() {
            rows.push(row);
        }
        rows
    }

    pub fn named_range(&self, name: &str) -> Option<&'a cellforge_core::DefinedName> {
        self.workbook.get_named_range(name, self.current_sheet)
    }

    pub fn qualified(&self, cell: ARef) -> QualifiedRef {
        let sheet = self
            .workbook
            .sheet(self.current_sheet)
            .map(|s| s.name().clone())
            .unwrap_or_else(|| SheetName::new("Sheet1").expect("valid default name"));
        QualifiedRef::new(sheet, cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{CellValue, SheetName as Name};

    #[test]
    fn adjust_serial_roundtrips() {
        let wb = Workbook::new()
            .add_sheet(Name::new("Sheet1").unwrap())
            .unwrap();
        let ctx = EvaluationContext::new(&wb, 0, ARef::parse("A1").unwrap());
        let adjusted = ctx.adjust_serial_for_date_system(45000.0);
        assert_eq!(ctx.serial_to_1900(adjusted), 45000.0);
    }

    #[test]
    fn raw_cell_value_reads_cell() {
        let sheet = cellforge_core::Sheet::new(Name::new("Sheet1").unwrap())
            .put(ARef::parse("A1").unwrap(), CellValue::number(7));
        let wb = Workbook::new().add_sheet(Name::new("Sheet1").unwrap()).unwrap();
        let wb = wb.with_sheet(0, sheet).unwrap();
        let ctx = EvaluationContext::new(&wb, 0, ARef::parse("B1").unwrap());
        assert_eq!(
            ctx.raw_cell_value(0, ARef::parse("A1").unwrap()),
            Some(CellValue::number(7))
        );
    }

    #[test]
    fn enter_rejects_reentrant_cell() {
        let wb = Workbook::new().add_sheet(Name::new("Sheet1").unwrap()).unwrap();
        let ctx = EvaluationContext::new(&wb, 0, ARef::parse("A1").unwrap());
        let qref = QualifiedRef::new(Name::new("Sheet1").unwrap(), ARef::parse("A1").unwrap());
        assert!(ctx.enter(qref.clone()));
        assert!(!ctx.enter(qref.clone()));
        ctx.exit(&qref);
        assert!(ctx.enter(qref));
    }
}
