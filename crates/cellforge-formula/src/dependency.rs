//! Dependency graphs over formula cells: a single-sheet graph keyed by
//! `ARef`, and a cross-sheet graph keyed by `QualifiedRef`.
//!
//! Both share the same two-adjacency-map shape (forward `precedents` +
//! reverse `dependents`, following the source workspace's
//! `DependencyGraph`), but cycle detection and recalculation order use
//! Tarjan's SCC algorithm and Kahn's algorithm instead of the source's
//! ad-hoc recursive DFS — the DFS-based "topological sort" there silently
//! drops cycle members rather than reporting them, which this engine's
//! evaluator cannot tolerate (see DESIGN.md).

use std::collections::VecDeque;
use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

use cellforge_core::{ARef, CellRange, CellValue, QualifiedRef, Sheet, SheetName, Workbook};

use crate::ast::RefSite;
use crate::error::FormulaError;
use crate::parser;

/// Every SCC with more than one member, or a single-member SCC with a
/// self-loop, is a cycle. Returns one representative cycle per offending
/// SCC's worth of caller interest — the first one found is reported, with
/// its first node repeated at the end to close the loop.
fn close_cycle<K: Clone>(scc: &[K]) -> Vec<K> {
    let mut path = scc.to_vec();
    if let Some(first) = scc.first() {
        path.push(first.clone());
    }
    path
}

/// Tarjan's strongly-connected-components algorithm, iterative (an explicit
/// stack stands in for the call stack) so a long dependency chain can't blow
/// a real one. `order` fixes traversal order for determinism; `precedents`
/// is the forward adjacency (node -> nodes it depends on).
fn tarjan_sccs<K>(order: &[K], precedents: &AHashMap<K, AHashSet<K>>) -> Vec<Vec<K>>
where
    K: Clone + Eq + Hash,
{
    let mut index_counter = 0usize;
    let mut indices: AHashMap<K, usize> = AHashMap::new();
    let mut low: AHashMap<K, usize> = AHashMap::new();
    let mut on_stack: AHashSet<K> = AHashSet::new();
    let mut tstack: Vec<K> = Vec::new();
    let mut sccs: Vec<Vec<K>> = Vec::new();
    let empty: AHashSet<K> = AHashSet::new();

    for root in order {
        if indices.contains_key(root) {
            continue;
        }

        indices.insert(root.clone(), index_counter);
        low.insert(root.clone(), index_counter);
        index_counter += 1;
        tstack.push(root.clone());
        on_stack.insert(root.clone());

        let neighbors: Vec<K> = precedents.get(root).unwrap_or(&empty).iter().cloned().collect();
        let mut frames: Vec<(K, Vec<K>, usize)> = vec![(root.clone(), neighbors, 0)];

        while let Some(top) = frames.last_mut() {
            let node = top.0.clone();
            let next_index = top.2;
            if next_index < top.1.len() {
                let w = top.1[next_index].clone();
                top.2 += 1;
                if !indices.contains_key(&w) {
                    indices.insert(w.clone(), index_counter);
                    low.insert(w.clone(), index_counter);
                    index_counter += 1;
                    tstack.push(w.clone());
                    on_stack.insert(w.clone());
                    let w_neighbors: Vec<K> = precedents.get(&w).unwrap_or(&empty).iter().cloned().collect();
                    frames.push((w, w_neighbors, 0));
                } else if on_stack.contains(&w) {
                    let wi = indices[&w];
                    if let Some(entry) = low.get_mut(&node) {
                        *entry = (*entry).min(wi);
                    }
                }
                continue;
            }

            frames.pop();
            let node_low = low[&node];
            if let Some(parent) = frames.last() {
                let parent_node = parent.0.clone();
                if let Some(parent_low) = low.get_mut(&parent_node) {
                    *parent_low = (*parent_low).min(node_low);
                }
            }
            if low[&node] == indices[&node] {
                let mut scc = Vec::new();
                loop {
                    let w = tstack.pop().expect("node must be on the Tarjan stack");
                    on_stack.remove(&w);
                    let done = w == node;
                    scc.push(w);
                    if done {
                        break;
                    }
                }
                sccs.push(scc);
            }
        }
    }

    sccs
}

/// True if any SCC in `precedents`/`order` is a genuine cycle (size > 1, or
/// a single node with a self-loop).
fn find_cycle<K>(order: &[K], precedents: &AHashMap<K, AHashSet<K>>) -> Option<Vec<K>>
where
    K: Clone + Eq + Hash,
{
    for scc in tarjan_sccs(order, precedents) {
        let is_cycle = scc.len() > 1
            || scc
                .first()
                .is_some_and(|n| precedents.get(n).is_some_and(|p| p.contains(n)));
        if is_cycle {
            return Some(close_cycle(&scc));
        }
    }
    None
}

/// Kahn's algorithm. Ties (multiple nodes reaching in-degree zero at the
/// same step) are broken by `order`'s index, i.e. insertion order. Returns
/// `Err` with the unprocessed (cyclic) remainder if the graph isn't a DAG.
fn kahn_order<K>(
    order: &[K],
    precedents: &AHashMap<K, AHashSet<K>>,
    dependents: &AHashMap<K, AHashSet<K>>,
) -> Result<Vec<K>, Vec<K>>
where
    K: Clone + Eq + Hash,
{
    let rank: AHashMap<K, usize> = order.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();
    let mut in_degree: AHashMap<K, usize> = order
        .iter()
        .map(|n| (n.clone(), precedents.get(n).map(|s| s.len()).unwrap_or(0)))
        .collect();

    let mut ready: Vec<K> = order.iter().filter(|n| in_degree[n] == 0).cloned().collect();
    ready.sort_by_key(|n| rank[n]);
    let mut queue: VecDeque<K> = ready.into_iter().collect();

    let mut result: Vec<K> = Vec::with_capacity(order.len());
    let mut done: AHashSet<K> = AHashSet::new();
    let empty: AHashSet<K> = AHashSet::new();

    while let Some(n) = queue.pop_front() {
        if !done.insert(n.clone()) {
            continue;
        }
        result.push(n.clone());

        let mut newly_ready: Vec<K> = Vec::new();
        for d in dependents.get(&n).unwrap_or(&empty) {
            if let Some(entry) = in_degree.get_mut(d) {
                *entry -= 1;
                if *entry == 0 {
                    newly_ready.push(d.clone());
                }
            }
        }
        newly_ready.sort_by_key(|n| rank[n]);
        for n in newly_ready {
            queue.push_back(n);
        }
    }

    if result.len() == order.len() {
        Ok(result)
    } else {
        let remaining: Vec<K> = order.iter().filter(|n| !done.contains(n)).cloned().collect();
        Err(remaining)
    }
}

/// Dependency graph over the cells of a single sheet. Cross-sheet
/// references are not represented here — see [`CrossSheetGraph`].
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    precedents: AHashMap<ARef, AHashSet<ARef>>,
    dependents: AHashMap<ARef, AHashSet<ARef>>,
    order: Vec<ARef>,
    seen: AHashSet<ARef>,
    formula_cells: AHashSet<ARef>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn note(&mut self, r: ARef) {
        if self.seen.insert(r) {
            self.order.push(r);
        }
    }

    pub fn add_dependency(&mut self, dependent: ARef, precedent: ARef) {
        self.note(dependent);
        self.note(precedent);
        self.precedents.entry(dependent).or_default().insert(precedent);
        self.dependents.entry(precedent).or_default().insert(dependent);
    }

    /// Build a graph from a sheet: for every formula cell, parse its
    /// expression, extract same-sheet references via a bounded traversal
    /// (unbounded ranges are clipped to the sheet's `used_range` before
    /// being expanded into individual cell edges), and record forward and
    /// reverse edges. Cross-sheet references inside the formula are
    /// skipped; they belong to [`CrossSheetGraph`].
    pub fn from_sheet(sheet: &Sheet) -> Result<Self, FormulaError> {
        let mut graph = DependencyGraph::new();
        let bound = sheet.used_range();

        for cell in sheet.cells() {
            let CellValue::Formula { expression, .. } = &cell.value else {
                continue;
            };
            graph.note(cell.r#ref);
            graph.formula_cells.insert(cell.r#ref);

            let expr = parser::parse_formula(expression).map_err(FormulaError::Parse)?;
            for site in expr.same_sheet_refs() {
                match site {
                    RefSite::Cell(r) => graph.add_dependency(cell.r#ref, r),
                    RefSite::Range(range) => {
                        let clipped = bound
                            .and_then(|b| range.clip(&b))
                            .unwrap_or(CellRange::single(range.start));
                        for r in clipped.cells() {
                            graph.add_dependency(cell.r#ref, r);
                        }
                    }
                    RefSite::SheetCell(..) | RefSite::SheetRange(..) => {}
                }
            }
        }

        Ok(graph)
    }

    pub fn nodes(&self) -> &[ARef] {
        &self.order
    }

    pub fn is_formula_cell(&self, r: ARef) -> bool {
        self.formula_cells.contains(&r)
    }

    pub fn precedents(&self, cell: ARef) -> impl Iterator<Item = ARef> + '_ {
        self.precedents.get(&cell).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn dependents(&self, cell: ARef) -> impl Iterator<Item = ARef> + '_ {
        self.dependents.get(&cell).into_iter().flat_map(|s| s.iter().copied())
    }

    /// BFS over forward edges (precedents), including the starting set.
    pub fn transitive_dependencies(&self, refs: &[ARef]) -> AHashSet<ARef> {
        let mut seen: AHashSet<ARef> = refs.iter().copied().collect();
        let mut queue: VecDeque<ARef> = refs.iter().copied().collect();
        while let Some(n) = queue.pop_front() {
            for p in self.precedents(n) {
                if seen.insert(p) {
                    queue.push_back(p);
                }
            }
        }
        seen
    }

    /// BFS over reverse edges (dependents), excluding the starting set.
    pub fn transitive_dependents(&self, refs: &[ARef]) -> AHashSet<ARef> {
        let starting: AHashSet<ARef> = refs.iter().copied().collect();
        let mut seen: AHashSet<ARef> = AHashSet::new();
        let mut queue: VecDeque<ARef> = refs.iter().copied().collect();
        while let Some(n) = queue.pop_front() {
            for d in self.dependents(n) {
                if !starting.contains(&d) && seen.insert(d) {
                    queue.push_back(d);
                }
            }
        }
        seen
    }

    pub fn detect_cycles(&self) -> Result<(), FormulaError> {
        match find_cycle(&self.order, &self.precedents) {
            Some(cycle) => {
                log::debug!("circular reference over {} cell(s)", cycle.len());
                Err(FormulaError::CircularRef(cycle))
            }
            None => Ok(()),
        }
    }

    /// Kahn's algorithm over every node in the graph (formula cells and the
    /// plain-value cells they reference). Callers that only want formula
    /// cells should filter with [`Self::is_formula_cell`].
    pub fn topological_order(&self) -> Result<Vec<ARef>, FormulaError> {
        kahn_order(&self.order, &self.precedents, &self.dependents)
            .map_err(|remaining| FormulaError::CircularRef(close_cycle(&remaining)))
    }
}

/// Dependency graph over an entire workbook, keyed by `QualifiedRef` so
/// cross-sheet references are first-class. Same-sheet references are
/// qualified with the formula's own sheet.
#[derive(Debug, Default, Clone)]
pub struct CrossSheetGraph {
    precedents: AHashMap<QualifiedRef, AHashSet<QualifiedRef>>,
    dependents: AHashMap<QualifiedRef, AHashSet<QualifiedRef>>,
    order: Vec<QualifiedRef>,
    seen: AHashSet<QualifiedRef>,
}

impl CrossSheetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn note(&mut self, r: QualifiedRef) {
        if self.seen.insert(r.clone()) {
            self.order.push(r);
        }
    }

    pub fn add_dependency(&mut self, dependent: QualifiedRef, precedent: QualifiedRef) {
        self.note(dependent.clone());
        self.note(precedent.clone());
        self.precedents.entry(dependent.clone()).or_default().insert(precedent.clone());
        self.dependents.entry(precedent).or_default().insert(dependent);
    }

    pub fn from_workbook(workbook: &Workbook) -> Result<Self, FormulaError> {
        let mut graph = CrossSheetGraph::new();

        for (sheet_index, sheet) in workbook.sheets().iter().enumerate() {
            let own_name = sheet.name().clone();
            let bound = sheet.used_range();

            for cell in sheet.cells() {
                let CellValue::Formula { expression, .. } = &cell.value else {
                    continue;
                };
                let dependent = QualifiedRef::new(own_name.clone(), cell.r#ref);
                graph.note(dependent.clone());

                let expr = parser::parse_formula(expression).map_err(FormulaError::Parse)?;
                for site in expr.same_sheet_refs() {
                    match site {
                        RefSite::Cell(r) => {
                            graph.add_dependency(dependent.clone(), QualifiedRef::new(own_name.clone(), r));
                        }
                        RefSite::Range(range) => {
                            let clipped = bound
                                .and_then(|b| range.clip(&b))
                                .unwrap_or(CellRange::single(range.start));
                            for r in clipped.cells() {
                                graph.add_dependency(dependent.clone(), QualifiedRef::new(own_name.clone(), r));
                            }
                        }
                        RefSite::SheetCell(sheet_name, r) => {
                            graph.add_dependency(dependent.clone(), QualifiedRef::new(sheet_name, r));
                        }
                        RefSite::SheetRange(sheet_name, range) => {
                            let other_bound = workbook
                                .sheet_index(sheet_name.as_str())
                                .and_then(|i| workbook.sheet(i))
                                .and_then(|s| s.used_range());
                            let clipped = other_bound
                                .and_then(|b| range.clip(&b))
                                .unwrap_or(CellRange::single(range.start));
                            for r in clipped.cells() {
                                graph.add_dependency(dependent.clone(), QualifiedRef::new(sheet_name.clone(), r));
                            }
                        }
                    }
                }
                let _ = sheet_index; // only the sheet's own name is needed above
            }
        }

        Ok(graph)
    }

    pub fn precedents(&self, cell: &QualifiedRef) -> impl Iterator<Item = QualifiedRef> + '_ {
        self.precedents.get(cell).into_iter().flat_map(|s| s.iter().cloned())
    }

    pub fn dependents(&self, cell: &QualifiedRef) -> impl Iterator<Item = QualifiedRef> + '_ {
        self.dependents.get(cell).into_iter().flat_map(|s| s.iter().cloned())
    }

    /// Cross-sheet cycle detection. The reported path loses sheet
    /// qualification (the core's `FormulaError::CircularRef` carries plain
    /// `ARef`s); this is an acceptable simplification since the cell
    /// coordinates alone are usually enough to locate the cycle, and a
    /// richer `QualifiedRef`-aware error is easy to add without touching
    /// this algorithm's shape.
    pub fn detect_cycles(&self) -> Result<(), FormulaError> {
        match find_cycle(&self.order, &self.precedents) {
            Some(cycle) => Err(FormulaError::CircularRef(cycle.into_iter().map(|q| q.cell).collect())),
            None => Ok(()),
        }
    }

    pub fn topological_order(&self) -> Result<Vec<QualifiedRef>, FormulaError> {
        kahn_order(&self.order, &self.precedents, &self.dependents).map_err(|remaining| {
            FormulaError::CircularRef(close_cycle(&remaining).into_iter().map(|q| q.cell).collect())
        })
    }

    /// `true` if the single-sheet graph restricted to `sheet_name` alone
    /// (ignoring every cross-sheet edge) has no cycle — used to report that
    /// a sheet is fine on its own even when the whole workbook isn't.
    pub fn sheet_is_acyclic(&self, sheet_name: &SheetName) -> bool {
        let nodes: Vec<QualifiedRef> = self.order.iter().filter(|q| &q.sheet == sheet_name).cloned().collect();
        let mut local_precedents: AHashMap<QualifiedRef, AHashSet<QualifiedRef>> = AHashMap::new();
        for n in &nodes {
            let local: AHashSet<QualifiedRef> = self
                .precedents
                .get(n)
                .into_iter()
                .flatten()
                .filter(|p| &p.sheet == sheet_name)
                .cloned()
                .collect();
            local_precedents.insert(n.clone(), local);
        }
        find_cycle(&nodes, &local_precedents).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellforge_core::{CellValue, SheetName as Name};

    fn a1(text: &str) -> ARef {
        ARef::parse(text).unwrap()
    }

    #[test]
    fn acyclic_graph_has_deterministic_order() {
        let sheet = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::formula("=B1+C1"))
            .put(a1("B1"), CellValue::number(10))
            .put(a1("C1"), CellValue::number(20));
        let graph = DependencyGraph::from_sheet(&sheet).unwrap();
        graph.detect_cycles().unwrap();
        let order = graph.topological_order().unwrap();
        let formula_order: Vec<String> =
            order.into_iter().filter(|r| graph.is_formula_cell(*r)).map(|r| r.to_a1()).collect();
        assert_eq!(formula_order, vec!["A1"]);
    }

    #[test]
    fn direct_cycle_is_detected() {
        let sheet = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::formula("=B1"))
            .put(a1("B1"), CellValue::formula("=C1"))
            .put(a1("C1"), CellValue::formula("=A1"));
        let graph = DependencyGraph::from_sheet(&sheet).unwrap();
        let err = graph.detect_cycles().unwrap_err();
        match err {
            FormulaError::CircularRef(path) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected CircularRef, got {other:?}"),
        }
    }

    #[test]
    fn topological_sort_agrees_with_cycle_detection() {
        let acyclic = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::formula("=B1"))
            .put(a1("B1"), CellValue::number(1));
        let graph = DependencyGraph::from_sheet(&acyclic).unwrap();
        assert!(graph.detect_cycles().is_ok());
        assert!(graph.topological_order().is_ok());

        let cyclic = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::formula("=A1"));
        let graph = DependencyGraph::from_sheet(&cyclic).unwrap();
        assert!(graph.detect_cycles().is_err());
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn unbounded_range_clips_to_used_range() {
        let sheet = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::number(1))
            .put(a1("A2"), CellValue::number(2))
            .put(a1("A3"), CellValue::number(3))
            .put(a1("D1"), CellValue::formula("=SUM(A:A)"));
        let graph = DependencyGraph::from_sheet(&sheet).unwrap();
        let precedents: Vec<ARef> = graph.precedents(a1("D1")).collect();
        assert_eq!(precedents.len(), 3);
    }

    #[test]
    fn transitive_dependents_excludes_starting_set() {
        let sheet = Sheet::new(Name::new("Sheet1").unwrap())
            .put(a1("A1"), CellValue::number(1))
            .put(a1("B1"), CellValue::formula("=A1"))
            .put(a1("C1"), CellValue::formula("=B1"));
        let graph = DependencyGraph::from_sheet(&sheet).unwrap();
        let dependents = graph.transitive_dependents(&[a1("A1")]);
        assert!(dependents.contains(&a1("B1")));
        assert!(dependents.contains(&a1("C1")));
        assert!(!dependents.contains(&a1("A1")));
    }

    #[test]
    fn cross_sheet_cycle_detected_but_single_sheet_is_fine() {
        let s1 = Sheet::new(Name::new("S1").unwrap()).put(a1("A1"), CellValue::formula("=S2!B1"));
        let s2 = Sheet::new(Name::new("S2").unwrap()).put(a1("B1"), CellValue::formula("=S1!A1"));
        let wb = Workbook::new()
            .add_sheet(Name::new("S1").unwrap())
            .unwrap()
            .add_sheet(Name::new("S2").unwrap())
            .unwrap();
        let wb = wb.with_sheet(0, s1).unwrap();
        let wb = wb.with_sheet(1, s2).unwrap();

        let graph = CrossSheetGraph::from_workbook(&wb).unwrap();
        assert!(graph.detect_cycles().is_err());

        let single = DependencyGraph::from_sheet(wb.sheet(0).unwrap()).unwrap();
        assert!(single.detect_cycles().is_ok());
    }
}
