use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sheetml_formula::{
    Axis, CellRef, Formula, FormulaShifter, IndexShift, Range, RangeShift, ShiftEdit,
    SharedFormulaExpander, SpanImpact, SpreadsheetVersion,
};

use crate::cell::{CachedValue, Cell, CellContent, FormulaBody, FormulaCell, WorksheetId};
use crate::conditional_formatting::ConditionalFormatting;
use crate::error::{ModelError, Result};
use crate::merge::{axis_span, MergedRegions};
use crate::outline::Outline;

/// A sparse row of cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cells: BTreeMap<u32, Cell>,
    /// Explicit height in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Default cell format for the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u32>,
}

impl Row {
    pub fn cell(&self, col: u32) -> Option<&Cell> {
        self.cells.get(&col)
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, &Cell)> {
        self.cells.iter().map(|(c, cell)| (*c, cell))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// No cells and no row-level properties.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.height.is_none() && self.style.is_none()
    }
}

/// Width and default format of a column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u32>,
}

impl ColumnProperties {
    fn is_empty(&self) -> bool {
        self.width.is_none() && self.style.is_none()
    }
}

/// A worksheet: sparse rows of cells plus the regions and outline metadata
/// that have to stay consistent with them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Worksheet {
    pub(crate) id: WorksheetId,
    pub(crate) name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    rows: BTreeMap<u32, Row>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    columns: BTreeMap<u32, ColumnProperties>,
    #[serde(skip_serializing_if = "MergedRegions::is_empty")]
    merged_regions: MergedRegions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conditional_formatting: Vec<ConditionalFormatting>,
    outline: Outline,

    /// Shared formula group `si` -> its master cell (runtime-only).
    #[serde(skip)]
    shared_masters: BTreeMap<u32, CellRef>,
    #[serde(skip)]
    pub(crate) version: SpreadsheetVersion,
}

impl Worksheet {
    pub fn new(id: WorksheetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rows: BTreeMap::new(),
            columns: BTreeMap::new(),
            merged_regions: MergedRegions::new(),
            conditional_formatting: Vec::new(),
            outline: Outline::default(),
            shared_masters: BTreeMap::new(),
            version: SpreadsheetVersion::default(),
        }
    }

    pub fn id(&self) -> WorksheetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> SpreadsheetVersion {
        self.version
    }

    // ---- rows and columns ----

    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(&row)
    }

    pub fn row_mut(&mut self, row: u32) -> Option<&mut Row> {
        self.rows.get_mut(&row)
    }

    pub fn get_or_create_row(&mut self, row: u32) -> Result<&mut Row> {
        self.check_row(row)?;
        Ok(self.rows.entry(row).or_default())
    }

    pub fn rows(&self) -> impl Iterator<Item = (u32, &Row)> {
        self.rows.iter().map(|(r, row)| (*r, row))
    }

    /// Remove a row with all of its cells.
    ///
    /// Fails with [`ModelError::ArrayFormulaConflict`] when a multi-cell array
    /// formula extends beyond the row.
    pub fn remove_row(&mut self, row: u32) -> Result<Option<Row>> {
        let whole_row = Range::from_bounds(row, 0, row, self.version.last_col_index());
        if let Some(array) = self
            .array_formula_ranges()
            .into_iter()
            .find(|a| a.intersects(&whole_row) && !whole_row.contains_range(a))
        {
            return Err(ModelError::ArrayFormulaConflict(array));
        }
        let Some(existing) = self.rows.get(&row) else {
            return Ok(None);
        };
        let mut removed = Row {
            cells: BTreeMap::new(),
            height: existing.height,
            style: existing.style,
        };
        let cols: Vec<u32> = existing.cells.keys().copied().collect();
        for col in cols {
            if let Some(cell) = self.take_cell(CellRef::new(row, col)) {
                removed.cells.insert(col, cell);
            }
        }
        self.rows.remove(&row);
        Ok(Some(removed))
    }

    pub fn column(&self, col: u32) -> Option<&ColumnProperties> {
        self.columns.get(&col)
    }

    pub fn set_column_width(&mut self, col: u32, width: Option<f64>) -> Result<()> {
        self.check_col(col)?;
        self.columns.entry(col).or_default().width = width;
        self.prune_column(col);
        Ok(())
    }

    pub fn set_column_style(&mut self, col: u32, style: Option<u32>) -> Result<()> {
        self.check_col(col)?;
        self.columns.entry(col).or_default().style = style;
        self.prune_column(col);
        Ok(())
    }

    fn prune_column(&mut self, col: u32) {
        if self.columns.get(&col).is_some_and(ColumnProperties::is_empty) {
            self.columns.remove(&col);
        }
    }

    // ---- grid bounds ----

    /// Fails with [`ModelError::OutOfRange`] when `range` reaches past the
    /// last row or column of the sheet's version.
    pub fn check_in_grid(&self, range: Range) -> Result<()> {
        self.check_row(range.end.row)?;
        self.check_col(range.end.col)
    }

    pub(crate) fn check_cell_in_grid(&self, at: CellRef) -> Result<()> {
        self.check_in_grid(Range::new(at, at))
    }

    fn check_row(&self, row: u32) -> Result<()> {
        if row > self.version.last_row_index() {
            return Err(ModelError::OutOfRange {
                what: "row",
                index: row as usize,
                len: self.version.max_rows() as usize,
            });
        }
        Ok(())
    }

    fn check_col(&self, col: u32) -> Result<()> {
        if col > self.version.last_col_index() {
            return Err(ModelError::OutOfRange {
                what: "column",
                index: col as usize,
                len: self.version.max_cols() as usize,
            });
        }
        Ok(())
    }

    // ---- cells ----

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(&at.row)?.cells.get(&at.col)
    }

    fn cell_mut(&mut self, at: CellRef) -> Option<&mut Cell> {
        self.rows.get_mut(&at.row)?.cells.get_mut(&at.col)
    }

    /// Iterate stored cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.rows.iter().flat_map(|(&r, row)| {
            row.cells
                .iter()
                .map(move |(&c, cell)| (CellRef::new(r, c), cell))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.cells.len()).sum()
    }

    /// Store `cell` at `at`, returning the previous cell.
    ///
    /// Cells inside a multi-cell array formula cannot be replaced one by one;
    /// see [`Worksheet::remove_array_formula`]. A shared formula master must
    /// be the only master of its group, and a member must land inside the
    /// range of an existing master.
    pub fn set_cell(&mut self, at: CellRef, cell: Cell) -> Result<Option<Cell>> {
        self.check_cell_in_grid(at)?;
        self.check_not_in_array(at)?;
        let mut keeps_master = false;
        match cell.content.formula_cell().map(|f| &f.body) {
            Some(FormulaBody::ArrayMaster { range, .. }) => {
                if range.start != at {
                    return Err(ModelError::ArrayFormulaConflict(*range));
                }
                self.check_in_grid(*range)?;
                self.check_array_placement(*range)?;
            }
            Some(FormulaBody::SharedMaster { si, range, .. }) => {
                let broken = ModelError::BrokenSharedFormulaGroup { si: *si, cell: at };
                match self.shared_group(*si) {
                    Some((anchor, _)) if anchor != at => return Err(broken),
                    Some(_) => keeps_master = true,
                    None => {}
                }
                if !range.contains(at) {
                    return Err(broken);
                }
                self.check_in_grid(*range)?;
            }
            Some(FormulaBody::SharedMember { si }) => match self.shared_group(*si) {
                Some((anchor, range)) if anchor != at && range.contains(at) => {}
                _ => return Err(ModelError::BrokenSharedFormulaGroup { si: *si, cell: at }),
            },
            _ => {}
        }
        // Rewriting a master in place must not hand its group to a member.
        let previous = if keeps_master {
            self.detach_cell(at)
        } else {
            self.take_cell(at)
        };
        self.put_cell(at, cell);
        Ok(previous)
    }

    /// Remove a cell. Removing a shared formula master hands the group over
    /// to its next member.
    pub fn remove_cell(&mut self, at: CellRef) -> Result<Option<Cell>> {
        self.check_not_in_array(at)?;
        Ok(self.take_cell(at))
    }

    pub fn set_cell_style(&mut self, at: CellRef, style: u32) -> Result<()> {
        self.check_cell_in_grid(at)?;
        let row = self.rows.entry(at.row).or_default();
        row.cells.entry(at.col).or_default().style = style;
        if row.cells.get(&at.col).is_some_and(Cell::is_empty) {
            row.cells.remove(&at.col);
        }
        if row.is_empty() {
            self.rows.remove(&at.row);
        }
        Ok(())
    }

    /// Update the cached result of a formula cell.
    pub fn set_cached_value(&mut self, at: CellRef, value: CachedValue) -> bool {
        match self.cell_mut(at).and_then(|c| c.content.formula_cell_mut()) {
            Some(formula) => {
                formula.cached = value;
                true
            }
            None => false,
        }
    }

    // ---- formulas ----

    /// Store an ordinary formula, keeping the cell's format.
    pub fn set_formula(&mut self, at: CellRef, formula: Formula) -> Result<()> {
        let style = self.cell(at).map_or(0, |c| c.style);
        self.set_cell(
            at,
            Cell {
                content: CellContent::Formula(FormulaCell::normal(formula)),
                style,
            },
        )?;
        Ok(())
    }

    /// Turn the formula of a cell into a plain value: its cached result when
    /// there is one, blank otherwise. Returns the removed formula cell.
    ///
    /// Cached text results are left to the caller, which owns the string table.
    pub fn remove_formula(&mut self, at: CellRef) -> Result<Option<FormulaCell>> {
        self.check_not_in_array(at)?;
        let Some(style) = self
            .cell(at)
            .filter(|c| c.content.is_formula())
            .map(|c| c.style)
        else {
            return Ok(None);
        };
        let Some(Cell {
            content: CellContent::Formula(removed),
            ..
        }) = self.take_cell(at)
        else {
            return Ok(None);
        };
        let content = CellContent::from_cached(&removed.cached).unwrap_or_default();
        self.put_cell(at, Cell { content, style });
        Ok(Some(removed))
    }

    /// Fill `range` with one shared formula anchored at its top-left cell.
    ///
    /// Returns the group's `si`.
    pub fn set_shared_formula(&mut self, range: Range, formula: Formula) -> Result<u32> {
        self.check_in_grid(range)?;
        if let Some(array) = self
            .array_formula_ranges()
            .into_iter()
            .find(|a| !a.is_single_cell() && a.intersects(&range))
        {
            return Err(ModelError::ArrayFormulaConflict(array));
        }
        let si = self.next_shared_index();
        let anchor = range.start;
        for at in range.cells() {
            let style = self.cell(at).map_or(0, |c| c.style);
            let body = if at == anchor {
                FormulaBody::SharedMaster {
                    si,
                    range,
                    formula: formula.clone(),
                }
            } else {
                FormulaBody::SharedMember { si }
            };
            self.take_cell(at);
            self.put_cell(
                at,
                Cell {
                    content: CellContent::Formula(FormulaCell {
                        body,
                        cached: CachedValue::None,
                    }),
                    style,
                },
            );
        }
        Ok(si)
    }

    /// Enter a multi-cell array formula over `range`.
    ///
    /// The range may not cut through another array formula or a merged
    /// region; cells other than the anchor are cleared.
    pub fn set_array_formula(&mut self, range: Range, formula: Formula) -> Result<()> {
        self.check_in_grid(range)?;
        self.check_array_placement(range)?;
        for at in range.cells() {
            let style = self.cell(at).map_or(0, |c| c.style);
            let content = if at == range.start {
                CellContent::Formula(FormulaCell {
                    body: FormulaBody::ArrayMaster {
                        range,
                        formula: formula.clone(),
                    },
                    cached: CachedValue::None,
                })
            } else {
                CellContent::Blank
            };
            self.take_cell(at);
            self.put_cell(at, Cell { content, style });
        }
        Ok(())
    }

    /// Remove the array formula covering `at`, returning its range.
    pub fn remove_array_formula(&mut self, at: CellRef) -> Result<Option<Range>> {
        let Some((anchor, range)) = self.array_containing(at) else {
            return Ok(None);
        };
        if let Some(cell) = self.cell_mut(anchor) {
            if let CellContent::Formula(formula) = &cell.content {
                cell.content = CellContent::from_cached(&formula.cached).unwrap_or_default();
            }
        }
        Ok(Some(range))
    }

    /// The formula a cell evaluates, expanding shared formula members.
    pub fn effective_formula(&self, at: CellRef) -> Result<Option<Formula>> {
        let Some(formula_cell) = self.cell(at).and_then(|c| c.content.formula_cell()) else {
            return Ok(None);
        };
        match &formula_cell.body {
            FormulaBody::SharedMember { si } => {
                let (anchor, master) = self
                    .shared_master(*si)
                    .ok_or(ModelError::BrokenSharedFormulaGroup { si: *si, cell: at })?;
                let expander = SharedFormulaExpander::new(self.version);
                Ok(Some(expander.expand(master, anchor, at)))
            }
            body => Ok(body.stored_formula().cloned()),
        }
    }

    /// Formula cells inside `range`, in row-major order.
    pub fn formula_cells_in(&self, range: Range) -> Vec<CellRef> {
        self.rows
            .range(range.start.row..=range.end.row)
            .flat_map(|(&r, row)| {
                row.cells
                    .range(range.start.col..=range.end.col)
                    .filter(|(_, cell)| cell.content.is_formula())
                    .map(move |(&c, _)| CellRef::new(r, c))
            })
            .collect()
    }

    /// Whether `at` belongs to an array formula (single-cell arrays included).
    pub fn is_part_of_array_formula(&self, at: CellRef) -> bool {
        self.array_containing(at).is_some()
    }

    /// Ranges of every array formula on the sheet.
    pub fn array_formula_ranges(&self) -> Vec<Range> {
        self.iter_cells()
            .filter_map(|(_, cell)| match cell.content.formula_cell().map(|f| &f.body) {
                Some(FormulaBody::ArrayMaster { range, .. }) => Some(*range),
                _ => None,
            })
            .collect()
    }

    fn array_containing(&self, at: CellRef) -> Option<(CellRef, Range)> {
        self.iter_cells()
            .find_map(|(anchor, cell)| match cell.content.formula_cell().map(|f| &f.body) {
                Some(FormulaBody::ArrayMaster { range, .. }) if range.contains(at) => {
                    Some((anchor, *range))
                }
                _ => None,
            })
    }

    pub(crate) fn check_not_in_array(&self, at: CellRef) -> Result<()> {
        match self.array_containing(at) {
            Some((_, range)) if !range.is_single_cell() => {
                Err(ModelError::ArrayFormulaConflict(range))
            }
            _ => Ok(()),
        }
    }

    fn check_array_placement(&self, range: Range) -> Result<()> {
        if let Some(array) = self
            .array_formula_ranges()
            .into_iter()
            .find(|a| *a != range && !a.is_single_cell() && a.intersects(&range))
        {
            return Err(ModelError::ArrayFormulaConflict(array));
        }
        if !range.is_single_cell()
            && self
                .merged_regions
                .iter()
                .any(|m| m.intersects(&range) && !m.contains_range(&range))
        {
            return Err(ModelError::ArrayFormulaConflict(range));
        }
        Ok(())
    }

    /// Master cell and formula of shared group `si`.
    pub fn shared_master(&self, si: u32) -> Option<(CellRef, &Formula)> {
        let anchor = *self.shared_masters.get(&si)?;
        match self.cell(anchor)?.content.formula_cell().map(|f| &f.body) {
            Some(FormulaBody::SharedMaster {
                si: master_si,
                formula,
                ..
            }) if *master_si == si => Some((anchor, formula)),
            _ => None,
        }
    }

    // Master cell and range of shared group `si`.
    fn shared_group(&self, si: u32) -> Option<(CellRef, Range)> {
        let anchor = *self.shared_masters.get(&si)?;
        match self.cell(anchor)?.content.formula_cell().map(|f| &f.body) {
            Some(FormulaBody::SharedMaster {
                si: master_si,
                range,
                ..
            }) if *master_si == si => Some((anchor, *range)),
            _ => None,
        }
    }

    fn next_shared_index(&self) -> u32 {
        self.iter_cells()
            .filter_map(|(_, c)| c.content.formula_cell().and_then(|f| f.body.shared_index()))
            .max()
            .map_or(0, |si| si + 1)
    }

    fn detach_cell(&mut self, at: CellRef) -> Option<Cell> {
        let row = self.rows.get_mut(&at.row)?;
        let old = row.cells.remove(&at.col)?;
        if row.is_empty() {
            self.rows.remove(&at.row);
        }
        Some(old)
    }

    fn take_cell(&mut self, at: CellRef) -> Option<Cell> {
        let old = self.detach_cell(at)?;
        if let Some(FormulaBody::SharedMaster { si, range, formula }) =
            old.content.formula_cell().map(|f| &f.body)
        {
            if self.shared_masters.get(si) == Some(&at) {
                self.shared_masters.remove(si);
                self.promote_shared_master(*si, at, *range, formula);
            }
        }
        Some(old)
    }

    fn put_cell(&mut self, at: CellRef, cell: Cell) {
        if let Some(FormulaBody::SharedMaster { si, .. }) =
            cell.content.formula_cell().map(|f| &f.body)
        {
            self.shared_masters.insert(*si, at);
        }
        if cell.is_empty() {
            return;
        }
        self.rows.entry(at.row).or_default().cells.insert(at.col, cell);
    }

    // The first remaining member becomes the master; the group range shrinks
    // to the remaining members.
    fn promote_shared_master(&mut self, si: u32, old_anchor: CellRef, range: Range, formula: &Formula) {
        let members: Vec<CellRef> = self
            .rows
            .range(range.start.row..=range.end.row)
            .flat_map(|(&r, row)| {
                row.cells
                    .range(range.start.col..=range.end.col)
                    .filter(move |(_, cell)| {
                        matches!(
                            cell.content.formula_cell().map(|f| &f.body),
                            Some(FormulaBody::SharedMember { si: s }) if *s == si
                        )
                    })
                    .map(move |(&c, _)| CellRef::new(r, c))
            })
            .collect();
        let Some(&next) = members.first() else {
            return;
        };
        let bounds = members.iter().fold(Range::new(next, next), |acc, m| {
            Range::from_bounds(
                acc.start.row.min(m.row),
                acc.start.col.min(m.col),
                acc.end.row.max(m.row),
                acc.end.col.max(m.col),
            )
        });
        let promoted = SharedFormulaExpander::new(self.version).expand(formula, old_anchor, next);
        if let Some(cell) = self.cell_mut(next).and_then(|c| c.content.formula_cell_mut()) {
            cell.body = FormulaBody::SharedMaster {
                si,
                range: bounds,
                formula: promoted,
            };
            self.shared_masters.insert(si, next);
            log::debug!("shared formula group {si} now anchored at {next}");
        }
    }

    fn rebuild_shared_index(&mut self) {
        let masters: BTreeMap<u32, CellRef> = self
            .iter_cells()
            .filter_map(|(at, c)| match c.content.formula_cell().map(|f| &f.body) {
                Some(FormulaBody::SharedMaster { si, .. }) => Some((*si, at)),
                _ => None,
            })
            .collect();
        self.shared_masters = masters;
    }

    // ---- merged regions and conditional formatting ----

    pub fn merged_regions(&self) -> &MergedRegions {
        &self.merged_regions
    }

    pub fn add_merged_region(&mut self, range: Range) -> Result<usize> {
        self.check_in_grid(range)?;
        let arrays = self.array_formula_ranges();
        self.merged_regions.add(range, &arrays)
    }

    pub fn remove_merged_region(&mut self, index: usize) -> Result<Range> {
        self.merged_regions.remove(index)
    }

    pub fn conditional_formatting(&self) -> &[ConditionalFormatting] {
        &self.conditional_formatting
    }

    pub fn add_conditional_formatting(&mut self, block: ConditionalFormatting) -> Result<usize> {
        for range in &block.applies_to {
            self.check_in_grid(*range)?;
        }
        self.conditional_formatting.push(block);
        Ok(self.conditional_formatting.len() - 1)
    }

    // ---- outline ----

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn group_rows(&mut self, first: u32, last: u32) -> Result<()> {
        self.check_row(first.max(last))?;
        self.outline.rows.group(first.min(last), first.max(last));
        Ok(())
    }

    pub fn ungroup_rows(&mut self, first: u32, last: u32) -> Result<()> {
        self.check_row(first.max(last))?;
        self.outline.rows.ungroup(first.min(last), first.max(last));
        Ok(())
    }

    pub fn set_row_group_collapsed(
        &mut self,
        row: u32,
        collapsed: bool,
    ) -> Result<Option<(u32, u32)>> {
        self.check_row(row)?;
        Ok(self.outline.rows.set_group_collapsed(row, collapsed))
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        self.check_row(row)?;
        self.outline.rows.set_user_hidden(row, hidden);
        Ok(())
    }

    pub fn group_columns(&mut self, first: u32, last: u32) -> Result<()> {
        self.check_col(first.max(last))?;
        self.outline.cols.group(first.min(last), first.max(last));
        Ok(())
    }

    pub fn ungroup_columns(&mut self, first: u32, last: u32) -> Result<()> {
        self.check_col(first.max(last))?;
        self.outline.cols.ungroup(first.min(last), first.max(last));
        Ok(())
    }

    pub fn set_column_group_collapsed(
        &mut self,
        col: u32,
        collapsed: bool,
    ) -> Result<Option<(u32, u32)>> {
        self.check_col(col)?;
        Ok(self.outline.cols.set_group_collapsed(col, collapsed))
    }

    pub fn set_column_hidden(&mut self, col: u32, hidden: bool) -> Result<()> {
        self.check_col(col)?;
        self.outline.cols.set_user_hidden(col, hidden);
        Ok(())
    }

    pub fn row_outline_level(&self, row: u32) -> u8 {
        self.outline.rows.entry(row).level
    }

    pub fn column_outline_level(&self, col: u32) -> u8 {
        self.outline.cols.entry(col).level
    }

    // ---- structural edits ----

    /// Work out what the shifter's edit does to this sheet (tab index
    /// `sheet`) without changing anything.
    pub(crate) fn plan_edit(&self, shifter: &FormulaShifter<'_>, sheet: usize) -> Result<SheetEditPlan> {
        let edited = shifter.edit().sheet == sheet;
        let mut plan = SheetEditPlan::default();
        let mut groups: BTreeMap<u32, Vec<CellRef>> = BTreeMap::new();

        for (at, cell) in self.iter_cells() {
            let Some(formula_cell) = cell.content.formula_cell() else {
                continue;
            };
            match &formula_cell.body {
                FormulaBody::Normal { formula } => {
                    if let Some(shifted) = shifter.shift_formula(formula, Some(sheet))? {
                        plan.formulas
                            .push((at, FormulaBody::Normal { formula: shifted }));
                    }
                }
                FormulaBody::ArrayMaster { range, formula } => {
                    let new_range = if edited {
                        match plan_array_range(shifter, *range)? {
                            Some(r) => r,
                            None => continue,
                        }
                    } else {
                        *range
                    };
                    let shifted = shifter.shift_formula(formula, Some(sheet))?;
                    if shifted.is_some() || new_range != *range {
                        plan.formulas.push((
                            at,
                            FormulaBody::ArrayMaster {
                                range: new_range,
                                formula: shifted.unwrap_or_else(|| formula.clone()),
                            },
                        ));
                    }
                }
                FormulaBody::SharedMaster { si, .. } | FormulaBody::SharedMember { si } => {
                    groups.entry(*si).or_default().push(at);
                }
            }
        }

        for (si, members) in groups {
            self.plan_shared_group(shifter, sheet, si, &members, &mut plan)?;
        }

        if edited {
            self.check_cells_fit(shifter)?;
            plan.merged_regions = Some(self.merged_regions.plan_edit(shifter)?);
        }
        for block in &self.conditional_formatting {
            if let Some(planned) = block.plan_edit(shifter, sheet)? {
                plan.conditional_formatting.push(planned);
            }
        }
        Ok(plan)
    }

    // A group keeps its shape when every surviving member still derives from
    // the rewritten master; otherwise it is dissolved into normal formulas.
    fn plan_shared_group(
        &self,
        shifter: &FormulaShifter<'_>,
        sheet: usize,
        si: u32,
        members: &[CellRef],
        plan: &mut SheetEditPlan,
    ) -> Result<()> {
        let edited = shifter.edit().sheet == sheet;
        let expander = SharedFormulaExpander::new(shifter.version());
        let (anchor, master) = self.shared_master(si).ok_or(ModelError::BrokenSharedFormulaGroup {
            si,
            cell: members.first().copied().unwrap_or(CellRef::new(0, 0)),
        })?;

        let mut survivors = Vec::with_capacity(members.len());
        for &at in members {
            let current = expander.expand(master, anchor, at);
            let formula = shifter
                .shift_formula(&current, Some(sheet))?
                .unwrap_or(current);
            let new_at = if edited { shifter.shift_cell(at)? } else { Some(at) };
            if let Some(new_at) = new_at {
                survivors.push((at, new_at, formula));
            }
        }

        let new_master = survivors.iter().find(|(old, ..)| *old == anchor);
        let derivable = new_master.is_some_and(|(_, new_anchor, new_formula)| {
            survivors
                .iter()
                .all(|(_, new_at, f)| expander.expand(new_formula, *new_anchor, *new_at) == *f)
        });

        if derivable {
            let Some((_, _, new_formula)) = new_master else {
                return Ok(());
            };
            let Some(FormulaBody::SharedMaster { range, .. }) = self
                .cell(anchor)
                .and_then(|c| c.content.formula_cell())
                .map(|f| &f.body)
            else {
                return Ok(());
            };
            let new_range = if edited {
                match shifter.shift_range(*range)? {
                    RangeShift::Unchanged => *range,
                    RangeShift::Moved(moved) => moved,
                    RangeShift::Deleted => {
                        bounding_range(survivors.iter().map(|(_, at, _)| *at)).unwrap_or(*range)
                    }
                }
            } else {
                *range
            };
            if new_formula != master || new_range != *range {
                plan.formulas.push((
                    anchor,
                    FormulaBody::SharedMaster {
                        si,
                        range: new_range,
                        formula: new_formula.clone(),
                    },
                ));
            }
        } else if !survivors.is_empty() {
            log::warn!(
                "dissolving shared formula group {si} on sheet {} into {} formulas",
                self.name,
                survivors.len()
            );
            for (old, _, formula) in survivors {
                plan.formulas.push((old, FormulaBody::Normal { formula }));
            }
        }
        Ok(())
    }

    fn check_cells_fit(&self, shifter: &FormulaShifter<'_>) -> Result<()> {
        let edit = shifter.edit();
        let version = shifter.version();
        for (&r, row) in &self.rows {
            match edit.axis {
                Axis::Rows if !row.cells.is_empty() => {
                    edit.map_index(r, version)?;
                }
                Axis::Rows => {}
                Axis::Columns => {
                    for &c in row.cells.keys() {
                        edit.map_index(c, version)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply a plan produced by [`Worksheet::plan_edit`] for the same edit.
    pub(crate) fn apply_edit(&mut self, plan: SheetEditPlan, edit: &ShiftEdit, sheet: usize) {
        for (at, body) in plan.formulas {
            if let Some(formula) = self.cell_mut(at).and_then(|c| c.content.formula_cell_mut()) {
                formula.body = body;
            }
        }
        if edit.sheet == sheet {
            let version = self.version;
            match edit.axis {
                Axis::Rows => {
                    self.rows = remap_keys(std::mem::take(&mut self.rows), edit, version);
                    self.outline.rows.apply_edit(edit, version);
                }
                Axis::Columns => {
                    for row in self.rows.values_mut() {
                        row.cells = remap_keys(std::mem::take(&mut row.cells), edit, version);
                    }
                    self.rows.retain(|_, row| !row.is_empty());
                    self.columns = remap_keys(std::mem::take(&mut self.columns), edit, version);
                    self.outline.cols.apply_edit(edit, version);
                }
            }
            if let Some(regions) = plan.merged_regions {
                self.merged_regions.replace_all(regions);
            }
        }
        self.conditional_formatting = plan.conditional_formatting;
        self.rebuild_shared_index();
    }

    /// Rewrite sheet-qualified references after a sheet rename.
    pub(crate) fn rename_sheet_references(&mut self, old_name: &str, new_name: &str) {
        for row in self.rows.values_mut() {
            for cell in row.cells.values_mut() {
                let Some(formula) = cell
                    .content
                    .formula_cell_mut()
                    .and_then(|f| f.body.stored_formula_mut())
                else {
                    continue;
                };
                if let Some(renamed) = formula.rename_sheet(old_name, new_name) {
                    *formula = renamed;
                }
            }
        }
        for block in &mut self.conditional_formatting {
            for rule in &mut block.rules {
                for formula in rule.formulas_mut() {
                    if let Some(renamed) = formula.rename_sheet(old_name, new_name) {
                        *formula = renamed;
                    }
                }
            }
        }
    }
}

/// Changes a structural edit makes to one sheet, computed up front.
#[derive(Debug, Default)]
pub(crate) struct SheetEditPlan {
    /// New formula bodies, keyed by the cell's position before the edit.
    formulas: Vec<(CellRef, FormulaBody)>,
    /// Merged regions after the edit; only set for the edited sheet.
    merged_regions: Option<Vec<Range>>,
    conditional_formatting: Vec<ConditionalFormatting>,
}

impl SheetEditPlan {
    pub(crate) fn rewritten_formulas(&self) -> usize {
        self.formulas.len()
    }
}

fn plan_array_range(shifter: &FormulaShifter<'_>, range: Range) -> Result<Option<Range>> {
    let (lo, hi) = axis_span(&range, shifter.edit().axis);
    if shifter.edit().span_impact(lo, hi) == SpanImpact::Split {
        return Err(ModelError::ArrayFormulaConflict(range));
    }
    Ok(match shifter.shift_range(range)? {
        RangeShift::Unchanged => Some(range),
        RangeShift::Moved(moved) => Some(moved),
        RangeShift::Deleted => None,
    })
}

fn bounding_range(cells: impl Iterator<Item = CellRef>) -> Option<Range> {
    cells
        .map(|c| Range::new(c, c))
        .reduce(|acc, r| {
            Range::from_bounds(
                acc.start.row.min(r.start.row),
                acc.start.col.min(r.start.col),
                acc.end.row.max(r.end.row),
                acc.end.col.max(r.end.col),
            )
        })
}

fn remap_keys<V>(map: BTreeMap<u32, V>, edit: &ShiftEdit, version: SpreadsheetVersion) -> BTreeMap<u32, V> {
    let mut out = BTreeMap::new();
    for (index, value) in map {
        match edit.map_index(index, version) {
            Ok(IndexShift::Kept(new_index)) => {
                out.insert(new_index, value);
            }
            Ok(IndexShift::Deleted) => {}
            Err(err) => log::debug!("dropping {} {index}: {err}", edit.axis),
        }
    }
    out
}

impl<'de> Deserialize<'de> for Worksheet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            id: WorksheetId,
            name: String,
            #[serde(default)]
            rows: BTreeMap<u32, Row>,
            #[serde(default)]
            columns: BTreeMap<u32, ColumnProperties>,
            #[serde(default)]
            merged_regions: MergedRegions,
            #[serde(default)]
            conditional_formatting: Vec<ConditionalFormatting>,
            #[serde(default)]
            outline: Outline,
        }

        let helper = Helper::deserialize(deserializer)?;
        let mut sheet = Worksheet {
            id: helper.id,
            name: helper.name,
            rows: helper.rows,
            columns: helper.columns,
            merged_regions: helper.merged_regions,
            conditional_formatting: helper.conditional_formatting,
            outline: helper.outline,
            shared_masters: BTreeMap::new(),
            version: SpreadsheetVersion::default(),
        };
        sheet.rebuild_shared_index();
        Ok(sheet)
    }
}
