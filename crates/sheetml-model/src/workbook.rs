use serde::{Deserialize, Serialize};
use sheetml_formula::{
    sheet_name_eq_case_insensitive, CellRef, Formula, FormulaShifter, Range, ShiftEdit,
};

use crate::calc_chain::CalcChain;
use crate::cell::{CachedValue, Cell, CellContent, WorksheetId};
use crate::error::{ModelError, NameKind, Result};
use crate::names::{
    is_builtin_name, validate_defined_name, DefinedName, DefinedNameScope,
    DefinedNameValidationError,
};
use crate::options::{CalcChainPolicy, WorkbookOptions};
use crate::rich_text::RichText;
use crate::shared_strings::SharedStringPool;
use crate::sheet::Worksheet;
use crate::sheet_name::validate_sheet_name;
use crate::style::StyleRegistry;

/// A workbook: ordered worksheets plus the tables their cells index into.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Workbook {
    /// Worksheets in tab order.
    sheets: Vec<Worksheet>,

    /// Fonts, fills, borders, number formats and cell formats.
    pub styles: StyleRegistry,

    /// The shared string table.
    pub shared_strings: SharedStringPool,

    /// Defined names (named ranges / constants / formulas).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    defined_names: Vec<DefinedName>,

    /// Calculation chain carried over from the source file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    calc_chain: Option<CalcChain>,

    options: WorkbookOptions,

    /// Next worksheet id to allocate (runtime-only).
    #[serde(skip)]
    next_sheet_id: WorksheetId,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new empty workbook.
    pub fn new() -> Self {
        Self::with_options(WorkbookOptions::default())
    }

    pub fn with_options(options: WorkbookOptions) -> Self {
        Self {
            sheets: Vec::new(),
            styles: StyleRegistry::new(),
            shared_strings: SharedStringPool::new(),
            defined_names: Vec::new(),
            calc_chain: None,
            options,
            next_sheet_id: 1,
        }
    }

    pub fn options(&self) -> &WorkbookOptions {
        &self.options
    }

    // ---- sheets ----

    /// Add a worksheet at the end of the tab order, returning its id.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<WorksheetId> {
        let name = name.into();
        validate_sheet_name(&name)?;
        self.ensure_unique_sheet_name(&name, None)?;

        let id = self.next_sheet_id;
        self.next_sheet_id = self.next_sheet_id.wrapping_add(1);
        let mut sheet = Worksheet::new(id, name);
        sheet.version = self.options.version;
        self.sheets.push(sheet);
        Ok(id)
    }

    /// Remove a worksheet together with its sheet-scoped names and its
    /// calculation chain entries.
    pub fn remove_sheet(&mut self, id: WorksheetId) -> Result<Worksheet> {
        let index = self.sheet_position(id)?;
        self.defined_names
            .retain(|n| n.scope != DefinedNameScope::Sheet(id));
        if let Some(chain) = &mut self.calc_chain {
            chain.on_sheet_removed(id);
        }
        Ok(self.sheets.remove(index))
    }

    /// Rename a worksheet and rewrite formulas that reference it.
    pub fn rename_sheet(&mut self, id: WorksheetId, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        validate_sheet_name(new_name)?;
        let index = self.sheet_position(id)?;
        self.ensure_unique_sheet_name(new_name, Some(id))?;

        let old_name = self.sheets[index].name.clone();
        for sheet in &mut self.sheets {
            sheet.rename_sheet_references(&old_name, new_name);
        }
        for name in &mut self.defined_names {
            if let Some(renamed) = name.refers_to.rename_sheet(&old_name, new_name) {
                name.refers_to = renamed;
            }
        }
        self.sheets[index].name = new_name.to_string();
        Ok(())
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Get a sheet by id.
    pub fn sheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    /// Get a mutable sheet by id.
    pub fn sheet_mut(&mut self, id: WorksheetId) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.id == id)
    }

    /// Find a sheet by name (case-insensitive, like Excel).
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|s| sheet_name_eq_case_insensitive(&s.name, name))
    }

    /// Tab index of the sheet called `name`.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| sheet_name_eq_case_insensitive(&s.name, name))
    }

    /// Sheet names in tab order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet_position(&self, id: WorksheetId) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ModelError::SheetNotFound(id.to_string()))
    }

    fn sheet_entry(&mut self, id: WorksheetId) -> Result<&mut Worksheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ModelError::SheetNotFound(id.to_string()))
    }

    fn ensure_unique_sheet_name(&self, name: &str, except: Option<WorksheetId>) -> Result<()> {
        let taken = self
            .sheets
            .iter()
            .any(|s| Some(s.id) != except && sheet_name_eq_case_insensitive(&s.name, name));
        if taken {
            return Err(ModelError::DuplicateName {
                kind: NameKind::Sheet,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    // ---- cells ----

    /// Store text in a cell through the shared string table, keeping the
    /// cell's format. Returns the string's index.
    pub fn set_cell_text(
        &mut self,
        sheet: WorksheetId,
        at: CellRef,
        text: impl Into<RichText>,
    ) -> Result<u32> {
        let text = text.into();
        let worksheet = self
            .sheet(sheet)
            .ok_or_else(|| ModelError::SheetNotFound(sheet.to_string()))?;
        // Validate against the sheet before the string table grows.
        worksheet.check_cell_in_grid(at)?;
        worksheet.check_not_in_array(at)?;
        let style = worksheet.cell(at).map_or(0, |c| c.style);
        let index = self.shared_strings.intern(text);
        let worksheet = self.sheet_entry(sheet)?;
        let previous = worksheet.set_cell(
            at,
            Cell {
                content: CellContent::SharedString(index),
                style,
            },
        )?;
        if previous.is_some_and(|c| c.content.is_formula()) {
            self.formula_deleted(sheet, at);
        }
        Ok(index)
    }

    /// The text of a cell holding a shared string.
    pub fn cell_text(&self, sheet: WorksheetId, at: CellRef) -> Result<Option<&RichText>> {
        let worksheet = self
            .sheet(sheet)
            .ok_or_else(|| ModelError::SheetNotFound(sheet.to_string()))?;
        match worksheet.cell(at).map(|c| &c.content) {
            Some(CellContent::SharedString(index)) => self.shared_strings.get(*index).map(Some),
            _ => Ok(None),
        }
    }

    /// Point a cell at an existing cell format.
    pub fn set_cell_style(&mut self, sheet: WorksheetId, at: CellRef, style: u32) -> Result<()> {
        self.styles.style(style)?;
        self.sheet_entry(sheet)?.set_cell_style(at, style)
    }

    /// Store `cell` at `at`, returning the previous cell.
    ///
    /// A formula the new cell replaces leaves the calculation chain.
    pub fn set_cell(
        &mut self,
        sheet: WorksheetId,
        at: CellRef,
        cell: Cell,
    ) -> Result<Option<Cell>> {
        let previous = self.sheet_entry(sheet)?.set_cell(at, cell)?;
        if previous.as_ref().is_some_and(|c| c.content.is_formula()) {
            self.formula_deleted(sheet, at);
        }
        Ok(previous)
    }

    pub fn set_formula(&mut self, sheet: WorksheetId, at: CellRef, formula: Formula) -> Result<()> {
        let worksheet = self.sheet_entry(sheet)?;
        let replaced = worksheet.cell(at).is_some_and(|c| c.content.is_formula());
        worksheet.set_formula(at, formula)?;
        if replaced {
            self.formula_deleted(sheet, at);
        }
        Ok(())
    }

    /// Fill `range` with one shared formula; see [`Worksheet::set_shared_formula`].
    pub fn set_shared_formula(
        &mut self,
        sheet: WorksheetId,
        range: Range,
        formula: Formula,
    ) -> Result<u32> {
        let worksheet = self.sheet_entry(sheet)?;
        let replaced = worksheet.formula_cells_in(range);
        let si = worksheet.set_shared_formula(range, formula)?;
        for at in replaced {
            self.formula_deleted(sheet, at);
        }
        Ok(si)
    }

    /// Enter an array formula over `range`; see [`Worksheet::set_array_formula`].
    pub fn set_array_formula(
        &mut self,
        sheet: WorksheetId,
        range: Range,
        formula: Formula,
    ) -> Result<()> {
        let worksheet = self.sheet_entry(sheet)?;
        let replaced = worksheet.formula_cells_in(range);
        worksheet.set_array_formula(range, formula)?;
        for at in replaced {
            self.formula_deleted(sheet, at);
        }
        Ok(())
    }

    /// Remove the array formula covering `at`, returning its range.
    pub fn remove_array_formula(
        &mut self,
        sheet: WorksheetId,
        at: CellRef,
    ) -> Result<Option<Range>> {
        let removed = self.sheet_entry(sheet)?.remove_array_formula(at)?;
        if let Some(range) = removed {
            self.formula_deleted(sheet, range.start);
        }
        Ok(removed)
    }

    pub fn remove_cell(&mut self, sheet: WorksheetId, at: CellRef) -> Result<Option<Cell>> {
        let removed = self.sheet_entry(sheet)?.remove_cell(at)?;
        if removed.as_ref().is_some_and(|c| c.content.is_formula()) {
            self.formula_deleted(sheet, at);
        }
        Ok(removed)
    }

    /// Replace a formula by its cached result. Returns whether the cell held
    /// a formula.
    pub fn remove_formula(&mut self, sheet: WorksheetId, at: CellRef) -> Result<bool> {
        let Some(removed) = self.sheet_entry(sheet)?.remove_formula(at)? else {
            return Ok(false);
        };
        if let CachedValue::String(text) = removed.cached {
            let index = self.shared_strings.intern(text);
            let worksheet = self.sheet_entry(sheet)?;
            let style = worksheet.cell(at).map_or(0, |c| c.style);
            worksheet.set_cell(
                at,
                Cell {
                    content: CellContent::SharedString(index),
                    style,
                },
            )?;
        }
        self.formula_deleted(sheet, at);
        Ok(true)
    }

    fn formula_deleted(&mut self, sheet: WorksheetId, at: CellRef) {
        if let Some(chain) = &mut self.calc_chain {
            chain.on_formula_deleted(sheet, at);
        }
    }

    // ---- styles ----

    /// Add a cell format record, honoring [`WorkbookOptions::dedupe_cell_styles`].
    pub fn create_cell_style(&mut self) -> u32 {
        self.styles.create_cell_style(self.options.dedupe_cell_styles)
    }

    /// Copy cell format `index` of `source` into this workbook.
    pub fn clone_style_from(&mut self, source: &Workbook, index: u32) -> Result<u32> {
        self.styles.clone_style_from(&source.styles, index)
    }

    // ---- calculation chain ----

    pub fn calc_chain(&self) -> Option<&CalcChain> {
        self.calc_chain.as_ref()
    }

    pub fn set_calc_chain(&mut self, chain: Option<CalcChain>) {
        self.calc_chain = chain;
    }

    // ---- structural edits ----

    /// Move rows `first..=last` by `delta`, overwriting the destination.
    pub fn shift_rows(&mut self, sheet: WorksheetId, first: u32, last: u32, delta: i32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::move_rows(index, first, last, delta))
    }

    pub fn insert_rows(&mut self, sheet: WorksheetId, at: u32, count: u32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::insert_rows(index, at, count))
    }

    pub fn delete_rows(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::delete_rows(index, first, last))
    }

    /// Move columns `first..=last` by `delta`, overwriting the destination.
    pub fn shift_columns(&mut self, sheet: WorksheetId, first: u32, last: u32, delta: i32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::move_columns(index, first, last, delta))
    }

    pub fn insert_columns(&mut self, sheet: WorksheetId, at: u32, count: u32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::insert_columns(index, at, count))
    }

    pub fn delete_columns(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        let index = self.sheet_position(sheet)?;
        self.apply_structural_edit(ShiftEdit::delete_columns(index, first, last))
    }

    /// Apply one structural edit to cells, formulas, defined names, merged
    /// regions, array formulas, conditional formatting, outlines and the
    /// calculation chain.
    ///
    /// The edit is planned against every sheet first; if any part fails the
    /// workbook is left untouched.
    pub fn apply_structural_edit(&mut self, edit: ShiftEdit) -> Result<()> {
        let sheet_names = self.sheet_names();
        let shifter = FormulaShifter::new(edit, &sheet_names, self.options.version)?;

        let mut plans = Vec::with_capacity(self.sheets.len());
        for (index, sheet) in self.sheets.iter().enumerate() {
            plans.push(sheet.plan_edit(&shifter, index)?);
        }
        let mut renamed = Vec::new();
        for (i, name) in self.defined_names.iter().enumerate() {
            let ctx = match name.scope {
                DefinedNameScope::Workbook => None,
                DefinedNameScope::Sheet(id) => self.sheets.iter().position(|s| s.id == id),
            };
            if let Some(shifted) = shifter.shift_formula(&name.refers_to, ctx)? {
                renamed.push((i, shifted));
            }
        }
        log::debug!(
            "applying {:?}: {} formulas, {} defined names",
            edit.descriptor(),
            plans.iter().map(|p| p.rewritten_formulas()).sum::<usize>(),
            renamed.len()
        );

        for (index, (sheet, plan)) in self.sheets.iter_mut().zip(plans).enumerate() {
            sheet.apply_edit(plan, &edit, index);
        }
        for (i, formula) in renamed {
            self.defined_names[i].refers_to = formula;
        }
        let sheet_id = self.sheets[edit.sheet].id;
        match self.options.calc_chain {
            CalcChainPolicy::Maintain => {
                if let Some(chain) = &mut self.calc_chain {
                    chain.on_edit(sheet_id, &edit, self.options.version);
                }
            }
            CalcChainPolicy::DropOnStructuralEdit => {
                if self.calc_chain.take().is_some() {
                    log::warn!("dropped the calculation chain after a structural edit");
                }
            }
        }
        Ok(())
    }

    // ---- outline ----

    pub fn group_rows(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        self.sheet_entry(sheet)?.group_rows(first, last)
    }

    pub fn ungroup_rows(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        self.sheet_entry(sheet)?.ungroup_rows(first, last)
    }

    /// Collapse or expand the row group containing `row`; returns its bounds.
    pub fn set_row_group_collapsed(
        &mut self,
        sheet: WorksheetId,
        row: u32,
        collapsed: bool,
    ) -> Result<Option<(u32, u32)>> {
        self.sheet_entry(sheet)?.set_row_group_collapsed(row, collapsed)
    }

    pub fn group_columns(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        self.sheet_entry(sheet)?.group_columns(first, last)
    }

    pub fn ungroup_columns(&mut self, sheet: WorksheetId, first: u32, last: u32) -> Result<()> {
        self.sheet_entry(sheet)?.ungroup_columns(first, last)
    }

    /// Collapse or expand the column group containing `col`; returns its bounds.
    pub fn set_column_group_collapsed(
        &mut self,
        sheet: WorksheetId,
        col: u32,
        collapsed: bool,
    ) -> Result<Option<(u32, u32)>> {
        self.sheet_entry(sheet)?.set_column_group_collapsed(col, collapsed)
    }

    // ---- defined names ----

    /// Create a new defined name.
    ///
    /// `refers_to` may carry a leading `=`; it is stored without one.
    pub fn create_name(
        &mut self,
        scope: DefinedNameScope,
        name: impl Into<String>,
        refers_to: &str,
    ) -> Result<()> {
        let name = name.into();
        let name = name.trim().to_string();
        validate_defined_name(&name)?;
        if is_builtin_name(&name) && scope == DefinedNameScope::Workbook {
            return Err(DefinedNameValidationError::BuiltinNeedsSheetScope.into());
        }
        if let DefinedNameScope::Sheet(sheet_id) = scope {
            self.sheet_position(sheet_id)?;
        }
        if self.name(scope, &name).is_some() {
            return Err(ModelError::DuplicateName {
                kind: NameKind::DefinedName,
                name,
            });
        }

        let trimmed = refers_to.trim();
        let refers_to = Formula::parse(trimmed.strip_prefix('=').unwrap_or(trimmed))?;
        self.defined_names.push(DefinedName {
            name,
            scope,
            refers_to,
            comment: None,
            hidden: false,
        });
        Ok(())
    }

    /// Find a defined name by scope and name (case-insensitive, like Excel).
    pub fn name(&self, scope: DefinedNameScope, name: &str) -> Option<&DefinedName> {
        self.defined_names
            .iter()
            .find(|n| n.scope == scope && sheet_name_eq_case_insensitive(&n.name, name))
    }

    pub fn remove_name(&mut self, scope: DefinedNameScope, name: &str) -> Option<DefinedName> {
        let index = self
            .defined_names
            .iter()
            .position(|n| n.scope == scope && sheet_name_eq_case_insensitive(&n.name, name))?;
        Some(self.defined_names.remove(index))
    }

    pub fn names(&self) -> &[DefinedName] {
        &self.defined_names
    }
}

impl<'de> Deserialize<'de> for Workbook {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default)]
            sheets: Vec<Worksheet>,
            #[serde(default)]
            styles: StyleRegistry,
            #[serde(default)]
            shared_strings: SharedStringPool,
            #[serde(default)]
            defined_names: Vec<DefinedName>,
            #[serde(default)]
            calc_chain: Option<CalcChain>,
            #[serde(default)]
            options: WorkbookOptions,
        }

        let helper = Helper::deserialize(deserializer)?;

        let next_sheet_id = helper
            .sheets
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .wrapping_add(1);

        let mut sheets = helper.sheets;
        for sheet in &mut sheets {
            sheet.version = helper.options.version;
        }

        Ok(Workbook {
            sheets,
            styles: helper.styles,
            shared_strings: helper.shared_strings,
            defined_names: helper.defined_names,
            calc_chain: helper.calc_chain,
            options: helper.options,
            next_sheet_id,
        })
    }
}
