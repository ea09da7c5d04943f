use serde::{Deserialize, Serialize};
use sheetml_formula::{Axis, CellRef, IndexShift, ShiftEdit, SpreadsheetVersion};

use crate::cell::{CellId, WorksheetId};

/// The calculation chain (`calcChain.xml`): formula cells in the order they
/// were last evaluated.
///
/// The chain is only an ordering hint. Whenever an edit makes an entry
/// doubtful the entry is dropped rather than guessed; an empty chain simply
/// means "recalculate everything".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalcChain {
    entries: Vec<CellId>,
}

impl CalcChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sheet_id: WorksheetId, cell: CellRef) {
        self.entries.push(CellId {
            sheet_id,
            cell,
        });
    }

    pub fn entries(&self) -> &[CellId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, sheet_id: WorksheetId, cell: CellRef) -> bool {
        self.entries
            .iter()
            .any(|e| e.sheet_id == sheet_id && e.cell == cell)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop the entry of a cell whose formula was removed.
    ///
    /// The remaining entries keep their relative order.
    pub fn on_formula_deleted(&mut self, sheet_id: WorksheetId, cell: CellRef) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.sheet_id == sheet_id && e.cell == cell));
        self.entries.len() != before
    }

    /// Rows `first..=last` of a sheet moved by `delta`.
    pub fn on_rows_shifted(
        &mut self,
        sheet_id: WorksheetId,
        first: u32,
        last: u32,
        delta: i32,
        version: SpreadsheetVersion,
    ) {
        self.on_edit(sheet_id, &ShiftEdit::move_rows(0, first, last, delta), version);
    }

    /// Columns `first..=last` of a sheet moved by `delta`.
    pub fn on_columns_shifted(
        &mut self,
        sheet_id: WorksheetId,
        first: u32,
        last: u32,
        delta: i32,
        version: SpreadsheetVersion,
    ) {
        self.on_edit(sheet_id, &ShiftEdit::move_columns(0, first, last, delta), version);
    }

    /// Remap entries of `sheet_id` through a structural edit.
    ///
    /// `edit.sheet` is ignored; the entries are selected by `sheet_id`.
    /// Entries whose cells were deleted, overwritten or pushed off the sheet
    /// are dropped.
    pub fn on_edit(&mut self, sheet_id: WorksheetId, edit: &ShiftEdit, version: SpreadsheetVersion) {
        let before = self.entries.len();
        self.entries.retain_mut(|entry| {
            if entry.sheet_id != sheet_id {
                return true;
            }
            let index = match edit.axis {
                Axis::Rows => entry.cell.row,
                Axis::Columns => entry.cell.col,
            };
            match edit.map_index(index, version) {
                Ok(IndexShift::Kept(new_index)) => {
                    match edit.axis {
                        Axis::Rows => entry.cell.row = new_index,
                        Axis::Columns => entry.cell.col = new_index,
                    }
                    true
                }
                Ok(IndexShift::Deleted) | Err(_) => false,
            }
        });
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::warn!("dropped {dropped} calculation chain entries on sheet {sheet_id}");
        }
    }

    pub fn on_sheet_removed(&mut self, sheet_id: WorksheetId) {
        self.entries.retain(|e| e.sheet_id != sheet_id);
    }
}
