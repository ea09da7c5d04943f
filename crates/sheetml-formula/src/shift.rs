//! Reference adjustment for structural edits (row/column moves, inserts and deletes).
//!
//! A [`ShiftEdit`] describes one edit on one sheet. [`FormulaShifter`] applies
//! it to formula token streams and plain ranges so that every reference keeps
//! pointing at the same logical cells. References whose cells were removed
//! become `#REF!`; references pushed past the last row/column are rejected with
//! [`ShiftError::ReferenceShiftOverflow`] and the formula is left untouched.

use core::fmt;
use std::cmp::{max, min};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sheet_name::sheet_name_eq_case_insensitive;
use crate::token::{AreaToken, Coord, Corner, LineRangeToken, RefToken, SheetRef, Token};
use crate::{CellRef, Formula, Range, SpreadsheetVersion};

/// Which dimension an edit acts on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Rows,
    Columns,
}

impl Axis {
    fn last_index(self, version: SpreadsheetVersion) -> u32 {
        match self {
            Axis::Rows => version.last_row_index(),
            Axis::Columns => version.last_col_index(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Rows => f.write_str("row"),
            Axis::Columns => f.write_str("column"),
        }
    }
}

/// What happens along the edited axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShiftKind {
    /// Move the band `first..=last` by `delta`, overwriting the destination.
    Move { first: u32, last: u32, delta: i32 },
    /// Insert `count` empty lines before `at`.
    Insert { at: u32, count: u32 },
    /// Delete the band `first..=last`; later lines close the gap.
    Delete { first: u32, last: u32 },
}

/// A structural edit on one sheet (identified by tab-order index).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftEdit {
    pub axis: Axis,
    pub sheet: usize,
    pub kind: ShiftKind,
}

/// Edit category in the flat descriptor form.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    RowShift,
    ColumnShift,
    RowInsertDelete,
    ColumnInsertDelete,
}

/// Flat `{kind, sheet, first, last, delta}` view of a [`ShiftEdit`].
///
/// Inserts report the inserted band (`at..=at+count-1`, positive delta);
/// deletes report the deleted band with a negative delta.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditDescriptor {
    pub kind: EditKind,
    pub sheet_index: usize,
    pub first_index: u32,
    pub last_index: u32,
    pub delta: i64,
}

/// Where a single row/column index ends up after an edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexShift {
    Kept(u32),
    Deleted,
}

/// How an inclusive span along the edited axis relates to the edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpanImpact {
    /// No index of the span changes.
    Unaffected,
    /// Every index of the span moves by the same amount.
    Shifted,
    /// Every index of the span is removed (deleted or overwritten).
    Deleted,
    /// The edit boundary falls inside the span.
    Split,
}

/// Result of mapping a rectangular range through an edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeShift {
    Unchanged,
    Moved(Range),
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShiftError {
    #[error("invalid {axis} band {first}..={last}")]
    InvalidBand { axis: Axis, first: u32, last: u32 },
    #[error("cannot insert zero {axis}s")]
    EmptyInsert { axis: Axis },
    #[error("sheet index {0} is out of range")]
    UnknownSheet(usize),
    #[error("{axis} {index} shifted by {delta} falls outside the sheet (last {axis} index {limit})")]
    ReferenceShiftOverflow {
        axis: Axis,
        index: u32,
        delta: i64,
        limit: u32,
    },
}

impl ShiftEdit {
    pub fn move_rows(sheet: usize, first: u32, last: u32, delta: i32) -> Self {
        Self {
            axis: Axis::Rows,
            sheet,
            kind: ShiftKind::Move { first, last, delta },
        }
    }

    pub fn move_columns(sheet: usize, first: u32, last: u32, delta: i32) -> Self {
        Self {
            axis: Axis::Columns,
            sheet,
            kind: ShiftKind::Move { first, last, delta },
        }
    }

    pub fn insert_rows(sheet: usize, at: u32, count: u32) -> Self {
        Self {
            axis: Axis::Rows,
            sheet,
            kind: ShiftKind::Insert { at, count },
        }
    }

    pub fn insert_columns(sheet: usize, at: u32, count: u32) -> Self {
        Self {
            axis: Axis::Columns,
            sheet,
            kind: ShiftKind::Insert { at, count },
        }
    }

    pub fn delete_rows(sheet: usize, first: u32, last: u32) -> Self {
        Self {
            axis: Axis::Rows,
            sheet,
            kind: ShiftKind::Delete { first, last },
        }
    }

    pub fn delete_columns(sheet: usize, first: u32, last: u32) -> Self {
        Self {
            axis: Axis::Columns,
            sheet,
            kind: ShiftKind::Delete { first, last },
        }
    }

    pub fn descriptor(&self) -> EditDescriptor {
        let (kind, first_index, last_index, delta) = match (self.axis, self.kind) {
            (Axis::Rows, ShiftKind::Move { first, last, delta }) => {
                (EditKind::RowShift, first, last, delta as i64)
            }
            (Axis::Columns, ShiftKind::Move { first, last, delta }) => {
                (EditKind::ColumnShift, first, last, delta as i64)
            }
            (axis, ShiftKind::Insert { at, count }) => (
                insert_delete_kind(axis),
                at,
                at.saturating_add(count.saturating_sub(1)),
                count as i64,
            ),
            (axis, ShiftKind::Delete { first, last }) => (
                insert_delete_kind(axis),
                first,
                last,
                -((last as i64) - (first as i64) + 1),
            ),
        };
        EditDescriptor {
            kind,
            sheet_index: self.sheet,
            first_index,
            last_index,
            delta,
        }
    }

    /// The edit that undoes this one, structurally.
    ///
    /// Content overwritten by a move or removed by a delete is not restored.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ShiftKind::Move { first, last, delta } => ShiftKind::Move {
                first: (first as i64 + delta as i64) as u32,
                last: (last as i64 + delta as i64) as u32,
                delta: -delta,
            },
            ShiftKind::Insert { at, count } => ShiftKind::Delete {
                first: at,
                last: at + count.saturating_sub(1),
            },
            ShiftKind::Delete { first, last } => ShiftKind::Insert {
                at: first,
                count: last - first + 1,
            },
        };
        Self { kind, ..*self }
    }

    /// Check the edit itself fits the grid.
    pub fn validate(&self, version: SpreadsheetVersion) -> Result<(), ShiftError> {
        let limit = self.axis.last_index(version);
        match self.kind {
            ShiftKind::Move { first, last, delta } => {
                if first > last || last > limit {
                    return Err(ShiftError::InvalidBand {
                        axis: self.axis,
                        first,
                        last,
                    });
                }
                let dest_first = first as i64 + delta as i64;
                let dest_last = last as i64 + delta as i64;
                if dest_first < 0 {
                    return Err(self.overflow(first, delta as i64, limit));
                }
                if dest_last > limit as i64 {
                    return Err(self.overflow(last, delta as i64, limit));
                }
            }
            ShiftKind::Insert { at, count } => {
                if count == 0 {
                    return Err(ShiftError::EmptyInsert { axis: self.axis });
                }
                if at as i64 + count as i64 - 1 > limit as i64 {
                    return Err(self.overflow(at, count as i64, limit));
                }
            }
            ShiftKind::Delete { first, last } => {
                if first > last || last > limit {
                    return Err(ShiftError::InvalidBand {
                        axis: self.axis,
                        first,
                        last,
                    });
                }
            }
        }
        Ok(())
    }

    /// Inclusive span of indices whose content may change.
    pub fn affected_span(&self, version: SpreadsheetVersion) -> (u32, u32) {
        let limit = self.axis.last_index(version);
        match self.kind {
            ShiftKind::Move { first, last, delta } => {
                let dest_first = (first as i64 + delta as i64).max(0) as u32;
                let dest_last = (last as i64 + delta as i64).min(limit as i64) as u32;
                (min(first, dest_first), max(last, dest_last))
            }
            ShiftKind::Insert { at, .. } => (at, limit),
            ShiftKind::Delete { first, .. } => (first, limit),
        }
    }

    /// Map one index along the edited axis.
    pub fn map_index(&self, index: u32, version: SpreadsheetVersion) -> Result<IndexShift, ShiftError> {
        let limit = self.axis.last_index(version);
        match self.kind {
            ShiftKind::Move { first, last, delta } => {
                if (first..=last).contains(&index) {
                    let moved = index as i64 + delta as i64;
                    if moved < 0 || moved > limit as i64 {
                        return Err(self.overflow(index, delta as i64, limit));
                    }
                    return Ok(IndexShift::Kept(moved as u32));
                }
                let (dest_first, dest_last) = self.move_destination(first, last, delta);
                if (dest_first..=dest_last).contains(&(index as i64)) {
                    Ok(IndexShift::Deleted)
                } else {
                    Ok(IndexShift::Kept(index))
                }
            }
            ShiftKind::Insert { at, count } => {
                if index < at {
                    return Ok(IndexShift::Kept(index));
                }
                let moved = index as i64 + count as i64;
                if moved > limit as i64 {
                    return Err(self.overflow(index, count as i64, limit));
                }
                Ok(IndexShift::Kept(moved as u32))
            }
            ShiftKind::Delete { first, last } => {
                if index < first {
                    Ok(IndexShift::Kept(index))
                } else if index <= last {
                    Ok(IndexShift::Deleted)
                } else {
                    Ok(IndexShift::Kept(index - (last - first + 1)))
                }
            }
        }
    }

    /// Classify an inclusive span `lo..=hi` along the edited axis.
    pub fn span_impact(&self, lo: u32, hi: u32) -> SpanImpact {
        let (lo, hi) = (min(lo, hi), max(lo, hi));
        match self.kind {
            ShiftKind::Move { first, last, delta } => {
                let (dest_first, dest_last) = self.move_destination(first, last, delta);
                let in_band = lo >= first && hi <= last;
                if in_band {
                    return SpanImpact::Shifted;
                }
                let touches_band = lo <= last && hi >= first;
                let touches_dest = (lo as i64) <= dest_last && (hi as i64) >= dest_first;
                if !touches_band && !touches_dest {
                    SpanImpact::Unaffected
                } else if !touches_band && (lo as i64) >= dest_first && (hi as i64) <= dest_last {
                    SpanImpact::Deleted
                } else {
                    SpanImpact::Split
                }
            }
            ShiftKind::Insert { at, .. } => {
                if hi < at {
                    SpanImpact::Unaffected
                } else if lo >= at {
                    SpanImpact::Shifted
                } else {
                    SpanImpact::Split
                }
            }
            ShiftKind::Delete { first, last } => {
                if hi < first {
                    SpanImpact::Unaffected
                } else if lo > last {
                    SpanImpact::Shifted
                } else if lo >= first && hi <= last {
                    SpanImpact::Deleted
                } else {
                    SpanImpact::Split
                }
            }
        }
    }

    /// Map an inclusive span along the edited axis.
    ///
    /// Returns `Ok(None)` when every index of the span was removed. Partially
    /// removed spans shrink to the surviving part; a span that the moved band
    /// lands inside keeps the bounding extent of its surviving indices.
    pub fn map_span(
        &self,
        lo: u32,
        hi: u32,
        version: SpreadsheetVersion,
    ) -> Result<Option<(u32, u32)>, ShiftError> {
        let (lo, hi) = (min(lo, hi), max(lo, hi));
        let limit = self.axis.last_index(version);
        match self.kind {
            ShiftKind::Insert { .. } => {
                let new_lo = self.kept_or_overflow(lo, version)?;
                let new_hi = self.kept_or_overflow(hi, version)?;
                Ok(Some((new_lo, new_hi)))
            }
            ShiftKind::Delete { first, last } => {
                Ok(adjust_span_delete(lo, hi, first, last, last - first + 1))
            }
            ShiftKind::Move { first, last, delta } => {
                if self.span_impact(lo, hi) == SpanImpact::Unaffected {
                    return Ok(Some((lo, hi)));
                }
                let (dest_first, dest_last) = self.move_destination(first, last, delta);
                let mut bounds: Option<(u32, u32)> = None;
                let mut include = |a: u32, b: u32| {
                    bounds = Some(match bounds {
                        None => (a, b),
                        Some((x, y)) => (min(x, a), max(y, b)),
                    });
                };

                let moved_lo = max(lo, first);
                let moved_hi = min(hi, last);
                if moved_lo <= moved_hi {
                    let a = moved_lo as i64 + delta as i64;
                    let b = moved_hi as i64 + delta as i64;
                    if a < 0 || b > limit as i64 {
                        return Err(self.overflow(moved_lo, delta as i64, limit));
                    }
                    include(a as u32, b as u32);
                }

                for (a, b) in subtract_interval(lo, hi, first, last) {
                    for (c, d) in subtract_interval(a, b, dest_first.max(0) as u32, dest_last as u32) {
                        include(c, d);
                    }
                }
                Ok(bounds)
            }
        }
    }

    fn kept_or_overflow(&self, index: u32, version: SpreadsheetVersion) -> Result<u32, ShiftError> {
        match self.map_index(index, version)? {
            IndexShift::Kept(v) => Ok(v),
            IndexShift::Deleted => Ok(index),
        }
    }

    fn move_destination(&self, first: u32, last: u32, delta: i32) -> (i64, i64) {
        (first as i64 + delta as i64, last as i64 + delta as i64)
    }

    fn overflow(&self, index: u32, delta: i64, limit: u32) -> ShiftError {
        ShiftError::ReferenceShiftOverflow {
            axis: self.axis,
            index,
            delta,
            limit,
        }
    }
}

fn insert_delete_kind(axis: Axis) -> EditKind {
    match axis {
        Axis::Rows => EditKind::RowInsertDelete,
        Axis::Columns => EditKind::ColumnInsertDelete,
    }
}

/// `[lo, hi]` minus `[cut_lo, cut_hi]`, as up to two inclusive intervals.
fn subtract_interval(lo: u32, hi: u32, cut_lo: u32, cut_hi: u32) -> Vec<(u32, u32)> {
    if cut_hi < lo || cut_lo > hi {
        return vec![(lo, hi)];
    }
    let mut out = Vec::with_capacity(2);
    if cut_lo > lo {
        out.push((lo, cut_lo - 1));
    }
    if cut_hi < hi {
        out.push((cut_hi + 1, hi));
    }
    out
}

fn adjust_span_delete(
    start: u32,
    end: u32,
    del_start: u32,
    del_end: u32,
    count: u32,
) -> Option<(u32, u32)> {
    if end < del_start {
        return Some((start, end));
    }
    if start > del_end {
        return Some((start - count, end - count));
    }
    if start >= del_start && end <= del_end {
        return None;
    }

    let mut new_start = start;
    let mut new_end = end;

    if start >= del_start && start <= del_end {
        new_start = del_start;
    }

    if end >= del_start && end <= del_end {
        if del_start == 0 {
            return None;
        }
        new_end = del_start - 1;
    } else if end > del_end {
        new_end = end - count;
    }

    if new_start > new_end {
        None
    } else {
        Some((new_start, new_end))
    }
}

/// Applies one [`ShiftEdit`] to formulas and ranges of a workbook.
///
/// `sheet_names` lists every sheet in tab order; it resolves sheet-qualified
/// references and 3D spans.
#[derive(Debug, Clone)]
pub struct FormulaShifter<'a> {
    edit: ShiftEdit,
    sheet_names: &'a [String],
    version: SpreadsheetVersion,
}

impl<'a> FormulaShifter<'a> {
    pub fn new(
        edit: ShiftEdit,
        sheet_names: &'a [String],
        version: SpreadsheetVersion,
    ) -> Result<Self, ShiftError> {
        if edit.sheet >= sheet_names.len() {
            return Err(ShiftError::UnknownSheet(edit.sheet));
        }
        edit.validate(version)?;
        Ok(Self {
            edit,
            sheet_names,
            version,
        })
    }

    pub fn edit(&self) -> &ShiftEdit {
        &self.edit
    }

    pub fn version(&self) -> SpreadsheetVersion {
        self.version
    }

    /// Rewrite `formula` for the edit.
    ///
    /// `ctx_sheet` is the sheet unqualified references belong to (the cell's
    /// sheet, or a sheet-scoped name's sheet); `None` means unqualified
    /// references are not tied to any sheet. Returns `Ok(None)` when nothing
    /// changed. On error no partial rewrite is produced.
    pub fn shift_formula(
        &self,
        formula: &Formula,
        ctx_sheet: Option<usize>,
    ) -> Result<Option<Formula>, ShiftError> {
        let mut changed = false;
        let mut out = Vec::with_capacity(formula.tokens().len());
        for token in formula.tokens() {
            let (token, token_changed) = self.shift_token(token, ctx_sheet)?;
            changed |= token_changed;
            out.push(token);
        }
        if !changed {
            return Ok(None);
        }
        let shifted = Formula::new(out);
        if shifted.has_ref_error() && !formula.has_ref_error() {
            log::debug!("{formula} lost a reference to {:?}; now {shifted}", self.edit);
        }
        Ok(Some(shifted))
    }

    /// Map a range that lives on the edited sheet.
    pub fn shift_range(&self, range: Range) -> Result<RangeShift, ShiftError> {
        let (lo, hi) = match self.edit.axis {
            Axis::Rows => (range.start.row, range.end.row),
            Axis::Columns => (range.start.col, range.end.col),
        };
        let Some((new_lo, new_hi)) = self.edit.map_span(lo, hi, self.version)? else {
            return Ok(RangeShift::Deleted);
        };
        if (new_lo, new_hi) == (lo, hi) {
            return Ok(RangeShift::Unchanged);
        }
        let moved = match self.edit.axis {
            Axis::Rows => Range::from_bounds(new_lo, range.start.col, new_hi, range.end.col),
            Axis::Columns => Range::from_bounds(range.start.row, new_lo, range.end.row, new_hi),
        };
        Ok(RangeShift::Moved(moved))
    }

    /// Map a single cell on the edited sheet; `None` when the cell is removed.
    pub fn shift_cell(&self, cell: CellRef) -> Result<Option<CellRef>, ShiftError> {
        let index = match self.edit.axis {
            Axis::Rows => cell.row,
            Axis::Columns => cell.col,
        };
        Ok(match self.edit.map_index(index, self.version)? {
            IndexShift::Deleted => None,
            IndexShift::Kept(v) => Some(match self.edit.axis {
                Axis::Rows => CellRef::new(v, cell.col),
                Axis::Columns => CellRef::new(cell.row, v),
            }),
        })
    }

    fn resolve_sheet(&self, name: &str) -> Option<usize> {
        self.sheet_names
            .iter()
            .position(|sheet| sheet_name_eq_case_insensitive(sheet, name))
    }

    fn applies(&self, sheet: Option<&SheetRef>, ctx_sheet: Option<usize>) -> bool {
        match sheet {
            None => ctx_sheet == Some(self.edit.sheet),
            Some(SheetRef::Sheet(name)) => self.resolve_sheet(name) == Some(self.edit.sheet),
            Some(SheetRef::Span { first, last }) => {
                let (Some(a), Some(b)) = (self.resolve_sheet(first), self.resolve_sheet(last)) else {
                    return false;
                };
                let (lo, hi) = (min(a, b), max(a, b));
                (lo..=hi).contains(&self.edit.sheet)
            }
        }
    }

    fn shift_token(&self, token: &Token, ctx_sheet: Option<usize>) -> Result<(Token, bool), ShiftError> {
        if !token.is_reference() || !self.applies(token.sheet(), ctx_sheet) {
            return Ok((token.clone(), false));
        }
        match (token, self.edit.axis) {
            (Token::Ref(r), axis) => self.shift_ref(r, axis),
            (Token::Area(a), axis) => self.shift_area(a, axis),
            (Token::Rows(l), Axis::Rows) => self.shift_line(l, Token::Rows),
            (Token::Cols(l), Axis::Columns) => self.shift_line(l, Token::Cols),
            _ => Ok((token.clone(), false)),
        }
    }

    fn shift_ref(&self, r: &RefToken, axis: Axis) -> Result<(Token, bool), ShiftError> {
        let coord = match axis {
            Axis::Rows => r.row,
            Axis::Columns => r.col,
        };
        let new_index = match self.edit.map_index(coord.index, self.version)? {
            IndexShift::Deleted => return Ok((Token::ref_error(), true)),
            IndexShift::Kept(v) => v,
        };
        if new_index == coord.index {
            return Ok((Token::Ref(r.clone()), false));
        }
        let mut out = r.clone();
        match axis {
            Axis::Rows => out.row = coord.with_index(new_index),
            Axis::Columns => out.col = coord.with_index(new_index),
        }
        Ok((Token::Ref(out), true))
    }

    fn shift_area(&self, a: &AreaToken, axis: Axis) -> Result<(Token, bool), ShiftError> {
        let (c1, c2) = match axis {
            Axis::Rows => (a.first.row, a.last.row),
            Axis::Columns => (a.first.col, a.last.col),
        };
        let Some((lo, hi)) = self.edit.map_span(c1.index, c2.index, self.version)? else {
            return Ok((Token::ref_error(), true));
        };
        if (lo, hi) == (min(c1.index, c2.index), max(c1.index, c2.index)) {
            return Ok((Token::Area(a.clone()), false));
        }
        let set = |corner: Corner, coord: Coord| match axis {
            Axis::Rows => Corner {
                row: coord,
                col: corner.col,
            },
            Axis::Columns => Corner {
                row: corner.row,
                col: coord,
            },
        };
        let out = AreaToken {
            sheet: a.sheet.clone(),
            first: set(a.first, c1.with_index(lo)),
            last: set(a.last, c2.with_index(hi)),
        };
        Ok((Token::Area(out), true))
    }

    fn shift_line(
        &self,
        l: &LineRangeToken,
        wrap: fn(LineRangeToken) -> Token,
    ) -> Result<(Token, bool), ShiftError> {
        let Some((lo, hi)) = self.edit.map_span(l.first.index, l.last.index, self.version)? else {
            return Ok((Token::ref_error(), true));
        };
        if (lo, hi) == (min(l.first.index, l.last.index), max(l.first.index, l.last.index)) {
            return Ok((wrap(l.clone()), false));
        }
        Ok((
            wrap(LineRangeToken {
                sheet: l.sheet.clone(),
                first: l.first.with_index(lo),
                last: l.last.with_index(hi),
            }),
            true,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["Sheet1".into(), "Sheet2".into(), "Sheet3".into()]
    }

    fn shift(formula: &str, edit: ShiftEdit, ctx: usize) -> String {
        let names = names();
        let shifter = FormulaShifter::new(edit, &names, SpreadsheetVersion::Excel2007).unwrap();
        let f = Formula::parse(formula).unwrap();
        match shifter.shift_formula(&f, Some(ctx)).unwrap() {
            Some(out) => out.to_string(),
            None => f.to_string(),
        }
    }

    #[test]
    fn move_band_shifts_only_refs_inside_it() {
        // Rows 5..=10 (1-based 6..11) move down 3.
        let edit = ShiftEdit::move_rows(0, 5, 10, 3);
        assert_eq!(shift("A5+A6+$B$11+A12+A20", edit, 0), "A5+A9+$B$14+#REF!+A20");
    }

    #[test]
    fn inclusive_band_start() {
        let edit = ShiftEdit::insert_rows(0, 4, 2);
        assert_eq!(shift("A4+A5", edit, 0), "A4+A7");
    }

    #[test]
    fn delete_truncates_areas_and_invalidates_refs() {
        let edit = ShiftEdit::delete_rows(0, 2, 4);
        assert_eq!(shift("SUM(A1:A10)+A3+A8+SUM(B3:B5)", edit, 0), "SUM(A1:A7)+#REF!+A5+#REF!");
    }

    #[test]
    fn insert_inside_area_expands_it() {
        let edit = ShiftEdit::insert_columns(0, 2, 1);
        assert_eq!(shift("SUM(A1:D1)+C:D+$E$2", edit, 0), "SUM(A1:E1)+D:E+$F$2");
    }

    #[test]
    fn other_sheets_are_untouched_unless_3d_span_covers_edit() {
        let edit = ShiftEdit::insert_rows(1, 0, 1);
        assert_eq!(
            shift("A1+Sheet2!A1+Sheet3!A1+SUM(Sheet1:Sheet3!B2)", edit, 0),
            "A1+Sheet2!A2+Sheet3!A1+SUM(Sheet1:Sheet3!B3)"
        );
    }

    #[test]
    fn overflow_is_an_error_and_formula_is_untouched() {
        let names = names();
        let edit = ShiftEdit::insert_rows(0, 10, 5);
        let shifter = FormulaShifter::new(edit, &names, SpreadsheetVersion::Excel97).unwrap();
        let f = Formula::parse("A1+A65535").unwrap();
        let err = shifter.shift_formula(&f, Some(0)).unwrap_err();
        assert!(matches!(err, ShiftError::ReferenceShiftOverflow { index: 65534, .. }));
    }

    #[test]
    fn invalid_edits_are_rejected_up_front() {
        let names = names();
        let version = SpreadsheetVersion::Excel2007;
        assert!(matches!(
            FormulaShifter::new(ShiftEdit::move_rows(0, 0, 3, -1), &names, version),
            Err(ShiftError::ReferenceShiftOverflow { .. })
        ));
        assert!(matches!(
            FormulaShifter::new(ShiftEdit::insert_rows(7, 0, 1), &names, version),
            Err(ShiftError::UnknownSheet(7))
        ));
        assert!(matches!(
            FormulaShifter::new(ShiftEdit::delete_rows(0, 5, 2), &names, version),
            Err(ShiftError::InvalidBand { .. })
        ));
    }

    #[test]
    fn span_impact_classification() {
        let edit = ShiftEdit::move_rows(0, 5, 10, 3);
        assert_eq!(edit.span_impact(0, 4), SpanImpact::Unaffected);
        assert_eq!(edit.span_impact(6, 8), SpanImpact::Shifted);
        assert_eq!(edit.span_impact(11, 13), SpanImpact::Deleted);
        assert_eq!(edit.span_impact(9, 12), SpanImpact::Split);
        assert_eq!(edit.span_impact(14, 20), SpanImpact::Unaffected);

        let insert = ShiftEdit::insert_rows(0, 5, 1);
        assert_eq!(insert.span_impact(3, 4), SpanImpact::Unaffected);
        assert_eq!(insert.span_impact(4, 5), SpanImpact::Split);
        assert_eq!(insert.span_impact(5, 9), SpanImpact::Shifted);
    }

    #[test]
    fn descriptor_view() {
        let d = ShiftEdit::delete_columns(2, 3, 5).descriptor();
        assert_eq!(d.kind, EditKind::ColumnInsertDelete);
        assert_eq!((d.first_index, d.last_index, d.delta), (3, 5, -3));

        let d = ShiftEdit::insert_rows(0, 7, 2).descriptor();
        assert_eq!(d.kind, EditKind::RowInsertDelete);
        assert_eq!((d.first_index, d.last_index, d.delta), (7, 8, 2));
    }
}
