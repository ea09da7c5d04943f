use serde::{Deserialize, Serialize};
use sheetml_formula::{Axis, CellRef, FormulaShifter, Range, RangeShift, ShiftKind, SpanImpact};

use crate::error::{ModelError, Result};

/// The merged cell regions of a worksheet.
///
/// Regions never overlap each other, and never cut through a multi-cell array
/// formula: an array range is either entirely inside a merged region or
/// entirely outside it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRegions {
    regions: Vec<Range>,
}

impl MergedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Range> {
        self.regions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.regions.iter()
    }

    /// Index of the region containing `cell`.
    pub fn find_containing(&self, cell: CellRef) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(cell))
    }

    /// Add a region, validating it against existing regions and `arrays`.
    ///
    /// Nothing changes when an error is returned.
    pub fn add<'a>(&mut self, range: Range, arrays: impl IntoIterator<Item = &'a Range>) -> Result<usize> {
        if let Some(existing) = self.regions.iter().find(|r| r.intersects(&range)) {
            return Err(ModelError::MergedRegionOverlap {
                existing: *existing,
                new: range,
            });
        }
        for array in arrays {
            if !array.is_single_cell() && array.intersects(&range) && !range.contains_range(array) {
                return Err(ModelError::ArrayFormulaConflict(*array));
            }
        }
        self.regions.push(range);
        Ok(self.regions.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<Range> {
        if index >= self.regions.len() {
            return Err(ModelError::OutOfRange {
                what: "merged region",
                index,
                len: self.regions.len(),
            });
        }
        Ok(self.regions.remove(index))
    }

    /// Regions as they will be after the shifter's edit.
    ///
    /// Regions inside the edited band move with it. A region straddling an
    /// insert point grows, one straddling a deleted band shrinks to its
    /// surviving cells, and one straddling a moved band is a
    /// [`ModelError::MergedRegionConflict`]. Regions left with a single cell,
    /// or none, are dropped.
    pub(crate) fn plan_edit(&self, shifter: &FormulaShifter<'_>) -> Result<Vec<Range>> {
        let edit = shifter.edit();
        let mut out = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let (lo, hi) = axis_span(region, edit.axis);
            let impact = edit.span_impact(lo, hi);
            if impact == SpanImpact::Split && matches!(edit.kind, ShiftKind::Move { .. }) {
                return Err(ModelError::MergedRegionConflict(*region));
            }
            match shifter.shift_range(*region)? {
                RangeShift::Unchanged => out.push(*region),
                RangeShift::Moved(moved) if !moved.is_single_cell() => out.push(moved),
                RangeShift::Moved(_) | RangeShift::Deleted => {
                    log::warn!("merged region {region} removed by {:?}", edit.kind);
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn replace_all(&mut self, regions: Vec<Range>) {
        self.regions = regions;
    }
}

/// Rows or columns spanned by `range` along `axis`.
pub(crate) fn axis_span(range: &Range, axis: Axis) -> (u32, u32) {
    match axis {
        Axis::Rows => (range.start.row, range.end.row),
        Axis::Columns => (range.start.col, range.end.col),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetml_formula::{ShiftEdit, SpreadsheetVersion};

    fn r(a1: &str) -> Range {
        Range::from_a1(a1).unwrap()
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut regions = MergedRegions::new();
        regions.add(r("A1:B2"), []).unwrap();
        let err = regions.add(r("B2:C3"), []).unwrap_err();
        assert_eq!(
            err,
            ModelError::MergedRegionOverlap {
                existing: r("A1:B2"),
                new: r("B2:C3")
            }
        );
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn merge_may_contain_an_array_but_not_cut_it() {
        let arrays = [r("D4:E5")];
        let mut regions = MergedRegions::new();
        assert_eq!(
            regions.add(r("E5:F6"), &arrays),
            Err(ModelError::ArrayFormulaConflict(r("D4:E5")))
        );
        assert!(regions.is_empty());
        regions.add(r("C3:F6"), &arrays).unwrap();
    }

    #[test]
    fn edits_move_grow_shrink_or_reject_regions() {
        let sheets = vec!["Sheet1".to_string()];
        let version = SpreadsheetVersion::Excel2007;
        let mut regions = MergedRegions::new();
        regions.add(r("A2:B3"), []).unwrap();
        regions.add(r("D5:D9"), []).unwrap();

        let insert = FormulaShifter::new(ShiftEdit::insert_rows(0, 5, 2), &sheets, version).unwrap();
        assert_eq!(regions.plan_edit(&insert).unwrap(), vec![r("A2:B3"), r("D5:D11")]);

        let delete = FormulaShifter::new(ShiftEdit::delete_rows(0, 1, 2), &sheets, version).unwrap();
        assert_eq!(regions.plan_edit(&delete).unwrap(), vec![r("D3:D7")]);

        let shift = FormulaShifter::new(ShiftEdit::move_rows(0, 2, 3, 10), &sheets, version).unwrap();
        assert_eq!(
            regions.plan_edit(&shift),
            Err(ModelError::MergedRegionConflict(r("A2:B3")))
        );
    }
}
