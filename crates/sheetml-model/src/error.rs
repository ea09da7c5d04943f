use sheetml_formula::{CellRef, LexError, Range, ShiftError};
use thiserror::Error;

use crate::names::DefinedNameValidationError;
use crate::sheet_name::SheetNameError;

/// Errors raised by workbook mutations.
///
/// Every mutating operation validates before it commits, so a returned error
/// means the workbook was left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: NameKind, name: String },
    #[error("{what} index {index} is out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("edit would split the array formula at {0}")]
    ArrayFormulaConflict(Range),
    #[error("shared formula group {si} has no master cell (member {cell})")]
    BrokenSharedFormulaGroup { si: u32, cell: CellRef },
    #[error(transparent)]
    ReferenceShiftOverflow(#[from] ShiftError),
    #[error("merged region {new} overlaps existing region {existing}")]
    MergedRegionOverlap { existing: Range, new: Range },
    #[error("edit would split the merged region {0}")]
    MergedRegionConflict(Range),
    #[error("sheet not found: {0}")]
    SheetNotFound(String),
    #[error(transparent)]
    InvalidSheetName(#[from] SheetNameError),
    #[error(transparent)]
    InvalidDefinedName(#[from] DefinedNameValidationError),
    #[error("invalid text range {start}..{end} for text of length {len}")]
    InvalidTextRange { start: usize, end: usize, len: usize },
    #[error("invalid formula: {0}")]
    InvalidFormula(#[from] LexError),
}

/// What kind of name collided in [`ModelError::DuplicateName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Sheet,
    DefinedName,
}

impl core::fmt::Display for NameKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NameKind::Sheet => f.write_str("sheet"),
            NameKind::DefinedName => f.write_str("defined"),
        }
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
