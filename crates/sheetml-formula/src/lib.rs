//! Formula token streams for SpreadsheetML workbooks.
//!
//! This crate owns everything about formula *text*: A1 addressing, a lexer
//! that turns formula strings into [`Token`] streams, reference shifting for
//! structural edits ([`FormulaShifter`]) and shared-formula expansion
//! ([`SharedFormulaExpander`]). Formulas are never evaluated here.

mod address;
mod formula;
mod lexer;
mod shared;
mod sheet_name;
mod shift;
mod token;
mod version;

pub use address::{col_to_name, name_to_col, A1ParseError, CellRef, Range, RangeParseError};
pub use formula::Formula;
pub use lexer::{tokenize, LexError};
pub use shared::SharedFormulaExpander;
pub use sheet_name::{
    quote_sheet_name, sheet_name_casefold, sheet_name_eq_case_insensitive, sheet_name_needs_quotes,
};
pub use shift::{
    Axis, EditDescriptor, EditKind, FormulaShifter, IndexShift, RangeShift, ShiftEdit, ShiftError,
    ShiftKind, SpanImpact,
};
pub use token::{AreaToken, Coord, Corner, LineRangeToken, RefToken, SheetRef, Token};
pub use version::SpreadsheetVersion;
