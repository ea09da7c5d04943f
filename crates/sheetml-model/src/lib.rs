//! `sheetml-model` is the in-memory SpreadsheetML workbook model.
//!
//! It owns the deduplicated resource tables a workbook shares between its
//! cells (fonts, fills, borders, number formats, cell formats and the shared
//! string table) and keeps formulas, defined names, merged regions, array
//! formulas, conditional formatting, outline groups and the calculation chain
//! consistent when rows and columns are inserted, deleted or moved.
//!
//! Reading and writing the XML parts is left to the packaging layer; every
//! record here derives `serde` so it can cross IPC/JSON boundaries.

mod calc_chain;
mod cell;
pub mod conditional_formatting;
mod error;
mod intern;
mod merge;
mod names;
mod number_format;
mod options;
mod outline;
pub mod rich_text;
mod shared_strings;
mod sheet;
mod sheet_name;
mod style;
mod workbook;

pub use calc_chain::CalcChain;
pub use cell::{
    CachedValue, Cell, CellContent, CellId, ErrorValue, FormulaBody, FormulaCell, WorksheetId,
};
pub use conditional_formatting::{
    format_sqref, parse_sqref, CellIsOperator, CfRule, CfRuleKind, ConditionalFormatting,
};
pub use error::{ModelError, NameKind, Result};
pub use intern::InternTable;
pub use merge::MergedRegions;
pub use names::{
    is_builtin_name, validate_defined_name, DefinedName, DefinedNameScope,
    DefinedNameValidationError, EXCEL_DEFINED_NAME_MAX_LEN, XLNM_FILTER_DATABASE, XLNM_PREFIX,
    XLNM_PRINT_AREA, XLNM_PRINT_TITLES,
};
pub use number_format::{
    builtin_number_format, builtin_number_format_id, NumberFormats, FIRST_CUSTOM_NUMBER_FORMAT_ID,
};
pub use options::{CalcChainPolicy, WorkbookOptions};
pub use outline::{HiddenState, Outline, OutlineAxis, OutlineEntry, MAX_OUTLINE_LEVEL};
pub use rich_text::{FormatRun, RichText};
pub use shared_strings::SharedStringPool;
pub use sheet::{ColumnProperties, Row, Worksheet};
pub use sheet_name::{validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN};
pub use style::{
    Alignment, Border, BorderEdge, BorderSide, BorderStyle, CellFormat, Color, Fill, FillPattern,
    Font, HorizontalAlignment, Protection, Style, StyleRegistry, Underline, VerticalAlignment,
};
pub use workbook::Workbook;

pub use sheetml_formula::{
    CellRef, Formula, Range, ShiftEdit, ShiftError, ShiftKind, SpreadsheetVersion,
};
