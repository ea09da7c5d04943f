use serde::{Deserialize, Serialize};
use sheetml_formula::SpreadsheetVersion;

/// What happens to the calculation chain when rows or columns move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcChainPolicy {
    /// Keep the chain and remap its entries through each edit.
    #[default]
    Maintain,
    /// Discard the whole chain on the first structural edit; consumers then
    /// fall back to a full recalculation.
    DropOnStructuralEdit,
}

/// Workbook-wide behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookOptions {
    pub version: SpreadsheetVersion,
    /// Intern records created through `create_cell_style` instead of always
    /// appending a fresh one.
    ///
    /// Off by default so files written by other tools, which carry duplicate
    /// `cellXfs` records, keep their indices.
    pub dedupe_cell_styles: bool,
    pub calc_chain: CalcChainPolicy,
}
