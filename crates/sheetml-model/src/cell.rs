use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sheetml_formula::{CellRef, Formula, Range};

/// Identifier for a worksheet. Stable across renames and reorders.
pub type WorksheetId = u32;

/// Address of a cell within a workbook.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    /// Worksheet identifier.
    pub sheet_id: WorksheetId,
    /// Cell coordinates within the worksheet.
    pub cell: CellRef,
}

impl CellId {
    pub const fn new(sheet_id: WorksheetId, row: u32, col: u32) -> Self {
        Self {
            sheet_id,
            cell: CellRef::new(row, col),
        }
    }
}

/// Spreadsheet error values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorValue {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    GettingData,
    Spill,
    Calc,
}

impl ErrorValue {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorValue::Null => "#NULL!",
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Num => "#NUM!",
            ErrorValue::NA => "#N/A",
            ErrorValue::GettingData => "#GETTING_DATA",
            ErrorValue::Spill => "#SPILL!",
            ErrorValue::Calc => "#CALC!",
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorValue {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            ErrorValue::Null,
            ErrorValue::Div0,
            ErrorValue::Value,
            ErrorValue::Ref,
            ErrorValue::Name,
            ErrorValue::Num,
            ErrorValue::NA,
            ErrorValue::GettingData,
            ErrorValue::Spill,
            ErrorValue::Calc,
        ];
        all.into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Last computed result of a formula, as stored in the file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    #[default]
    None,
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorValue),
}

/// How a formula cell carries its formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaBody {
    /// An ordinary formula stored on this cell.
    Normal { formula: Formula },
    /// Anchor of a shared-formula group: holds the text for the whole `range`.
    SharedMaster {
        si: u32,
        range: Range,
        formula: Formula,
    },
    /// Member of shared-formula group `si`; its formula is derived from the master.
    SharedMember { si: u32 },
    /// Anchor of a multi-cell array formula covering `range`.
    ArrayMaster { range: Range, formula: Formula },
}

impl FormulaBody {
    /// The formula text stored on this cell, if any (members store none).
    pub fn stored_formula(&self) -> Option<&Formula> {
        match self {
            FormulaBody::Normal { formula }
            | FormulaBody::SharedMaster { formula, .. }
            | FormulaBody::ArrayMaster { formula, .. } => Some(formula),
            FormulaBody::SharedMember { .. } => None,
        }
    }

    pub fn stored_formula_mut(&mut self) -> Option<&mut Formula> {
        match self {
            FormulaBody::Normal { formula }
            | FormulaBody::SharedMaster { formula, .. }
            | FormulaBody::ArrayMaster { formula, .. } => Some(formula),
            FormulaBody::SharedMember { .. } => None,
        }
    }

    pub fn shared_index(&self) -> Option<u32> {
        match self {
            FormulaBody::SharedMaster { si, .. } | FormulaBody::SharedMember { si } => Some(*si),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaCell {
    pub body: FormulaBody,
    #[serde(default)]
    pub cached: CachedValue,
}

impl FormulaCell {
    pub fn normal(formula: Formula) -> Self {
        Self {
            body: FormulaBody::Normal { formula },
            cached: CachedValue::None,
        }
    }
}

/// The value slot of a cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellContent {
    #[default]
    Blank,
    Number(f64),
    /// Index into the workbook's shared string table.
    SharedString(u32),
    Boolean(bool),
    Error(ErrorValue),
    Formula(FormulaCell),
}

impl CellContent {
    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }

    pub fn formula_cell(&self) -> Option<&FormulaCell> {
        match self {
            CellContent::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub fn formula_cell_mut(&mut self) -> Option<&mut FormulaCell> {
        match self {
            CellContent::Formula(f) => Some(f),
            _ => None,
        }
    }

    /// The value left behind when a formula is removed from a cell.
    pub fn from_cached(cached: &CachedValue) -> Option<Self> {
        match cached {
            CachedValue::None | CachedValue::String(_) => None,
            CachedValue::Number(n) => Some(CellContent::Number(*n)),
            CachedValue::Boolean(b) => Some(CellContent::Boolean(*b)),
            CachedValue::Error(e) => Some(CellContent::Error(*e)),
        }
    }
}

/// A stored cell: content plus an index into the workbook's cell formats.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub content: CellContent,
    #[serde(default)]
    pub style: u32,
}

impl Cell {
    pub fn new(content: CellContent) -> Self {
        Self { content, style: 0 }
    }

    /// A cell with no content and the default style carries nothing worth storing.
    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Blank) && self.style == 0
    }
}
