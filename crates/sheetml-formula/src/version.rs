use serde::{Deserialize, Serialize};

/// Grid limits of a spreadsheet file format.
///
/// Every structural edit is validated against these limits: a reference or row
/// that would move past the last row/column is an overflow, never a wrap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadsheetVersion {
    /// BIFF8 (`.xls`) limits: 65,536 rows × 256 columns.
    Excel97,
    /// SpreadsheetML (`.xlsx`) limits: 1,048,576 rows × 16,384 columns.
    #[default]
    Excel2007,
}

impl SpreadsheetVersion {
    pub const fn max_rows(self) -> u32 {
        match self {
            SpreadsheetVersion::Excel97 => 65_536,
            SpreadsheetVersion::Excel2007 => 1_048_576,
        }
    }

    pub const fn max_cols(self) -> u32 {
        match self {
            SpreadsheetVersion::Excel97 => 256,
            SpreadsheetVersion::Excel2007 => 16_384,
        }
    }

    /// 0-based index of the last row.
    pub const fn last_row_index(self) -> u32 {
        self.max_rows() - 1
    }

    /// 0-based index of the last column.
    pub const fn last_col_index(self) -> u32 {
        self.max_cols() - 1
    }
}
