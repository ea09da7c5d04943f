use core::fmt;

/// Maximum sheet name length in characters.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Reasons a sheet name is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetNameError {
    Empty,
    TooLong { len: usize, max: usize },
    InvalidCharacter(char),
    /// Names may not begin or end with `'`.
    EdgeApostrophe,
}

impl fmt::Display for SheetNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetNameError::Empty => f.write_str("sheet name cannot be empty"),
            SheetNameError::TooLong { len, max } => {
                write!(f, "sheet name is too long ({len} > {max})")
            }
            SheetNameError::InvalidCharacter(ch) => {
                write!(f, "sheet name cannot contain '{ch}'")
            }
            SheetNameError::EdgeApostrophe => {
                f.write_str("sheet name cannot begin or end with an apostrophe")
            }
        }
    }
}

impl std::error::Error for SheetNameError {}

/// Validate a sheet name.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.is_empty() {
        return Err(SheetNameError::Empty);
    }
    let len = name.chars().count();
    if len > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong {
            len,
            max: EXCEL_MAX_SHEET_NAME_LEN,
        });
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_CHARS.contains(ch)) {
        return Err(SheetNameError::InvalidCharacter(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::EdgeApostrophe);
    }
    Ok(())
}
