use serde::{Deserialize, Serialize};
use sheetml_formula::Formula;
use thiserror::Error;

use crate::cell::WorksheetId;

/// Longest defined name accepted, in characters.
pub const EXCEL_DEFINED_NAME_MAX_LEN: usize = 255;

/// Prefix of names reserved by the file format.
pub const XLNM_PREFIX: &str = "_xlnm.";
pub const XLNM_PRINT_AREA: &str = "_xlnm.Print_Area";
pub const XLNM_PRINT_TITLES: &str = "_xlnm.Print_Titles";
/// Range an autofilter works on.
pub const XLNM_FILTER_DATABASE: &str = "_xlnm._FilterDatabase";

/// Where a defined name is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "worksheet_id", rename_all = "snake_case")]
pub enum DefinedNameScope {
    Workbook,
    Sheet(WorksheetId),
}

/// A named range, constant or formula (`<definedName>`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub scope: DefinedNameScope,
    /// Stored without a leading `=`.
    pub refers_to: Formula,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl DefinedName {
    /// Whether this is a reserved `_xlnm.` name.
    pub fn is_builtin(&self) -> bool {
        is_builtin_name(&self.name)
    }
}

pub fn is_builtin_name(name: &str) -> bool {
    name.get(..XLNM_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(XLNM_PREFIX))
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DefinedNameValidationError {
    #[error("defined name is empty")]
    Empty,
    #[error("defined name has {len} characters, at most {max} are allowed")]
    TooLong { len: usize, max: usize },
    #[error("defined name cannot start with '{0}'")]
    InvalidStartCharacter(char),
    #[error("defined name contains '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
    #[error("defined name reads as a cell reference")]
    LooksLikeCellReference,
    /// Reserved `_xlnm.` names only exist at sheet scope.
    #[error("built-in _xlnm names must be scoped to a sheet")]
    BuiltinNeedsSheetScope,
}

// `AB12`: one to three letters followed by digits.
fn reads_as_a1(name: &str) -> bool {
    let digits = name.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let letters = name.len() - digits.len();
    (1..=3).contains(&letters) && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// `R`, `C`, `R2`, `C7`, `R1C1`, `RC3`, in any case.
fn reads_as_r1c1(name: &str) -> bool {
    let strip_axis = |s: &str, axis: char| -> Option<usize> {
        let rest = s.strip_prefix(axis).or_else(|| s.strip_prefix(axis.to_ascii_lowercase()))?;
        Some(s.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len())
    };
    let row = strip_axis(name, 'R').unwrap_or(0);
    let rest = &name[row..];
    let col = strip_axis(rest, 'C').unwrap_or(0);
    (row > 0 || col > 0) && row + col == name.len()
}

/// Check a defined name against the file format's naming rules.
///
/// Surrounding whitespace is ignored. The first character must be a letter,
/// `_` or `\`, the rest letters, digits, `_` or `.`, and the name may not be
/// readable as an A1 or R1C1 reference.
pub fn validate_defined_name(name: &str) -> Result<(), DefinedNameValidationError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 {
        return Err(DefinedNameValidationError::Empty);
    }
    if len > EXCEL_DEFINED_NAME_MAX_LEN {
        return Err(DefinedNameValidationError::TooLong {
            len,
            max: EXCEL_DEFINED_NAME_MAX_LEN,
        });
    }
    if reads_as_a1(name) || reads_as_r1c1(name) {
        return Err(DefinedNameValidationError::LooksLikeCellReference);
    }

    for (index, ch) in name.chars().enumerate() {
        let allowed = match index {
            0 => ch.is_alphabetic() || matches!(ch, '_' | '\\'),
            _ => ch.is_alphabetic() || ch.is_ascii_digit() || matches!(ch, '_' | '.'),
        };
        if !allowed && index == 0 {
            return Err(DefinedNameValidationError::InvalidStartCharacter(ch));
        }
        if !allowed {
            return Err(DefinedNameValidationError::InvalidCharacter { ch, index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_name_rules() {
        assert_eq!(validate_defined_name("SalesTotal"), Ok(()));
        assert_eq!(validate_defined_name(XLNM_PRINT_AREA), Ok(()));
        assert_eq!(validate_defined_name(""), Err(DefinedNameValidationError::Empty));
        assert_eq!(
            validate_defined_name("AB12"),
            Err(DefinedNameValidationError::LooksLikeCellReference)
        );
        assert_eq!(
            validate_defined_name("r2c3"),
            Err(DefinedNameValidationError::LooksLikeCellReference)
        );
        assert_eq!(
            validate_defined_name("1st"),
            Err(DefinedNameValidationError::InvalidStartCharacter('1'))
        );
        assert_eq!(
            validate_defined_name("a b"),
            Err(DefinedNameValidationError::InvalidCharacter { ch: ' ', index: 1 })
        );
    }

    #[test]
    fn builtin_names_are_recognised_case_insensitively() {
        assert!(is_builtin_name("_XLNM.print_area"));
        assert!(!is_builtin_name("xlnm"));
    }
}
