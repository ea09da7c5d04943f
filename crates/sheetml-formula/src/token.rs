use core::fmt;

use serde::{Deserialize, Serialize};

use crate::address::col_to_name;
use crate::sheet_name::{quote_sheet_name, sheet_name_needs_quotes};

/// One coordinate (row or column) of a reference, with its `$` marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// 0-based row or column index.
    pub index: u32,
    /// `true` when written with a `$` prefix.
    pub abs: bool,
}

impl Coord {
    pub const fn relative(index: u32) -> Self {
        Self { index, abs: false }
    }

    pub const fn absolute(index: u32) -> Self {
        Self { index, abs: true }
    }

    #[must_use]
    pub const fn with_index(self, index: u32) -> Self {
        Self {
            index,
            abs: self.abs,
        }
    }
}

/// Sheet qualifier in front of a reference (`Sheet1!A1`, `Sheet1:Sheet3!A1`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetRef {
    Sheet(String),
    /// A 3D span across every sheet between `first` and `last` in tab order.
    Span { first: String, last: String },
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRef::Sheet(name) => f.write_str(&quote_sheet_name(name)),
            SheetRef::Span { first, last } => {
                if sheet_name_needs_quotes(first) || sheet_name_needs_quotes(last) {
                    write!(
                        f,
                        "'{}:{}'",
                        first.replace('\'', "''"),
                        last.replace('\'', "''")
                    )
                } else {
                    write!(f, "{first}:{last}")
                }
            }
        }
    }
}

/// A single-cell reference (`A1`, `$B$2`, `Sheet1!C3`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefToken {
    pub sheet: Option<SheetRef>,
    pub row: Coord,
    pub col: Coord,
}

/// One corner of an area reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Corner {
    pub row: Coord,
    pub col: Coord,
}

/// A rectangular area reference (`A1:B2`), corners kept in written order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaToken {
    pub sheet: Option<SheetRef>,
    pub first: Corner,
    pub last: Corner,
}

/// A whole-row (`3:5`) or whole-column (`A:C`) reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRangeToken {
    pub sheet: Option<SheetRef>,
    pub first: Coord,
    pub last: Coord,
}

/// A lexical unit of a formula.
///
/// Token streams are rendered back to text by concatenating each token's
/// [`Display`](fmt::Display) output, so whitespace is kept as its own token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Token {
    /// Numeric literal, kept verbatim (`1.50`, `2E3`).
    Number(String),
    /// String literal content without surrounding quotes.
    Text(String),
    Bool(bool),
    /// Error literal (`#REF!`, `#N/A`).
    Error(String),
    Operator(String),
    /// Function name; renders with its opening parenthesis.
    Function(String),
    OpenParen,
    CloseParen,
    /// Argument separator `,`.
    Separator,
    /// Array row separator `;`.
    RowSeparator,
    OpenBrace,
    CloseBrace,
    Whitespace(String),
    /// Defined name or other identifier.
    Name(String),
    Ref(RefToken),
    Area(AreaToken),
    Rows(LineRangeToken),
    Cols(LineRangeToken),
}

pub(crate) const REF_ERROR: &str = "#REF!";

impl Token {
    /// The `#REF!` error literal used for references whose cells no longer exist.
    pub fn ref_error() -> Self {
        Token::Error(REF_ERROR.to_string())
    }

    /// Returns true for tokens that point at cells.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Token::Ref(_) | Token::Area(_) | Token::Rows(_) | Token::Cols(_)
        )
    }

    /// Sheet qualifier of a reference token, if any.
    pub fn sheet(&self) -> Option<&SheetRef> {
        match self {
            Token::Ref(r) => r.sheet.as_ref(),
            Token::Area(a) => a.sheet.as_ref(),
            Token::Rows(l) | Token::Cols(l) => l.sheet.as_ref(),
            _ => None,
        }
    }

    /// Mutable sheet qualifier of a reference token.
    pub fn sheet_mut(&mut self) -> Option<&mut Option<SheetRef>> {
        match self {
            Token::Ref(r) => Some(&mut r.sheet),
            Token::Area(a) => Some(&mut a.sheet),
            Token::Rows(l) | Token::Cols(l) => Some(&mut l.sheet),
            _ => None,
        }
    }
}

fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: &Option<SheetRef>) -> fmt::Result {
    match sheet {
        Some(sheet) => write!(f, "{sheet}!"),
        None => Ok(()),
    }
}

fn dollar(abs: bool) -> &'static str {
    if abs {
        "$"
    } else {
        ""
    }
}

fn write_corner(f: &mut fmt::Formatter<'_>, row: Coord, col: Coord) -> fmt::Result {
    write!(
        f,
        "{}{}{}{}",
        dollar(col.abs),
        col_to_name(col.index),
        dollar(row.abs),
        row.index + 1
    )
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => f.write_str(n),
            Token::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Token::Bool(true) => f.write_str("TRUE"),
            Token::Bool(false) => f.write_str("FALSE"),
            Token::Error(e) => f.write_str(e),
            Token::Operator(op) => f.write_str(op),
            Token::Function(name) => write!(f, "{name}("),
            Token::OpenParen => f.write_str("("),
            Token::CloseParen => f.write_str(")"),
            Token::Separator => f.write_str(","),
            Token::RowSeparator => f.write_str(";"),
            Token::OpenBrace => f.write_str("{"),
            Token::CloseBrace => f.write_str("}"),
            Token::Whitespace(ws) => f.write_str(ws),
            Token::Name(name) => f.write_str(name),
            Token::Ref(r) => {
                write_sheet_prefix(f, &r.sheet)?;
                write_corner(f, r.row, r.col)
            }
            Token::Area(a) => {
                write_sheet_prefix(f, &a.sheet)?;
                write_corner(f, a.first.row, a.first.col)?;
                f.write_str(":")?;
                write_corner(f, a.last.row, a.last.col)
            }
            Token::Rows(l) => {
                write_sheet_prefix(f, &l.sheet)?;
                write!(
                    f,
                    "{}{}:{}{}",
                    dollar(l.first.abs),
                    l.first.index + 1,
                    dollar(l.last.abs),
                    l.last.index + 1
                )
            }
            Token::Cols(l) => {
                write_sheet_prefix(f, &l.sheet)?;
                write!(
                    f,
                    "{}{}:{}{}",
                    dollar(l.first.abs),
                    col_to_name(l.first.index),
                    dollar(l.last.abs),
                    col_to_name(l.last.index)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_reference_tokens() {
        let r = Token::Ref(RefToken {
            sheet: Some(SheetRef::Sheet("My Sheet".into())),
            row: Coord::absolute(0),
            col: Coord::relative(1),
        });
        assert_eq!(r.to_string(), "'My Sheet'!B$1");

        let area = Token::Area(AreaToken {
            sheet: Some(SheetRef::Span {
                first: "Jan".into(),
                last: "Mar".into(),
            }),
            first: Corner {
                row: Coord::relative(0),
                col: Coord::absolute(0),
            },
            last: Corner {
                row: Coord::relative(9),
                col: Coord::absolute(2),
            },
        });
        assert_eq!(area.to_string(), "Jan:Mar!$A1:$C10");

        let cols = Token::Cols(LineRangeToken {
            sheet: None,
            first: Coord::relative(0),
            last: Coord::absolute(27),
        });
        assert_eq!(cols.to_string(), "A:$AB");
    }

    #[test]
    fn renders_literals() {
        assert_eq!(Token::Text("say \"hi\"".into()).to_string(), "\"say \"\"hi\"\"\"");
        assert_eq!(Token::Function("SUM".into()).to_string(), "SUM(");
        assert_eq!(Token::ref_error().to_string(), "#REF!");
    }
}
