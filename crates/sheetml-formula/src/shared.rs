//! Shared-formula expansion.
//!
//! A shared formula group stores its text once, on the anchor (master) cell.
//! Every other member evaluates the master formula translated by its offset
//! from the anchor: relative coordinates move, `$`-absolute ones stay put.

use crate::token::{AreaToken, Coord, Corner, LineRangeToken, RefToken, Token};
use crate::{CellRef, Formula, SpreadsheetVersion};

/// Translates a group's master formula to each member cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedFormulaExpander {
    version: SpreadsheetVersion,
}

impl SharedFormulaExpander {
    pub fn new(version: SpreadsheetVersion) -> Self {
        Self { version }
    }

    /// The formula `target` evaluates when it belongs to the group anchored at `anchor`.
    ///
    /// Relative references that would land outside the grid become `#REF!`.
    pub fn expand(&self, master: &Formula, anchor: CellRef, target: CellRef) -> Formula {
        let dr = target.row as i64 - anchor.row as i64;
        let dc = target.col as i64 - anchor.col as i64;
        self.translate(master, dr, dc)
    }

    /// Translate every relative coordinate of `formula` by `(dr, dc)`.
    pub fn translate(&self, formula: &Formula, dr: i64, dc: i64) -> Formula {
        if dr == 0 && dc == 0 {
            return formula.clone();
        }
        let tokens = formula
            .tokens()
            .iter()
            .map(|token| self.translate_token(token, dr, dc))
            .collect();
        Formula::new(tokens)
    }

    fn translate_token(&self, token: &Token, dr: i64, dc: i64) -> Token {
        let max_row = self.version.last_row_index();
        let max_col = self.version.last_col_index();
        let row = |c: Coord| offset(c, dr, max_row);
        let col = |c: Coord| offset(c, dc, max_col);

        match token {
            Token::Ref(r) => {
                let (Some(new_row), Some(new_col)) = (row(r.row), col(r.col)) else {
                    return Token::ref_error();
                };
                Token::Ref(RefToken {
                    sheet: r.sheet.clone(),
                    row: new_row,
                    col: new_col,
                })
            }
            Token::Area(a) => {
                let corner = |c: Corner| Some(Corner {
                    row: row(c.row)?,
                    col: col(c.col)?,
                });
                let (Some(first), Some(last)) = (corner(a.first), corner(a.last)) else {
                    return Token::ref_error();
                };
                Token::Area(AreaToken {
                    sheet: a.sheet.clone(),
                    first,
                    last,
                })
            }
            Token::Rows(l) => match (row(l.first), row(l.last)) {
                (Some(first), Some(last)) => Token::Rows(LineRangeToken {
                    sheet: l.sheet.clone(),
                    first,
                    last,
                }),
                _ => Token::ref_error(),
            },
            Token::Cols(l) => match (col(l.first), col(l.last)) {
                (Some(first), Some(last)) => Token::Cols(LineRangeToken {
                    sheet: l.sheet.clone(),
                    first,
                    last,
                }),
                _ => Token::ref_error(),
            },
            other => other.clone(),
        }
    }
}

fn offset(coord: Coord, delta: i64, max: u32) -> Option<Coord> {
    if coord.abs {
        return Some(coord);
    }
    let moved = coord.index as i64 + delta;
    if moved < 0 || moved > max as i64 {
        return None;
    }
    Some(coord.with_index(moved as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(master: &str, anchor: &str, target: &str) -> String {
        let expander = SharedFormulaExpander::default();
        let master = Formula::parse(master).unwrap();
        expander
            .expand(
                &master,
                CellRef::from_a1(anchor).unwrap(),
                CellRef::from_a1(target).unwrap(),
            )
            .to_string()
    }

    #[test]
    fn relative_refs_follow_the_member() {
        assert_eq!(expand("A1+B1", "C1", "D2"), "B2+C2");
        assert_eq!(expand("A1+B1", "C1", "C1"), "A1+B1");
    }

    #[test]
    fn absolute_parts_stay_fixed() {
        assert_eq!(expand("$A1+A$1+$A$1", "B1", "C3"), "$A3+B$1+$A$1");
        assert_eq!(expand("SUM($A$1:A1)", "B1", "B4"), "SUM($A$1:A4)");
    }

    #[test]
    fn refs_pushed_off_the_grid_become_ref_errors() {
        let expander = SharedFormulaExpander::default();
        let f = Formula::parse("A1+B2").unwrap();
        assert_eq!(expander.translate(&f, -1, 0).to_string(), "#REF!+B1");
    }

    #[test]
    fn whole_line_refs_move_on_their_axis() {
        assert_eq!(expand("SUM(1:2)+SUM(A:A)", "A1", "B3"), "SUM(3:4)+SUM(B:B)");
    }
}
