//! Minimal A1 lexer for the tokenization boundary.
//!
//! Turns formula text into the [`Token`] stream the rest of the crate rewrites.
//! It recognizes literals, operators, function calls, names and every A1
//! reference shape (cells, areas, whole rows/columns, sheet and 3D prefixes).
//! It does not build a syntax tree and does not check arity or operator placement.

use thiserror::Error;

use crate::address::name_to_col;
use crate::token::{AreaToken, Coord, Corner, LineRangeToken, RefToken, SheetRef, Token};
use crate::SpreadsheetVersion;

const ERROR_LITERALS: &[&str] = &[
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
    "#SPILL!",
    "#CALC!",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("unterminated quoted sheet name starting at offset {0}")]
    UnterminatedSheetName(usize),
    #[error("expected a reference after sheet prefix at offset {0}")]
    ExpectedReference(usize),
    #[error("unknown error literal at offset {0}")]
    UnknownErrorLiteral(usize),
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
}

/// Tokenize formula text (with or without a leading `=`).
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let body = input.trim_start();
    let body = body.strip_prefix('=').unwrap_or(body);
    Lexer::new(body).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    out: Vec<Token>,
}

/// Parsed form of a bare reference word such as `$A$1`, `B`, or `12`.
#[derive(Clone, Copy)]
enum RefPart {
    Cell(Corner),
    Col(Coord),
    Row(Coord),
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '$' | '\\')
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek() {
            match ch {
                c if c.is_whitespace() => {
                    let start = self.pos;
                    while self.peek().is_some_and(char::is_whitespace) {
                        self.pos += 1;
                    }
                    let ws: String = self.chars[start..self.pos].iter().collect();
                    self.out.push(Token::Whitespace(ws));
                }
                '"' => self.lex_string()?,
                '\'' => self.lex_quoted_sheet()?,
                '#' => self.lex_error_literal()?,
                '(' => self.single(Token::OpenParen),
                ')' => self.single(Token::CloseParen),
                ',' => self.single(Token::Separator),
                ';' => self.single(Token::RowSeparator),
                '{' => self.single(Token::OpenBrace),
                '}' => self.single(Token::CloseBrace),
                '<' | '>' => {
                    let next = self.peek_at(1);
                    let op = match (ch, next) {
                        ('<', Some('>')) => "<>",
                        ('<', Some('=')) => "<=",
                        ('>', Some('=')) => ">=",
                        ('<', _) => "<",
                        _ => ">",
                    };
                    self.pos += op.len();
                    self.out.push(Token::Operator(op.to_string()));
                }
                '+' | '-' | '*' | '/' | '^' | '&' | '=' | '%' | ':' | '@' => {
                    self.single(Token::Operator(ch.to_string()))
                }
                c if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) => {
                    self.lex_number_or_rows()?
                }
                c if is_word_char(c) => self.lex_word()?,
                other => {
                    return Err(LexError::UnexpectedChar {
                        ch: other,
                        offset: self.pos,
                    })
                }
            }
        }
        Ok(self.out)
    }

    fn single(&mut self, token: Token) {
        self.pos += 1;
        self.out.push(token);
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString(start)),
                Some('"') if self.peek_at(1) == Some('"') => {
                    text.push('"');
                    self.pos += 2;
                }
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some(ch) => {
                    text.push(ch);
                    self.pos += 1;
                }
            }
        }
        self.out.push(Token::Text(text));
        Ok(())
    }

    fn lex_error_literal(&mut self) -> Result<(), LexError> {
        let rest: String = self.chars[self.pos..].iter().collect();
        let upper = rest.to_ascii_uppercase();
        let Some(literal) = ERROR_LITERALS.iter().find(|lit| upper.starts_with(**lit)) else {
            return Err(LexError::UnknownErrorLiteral(self.pos));
        };
        self.pos += literal.chars().count();
        self.out.push(Token::Error((*literal).to_string()));
        Ok(())
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn lex_quoted_sheet(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedSheetName(start)),
                Some('\'') if self.peek_at(1) == Some('\'') => {
                    name.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                Some(ch) => {
                    name.push(ch);
                    self.pos += 1;
                }
            }
        }
        if self.peek() != Some('!') {
            return Err(LexError::ExpectedReference(self.pos));
        }
        self.pos += 1;
        let sheet = match name.split_once(':') {
            Some((first, last)) => SheetRef::Span {
                first: first.to_string(),
                last: last.to_string(),
            },
            None => SheetRef::Sheet(name),
        };
        self.lex_reference_body(Some(sheet))
    }

    fn lex_number_or_rows(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        if self.try_reference(None)? {
            return Ok(());
        }
        self.pos = start;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.out.push(Token::Number(text));
        Ok(())
    }

    fn lex_word(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let word = self.read_word();

        if self.peek() == Some('(') {
            self.pos += 1;
            self.out.push(Token::Function(word));
            return Ok(());
        }

        if self.peek() == Some('!') {
            self.pos += 1;
            return self.lex_reference_body(Some(SheetRef::Sheet(word)));
        }

        // `Sheet1:Sheet3!A1` (unquoted 3D prefix).
        if self.peek() == Some(':') {
            let save = self.pos;
            self.pos += 1;
            let second = self.read_word();
            if !second.is_empty() && self.peek() == Some('!') {
                self.pos += 1;
                return self.lex_reference_body(Some(SheetRef::Span {
                    first: word,
                    last: second,
                }));
            }
            self.pos = save;
        }

        self.pos = start;
        if self.try_reference(None)? {
            return Ok(());
        }

        self.pos = start;
        let word = self.read_word();
        if word.eq_ignore_ascii_case("TRUE") {
            self.out.push(Token::Bool(true));
        } else if word.eq_ignore_ascii_case("FALSE") {
            self.out.push(Token::Bool(false));
        } else {
            self.out.push(Token::Name(word));
        }
        Ok(())
    }

    fn lex_reference_body(&mut self, sheet: Option<SheetRef>) -> Result<(), LexError> {
        let start = self.pos;
        if self.try_reference(sheet)? {
            return Ok(());
        }
        // `Sheet1!#REF!` degrades to a plain error literal.
        if self.peek() == Some('#') {
            return self.lex_error_literal();
        }
        Err(LexError::ExpectedReference(start))
    }

    /// Attempts to lex a reference at the cursor. Restores nothing on failure;
    /// callers reset `pos` themselves.
    fn try_reference(&mut self, sheet: Option<SheetRef>) -> Result<bool, LexError> {
        let word = self.read_word();
        let Some(first) = parse_ref_part(&word) else {
            return Ok(false);
        };

        let after_first = self.pos;
        let second = if self.peek() == Some(':') {
            self.pos += 1;
            let word = self.read_word();
            parse_ref_part(&word)
        } else {
            None
        };

        let token = match (first, second) {
            (RefPart::Cell(a), Some(RefPart::Cell(b))) => Token::Area(AreaToken {
                sheet,
                first: a,
                last: b,
            }),
            (RefPart::Col(a), Some(RefPart::Col(b))) => Token::Cols(LineRangeToken {
                sheet,
                first: a,
                last: b,
            }),
            (RefPart::Row(a), Some(RefPart::Row(b))) => Token::Rows(LineRangeToken {
                sheet,
                first: a,
                last: b,
            }),
            (RefPart::Cell(a), _) => {
                self.pos = after_first;
                Token::Ref(RefToken {
                    sheet,
                    row: a.row,
                    col: a.col,
                })
            }
            _ => return Ok(false),
        };

        // A cell-shaped word directly followed by `(` is a function like `LOG10(`.
        if self.peek() == Some('(') {
            return Ok(false);
        }
        self.out.push(token);
        Ok(true)
    }
}

fn parse_ref_part(word: &str) -> Option<RefPart> {
    let version = SpreadsheetVersion::Excel2007;
    let bytes = word.as_bytes();
    if bytes.is_empty() || !word.is_ascii() {
        return None;
    }

    let mut idx = 0usize;
    let col_abs = bytes[idx] == b'$';
    if col_abs {
        idx += 1;
    }
    let col_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
        idx += 1;
    }
    let col_letters = &word[col_start..idx];

    let row_abs = bytes.get(idx) == Some(&b'$');
    if row_abs {
        idx += 1;
    }
    let row_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let row_digits = &word[row_start..idx];
    if idx != bytes.len() {
        return None;
    }

    let col = if col_letters.is_empty() {
        None
    } else {
        if col_letters.len() > 3 {
            return None;
        }
        let col = name_to_col(col_letters).ok()?;
        if col >= version.max_cols() {
            return None;
        }
        Some(Coord {
            index: col,
            abs: col_abs,
        })
    };

    let row = if row_digits.is_empty() {
        None
    } else {
        let row_1_based: u32 = row_digits.parse().ok()?;
        if row_1_based == 0 || row_1_based > version.max_rows() {
            return None;
        }
        // For a row-only word the leading `$` belongs to the row.
        let abs = if col.is_none() { col_abs || row_abs } else { row_abs };
        Some(Coord {
            index: row_1_based - 1,
            abs,
        })
    };

    match (col, row) {
        (Some(col), Some(row)) => Some(RefPart::Cell(Corner { row, col })),
        (Some(col), None) if !row_abs => Some(RefPart::Col(col)),
        (None, Some(row)) => Some(RefPart::Row(row)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(tokens: &[Token]) -> String {
        tokens.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lexes_references_and_literals() {
        let tokens = tokenize("=SUM($A$1:B2, 'My Sheet'!C3) & \"x\"").unwrap();
        assert_eq!(tokens[0], Token::Function("SUM".into()));
        assert!(matches!(tokens[1], Token::Area(_)));
        assert!(matches!(&tokens[4], Token::Ref(r) if r.sheet == Some(SheetRef::Sheet("My Sheet".into()))));
        assert_eq!(render(&tokens), "SUM($A$1:B2, 'My Sheet'!C3) & \"x\"");
    }

    #[test]
    fn lexes_line_ranges_and_3d_prefixes() {
        let tokens = tokenize("SUM(Jan:Mar!B:B)+COUNT($2:$4)").unwrap();
        assert!(matches!(
            &tokens[1],
            Token::Cols(l) if l.sheet == Some(SheetRef::Span { first: "Jan".into(), last: "Mar".into() })
        ));
        assert!(matches!(&tokens[5], Token::Rows(l) if l.first == Coord::absolute(1) && l.last == Coord::absolute(3)));
        assert_eq!(render(&tokens), "SUM(Jan:Mar!B:B)+COUNT($2:$4)");
    }

    #[test]
    fn numbers_names_and_functions_are_not_references() {
        let tokens = tokenize("LOG10(1.5E3)+Total+TRUE").unwrap();
        assert_eq!(tokens[0], Token::Function("LOG10".into()));
        assert_eq!(tokens[1], Token::Number("1.5E3".into()));
        assert_eq!(tokens[4], Token::Name("Total".into()));
        assert_eq!(tokens[6], Token::Bool(true));
    }

    #[test]
    fn reports_lex_errors() {
        assert_eq!(tokenize("\"abc"), Err(LexError::UnterminatedString(0)));
        assert_eq!(tokenize("'Sheet1!A1"), Err(LexError::UnterminatedSheetName(0)));
        assert_eq!(tokenize("#BOGUS"), Err(LexError::UnknownErrorLiteral(0)));
        assert!(matches!(tokenize("A1 ~ 2"), Err(LexError::UnexpectedChar { ch: '~', .. })));
    }
}
