use core::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lexer::{tokenize, LexError};
use crate::sheet_name::sheet_name_eq_case_insensitive;
use crate::token::{SheetRef, Token, REF_ERROR};

/// A tokenized formula.
///
/// Formulas are stored **without** the leading `=`; [`Display`](fmt::Display)
/// renders the token stream back to that canonical text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Formula {
    tokens: Vec<Token>,
}

impl Formula {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Tokenize formula text (a leading `=` is accepted and dropped).
    pub fn parse(text: &str) -> Result<Self, LexError> {
        Ok(Self {
            tokens: tokenize(text)?,
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate the reference-bearing tokens in order.
    pub fn references(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_reference())
    }

    /// Returns true if any token is the `#REF!` error.
    pub fn has_ref_error(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, Token::Error(e) if e == REF_ERROR))
    }

    /// Render with a leading `=` (the form shown in a formula bar).
    pub fn to_display_text(&self) -> String {
        format!("={self}")
    }

    /// Rename sheet qualifiers from `old_name` to `new_name`.
    ///
    /// Returns `None` when no token referenced `old_name`.
    pub fn rename_sheet(&self, old_name: &str, new_name: &str) -> Option<Formula> {
        let rename = |name: &mut String| {
            if sheet_name_eq_case_insensitive(name, old_name) {
                *name = new_name.to_string();
                true
            } else {
                false
            }
        };

        let mut changed = false;
        let mut tokens = self.tokens.clone();
        for token in &mut tokens {
            let Some(Some(sheet)) = token.sheet_mut() else {
                continue;
            };
            match sheet {
                SheetRef::Sheet(name) => changed |= rename(name),
                SheetRef::Span { first, last } => {
                    changed |= rename(first);
                    changed |= rename(last);
                }
            }
        }
        changed.then(|| Formula::new(tokens))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl FromStr for Formula {
    type Err = LexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl From<Vec<Token>> for Formula {
    fn from(tokens: Vec<Token>) -> Self {
        Formula::new(tokens)
    }
}

impl Serialize for Formula {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Formula {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Formula::parse(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_without_leading_equals() {
        let f = Formula::parse("=A1+ SUM(B1:B3)").unwrap();
        assert_eq!(f.to_string(), "A1+ SUM(B1:B3)");
        assert_eq!(f.to_display_text(), "=A1+ SUM(B1:B3)");
        assert_eq!(f.references().count(), 2);
    }

    #[test]
    fn rename_sheet_rewrites_qualifiers_only() {
        let f = Formula::parse("Data!A1+'Old Data'!B2+Jan:Data!C3+A1").unwrap();
        let renamed = f.rename_sheet("data", "Input Sheet").unwrap();
        assert_eq!(
            renamed.to_string(),
            "'Input Sheet'!A1+'Old Data'!B2+'Jan:Input Sheet'!C3+A1"
        );
        assert!(f.rename_sheet("Missing", "X").is_none());
    }

    #[test]
    fn serde_uses_formula_text() {
        let f = Formula::parse("SUM($A$1:A2)").unwrap();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"SUM($A$1:A2)\"");
        let back: Formula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
