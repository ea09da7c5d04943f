use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, Result};

/// First id available for custom (workbook-defined) number formats.
pub const FIRST_CUSTOM_NUMBER_FORMAT_ID: u16 = 164;

/// Built-in number formats by id. Ids 23..=36 are locale-reserved.
const BUILTIN_FORMATS: [Option<&str>; 50] = [
    Some("General"),
    Some("0"),
    Some("0.00"),
    Some("#,##0"),
    Some("#,##0.00"),
    Some("\"$\"#,##0_);(\"$\"#,##0)"),
    Some("\"$\"#,##0_);[Red](\"$\"#,##0)"),
    Some("\"$\"#,##0.00_);(\"$\"#,##0.00)"),
    Some("\"$\"#,##0.00_);[Red](\"$\"#,##0.00)"),
    Some("0%"),
    Some("0.00%"),
    Some("0.00E+00"),
    Some("# ?/?"),
    Some("# ??/??"),
    Some("m/d/yy"),
    Some("d-mmm-yy"),
    Some("d-mmm"),
    Some("mmm-yy"),
    Some("h:mm AM/PM"),
    Some("h:mm:ss AM/PM"),
    Some("h:mm"),
    Some("h:mm:ss"),
    Some("m/d/yy h:mm"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("#,##0_);(#,##0)"),
    Some("#,##0_);[Red](#,##0)"),
    Some("#,##0.00_);(#,##0.00)"),
    Some("#,##0.00_);[Red](#,##0.00)"),
    Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
    Some("_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)"),
    Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
    Some("_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)"),
    Some("mm:ss"),
    Some("[h]:mm:ss"),
    Some("mm:ss.0"),
    Some("##0.0E+0"),
    Some("@"),
];

/// Format code of a built-in number format id.
pub fn builtin_number_format(id: u16) -> Option<&'static str> {
    BUILTIN_FORMATS.get(id as usize).copied().flatten()
}

/// Id of a built-in format code, if the code is built in.
pub fn builtin_number_format_id(code: &str) -> Option<u16> {
    BUILTIN_FORMATS
        .iter()
        .position(|fmt| *fmt == Some(code))
        .map(|i| i as u16)
}

/// The workbook's number format table (`numFmts`).
///
/// Built-in codes always resolve to their fixed ids; every other code gets a
/// custom id from 164 upward, interned by its exact text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberFormats {
    custom: BTreeMap<u16, String>,
    by_code: HashMap<String, u16>,
}

impl NumberFormats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `code`, allocating a custom id for new codes.
    ///
    /// Fails with [`ModelError::OutOfRange`] once the highest custom id is
    /// `u16::MAX`.
    pub fn intern(&mut self, code: &str) -> Result<u16> {
        if let Some(id) = builtin_number_format_id(code) {
            return Ok(id);
        }
        if let Some(id) = self.by_code.get(code) {
            return Ok(*id);
        }
        let id = match self.custom.keys().next_back() {
            None => FIRST_CUSTOM_NUMBER_FORMAT_ID,
            Some(last) => last
                .checked_add(1)
                .ok_or(ModelError::OutOfRange {
                    what: "number format",
                    index: usize::from(u16::MAX) + 1,
                    len: self.custom.len(),
                })?
                .max(FIRST_CUSTOM_NUMBER_FORMAT_ID),
        };
        self.custom.insert(id, code.to_string());
        self.by_code.insert(code.to_string(), id);
        Ok(id)
    }

    /// Register a custom format under an explicit id (as read from a file),
    /// replacing whatever code the id had.
    pub fn insert_custom(&mut self, id: u16, code: impl Into<String>) {
        let code = code.into();
        if let Some(old) = self.custom.insert(id, code.clone()) {
            if old != code && self.by_code.get(&old) == Some(&id) {
                self.by_code.remove(&old);
                // Another id may still carry the old code.
                if let Some((&other, _)) = self.custom.iter().find(|(_, c)| **c == old) {
                    self.by_code.insert(old, other);
                }
            }
        }
        self.by_code.entry(code).or_insert(id);
    }

    pub fn code(&self, id: u16) -> Option<&str> {
        builtin_number_format(id).or_else(|| self.custom.get(&id).map(String::as_str))
    }

    pub fn custom_formats(&self) -> impl Iterator<Item = (u16, &str)> {
        self.custom.iter().map(|(id, code)| (*id, code.as_str()))
    }
}

impl Serialize for NumberFormats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.custom.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NumberFormats {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let custom = BTreeMap::<u16, String>::deserialize(deserializer)?;
        let mut formats = NumberFormats::new();
        for (id, code) in custom {
            formats.insert_custom(id, code);
        }
        Ok(formats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_keep_their_ids() {
        let mut formats = NumberFormats::new();
        assert_eq!(formats.intern("General"), Ok(0));
        assert_eq!(formats.intern("0.00%"), Ok(10));
        assert_eq!(formats.intern("@"), Ok(49));
        assert_eq!(builtin_number_format(23), None);
        assert_eq!(formats.custom_formats().count(), 0);
    }

    #[test]
    fn custom_codes_start_at_164_and_are_interned() {
        let mut formats = NumberFormats::new();
        let a = formats.intern("0.000").unwrap();
        let b = formats.intern("yyyy-mm-dd").unwrap();
        assert_eq!((a, b), (164, 165));
        assert_eq!(formats.intern("0.000"), Ok(164));
        assert_eq!(formats.code(165), Some("yyyy-mm-dd"));

        formats.insert_custom(200, "[Blue]0");
        assert_eq!(formats.intern("#,##0.0"), Ok(201));
    }

    #[test]
    fn custom_ids_stop_at_u16_max() {
        let mut formats = NumberFormats::new();
        formats.insert_custom(u16::MAX, "0.0000");
        assert_eq!(
            formats.intern("0.00000"),
            Err(ModelError::OutOfRange {
                what: "number format",
                index: 65_536,
                len: 1,
            })
        );
        assert_eq!(formats.code(u16::MAX), Some("0.0000"));
        assert_eq!(formats.custom_formats().count(), 1);
        assert_eq!(formats.intern("0.0000"), Ok(u16::MAX));
    }

    #[test]
    fn reassigning_an_id_forgets_its_old_code() {
        let mut formats = NumberFormats::new();
        formats.insert_custom(164, "0.0%");
        formats.insert_custom(164, "#,##0.000");
        assert_eq!(formats.code(164), Some("#,##0.000"));
        assert_eq!(formats.intern("#,##0.000"), Ok(164));
        assert_eq!(formats.intern("0.0%"), Ok(165));
        assert_eq!(formats.code(165), Some("0.0%"));

        formats.insert_custom(170, "0.0%");
        formats.insert_custom(165, "[Red]0");
        assert_eq!(formats.intern("0.0%"), Ok(170));
    }
}
