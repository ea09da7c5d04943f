use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::intern::InternTable;
use crate::rich_text::RichText;

/// The workbook's shared string table (`sst`).
///
/// Strings are interned by content, formatting runs included, so `"a"` and a
/// bold `"a"` get separate entries. `total_references` counts every intern
/// call (the `count` attribute), while [`len`](Self::len) is the number of
/// distinct entries (`uniqueCount`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedStringPool {
    strings: InternTable<RichText>,
    total_references: u64,
}

impl SharedStringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: impl Into<RichText>) -> u32 {
        self.total_references += 1;
        self.strings.intern(text.into())
    }

    pub fn get(&self, index: u32) -> Result<&RichText> {
        self.strings.get(index).ok_or(ModelError::OutOfRange {
            what: "shared string",
            index: index as usize,
            len: self.strings.len(),
        })
    }

    /// Index of an equal entry, without recording a reference.
    pub fn find(&self, text: &RichText) -> Option<u32> {
        self.strings.find(text)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn total_references(&self) -> u64 {
        self.total_references
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RichText)> {
        self.strings.iter()
    }
}
