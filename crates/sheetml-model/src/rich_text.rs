use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::style::Font;

/// Rich (multi-font) text.
///
/// `runs` is either empty (plain text) or starts at offset 0 with strictly
/// increasing `start` offsets; run `i` covers `[runs[i].start, runs[i+1].start)`
/// and the last run extends to the end of the text. A run without a font uses
/// the cell's font. Adjacent runs never carry the same font.
///
/// ## Indexing
/// Offsets are **Unicode scalar value** (`char`) indices into `text`, not UTF-8
/// byte offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RichText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<FormatRun>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatRun {
    pub start: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

impl RichText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Vec::new(),
        }
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn is_plain(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// `[start, end)` of run `index`.
    pub fn run_range(&self, index: usize) -> Option<(usize, usize)> {
        let run = self.runs.get(index)?;
        let end = self
            .runs
            .get(index + 1)
            .map_or_else(|| self.char_len(), |next| next.start);
        Some((run.start, end))
    }

    pub fn run_text(&self, index: usize) -> Option<&str> {
        let (start, end) = self.run_range(index)?;
        Some(slice_by_char_range(&self.text, start, end))
    }

    /// Font in effect at char offset `index`, if a run sets one.
    pub fn font_at(&self, index: usize) -> Option<&Font> {
        if index >= self.char_len() {
            return None;
        }
        let pos = self.runs.partition_point(|run| run.start <= index);
        pos.checked_sub(1)
            .and_then(|i| self.runs[i].font.as_ref())
    }

    /// Apply `font` to chars `[start, end)`.
    ///
    /// Existing run boundaries are collected into an ordered map keyed by run
    /// end offset; boundaries inside the range are dropped, a boundary at
    /// `end` carries the new font, and the run list is rebuilt from the map.
    pub fn apply_font(&mut self, start: usize, end: usize, font: Font) -> Result<()> {
        self.apply(start, end, Some(font))
    }

    pub fn apply_font_all(&mut self, font: Font) -> Result<()> {
        self.apply(0, self.char_len(), Some(font))
    }

    /// Drop every run; the text takes the cell's font again.
    pub fn clear_formatting(&mut self) {
        self.runs.clear();
    }

    /// Append `text`, formatted with `font` (or the cell font when `None`).
    pub fn append(&mut self, text: &str, font: Option<Font>) {
        if text.is_empty() {
            return;
        }
        let start = self.char_len();
        if self.runs.is_empty() && font.is_none() {
            self.text.push_str(text);
            return;
        }
        if self.runs.is_empty() && start > 0 {
            self.runs.push(FormatRun { start: 0, font: None });
        }
        self.text.push_str(text);
        self.runs.push(FormatRun { start, font });
        self.coalesce();
    }

    fn apply(&mut self, start: usize, end: usize, font: Option<Font>) -> Result<()> {
        let len = self.char_len();
        if start > end || end > len {
            return Err(ModelError::InvalidTextRange { start, end, len });
        }
        if start == end {
            return Ok(());
        }

        let mut formats = self.format_map(len);
        if start > 0 {
            // The run that covered `start` now ends there.
            let before = formats
                .range(start + 1..)
                .next()
                .map(|(_, f)| f.clone())
                .unwrap_or_default();
            formats.insert(start, before);
        }
        let inner: Vec<usize> = formats.range(start + 1..=end).map(|(k, _)| *k).collect();
        for key in inner {
            formats.remove(&key);
        }
        formats.insert(end, font);

        self.runs = rebuild_runs(&formats);
        self.coalesce();
        Ok(())
    }

    fn format_map(&self, len: usize) -> BTreeMap<usize, Option<Font>> {
        let mut formats = BTreeMap::new();
        if self.runs.is_empty() {
            formats.insert(len, None);
            return formats;
        }
        for (i, run) in self.runs.iter().enumerate() {
            let end = self.runs.get(i + 1).map_or(len, |next| next.start);
            formats.insert(end, run.font.clone());
        }
        formats
    }

    fn coalesce(&mut self) {
        self.runs.dedup_by(|next, prev| next.font == prev.font);
        if self.runs.len() == 1 && self.runs[0].font.is_none() {
            self.runs.clear();
        }
    }
}

impl From<&str> for RichText {
    fn from(text: &str) -> Self {
        RichText::new(text)
    }
}

impl From<String> for RichText {
    fn from(text: String) -> Self {
        RichText::new(text)
    }
}

fn rebuild_runs(formats: &BTreeMap<usize, Option<Font>>) -> Vec<FormatRun> {
    let mut runs = Vec::with_capacity(formats.len());
    let mut start = 0usize;
    for (&end, font) in formats {
        if end > start {
            runs.push(FormatRun {
                start,
                font: font.clone(),
            });
        }
        start = end;
    }
    runs
}

fn slice_by_char_range(text: &str, start: usize, end: usize) -> &str {
    if start == end {
        return "";
    }

    let mut start_byte = None;
    let mut end_byte = None;

    for (i, (byte_idx, _ch)) in text.char_indices().enumerate() {
        if i == start {
            start_byte = Some(byte_idx);
        }
        if i == end {
            end_byte = Some(byte_idx);
            break;
        }
    }

    let start_byte = start_byte.unwrap_or(text.len());
    let end_byte = end_byte.unwrap_or(text.len());

    &text[start_byte..end_byte]
}
