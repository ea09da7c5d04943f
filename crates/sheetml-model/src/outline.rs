use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sheetml_formula::{IndexShift, ShiftEdit, SpreadsheetVersion};

/// Deepest outline level the file format allows.
pub const MAX_OUTLINE_LEVEL: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenState {
    /// Hidden explicitly (eg via "Hide row").
    pub user: bool,
    /// Hidden because it is inside a collapsed outline group.
    pub outline: bool,
}

impl HiddenState {
    #[must_use]
    pub fn is_hidden(self) -> bool {
        self.user || self.outline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineEntry {
    /// 0-7 (`outlineLevel`).
    pub level: u8,
    pub hidden: HiddenState,
    /// This row/column is the collapsed summary of the group next to it (`collapsed="1"`).
    pub collapsed: bool,
}

/// Outline state of one axis (rows or columns), keyed by 0-based index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineAxis {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    entries: BTreeMap<u32, OutlineEntry>,
}

impl OutlineAxis {
    #[must_use]
    pub fn entry(&self, index: u32) -> OutlineEntry {
        self.entries.get(&index).copied().unwrap_or_default()
    }

    pub fn entry_mut(&mut self, index: u32) -> &mut OutlineEntry {
        self.entries.entry(index).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &OutlineEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_user_hidden(&mut self, index: u32, hidden: bool) {
        self.entry_mut(index).hidden.user = hidden;
        self.prune(index);
    }

    /// Raise the outline level of `start..=end` by one (capped at 7).
    pub fn group(&mut self, start: u32, end: u32) {
        for index in start..=end {
            let entry = self.entry_mut(index);
            entry.level = (entry.level + 1).min(MAX_OUTLINE_LEVEL);
        }
        self.recompute_outline_hidden();
    }

    /// Lower the outline level of `start..=end` by one.
    pub fn ungroup(&mut self, start: u32, end: u32) {
        for index in start..=end {
            let entry = self.entry_mut(index);
            entry.level = entry.level.saturating_sub(1);
            self.prune(index);
        }
        // A summary next to a group that no longer exists stops being collapsed.
        let orphaned: Vec<u32> = self
            .entries
            .iter()
            .filter(|(&i, e)| e.collapsed && self.detail_before(i).is_none())
            .map(|(&i, _)| i)
            .collect();
        for index in orphaned {
            self.entry_mut(index).collapsed = false;
        }
        self.recompute_outline_hidden();
    }

    /// The deepest contiguous group containing `index`: every neighbour at the
    /// same or a deeper level.
    #[must_use]
    pub fn group_containing(&self, index: u32) -> Option<(u32, u32)> {
        let level = self.entry(index).level;
        if level == 0 {
            return None;
        }
        let mut start = index;
        while start > 0 && self.entry(start - 1).level >= level {
            start -= 1;
        }
        let mut end = index;
        while end < u32::MAX && self.entry(end + 1).level >= level {
            end += 1;
        }
        Some((start, end))
    }

    /// Collapse or expand the group containing `index`.
    ///
    /// The group's members are hidden and the index right after the group
    /// carries the `collapsed` marker. Returns the group's bounds.
    pub fn set_group_collapsed(&mut self, index: u32, collapsed: bool) -> Option<(u32, u32)> {
        let (start, end) = self.group_containing(index)?;
        let summary = end.checked_add(1)?;
        let entry = self.entry_mut(summary);
        entry.collapsed = collapsed;
        self.prune(summary);
        self.recompute_outline_hidden();
        Some((start, end))
    }

    /// Recompute which indices are hidden by collapsed groups.
    ///
    /// User-hidden flags are left alone.
    pub fn recompute_outline_hidden(&mut self) {
        for entry in self.entries.values_mut() {
            entry.hidden.outline = false;
        }
        let summaries: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.collapsed)
            .map(|(&i, _)| i)
            .collect();
        for summary in summaries {
            let Some((start, end)) = self.detail_before(summary) else {
                continue;
            };
            for index in start..=end {
                self.entry_mut(index).hidden.outline = true;
            }
        }
        let keys: Vec<u32> = self.entries.keys().copied().collect();
        for key in keys {
            self.prune(key);
        }
    }

    /// Move entries through a structural edit on this axis.
    ///
    /// Entries of deleted or overwritten indices are dropped, as are entries
    /// pushed past the last index.
    pub fn apply_edit(&mut self, edit: &ShiftEdit, version: SpreadsheetVersion) {
        let old = std::mem::take(&mut self.entries);
        let mut moved = BTreeMap::new();
        for (index, entry) in old {
            match edit.map_index(index, version) {
                Ok(IndexShift::Kept(new_index)) => {
                    moved.insert(new_index, entry);
                }
                Ok(IndexShift::Deleted) => {}
                Err(err) => log::debug!("dropping outline entry {index}: {err}"),
            }
        }
        self.entries = moved;
        self.recompute_outline_hidden();
    }

    // Detail run that the summary at `summary` controls (the run just before it).
    fn detail_before(&self, summary: u32) -> Option<(u32, u32)> {
        let end = summary.checked_sub(1)?;
        let target = self.entry(summary).level.saturating_add(1);
        if self.entry(end).level < target {
            return None;
        }
        let mut start = end;
        while start > 0 && self.entry(start - 1).level >= target {
            start -= 1;
        }
        Some((start, end))
    }

    fn prune(&mut self, index: u32) {
        if self.entries.get(&index) == Some(&OutlineEntry::default()) {
            self.entries.remove(&index);
        }
    }
}

/// Row and column outline state of a worksheet.
///
/// Summary rows sit below their detail rows and summary columns to the right.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    pub rows: OutlineAxis,
    pub cols: OutlineAxis,
}
