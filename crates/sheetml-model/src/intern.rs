use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Append-only table that assigns one stable index per distinct value.
///
/// Values are compared structurally. Entries are never removed, so an index
/// handed out once resolves to the same value for the lifetime of the table.
/// Serialized as the plain value list; the lookup index is rebuilt on load.
#[derive(Clone, Debug)]
pub struct InternTable<T> {
    values: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T> Default for InternTable<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> InternTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an ordered value list (as read from a file).
    ///
    /// Duplicates keep their positions; lookups resolve to the first one.
    pub fn from_values(values: Vec<T>) -> Self {
        let mut table = Self {
            values,
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    /// Return the index of `value`, appending it first if it is new.
    pub fn intern(&mut self, value: T) -> u32 {
        if let Some(id) = self.index.get(&value) {
            return *id;
        }
        self.push(value)
    }

    /// Append `value` even if an equal value is already stored.
    pub fn append(&mut self, value: T) -> u32 {
        self.push(value)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.values.get(index as usize)
    }

    /// Index of a structurally equal value, if one is stored.
    pub fn find(&self, value: &T) -> Option<u32> {
        self.index.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.values.iter().enumerate().map(|(i, v)| (i as u32, v))
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn push(&mut self, value: T) -> u32 {
        let id = self.values.len() as u32;
        self.index.entry(value.clone()).or_insert(id);
        self.values.push(value);
        id
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, value) in self.values.iter().enumerate() {
            self.index.entry(value.clone()).or_insert(i as u32);
        }
    }
}

impl<T: PartialEq> PartialEq for InternTable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<T: Serialize> Serialize for InternTable<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for InternTable<T>
where
    T: Deserialize<'de> + Eq + Hash + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_values(values))
    }
}
