//! Shared-string table
//!
//! Append-only, de-duplicating registry of the strings referenced by `t="s"`
//! cells. The index of a string is its position at first insertion and never
//! changes afterwards, so rendering the same database twice produces the same
//! table.

use ahash::AHashMap;

/// Ordered, duplicate-free table of shared strings
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
    index: AHashMap<String, usize>,
}

impl SharedStringTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from the entries of an existing `sharedStrings.xml`.
    ///
    /// Every entry keeps its position so existing `t="s"` cells stay valid.
    /// When the part holds the same text twice, lookups resolve to the first.
    pub fn from_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for s in strings {
            let s = s.into();
            let idx = table.strings.len();
            table.index.entry(s.clone()).or_insert(idx);
            table.strings.push(s);
        }
        table
    }

    /// Return the index of `value`, appending it if not yet present
    pub fn intern(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    /// Index of `value` if present
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// String at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Entries appended after the first `count`
    pub fn appended_since(&self, count: usize) -> &[String] {
        self.strings.get(count..).unwrap_or(&[])
    }
}
