use std::collections::HashMap;

/// Interning table for one string encoding within one document.
///
/// Indices are assigned in first-seen order, identically on the encode and
/// decode side, so a table rebuilt while decoding resolves every back
/// reference the encoder emitted.
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    entries: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of `s` if it was registered earlier in this document.
    pub fn lookup(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    /// Registers a string and returns its index. Duplicates still take a new
    /// slot because a decoded document may define the same text twice; lookups
    /// keep pointing at the first slot.
    pub fn push(&mut self, s: &str) -> u32 {
        let idx = self.entries.len() as u32;
        self.entries.push(s.to_string());
        self.index.entry(s.to_string()).or_insert(idx);
        idx
    }

    pub fn get(&self, idx: u64) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }
}

/// The two per-document tables: native strings (0x90/0x91) and unicode
/// strings (0x92/0x93).
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    pub native: StringTable,
    pub unicode: StringTable,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut table = StringTable::new();
        assert_eq!(table.push("a"), 0);
        assert_eq!(table.push("b"), 1);
        assert_eq!(table.lookup("a"), Some(0));
        assert_eq!(table.lookup("b"), Some(1));
        assert_eq!(table.lookup("c"), None);
        assert_eq!(table.get(1), Some("b"));
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn test_duplicate_definition_keeps_first_slot() {
        let mut table = StringTable::new();
        table.push("x");
        assert_eq!(table.push("x"), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("x"), Some(0));
        assert_eq!(table.get(1), Some("x"));
    }

    #[test]
    fn test_pool_tables_are_independent() {
        let mut pool = StringPool::new();
        pool.native.push("a");
        assert!(pool.unicode.is_empty());
        assert_eq!(pool.unicode.lookup("a"), None);
        assert_eq!(pool.unicode.push("a"), 0);
    }
}
