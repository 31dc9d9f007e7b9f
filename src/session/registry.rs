//! Transient pid -> display-name cache.
//!
//! Filled from the host process table on every enumeration and thrown away
//! with the session. Rebuilds happen on the session executor, so readers on
//! the same executor never observe the intermediate empty state.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    names: HashMap<u32, String>,
}

impl ProcessRegistry {
    /// Replace the whole mapping. Entries from a previous enumeration never
    /// survive a rebuild.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (u32, String)>) {
        self.names.clear();
        self.names.extend(entries);
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn lookup(&self, pid: u32) -> Option<&str> {
        self.names.get(&pid).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_drops_stale_entries() {
        let mut registry = ProcessRegistry::default();
        registry.rebuild([(7, "a".to_string()), (9, "b".to_string())]);
        assert_eq!(registry.lookup(7), Some("a"));
        assert_eq!(registry.lookup(9), Some("b"));

        registry.rebuild([(9, "b".to_string())]);
        assert_eq!(registry.lookup(7), None);
        assert_eq!(registry.lookup(9), Some("b"));
    }

    #[test]
    fn test_clear() {
        let mut registry = ProcessRegistry::default();
        registry.rebuild([(1, "init".to_string())]);
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup(1), None);
    }
}
