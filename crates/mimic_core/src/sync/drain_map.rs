//! Keyed map drained by the reader.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

/// Keyed records that the reader removes as it consumes them.
///
/// Draining leaves the map empty, not gone; the next upsert refills it.
pub struct DrainMap<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V> DrainMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `value` under `key`, replacing any unread value.
    pub fn upsert(&self, key: K, value: V) {
        self.entries.lock().insert(key, value);
    }

    /// Returns every entry and empties the map.
    pub fn drain(&self) -> HashMap<K, V> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Removes and returns the entry for `key`.
    ///
    /// `None` means no update since the last take.
    pub fn take(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key)
    }

    /// Number of unread entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is waiting to be read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K: Eq + Hash, V> Default for DrainMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for DrainMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainMap")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_map() {
        let map = DrainMap::new();
        map.upsert(1u8, "a");
        map.upsert(2u8, "b");
        map.upsert(1u8, "c");

        let drained = map.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[&1], "c");
        assert!(map.is_empty());
        assert!(map.drain().is_empty());
    }

    #[test]
    fn test_take_by_key() {
        let map = DrainMap::new();
        map.upsert(3u8, 30);
        map.upsert(4u8, 40);

        assert_eq!(map.take(&3), Some(30));
        assert_eq!(map.take(&3), None);
        assert_eq!(map.len(), 1);
    }
}
