/// A sorted-array associative map: O(log n) lookup, O(n) insert.
///
/// For the small, short-lived maps built inside a single tetrahedron this is
/// consistently faster than a hash map and keeps iteration ordered.
#[derive(Clone, Debug, Default)]
pub struct FlatMap<K: Ord, V> {
    entries: Vec<(K, V)>,
}

impl<K: Ord, V> FlatMap<K, V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Insert `key -> value`, returning the previous value if the key existed.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.entries.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) => Some(&mut self.entries[i].1),
            Err(_) => None,
        }
    }

    /// Get the value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let i = match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => i,
            Err(i) => {
                self.entries.insert(i, (key, default()));
                i
            }
        };
        &mut self.entries[i].1
    }

    #[inline] pub fn contains_key(&self, key: &K) -> bool { self.get(key).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A sorted-array set; the set counterpart of [`FlatMap`].
#[derive(Clone, Debug, Default)]
pub struct FlatSet<K: Ord> {
    keys: Vec<K>,
}

impl<K: Ord> FlatSet<K> {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    #[inline] pub fn len(&self) -> usize { self.keys.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Insert `key`; returns true if it was not present before.
    pub fn insert(&mut self, key: K) -> bool {
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(i) => {
                self.keys.insert(i, key);
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.keys.binary_search(key).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    pub fn as_slice(&self) -> &[K] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn insert_get_replace() {
        let mut map = FlatMap::new();
        assert_eq!(map.insert(5u32, "five"), None);
        assert_eq!(map.insert(1, "one"), None);
        assert_eq!(map.insert(9, "nine"), None);
        assert_eq!(map.insert(5, "FIVE"), Some("five"));

        assert_eq!(map.get(&5), Some(&"FIVE"));
        assert_eq!(map.get(&2), None);
        assert_eq!(map.len(), 3);

        // Iteration is key-ordered.
        let keys = map.iter().map(|(k, _)| *k).collect::<Vec<_>>();
        assert_eq!(keys, vec![1, 5, 9]);
    }

    #[test]
    fn get_or_insert_with() {
        let mut map: FlatMap<u32, Vec<u32>> = FlatMap::new();
        map.get_or_insert_with(3, Vec::new).push(7);
        map.get_or_insert_with(3, Vec::new).push(8);
        assert_eq!(map.get(&3), Some(&vec![7, 8]));
    }

    #[test]
    fn set_membership() {
        let mut set = FlatSet::new();
        assert!(set.insert(4u32));
        assert!(set.insert(2));
        assert!(!set.insert(4));
        assert!(set.contains(&2));
        assert!(!set.contains(&3));
        assert_eq!(set.as_slice(), &[2, 4]);
    }

    #[test]
    fn matches_std_map_on_random_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut flat = FlatMap::new();
        let mut std = std::collections::BTreeMap::new();
        for _ in 0..500 {
            let k: u16 = rng.random_range(0..64);
            let v: u32 = rng.random();
            flat.insert(k, v);
            std.insert(k, v);
        }
        assert_eq!(flat.len(), std.len());
        for (k, v) in std.iter() {
            assert_eq!(flat.get(k), Some(v));
        }
    }
}
