//! Commit identity interning.
//!
//! Maps (hash, root) pairs to dense u32 indices so that all filtering and
//! graph work runs on integer sets instead of 20-byte hashes.

use rustc_hash::FxHashMap;

use crate::model::{CommitHash, CommitId, RootId};

/// Commit identity resolver: interns commit ids and answers exact and
/// partial-hash lookups.
#[derive(Debug, Default)]
pub struct CommitStorage {
    map: FxHashMap<CommitId, u32>,
    vec: Vec<CommitId>,
}

impl CommitStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a commit id and return its dense index.
    pub fn intern(&mut self, id: CommitId) -> u32 {
        if let Some(&index) = self.map.get(&id) {
            return index;
        }
        let index = self.vec.len() as u32;
        self.map.insert(id, index);
        self.vec.push(id);
        index
    }

    pub fn commit_id(&self, index: u32) -> CommitId {
        self.vec[index as usize]
    }

    pub fn lookup(&self, id: &CommitId) -> Option<u32> {
        self.map.get(id).copied()
    }

    /// Exact full-hash lookup across every root.
    pub fn find_hash(&self, hash: &CommitHash) -> Vec<u32> {
        self.vec
            .iter()
            .enumerate()
            .filter(|(_, id)| &id.hash == hash)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Partial-hash search: every interned commit whose hex starts with
    /// `prefix`, optionally restricted to one root.
    pub fn find_prefix(&self, prefix: &str, root: Option<RootId>) -> Vec<u32> {
        self.vec
            .iter()
            .enumerate()
            .filter(|(_, id)| root.is_none_or(|r| id.root == r))
            .filter(|(_, id)| id.hash.matches_prefix(prefix))
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> CommitHash {
        CommitHash::from_bytes([byte; 20])
    }

    #[test]
    fn test_intern_returns_same_index() {
        let mut storage = CommitStorage::new();
        let id = CommitId::new(hash(1), RootId(0));
        assert_eq!(storage.intern(id), storage.intern(id));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_same_hash_different_roots() {
        let mut storage = CommitStorage::new();
        let a = storage.intern(CommitId::new(hash(1), RootId(0)));
        let b = storage.intern(CommitId::new(hash(1), RootId(1)));
        assert_ne!(a, b);
        assert_eq!(storage.find_hash(&hash(1)), vec![a, b]);
    }

    #[test]
    fn test_prefix_search() {
        let mut storage = CommitStorage::new();
        let a = storage.intern(CommitId::new(hash(0xab), RootId(0)));
        storage.intern(CommitId::new(hash(0xcd), RootId(0)));
        assert_eq!(storage.find_prefix("abab", None), vec![a]);
        assert!(storage.find_prefix("abab", Some(RootId(1))).is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let mut storage = CommitStorage::new();
        let id = CommitId::new(hash(7), RootId(3));
        let index = storage.intern(id);
        assert_eq!(storage.commit_id(index), id);
        assert_eq!(storage.lookup(&id), Some(index));
    }
}
