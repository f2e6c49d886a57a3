//! Commit identity types.
//!
//! A commit is identified by its (hash, root) pair. All internal set
//! operations run on dense `u32` indices produced by the
//! [`CommitStorage`](crate::storage::CommitStorage) interner.

use std::fmt;

use anyhow::{Result, bail};

/// Raw 20-byte SHA-1 commit hash.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitHash([u8; 20]);

impl CommitHash {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a full 40-character hex hash.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)?;
        let bytes: [u8; 20] = match bytes.try_into() {
            Ok(b) => b,
            Err(_) => bail!("expected a full 40-character hash, got {:?}", hex_str),
        };
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Case-insensitive hex-prefix match, used for partial-hash lookup.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let hex = self.to_hex();
        hex.starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of a repository root within one session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(pub u32);

impl RootId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Globally unique commit identity: hash plus the root it belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommitId {
    pub hash: CommitHash,
    pub root: RootId,
}

impl CommitId {
    pub fn new(hash: CommitHash, root: RootId) -> Self {
        Self { hash, root }
    }
}

/// Commit metadata needed by detail filters (message, author, date).
#[derive(Debug, Clone)]
pub struct CommitMetadata {
    pub id: CommitId,
    pub author: String,
    pub timestamp: i64,
    pub message: String,
}

impl CommitMetadata {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
