//! Stable-identifier generation.
//!
//! Identities are assigned at node creation and preserved across structural
//! edits; the registry and visual index key on them. The generator hashes
//! the session name into a seed and appends a sequential counter, which
//! keeps identifiers unique for the lifetime of the editing session.

use std::sync::atomic::{AtomicU64, Ordering};

use crc32fast::Hasher;

/// Derive the seed for a session name using CRC32.
pub fn session_seed(session: &str) -> String {
    let mut buff = String::from(session);
    if !session.starts_with("session://") {
        buff = format!("session://{}", buff);
    }

    let mut hasher = Hasher::new();
    hasher.update(buff.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential identifier generator for nodes within an editing session.
#[derive(Debug)]
pub struct IdGenerator {
    seed: String,
    count: AtomicU64,
}

impl IdGenerator {
    pub fn new(session: &str) -> Self {
        Self {
            seed: session_seed(session),
            count: AtomicU64::new(0),
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self {
            seed,
            count: AtomicU64::new(0),
        }
    }

    /// Generate the next sequential identifier.
    pub fn next_id(&self) -> String {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.seed, n)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}
