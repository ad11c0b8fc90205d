//! Per-stream send sequences

use dashmap::DashMap;
use uuid::Uuid;

/// Session id plus a strictly increasing sequence per stream key
///
/// The session id is fixed for the lifetime of the counter, which the
/// feature creates once per process. Sequences start at 1 and are never
/// reset or reused.
#[derive(Debug)]
pub struct SequenceCounter {
    session_id: String,
    sequences: DashMap<String, u64>,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::with_session_id(Uuid::new_v4().to_string())
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sequences: DashMap::new(),
        }
    }

    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Take the next sequence number for `key`
    ///
    /// The increment happens under the key's shard lock, so concurrent
    /// callers for one key are serialized while other keys proceed.
    pub fn next(&self, key: &str) -> u64 {
        if let Some(mut sequence) = self.sequences.get_mut(key) {
            *sequence += 1;
            return *sequence;
        }
        let mut sequence = self.sequences.entry(key.to_string()).or_insert(0);
        *sequence += 1;
        *sequence
    }

    /// Last sequence number handed out for `key`
    pub fn current(&self, key: &str) -> Option<u64> {
        self.sequences.get(key).map(|s| *s)
    }

    /// Number of keys seen so far
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
