//! Pending registrations keyed by character name

use eve_ts3_core::Character;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Intent to bind a character to the next TS3 client connecting under its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    /// Unix seconds when the registration was made
    pub created_at: i64,
    pub character: Character,
}

impl RegistrationRecord {
    pub fn new(created_at: i64, character: Character) -> Self {
        Self {
            created_at,
            character,
        }
    }

    /// Live while `now - created_at < ttl`
    pub fn is_live(&self, now: i64, ttl: i64) -> bool {
        now.saturating_sub(self.created_at) < ttl
    }
}

/// Result of [`RegistrationQueue::claim`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The live record, now removed from the queue
    Claimed(RegistrationRecord),
    /// A record exists but its TTL has run out; it stays for the sweeper
    Expired(RegistrationRecord),
    /// Nothing queued under this name
    Missing,
}

/// Lock-guarded map of pending registrations.
///
/// The lock is held for a single map operation and never across I/O.
#[derive(Debug, Default)]
pub struct RegistrationQueue {
    records: Mutex<HashMap<String, RegistrationRecord>>,
}

impl RegistrationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier one for `key`
    pub fn put(&self, key: impl Into<String>, record: RegistrationRecord) {
        self.records.lock().insert(key.into(), record);
    }

    /// Copy of the record for `key`, left in place
    pub fn take(&self, key: &str) -> Option<RegistrationRecord> {
        self.records.lock().get(key).cloned()
    }

    /// Remove the record for `key`
    pub fn consume(&self, key: &str) -> Option<RegistrationRecord> {
        self.records.lock().remove(key)
    }

    /// Look up `key` and, if live, remove it in the same critical section.
    ///
    /// Two connections racing for one registration cannot both claim it.
    pub fn claim(&self, key: &str, now: i64, ttl: i64) -> Claim {
        let mut records = self.records.lock();
        let Some(record) = records.get(key) else {
            return Claim::Missing;
        };
        if !record.is_live(now, ttl) {
            return Claim::Expired(record.clone());
        }
        records.remove(key).map_or(Claim::Missing, Claim::Claimed)
    }

    /// Drop every record aged `ttl` or more; returns how many were removed
    pub fn sweep(&self, now: i64, ttl: i64) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.is_live(now, ttl));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
