//! Out-of-band server notifications.

use crate::reply::{parse_records, Record};
use std::sync::Arc;

/// Callback receiving every notification of a session
pub type NotificationHandler = Arc<dyn Fn(Notification) + Send + Sync>;

/// A `notify*` line pushed by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Event name, e.g. `notifycliententerview`
    pub kind: String,
    /// One record per affected client
    pub params: Vec<Record>,
}

impl Notification {
    pub fn new(kind: impl Into<String>, params: Vec<Record>) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Value of `key` in the first record
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .first()
            .and_then(|record| record.get(key))
            .map(String::as_str)
    }

    /// Parse a wire line; `None` if it is not a notification
    pub fn parse(line: &str) -> Option<Self> {
        let (kind, rest) = match line.split_once(' ') {
            Some((kind, rest)) => (kind, rest),
            None => (line, ""),
        };
        if !kind.starts_with("notify") {
            return None;
        }
        let params = if rest.is_empty() {
            Vec::new()
        } else {
            parse_records(rest)
        };
        Some(Self::new(kind, params))
    }
}
