//! Reply parsing.

use crate::error::{QueryError, Result};
use crate::escape::unescape;
use std::collections::HashMap;

/// One `key=value` record of a reply or notification
pub type Record = HashMap<String, String>;

/// Successful reply to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    records: Vec<Record>,
}

impl Reply {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Records in the order the server sent them
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// First record, if any
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Status carried by the `error id=.. msg=..` line closing every reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Status {
    pub id: u32,
    pub message: String,
}

impl Status {
    pub fn into_result(self, records: Vec<Record>) -> Result<Reply> {
        if self.id == crate::ERROR_OK {
            Ok(Reply::new(records))
        } else {
            Err(QueryError::Server {
                id: self.id,
                message: self.message,
            })
        }
    }
}

/// Parse one data line into records separated by `|`
pub(crate) fn parse_records(line: &str) -> Vec<Record> {
    line.split('|').map(parse_record).collect()
}

fn parse_record(chunk: &str) -> Record {
    chunk
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (unescape(key), unescape(value)),
            None => (unescape(token), String::new()),
        })
        .collect()
}

/// Whether a line is the status line that terminates a reply
pub(crate) fn is_status_line(line: &str) -> bool {
    line == "error" || line.starts_with("error ")
}

/// Parse `error id=0 msg=ok`
pub(crate) fn parse_status(line: &str) -> Result<Status> {
    let rest = line
        .strip_prefix("error")
        .ok_or_else(|| QueryError::Malformed(line.to_string()))?;
    let record = parse_record(rest);

    let id = record
        .get("id")
        .ok_or_else(|| QueryError::Malformed(line.to_string()))?
        .parse::<u32>()
        .map_err(|_| QueryError::Malformed(line.to_string()))?;
    let message = record.get("msg").cloned().unwrap_or_default();

    Ok(Status { id, message })
}
