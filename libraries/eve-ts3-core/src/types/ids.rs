/// ID types for TS3 server entities
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Server group identifier (`sgid`) assigned by the TS3 server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerGroupId(u64);

impl ServerGroupId {
    /// Create a new server group ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServerGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerGroupId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Client database identifier (`cldbid`), stable across reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientDbId(u64);

impl ClientDbId {
    /// Create a new client database ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientDbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientDbId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}
