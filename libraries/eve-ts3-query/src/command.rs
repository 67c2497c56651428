//! ServerQuery commands.

use crate::escape::escape;
use std::collections::BTreeMap;
use std::fmt;

/// A ServerQuery command with its parameters.
///
/// A parameter may carry several values; they are sent as
/// `key=v1|key=v2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: BTreeMap<String, Vec<String>>,
}

impl Command {
    /// Create a command without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a value to a parameter
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params
            .entry(key.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Command name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First value of a parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Encode as a single wire line, without the terminator
    pub fn encode(&self) -> String {
        let mut line = escape(&self.name);
        for (key, values) in &self.params {
            let key = escape(key);
            let joined = values
                .iter()
                .map(|value| format!("{}={}", key, escape(value)))
                .collect::<Vec<_>>()
                .join("|");
            line.push(' ');
            line.push_str(&joined);
        }
        line
    }

    /// `login client_login_name=.. client_login_password=..`
    pub fn login(user: &str, password: &str) -> Self {
        Self::new("login")
            .arg("client_login_name", user)
            .arg("client_login_password", password)
    }

    /// `use sid=..`: select a virtual server
    pub fn use_server(server_id: u32) -> Self {
        Self::new("use").arg("sid", server_id)
    }

    /// `servernotifyregister event=server`: subscribe to client connects
    pub fn server_notify_register() -> Self {
        Self::new("servernotifyregister").arg("event", "server")
    }

    /// `version`
    pub fn version() -> Self {
        Self::new("version")
    }

    /// `quit`: end the session gracefully
    pub fn quit() -> Self {
        Self::new("quit")
    }

    /// `servergrouplist`
    pub fn server_group_list() -> Self {
        Self::new("servergrouplist")
    }

    /// `servergroupcopy`: clone `source_sgid` into a new regular group named `name`
    pub fn server_group_copy(source_sgid: u64, name: &str) -> Self {
        Self::new("servergroupcopy")
            .arg("ssgid", source_sgid)
            .arg("tsgid", 0)
            .arg("type", 1)
            .arg("name", name)
    }

    /// `servergroupaddclient sgid=.. cldbid=..`
    pub fn server_group_add_client(sgid: u64, cldbid: u64) -> Self {
        Self::new("servergroupaddclient")
            .arg("sgid", sgid)
            .arg("cldbid", cldbid)
    }

    /// `servergroupdelclient sgid=.. cldbid=..`
    pub fn server_group_del_client(sgid: u64, cldbid: u64) -> Self {
        Self::new("servergroupdelclient")
            .arg("sgid", sgid)
            .arg("cldbid", cldbid)
    }

    /// `servergroupsbyclientid cldbid=..`
    pub fn server_groups_by_client_id(cldbid: u64) -> Self {
        Self::new("servergroupsbyclientid").arg("cldbid", cldbid)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
