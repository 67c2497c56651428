//! Shared fixtures for sync engine tests
//!
//! An in-memory TS3 server that keeps real group state, a scripted
//! validation authority and a throwaway `SQLite` store.

#![allow(dead_code)]

use async_trait::async_trait;
use eve_ts3_core::{Character, ClientDbId, ServerGroupId, ValidationVerdict};
use eve_ts3_query::{
    Command, Connector, Notification, NotificationHandler, QueryError, Record, Reply,
    ServerQuery, ERROR_DATABASE_EMPTY_RESULT, ERROR_DUPLICATE_ENTRY,
};
use eve_ts3_storage::SqliteUserStore;
use eve_ts3_sync::{ManualClock, SyncConfig, SyncEngine, SyncError, ValidationAuthority};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const REFERENCE_GROUP: u64 = 7;
pub const EXEMPT_GROUP: u64 = 6;

#[derive(Default)]
struct ServerState {
    groups: BTreeMap<u64, String>,
    members: BTreeMap<u64, BTreeSet<u64>>,
    next_sgid: u64,
    log: Vec<Command>,
    failing_commands: HashSet<String>,
    failing_clients: HashSet<u64>,
    closed: bool,
}

/// In-memory ServerQuery session with server group bookkeeping
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
    handler: Mutex<Option<NotificationHandler>>,
}

impl FakeServer {
    /// A server with the template and exempt groups in place
    pub fn new() -> Arc<Self> {
        let server = Self::default();
        {
            let mut state = server.state.lock();
            state.groups.insert(EXEMPT_GROUP, "Guest".to_string());
            state.groups.insert(REFERENCE_GROUP, "Template".to_string());
            state.next_sgid = 100;
        }
        Arc::new(server)
    }

    pub fn add_group(&self, sgid: u64, name: &str) {
        self.state.lock().groups.insert(sgid, name.to_string());
    }

    pub fn add_member(&self, sgid: u64, cldbid: u64) {
        self.state
            .lock()
            .members
            .entry(cldbid)
            .or_default()
            .insert(sgid);
    }

    pub fn group_id(&self, name: &str) -> Option<u64> {
        self.state
            .lock()
            .groups
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(sgid, _)| *sgid)
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    pub fn member_groups(&self, cldbid: u64) -> Vec<u64> {
        self.state
            .lock()
            .members
            .get(&cldbid)
            .map(|groups| groups.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Names of every command received, in order
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Number of commands that change server state
    pub fn mutation_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|name| {
                matches!(
                    name.as_str(),
                    "servergroupcopy" | "servergroupaddclient" | "servergroupdelclient"
                )
            })
            .count()
    }

    /// Make every `name` command fail
    pub fn fail_command(&self, name: &str) {
        self.state.lock().failing_commands.insert(name.to_string());
    }

    /// Make every command addressing `cldbid` fail
    pub fn fail_client(&self, cldbid: u64) {
        self.state.lock().failing_clients.insert(cldbid);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Push a notification to the registered handler
    pub fn emit(&self, notification: Notification) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(notification);
        }
    }

    fn reply(&self, command: &Command) -> Result<Reply, QueryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueryError::ConnectionClosed);
        }
        state.log.push(command.clone());

        let cldbid = command.param("cldbid").and_then(|v| v.parse::<u64>().ok());
        if state.failing_commands.contains(command.name())
            || cldbid.is_some_and(|id| state.failing_clients.contains(&id))
        {
            return Err(server_error(9999, "injected failure"));
        }

        let number = |key: &str| -> Result<u64, QueryError> {
            command
                .param(key)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| server_error(1538, "invalid parameter"))
        };

        match command.name() {
            "login" | "use" | "servernotifyregister" | "version" | "quit" => Ok(Reply::default()),
            "servergrouplist" => Ok(Reply::new(
                state
                    .groups
                    .iter()
                    .map(|(sgid, name)| {
                        record(&[("sgid", &sgid.to_string()), ("name", name), ("type", "1")])
                    })
                    .collect(),
            )),
            "servergroupcopy" => {
                let source = number("ssgid")?;
                let name = command.param("name").unwrap_or_default().to_string();
                if !state.groups.contains_key(&source) {
                    return Err(server_error(2560, "invalid group ID"));
                }
                if state.groups.values().any(|n| *n == name) {
                    return Err(server_error(1282, "database duplicate entry"));
                }
                let sgid = state.next_sgid;
                state.next_sgid += 1;
                state.groups.insert(sgid, name);
                Ok(Reply::new(vec![record(&[("sgid", &sgid.to_string())])]))
            }
            "servergroupaddclient" => {
                let sgid = number("sgid")?;
                let cldbid = number("cldbid")?;
                if !state.members.entry(cldbid).or_default().insert(sgid) {
                    return Err(server_error(ERROR_DUPLICATE_ENTRY, "duplicate entry"));
                }
                Ok(Reply::default())
            }
            "servergroupdelclient" => {
                let sgid = number("sgid")?;
                let cldbid = number("cldbid")?;
                let removed = state
                    .members
                    .get_mut(&cldbid)
                    .is_some_and(|groups| groups.remove(&sgid));
                if !removed {
                    return Err(server_error(
                        ERROR_DATABASE_EMPTY_RESULT,
                        "database empty result set",
                    ));
                }
                Ok(Reply::default())
            }
            "servergroupsbyclientid" => {
                let cldbid = number("cldbid")?;
                let groups: Vec<Record> = state
                    .members
                    .get(&cldbid)
                    .into_iter()
                    .flatten()
                    .map(|sgid| {
                        let name = state.groups.get(sgid).cloned().unwrap_or_default();
                        record(&[
                            ("name", &name),
                            ("sgid", &sgid.to_string()),
                            ("cldbid", &cldbid.to_string()),
                        ])
                    })
                    .collect();
                if groups.is_empty() {
                    return Err(server_error(
                        ERROR_DATABASE_EMPTY_RESULT,
                        "database empty result set",
                    ));
                }
                Ok(Reply::new(groups))
            }
            _ => Err(server_error(256, "command not found")),
        }
    }
}

#[async_trait]
impl ServerQuery for FakeServer {
    async fn execute(&self, command: Command) -> Result<Reply, QueryError> {
        self.reply(&command)
    }

    fn on_notification(&self, handler: NotificationHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn close(&self) {
        self.state.lock().closed = true;
        self.handler.lock().take();
    }
}

/// Hands control back to the runtime before every command, so concurrent
/// callers interleave between round trips the way a real socket would.
pub struct YieldingServer {
    pub inner: Arc<FakeServer>,
}

#[async_trait]
impl ServerQuery for YieldingServer {
    async fn execute(&self, command: Command) -> Result<Reply, QueryError> {
        tokio::task::yield_now().await;
        let reply = self.inner.execute(command).await;
        tokio::task::yield_now().await;
        reply
    }

    fn on_notification(&self, handler: NotificationHandler) {
        self.inner.on_notification(handler);
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

fn server_error(id: u32, message: &str) -> QueryError {
    QueryError::Server {
        id,
        message: message.to_string(),
    }
}

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Hands out the same [`FakeServer`] on every connect
pub struct FakeConnector {
    server: Arc<FakeServer>,
    connects: AtomicUsize,
    refuse: AtomicBool,
    yielding: AtomicBool,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            yielding: AtomicBool::new(false),
        })
    }

    pub fn refuse(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Wrap later sessions in a [`YieldingServer`]
    pub fn set_yielding(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ServerQuery>, QueryError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(QueryError::Connect {
                address: address.to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.server.state.lock().closed = false;
        let session: Arc<dyn ServerQuery> = if self.yielding.load(Ordering::SeqCst) {
            Arc::new(YieldingServer {
                inner: self.server.clone(),
            })
        } else {
            self.server.clone()
        };
        Ok(session)
    }
}

/// Validation authority answering from a fixed verdict list
#[derive(Default)]
pub struct ScriptedAuthority {
    verdicts: Mutex<Vec<ValidationVerdict>>,
    requests: Mutex<Vec<Vec<i32>>>,
    unavailable: AtomicBool,
}

impl ScriptedAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_verdicts(&self, verdicts: Vec<ValidationVerdict>) {
        *self.verdicts.lock() = verdicts;
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    /// Id lists of every request made so far
    pub fn requests(&self) -> Vec<Vec<i32>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ValidationAuthority for ScriptedAuthority {
    async fn validate(&self, char_ids: &[i32]) -> Result<Vec<ValidationVerdict>, SyncError> {
        self.requests.lock().push(char_ids.to_vec());
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::AuthorityStatus {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self
            .verdicts
            .lock()
            .iter()
            .filter(|v| char_ids.contains(&v.eve_char_id))
            .cloned()
            .collect())
    }
}

pub fn verdict(char_id: i32, corp: &str, alli: &str, valid: bool) -> ValidationVerdict {
    ValidationVerdict {
        eve_char_id: char_id,
        eve_corp_ticker: corp.to_string(),
        eve_alli_ticker: alli.to_string(),
        valid,
    }
}

pub fn character(char_id: i32, name: &str, corp: &str, alli: &str) -> Character {
    Character::new(char_id, name, corp, alli)
}

/// A fresh-connection `notifycliententerview`
pub fn client_connected(nickname: &str, uid: &str, cldbid: u64) -> Notification {
    client_entered(nickname, uid, cldbid, "0")
}

pub fn client_entered(nickname: &str, uid: &str, cldbid: u64, reason: &str) -> Notification {
    Notification::new(
        "notifycliententerview",
        vec![record(&[
            ("cfid", "0"),
            ("ctid", "1"),
            ("reasonid", reason),
            ("clid", "5"),
            ("client_unique_identifier", uid),
            ("client_nickname", nickname),
            ("client_database_id", &cldbid.to_string()),
            ("client_type", "0"),
        ])],
    )
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        reference_group: ServerGroupId::new(REFERENCE_GROUP),
        exempt_group: ServerGroupId::new(EXEMPT_GROUP),
        register_ttl: Duration::from_secs(300),
        ..SyncConfig::default()
    }
}

pub fn cldbid(id: u64) -> ClientDbId {
    ClientDbId::new(id)
}

/// Engine wired to fakes and a temp-file `SQLite` store
pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub server: Arc<FakeServer>,
    pub connector: Arc<FakeConnector>,
    pub authority: Arc<ScriptedAuthority>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteUserStore>,
    _temp_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(sync_config()).await
    }

    pub async fn with_config(config: SyncConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}", temp_dir.path().join("test.db").display());
        let pool = eve_ts3_storage::create_pool(&db_url)
            .await
            .expect("Failed to create pool");
        eve_ts3_storage::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let server = FakeServer::new();
        let connector = FakeConnector::new(server.clone());
        let authority = ScriptedAuthority::new();
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(SqliteUserStore::new(pool));

        let engine = SyncEngine::new(config, connector.clone(), store.clone(), authority.clone())
            .with_clock(clock.clone());

        Self {
            engine: Arc::new(engine),
            server,
            connector,
            authority,
            clock,
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Harness with the engine already started
    pub async fn running() -> Self {
        let harness = Self::new().await;
        harness.engine.start().await.expect("Failed to start engine");
        harness
    }
}
