//! Sync engine lifecycle and shared state

use crate::authority::ValidationAuthority;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::groups::GroupManager;
use crate::queue::{RegistrationQueue, RegistrationRecord};
use crate::reconcile::ReconcileSummary;
use crate::scheduler::spawn_periodic;
use eve_ts3_core::{Character, UserStore};
use eve_ts3_query::{Command, Connector, Notification, ServerQuery};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of a [`SyncEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Stopping,
}

/// Timer tasks owned by a running engine
#[derive(Default)]
struct Background {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Keeps TS3 group membership in sync with EVE affiliation.
///
/// Holds the registration queue, the ServerQuery session and the timer
/// tasks. Registrations can be queued at any time; notifications and
/// timers only act while the engine is running.
pub struct SyncEngine {
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    store: Arc<dyn UserStore>,
    authority: Arc<dyn ValidationAuthority>,
    clock: Arc<dyn Clock>,
    queue: RegistrationQueue,
    session: RwLock<Option<Arc<dyn ServerQuery>>>,
    group_lock: Arc<Mutex<()>>,
    state: RwLock<EngineState>,
    // Serializes start/stop
    background: Mutex<Background>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        store: Arc<dyn UserStore>,
        authority: Arc<dyn ValidationAuthority>,
    ) -> Self {
        Self {
            config,
            connector,
            store,
            authority,
            clock: Arc::new(SystemClock),
            queue: RegistrationQueue::new(),
            session: RwLock::new(None),
            group_lock: Arc::new(Mutex::new(())),
            state: RwLock::new(EngineState::Stopped),
            background: Mutex::new(Background::default()),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &RegistrationQueue {
        &self.queue
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Registration TTL in seconds, as reported to the web callback
    pub fn register_ttl_secs(&self) -> i64 {
        self.config.register_ttl_secs()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    pub(crate) fn authority(&self) -> &dyn ValidationAuthority {
        self.authority.as_ref()
    }

    /// Group primitives bound to the current session
    pub fn groups(&self) -> Result<GroupManager> {
        let session = self.session()?;
        Ok(GroupManager::new(
            session,
            self.config.reference_group,
            self.config.exempt_group,
        )
        .with_resolve_lock(Arc::clone(&self.group_lock)))
    }

    fn session(&self) -> Result<Arc<dyn ServerQuery>> {
        self.session.read().clone().ok_or(SyncError::NotConnected)
    }

    /// Queue a registration for `character`, keyed by character name.
    ///
    /// A later registration for the same name replaces the earlier one and
    /// restarts its TTL. Returns the TTL in seconds.
    pub fn create_register_record(&self, character: Character) -> i64 {
        let name = character.eve_char_name.clone();
        let record = RegistrationRecord::new(self.clock.now(), character);
        self.queue.put(name.clone(), record);

        info!(character = %name, ttl_secs = self.register_ttl_secs(), "Registration queued");
        self.register_ttl_secs()
    }

    /// Drop expired registrations; returns how many were removed
    pub fn sweep_registrations(&self) -> usize {
        let removed = self
            .queue
            .sweep(self.clock.now(), self.register_ttl_secs());
        if removed > 0 {
            debug!(removed, pending = self.queue.len(), "Swept expired registrations");
        }
        removed
    }

    /// Send a no-op command so the server keeps the session open
    pub async fn keep_alive(&self) -> Result<()> {
        self.session()?.execute(Command::version()).await?;
        trace!("Keepalive sent");
        Ok(())
    }

    /// Connect, log in and select the virtual server
    async fn open_session(&self) -> Result<Arc<dyn ServerQuery>> {
        let session = self.connector.connect(&self.config.address).await?;

        let setup = async {
            session
                .execute(Command::login(&self.config.user, &self.config.password))
                .await?;
            session
                .execute(Command::use_server(self.config.server_id))
                .await
        };

        if let Err(e) = setup.await {
            session.close().await;
            return Err(e.into());
        }

        Ok(session)
    }

    /// Connect to the server, subscribe to connection events and start the
    /// keepalive, sweep and validation timers.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut background = self.background.lock().await;
        let state = self.state();
        if state != EngineState::Stopped {
            return Err(SyncError::InvalidState(format!(
                "cannot start while {:?}",
                state
            )));
        }

        info!(address = %self.config.address, server_id = self.config.server_id, "Starting sync engine");

        let session = self.open_session().await?;
        if let Err(e) = session.execute(Command::server_notify_register()).await {
            session.close().await;
            return Err(e.into());
        }

        let engine = Arc::downgrade(self);
        session.on_notification(Arc::new(move |notification| {
            if let Some(engine) = engine.upgrade() {
                engine.dispatch_notification(notification);
            }
        }));
        *self.session.write() = Some(session);

        let cancel = CancellationToken::new();
        let tasks = vec![
            self.spawn_timer("keepalive", self.config.keepalive_interval, &cancel, |engine| async move {
                engine.keep_alive().await
            }),
            self.spawn_timer("sweep", self.config.sweep_interval, &cancel, |engine| async move {
                engine.sweep_registrations();
                Ok(())
            }),
            self.spawn_timer("validate", self.config.validation_interval, &cancel, |engine| async move {
                engine.validate_users().await.map(|_: ReconcileSummary| ())
            }),
        ];

        *background = Background { cancel, tasks };
        *self.state.write() = EngineState::Running;

        info!("Sync engine running");
        Ok(())
    }

    /// Stop the timers, leave the server and close the session.
    ///
    /// Registrations still queued are kept.
    pub async fn stop(&self) -> Result<()> {
        let mut background = self.background.lock().await;
        let state = self.state();
        if state != EngineState::Running {
            return Err(SyncError::InvalidState(format!(
                "cannot stop while {:?}",
                state
            )));
        }

        *self.state.write() = EngineState::Stopping;
        info!("Stopping sync engine");

        background.cancel.cancel();

        let session = self.session.write().take();
        if let Some(session) = session {
            if let Err(e) = session.execute(Command::quit()).await {
                debug!("quit failed: {}", e);
            }
            session.close().await;
        }

        for task in background.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Timer task ended abnormally: {}", e);
            }
        }

        *self.state.write() = EngineState::Stopped;
        info!("Sync engine stopped");
        Ok(())
    }

    /// One validation pass on a session of its own, without timers or
    /// notifications
    pub async fn validate_once(&self) -> Result<ReconcileSummary> {
        // Excludes start and stop for the whole pass
        let _background = self.background.lock().await;
        let state = self.state();
        if state != EngineState::Stopped {
            return Err(SyncError::InvalidState(format!(
                "cannot run a one-off validation while {:?}",
                state
            )));
        }

        let session = self.open_session().await?;
        *self.session.write() = Some(Arc::clone(&session));

        let result = self.validate_users().await;

        self.session.write().take();
        if let Err(e) = session.execute(Command::quit()).await {
            debug!("quit failed: {}", e);
        }
        session.close().await;

        result
    }

    fn spawn_timer<F, Fut>(
        self: &Arc<Self>,
        name: &'static str,
        period: std::time::Duration,
        cancel: &CancellationToken,
        job: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<SyncEngine>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let engine = Arc::clone(self);
        spawn_periodic(name, period, cancel.clone(), move || job(Arc::clone(&engine)))
    }

    // Runs on the connection's reader task, so the work goes to its own task
    fn dispatch_notification(self: Arc<Self>, notification: Notification) {
        let nickname = notification
            .get("client_nickname")
            .unwrap_or_default()
            .to_string();

        tokio::spawn(async move {
            match self.handle_notification(notification).await {
                Ok(outcome) => trace!(nickname = %nickname, ?outcome, "Notification handled"),
                Err(e) => error!(nickname = %nickname, "Failed to handle notification: {}", e),
            }
        });
    }
}
