//! Server group primitives over a ServerQuery session

use crate::error::{Result, SyncError};
use eve_ts3_core::{ClientDbId, ServerGroupId};
use eve_ts3_query::{
    Command, Record, ServerQuery, ERROR_DATABASE_EMPTY_RESULT, ERROR_DUPLICATE_ENTRY,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Group lookups and membership changes.
///
/// Membership changes are idempotent: adding a member or removing a
/// non-member succeeds. [`resolve`](Self::resolve) is serialized across
/// every manager sharing the same resolve lock, so a name is created once.
#[derive(Clone)]
pub struct GroupManager {
    query: Arc<dyn ServerQuery>,
    reference_group: ServerGroupId,
    exempt_group: ServerGroupId,
    resolve_lock: Arc<Mutex<()>>,
}

impl GroupManager {
    pub fn new(
        query: Arc<dyn ServerQuery>,
        reference_group: ServerGroupId,
        exempt_group: ServerGroupId,
    ) -> Self {
        Self {
            query,
            reference_group,
            exempt_group,
            resolve_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Share a resolve lock with other managers on the same server
    pub fn with_resolve_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.resolve_lock = lock;
        self
    }

    /// Find a group by exact, case-sensitive name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ServerGroupId>> {
        let reply = self.query.execute(Command::server_group_list()).await?;

        for group in reply.records() {
            if group.get("name").map(String::as_str) == Some(name) {
                return parse_sgid(group, "servergrouplist").map(Some);
            }
        }

        Ok(None)
    }

    /// Clone the reference group into a new group called `name`
    pub async fn create_from_template(&self, name: &str) -> Result<ServerGroupId> {
        let reply = self
            .query
            .execute(Command::server_group_copy(self.reference_group.get(), name))
            .await?;

        let group = reply.first().ok_or_else(|| SyncError::UnexpectedReply {
            command: "servergroupcopy".to_string(),
            field: "sgid".to_string(),
        })?;
        let sgid = parse_sgid(group, "servergroupcopy")?;

        info!(group = %name, sgid = %sgid, template = %self.reference_group, "Created server group");
        Ok(sgid)
    }

    /// Find the group called `name`, creating it from the template if absent.
    ///
    /// Returns the id and whether it was created.
    pub async fn resolve(&self, name: &str) -> Result<(ServerGroupId, bool)> {
        // Held across lookup and create
        let _guard = self.resolve_lock.lock().await;
        match self.find_by_name(name).await? {
            Some(sgid) => Ok((sgid, false)),
            None => Ok((self.create_from_template(name).await?, true)),
        }
    }

    /// Add a client to a group; already being a member is success
    pub async fn add_client(&self, sgid: ServerGroupId, cldbid: ClientDbId) -> Result<()> {
        let result = self
            .query
            .execute(Command::server_group_add_client(sgid.get(), cldbid.get()))
            .await;

        match result {
            Ok(_) => {
                debug!(sgid = %sgid, cldbid = %cldbid, "Added client to server group");
                Ok(())
            }
            Err(e) if e.server_id() == Some(ERROR_DUPLICATE_ENTRY) => {
                debug!(sgid = %sgid, cldbid = %cldbid, "Client already in server group");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a client from a group; not being a member is success
    pub async fn remove_client(&self, sgid: ServerGroupId, cldbid: ClientDbId) -> Result<()> {
        let result = self
            .query
            .execute(Command::server_group_del_client(sgid.get(), cldbid.get()))
            .await;

        match result {
            Ok(_) => {
                debug!(sgid = %sgid, cldbid = %cldbid, "Removed client from server group");
                Ok(())
            }
            Err(e) if e.server_id() == Some(ERROR_DATABASE_EMPTY_RESULT) => {
                debug!(sgid = %sgid, cldbid = %cldbid, "Client was not in server group");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Groups the client currently belongs to
    pub async fn client_groups(&self, cldbid: ClientDbId) -> Result<Vec<ServerGroupId>> {
        let result = self
            .query
            .execute(Command::server_groups_by_client_id(cldbid.get()))
            .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) if e.server_id() == Some(ERROR_DATABASE_EMPTY_RESULT) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        reply
            .records()
            .iter()
            .map(|group| parse_sgid(group, "servergroupsbyclientid"))
            .collect()
    }

    /// Remove a client from every group except the exempt one.
    ///
    /// Every group is attempted; the first failure is returned afterwards.
    pub async fn remove_client_from_all(&self, cldbid: ClientDbId) -> Result<Vec<ServerGroupId>> {
        let groups = self.client_groups(cldbid).await?;
        let mut removed = Vec::new();
        let mut first_error = None;

        for sgid in groups {
            if sgid == self.exempt_group {
                continue;
            }
            match self.remove_client(sgid, cldbid).await {
                Ok(()) => removed.push(sgid),
                Err(e) => {
                    warn!(sgid = %sgid, cldbid = %cldbid, "Failed to remove client from server group: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

fn parse_sgid(record: &Record, command: &str) -> Result<ServerGroupId> {
    record
        .get("sgid")
        .and_then(|sgid| sgid.parse().ok())
        .ok_or_else(|| SyncError::UnexpectedReply {
            command: command.to_string(),
            field: "sgid".to_string(),
        })
}

