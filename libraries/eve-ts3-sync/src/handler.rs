//! Group assignment on client connect

use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::queue::Claim;
use eve_ts3_core::{ClientDbId, NewUser, ServerGroupId};
use eve_ts3_query::Notification;
use tracing::{debug, info};

/// Notification sent when a client becomes visible to the query client
pub const EVENT_CLIENT_ENTER_VIEW: &str = "notifycliententerview";

/// `reasonid` of a client that just connected (not moved or switched channel)
pub const REASON_FRESH_CONNECTION: &str = "0";

/// What [`SyncEngine::handle_notification`] did with a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Not a fresh connection
    Ignored,
    /// No registration for this nickname
    NotPending,
    /// A registration exists but ran out before the client connected
    Expired,
    /// The client was added to its group and the user persisted
    Assigned {
        sgid: ServerGroupId,
        created_group: bool,
        created_user: bool,
    },
}

/// The client fields of a `notifycliententerview`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectedClient {
    uid: String,
    nickname: String,
    cldbid: ClientDbId,
}

impl ConnectedClient {
    fn from_notification(notification: &Notification) -> Result<Self> {
        let field = |key: &str| {
            notification
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| SyncError::MalformedNotification(format!("missing {}", key)))
        };

        let cldbid = field("client_database_id")?;
        let cldbid = cldbid.parse().map_err(|_| {
            SyncError::MalformedNotification(format!("invalid client_database_id '{}'", cldbid))
        })?;

        Ok(Self {
            uid: field("client_unique_identifier")?,
            nickname: field("client_nickname")?,
            cldbid,
        })
    }
}

impl SyncEngine {
    /// React to one ServerQuery notification.
    ///
    /// A fresh connection whose nickname has a live registration claims that
    /// registration, joins the `"<alliance> <corp>"` group (created from the
    /// template if needed) and is persisted. A failure part-way leaves the
    /// registration consumed and earlier group changes in place.
    pub async fn handle_notification(&self, notification: Notification) -> Result<HandleOutcome> {
        if notification.kind != EVENT_CLIENT_ENTER_VIEW
            || notification.get("reasonid") != Some(REASON_FRESH_CONNECTION)
        {
            return Ok(HandleOutcome::Ignored);
        }

        let client = ConnectedClient::from_notification(&notification)?;
        let now = self.clock().now();

        let record = match self
            .queue()
            .claim(&client.nickname, now, self.config().register_ttl_secs())
        {
            Claim::Missing => return Ok(HandleOutcome::NotPending),
            Claim::Expired(record) => {
                debug!(
                    nickname = %client.nickname,
                    age_secs = now - record.created_at,
                    "Registration expired before connect"
                );
                return Ok(HandleOutcome::Expired);
            }
            Claim::Claimed(record) => record,
        };

        let groups = self.groups()?;
        let group = record.character.group_name();
        let (sgid, created_group) = groups.resolve(&group).await?;
        groups.add_client(sgid, client.cldbid).await?;

        let user = NewUser::confirmed(record.character, client.uid.clone(), client.cldbid);
        let created_user = if self.store().uid_exists(&client.uid).await? {
            self.store().update_user_by_uid(&user).await?;
            false
        } else {
            self.store().create_user(user).await?;
            true
        };

        info!(
            nickname = %client.nickname,
            uid = %client.uid,
            cldbid = %client.cldbid,
            group = %group,
            sgid = %sgid,
            "Registered client assigned to server group"
        );

        Ok(HandleOutcome::Assigned {
            sgid,
            created_group,
            created_user,
        })
    }
}
