//! Periodic re-validation of known users

use crate::engine::SyncEngine;
use crate::error::Result;
use crate::groups::GroupManager;
use eve_ts3_core::{group_name, User, ValidationVerdict};
use tracing::{debug, error, info};

/// Counters for one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Verdicts returned by the authority
    pub verdicts: usize,
    /// Active users matched by a verdict
    pub checked: usize,
    pub deactivated: usize,
    pub moved: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserChange {
    Deactivated,
    Moved,
    Unchanged,
}

impl SyncEngine {
    /// Re-validate every active user against the validation authority.
    ///
    /// A failed authority call aborts the pass before any change is made.
    /// Once verdicts are in, each user is handled on its own: a failure is
    /// logged and counted, and the pass moves on. Users the authority did
    /// not return a verdict for are left alone.
    pub async fn validate_users(&self) -> Result<ReconcileSummary> {
        let groups = self.groups()?;

        let ids = self.store().active_character_ids().await?;
        if ids.is_empty() {
            debug!("No active users to validate");
            return Ok(ReconcileSummary::default());
        }

        let verdicts = self.authority().validate(&ids).await?;
        let users = self.store().users().await?;

        let mut summary = ReconcileSummary {
            verdicts: verdicts.len(),
            ..ReconcileSummary::default()
        };

        for verdict in &verdicts {
            let matching = users
                .iter()
                .filter(|user| user.active && user.eve_char_id == verdict.eve_char_id);

            for user in matching {
                summary.checked += 1;
                match self.reconcile_user(&groups, user, verdict).await {
                    Ok(UserChange::Deactivated) => summary.deactivated += 1,
                    Ok(UserChange::Moved) => summary.moved += 1,
                    Ok(UserChange::Unchanged) => summary.unchanged += 1,
                    Err(e) => {
                        summary.failed += 1;
                        error!(
                            char_id = user.eve_char_id,
                            uid = %user.ts3_uid,
                            cldbid = %user.ts3_cldbid,
                            "Failed to reconcile user: {}",
                            e
                        );
                    }
                }
            }
        }

        info!(
            verdicts = summary.verdicts,
            checked = summary.checked,
            deactivated = summary.deactivated,
            moved = summary.moved,
            failed = summary.failed,
            "User validation finished"
        );

        Ok(summary)
    }

    async fn reconcile_user(
        &self,
        groups: &GroupManager,
        user: &User,
        verdict: &ValidationVerdict,
    ) -> Result<UserChange> {
        if !verdict.valid {
            let removed = groups.remove_client_from_all(user.ts3_cldbid).await?;
            self.store().set_user_inactive_by_uid(&user.ts3_uid).await?;
            info!(
                char_id = user.eve_char_id,
                uid = %user.ts3_uid,
                groups = removed.len(),
                "User lost access, deactivated"
            );
            return Ok(UserChange::Deactivated);
        }

        if user.eve_corp_ticker == verdict.eve_corp_ticker
            && user.eve_alli_ticker == verdict.eve_alli_ticker
        {
            return Ok(UserChange::Unchanged);
        }

        let old_group = user.group_name();
        let new_group = group_name(&verdict.eve_alli_ticker, &verdict.eve_corp_ticker);

        // The user may already have been moved out by hand
        if let Some(old_sgid) = groups.find_by_name(&old_group).await? {
            groups.remove_client(old_sgid, user.ts3_cldbid).await?;
        }

        let (new_sgid, _) = groups.resolve(&new_group).await?;
        groups.add_client(new_sgid, user.ts3_cldbid).await?;

        let mut updated = user.clone();
        updated.eve_corp_ticker = verdict.eve_corp_ticker.clone();
        updated.eve_alli_ticker = verdict.eve_alli_ticker.clone();
        self.store().update_user(&updated).await?;

        info!(
            char_id = user.eve_char_id,
            uid = %user.ts3_uid,
            from = %old_group,
            to = %new_group,
            "User affiliation changed, moved group"
        );

        Ok(UserChange::Moved)
    }
}
