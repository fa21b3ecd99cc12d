use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::group::GroupRepository;
use crate::ports::mute::MuteRepository;
use crate::util::now_ms;

/// Per-user, per-group notification preference. One record per
/// `(user_id, group_id)` pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MuteStatus {
    pub user_id: i64,
    pub group_id: String,
    pub muted: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone)]
pub struct MuteService {
    groups: Arc<dyn GroupRepository>,
    mutes: Arc<dyn MuteRepository>,
}

impl MuteService {
    pub fn new(groups: Arc<dyn GroupRepository>, mutes: Arc<dyn MuteRepository>) -> Self {
        Self { groups, mutes }
    }

    /// Reads the caller's mute preference, durably materializing the
    /// unmuted default on first read. Concurrent first reads converge
    /// on a single stored record.
    pub async fn get_status(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
    ) -> DomainResult<MuteStatus> {
        self.assert_actor_is_member(actor, group_id).await?;
        if let Some(status) = self.mutes.get(actor.user_id, group_id).await? {
            return Ok(status);
        }

        let now = now_ms();
        self.mutes
            .put_if_absent(&MuteStatus {
                user_id: actor.user_id,
                group_id: group_id.to_string(),
                muted: false,
                created_at_ms: now,
                updated_at_ms: now,
            })
            .await
    }

    pub async fn set_status(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        muted: bool,
    ) -> DomainResult<MuteStatus> {
        self.assert_actor_is_member(actor, group_id).await?;
        let now = now_ms();
        self.mutes
            .upsert(&MuteStatus {
                user_id: actor.user_id,
                group_id: group_id.to_string(),
                muted,
                created_at_ms: now,
                updated_at_ms: now,
            })
            .await
    }

    async fn assert_actor_is_member(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
    ) -> DomainResult<()> {
        let group = self
            .groups
            .get(group_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if !group.members.contains(&actor.user_id) {
            return Err(DomainError::Forbidden(
                "user is not a member of this group".into(),
            ));
        }
        Ok(())
    }
}
