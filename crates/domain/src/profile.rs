use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::ports::profile::{ProfileCacheStore, UserDirectory};

pub const PROFILE_CACHE_TTL_SECS: u64 = 3_600;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub photo: Option<String>,
}

pub fn profile_cache_key(user_id: i64) -> String {
    format!("{user_id}_info")
}

/// Stand-in for a user with no directory record. Reads never fail over
/// a missing profile.
pub fn placeholder_profile(user_id: i64) -> UserProfile {
    UserProfile {
        id: user_id,
        username: format!("user{user_id}"),
        photo: None,
    }
}

/// Cache-aside read path over the user directory.
///
/// Cache failures and undecodable entries are treated as misses; a
/// miss falls through to the directory and repopulates the cache.
/// Cache writes are fire-and-forget.
#[derive(Clone)]
pub struct ProfileCache {
    cache: Arc<dyn ProfileCacheStore>,
    directory: Arc<dyn UserDirectory>,
    ttl_secs: u64,
}

impl ProfileCache {
    pub fn new(
        cache: Arc<dyn ProfileCacheStore>,
        directory: Arc<dyn UserDirectory>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            directory,
            ttl_secs,
        }
    }

    pub async fn get_profile(&self, user_id: i64) -> DomainResult<Option<UserProfile>> {
        let key = profile_cache_key(user_id);
        if let Ok(Some(raw)) = self.cache.get(&key).await
            && let Ok(profile) = serde_json::from_str::<UserProfile>(&raw)
        {
            return Ok(Some(profile));
        }

        let Some(profile) = self.directory.get_by_user_id(user_id).await? else {
            return Ok(None);
        };

        if let Ok(raw) = serde_json::to_string(&profile) {
            let _ = self.cache.set(&key, &raw, self.ttl_secs).await;
        }
        Ok(Some(profile))
    }

    pub async fn profile_or_placeholder(&self, user_id: i64) -> DomainResult<UserProfile> {
        Ok(self
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| placeholder_profile(user_id)))
    }
}
