use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::profile::UserProfile;

/// Key/value cache with per-entry expiry. Entries are disposable
/// projections; callers must treat every failure as a miss.
pub trait ProfileCacheStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'_, DomainResult<Option<String>>>;

    fn set(
        &self,
        key: &str,
        value: &str,
        expire_secs: u64,
    ) -> BoxFuture<'_, DomainResult<()>>;
}

/// Source of truth for user profiles.
pub trait UserDirectory: Send + Sync {
    fn get_by_user_id(&self, user_id: i64) -> BoxFuture<'_, DomainResult<Option<UserProfile>>>;
}
