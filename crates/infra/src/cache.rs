use kumpul_domain::DomainResult;
use kumpul_domain::error::DomainError;
use kumpul_domain::ports::BoxFuture;
use kumpul_domain::ports::profile::ProfileCacheStore;
use metrics::counter;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const PROFILE_CACHE_ERRORS_TOTAL: &str = "kumpul_infra_profile_cache_errors_total";

/// Redis-backed profile cache. Callers treat every error as a cache
/// miss, so failures are surfaced as `Unavailable` and counted rather
/// than retried here.
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> DomainResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| DomainError::Unavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| DomainError::Unavailable(err.to_string()))?;
        Ok(Self { manager })
    }
}

impl ProfileCacheStore for RedisCacheStore {
    fn get(&self, key: &str) -> BoxFuture<'_, DomainResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let value: Option<String> = conn.get(&key).await.map_err(|err| {
                counter!(PROFILE_CACHE_ERRORS_TOTAL, "op" => "get").increment(1);
                DomainError::Unavailable(err.to_string())
            })?;
            Ok(value)
        })
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        expire_secs: u64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let () = conn.set_ex(&key, value, expire_secs).await.map_err(|err| {
                counter!(PROFILE_CACHE_ERRORS_TOTAL, "op" => "set").increment(1);
                DomainError::Unavailable(err.to_string())
            })?;
            Ok(())
        })
    }
}
