use std::sync::Arc;

use anyhow::Context;
use kumpul_domain::group::GroupService;
use kumpul_domain::mute::MuteService;
use kumpul_domain::notify::NotificationService;
use kumpul_domain::ports::db::DbAdapter;
use kumpul_domain::ports::group::GroupRepository;
use kumpul_domain::ports::mute::MuteRepository;
use kumpul_domain::ports::notify::NotificationRepository;
use kumpul_domain::ports::profile::{ProfileCacheStore, UserDirectory};
use kumpul_domain::profile::ProfileCache;
use kumpul_infra::cache::RedisCacheStore;
use kumpul_infra::config::AppConfig;
use kumpul_infra::db::{DbConfig, SurrealAdapter};
use kumpul_infra::directory::HttpUserDirectory;
use kumpul_infra::repositories::{
    InMemoryGroupRepository, InMemoryMuteRepository, InMemoryNotificationRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub groups: GroupService,
    pub mutes: MuteService,
    pub notifications: NotificationService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.data_backend.eq_ignore_ascii_case("surreal") {
            let adapter = SurrealAdapter::new(DbConfig::from_app_config(&config));
            adapter
                .health_check()
                .await
                .context("document store health check failed")?;
        }

        let cache: Arc<dyn ProfileCacheStore> = Arc::new(
            RedisCacheStore::connect(&config.redis_url)
                .await
                .map_err(|err| anyhow::anyhow!("redis connect failed: {err}"))?,
        );
        let directory: Arc<dyn UserDirectory> = Arc::new(HttpUserDirectory::from_config(&config));
        let profiles = ProfileCache::new(cache, directory, config.profile_cache_ttl_secs);

        Ok(Self::with_repositories(
            config,
            Arc::new(InMemoryGroupRepository::new()),
            Arc::new(InMemoryMuteRepository::new()),
            Arc::new(InMemoryNotificationRepository::new()),
            profiles,
        ))
    }

    pub fn with_repositories(
        config: AppConfig,
        group_repo: Arc<dyn GroupRepository>,
        mute_repo: Arc<dyn MuteRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
        profiles: ProfileCache,
    ) -> Self {
        let groups = GroupService::new(group_repo.clone(), profiles);
        let mutes = MuteService::new(group_repo.clone(), mute_repo);
        let notifications = NotificationService::new(group_repo, notification_repo);
        Self {
            config,
            groups,
            mutes,
            notifications,
        }
    }
}
