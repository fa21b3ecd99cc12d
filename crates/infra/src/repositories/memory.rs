use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kumpul_domain::DomainResult;
use kumpul_domain::error::DomainError;
use kumpul_domain::group::{Group, GroupState};
use kumpul_domain::mute::MuteStatus;
use kumpul_domain::notify::{NotificationQuery, SystemNotification};
use kumpul_domain::ports::BoxFuture;
use kumpul_domain::ports::group::GroupRepository;
use kumpul_domain::ports::mute::MuteRepository;
use kumpul_domain::ports::notify::NotificationRepository;
use kumpul_domain::ports::profile::{ProfileCacheStore, UserDirectory};
use kumpul_domain::profile::UserProfile;
use tokio::sync::RwLock;

/// Group store for the `memory` data backend. Each mutation holds the
/// write guard across the member set and the count, so the two are
/// never observable out of sync.
#[derive(Default)]
pub struct InMemoryGroupRepository {
    store: Arc<RwLock<HashMap<String, Group>>>,
}

impl InMemoryGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupRepository for InMemoryGroupRepository {
    fn insert(&self, group: &Group) -> BoxFuture<'_, DomainResult<Group>> {
        let group = group.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if store.contains_key(&group.group_id) {
                return Err(DomainError::Conflict);
            }
            store.insert(group.group_id.clone(), group.clone());
            Ok(group)
        })
    }

    fn get(&self, group_id: &str) -> BoxFuture<'_, DomainResult<Option<Group>>> {
        let group_id = group_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store.get(&group_id).cloned())
        })
    }

    fn list_joined(
        &self,
        user_id: i64,
        limit: usize,
    ) -> BoxFuture<'_, DomainResult<Vec<Group>>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut joined: Vec<_> = store
                .read()
                .await
                .values()
                .filter(|group| {
                    group.state == GroupState::Active && group.members.contains(&user_id)
                })
                .cloned()
                .collect();
            joined.sort_by(|left, right| {
                right
                    .created_at_ms
                    .cmp(&left.created_at_ms)
                    .then_with(|| right.group_id.cmp(&left.group_id))
            });
            joined.truncate(limit);
            Ok(joined)
        })
    }

    fn add_members(
        &self,
        group_id: &str,
        user_ids: &[i64],
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>> {
        let group_id = group_id.to_string();
        let user_ids = user_ids.to_vec();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let group = store.get_mut(&group_id).ok_or(DomainError::NotFound)?;
            if group.state == GroupState::Dismissed {
                return Err(DomainError::Conflict);
            }
            for user_id in user_ids {
                if !group.members.contains(&user_id) {
                    group.members.push(user_id);
                }
            }
            group.members_count = group.members.len();
            group.updated_at_ms = updated_at_ms;
            Ok(group.clone())
        })
    }

    fn remove_member(
        &self,
        group_id: &str,
        user_id: i64,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>> {
        let group_id = group_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let group = store.get_mut(&group_id).ok_or(DomainError::NotFound)?;
            if group.state == GroupState::Dismissed {
                return Err(DomainError::Conflict);
            }
            let position = group
                .members
                .iter()
                .position(|member| *member == user_id)
                .ok_or(DomainError::NotFound)?;
            group.members.remove(position);
            group.members_count = group.members.len();
            group.updated_at_ms = updated_at_ms;
            Ok(group.clone())
        })
    }

    fn rename(
        &self,
        group_id: &str,
        name: &str,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>> {
        let group_id = group_id.to_string();
        let name = name.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let group = store.get_mut(&group_id).ok_or(DomainError::NotFound)?;
            if group.state == GroupState::Dismissed {
                return Err(DomainError::Conflict);
            }
            group.name = name;
            group.updated_at_ms = updated_at_ms;
            Ok(group.clone())
        })
    }

    fn dismiss(
        &self,
        group_id: &str,
        dismissed_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>> {
        let group_id = group_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let group = store.get_mut(&group_id).ok_or(DomainError::NotFound)?;
            if group.state == GroupState::Dismissed {
                return Err(DomainError::Conflict);
            }
            group.state = GroupState::Dismissed;
            group.dismissed_at_ms = Some(dismissed_at_ms);
            group.updated_at_ms = dismissed_at_ms;
            Ok(group.clone())
        })
    }
}

#[derive(Default)]
pub struct InMemoryMuteRepository {
    records: Arc<RwLock<HashMap<(i64, String), MuteStatus>>>,
}

impl InMemoryMuteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MuteRepository for InMemoryMuteRepository {
    fn get(
        &self,
        user_id: i64,
        group_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<MuteStatus>>> {
        let key = (user_id, group_id.to_string());
        let records = self.records.clone();
        Box::pin(async move {
            let records = records.read().await;
            Ok(records.get(&key).cloned())
        })
    }

    fn put_if_absent(&self, status: &MuteStatus) -> BoxFuture<'_, DomainResult<MuteStatus>> {
        let status = status.clone();
        let records = self.records.clone();
        Box::pin(async move {
            let key = (status.user_id, status.group_id.clone());
            let mut records = records.write().await;
            Ok(records.entry(key).or_insert(status).clone())
        })
    }

    fn upsert(&self, status: &MuteStatus) -> BoxFuture<'_, DomainResult<MuteStatus>> {
        let mut status = status.clone();
        let records = self.records.clone();
        Box::pin(async move {
            let key = (status.user_id, status.group_id.clone());
            let mut records = records.write().await;
            if let Some(existing) = records.get(&key) {
                status.created_at_ms = existing.created_at_ms;
            }
            records.insert(key, status.clone());
            Ok(status)
        })
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    entries: Arc<RwLock<Vec<SystemNotification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationRepository for InMemoryNotificationRepository {
    fn append(
        &self,
        notification: &SystemNotification,
    ) -> BoxFuture<'_, DomainResult<SystemNotification>> {
        let notification = notification.clone();
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut entries = entries.write().await;
            entries.push(notification.clone());
            Ok(notification)
        })
    }

    fn list(
        &self,
        query: &NotificationQuery,
    ) -> BoxFuture<'_, DomainResult<Vec<SystemNotification>>> {
        let query = query.clone();
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut matching: Vec<_> = entries
                .read()
                .await
                .iter()
                .filter(|entry| {
                    entry.group_id == query.group_id
                        && query
                            .before_ms
                            .is_none_or(|before| entry.created_at_ms < before)
                })
                .cloned()
                .collect();
            matching.sort_by(|left, right| {
                right
                    .created_at_ms
                    .cmp(&left.created_at_ms)
                    .then_with(|| right.id.cmp(&left.id))
            });
            matching.truncate(query.limit);
            Ok(matching)
        })
    }
}

/// Seedable directory for the `memory` backend and tests.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<i64, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, profile: UserProfile) {
        let mut users = self.users.write().await;
        users.insert(profile.id, profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get_by_user_id(&self, user_id: i64) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let users = self.users.clone();
        Box::pin(async move {
            let users = users.read().await;
            Ok(users.get(&user_id).cloned())
        })
    }
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileCacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> BoxFuture<'_, DomainResult<Option<String>>> {
        let key = key.to_string();
        let entries = self.entries.clone();
        Box::pin(async move {
            let entries = entries.read().await;
            let value = entries
                .get(&key)
                .filter(|entry| Instant::now() < entry.expires_at)
                .map(|entry| entry.value.clone());
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
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut entries = entries.write().await;
            entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: Instant::now() + Duration::from_secs(expire_secs),
                },
            );
            Ok(())
        })
    }
}
