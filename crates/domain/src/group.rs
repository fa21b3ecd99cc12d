use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::group::GroupRepository;
use crate::profile::ProfileCache;
use crate::util::{new_group_id, now_ms};

const MAX_NAME_LENGTH: usize = 20;
const MAX_AVATAR_MEMBERS: usize = 9;
const MAX_JOINED_GROUPS: usize = 50;
const DEFAULT_JOINED_GROUPS: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Active,
    Dismissed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub creator_id: i64,
    pub members: Vec<i64>,
    pub members_count: usize,
    pub state: GroupState,
    pub photo: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub dismissed_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCreate {
    pub name: String,
    pub members: Vec<i64>,
    pub photo: Option<String>,
}

/// Directory projection of one member, placeholder-filled when the
/// directory has no record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberProfile {
    pub id: i64,
    pub username: String,
    pub photo: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMembers {
    pub group_id: String,
    pub members: Vec<MemberProfile>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupInfo {
    pub group: Group,
    pub avatar_photos: Vec<String>,
}

#[derive(Clone)]
pub struct GroupService {
    repository: Arc<dyn GroupRepository>,
    profiles: ProfileCache,
}

impl GroupService {
    pub fn new(repository: Arc<dyn GroupRepository>, profiles: ProfileCache) -> Self {
        Self {
            repository,
            profiles,
        }
    }

    pub async fn create_group(
        &self,
        actor: &ActorIdentity,
        input: GroupCreate,
    ) -> DomainResult<Group> {
        let name = validate_group_name(&input.name)?;
        let now = now_ms();
        let members = dedup_with_creator(actor.user_id, &input.members);

        let group = Group {
            group_id: new_group_id(),
            name,
            creator_id: actor.user_id,
            members_count: members.len(),
            members,
            state: GroupState::Active,
            photo: input.photo,
            created_at_ms: now,
            updated_at_ms: now,
            dismissed_at_ms: None,
        };
        self.repository.insert(&group).await
    }

    pub async fn get_group(&self, group_id: &str) -> DomainResult<Group> {
        self.repository
            .get(group_id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn joined_groups(
        &self,
        actor: &ActorIdentity,
        limit: Option<usize>,
    ) -> DomainResult<Vec<Group>> {
        self.repository
            .list_joined(actor.user_id, joined_groups_limit(limit))
            .await
    }

    pub async fn group_info(&self, group_id: &str) -> DomainResult<GroupInfo> {
        let group = self.get_group(group_id).await?;
        let avatar_photos = self.avatar_photos_for(&group).await?;
        Ok(GroupInfo {
            group,
            avatar_photos,
        })
    }

    pub async fn avatar_photos(&self, group_id: &str) -> DomainResult<Vec<String>> {
        let group = self.get_group(group_id).await?;
        self.avatar_photos_for(&group).await
    }

    pub async fn members_with_profiles(&self, group_id: &str) -> DomainResult<GroupMembers> {
        let group = self.get_group(group_id).await?;
        let mut members = Vec::with_capacity(group.members.len());
        for &user_id in &group.members {
            let profile = self.profiles.profile_or_placeholder(user_id).await?;
            members.push(MemberProfile {
                id: user_id,
                username: profile.username,
                photo: profile.photo.unwrap_or_default(),
            });
        }
        Ok(GroupMembers {
            group_id: group.group_id,
            members,
        })
    }

    /// Resolves each candidate against the user directory first; ids
    /// with no directory record are skipped, not rejected. The store
    /// drops ids already present and adjusts the count by the number
    /// actually appended.
    pub async fn add_members(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        user_ids: Vec<i64>,
    ) -> DomainResult<Group> {
        let group = self.assert_actor_is_member(actor, group_id).await?;
        if group.state == GroupState::Dismissed {
            return Err(DomainError::Conflict);
        }

        let mut known = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if self.profiles.get_profile(user_id).await?.is_some() {
                known.push(user_id);
            }
        }
        self.repository
            .add_members(group_id, &known, now_ms())
            .await
    }

    pub async fn remove_member(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        user_id: i64,
    ) -> DomainResult<Group> {
        let group = self.get_group(group_id).await?;
        if actor.user_id != group.creator_id {
            return Err(DomainError::Forbidden(
                "only the creator can remove members".into(),
            ));
        }
        if user_id == group.creator_id {
            return Err(DomainError::Forbidden("creator cannot be removed".into()));
        }
        self.repository
            .remove_member(group_id, user_id, now_ms())
            .await
    }

    pub async fn rename_group(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        name: &str,
    ) -> DomainResult<Group> {
        let name = validate_group_name(name)?;
        self.assert_actor_is_member(actor, group_id).await?;
        self.repository.rename(group_id, &name, now_ms()).await
    }

    pub async fn exit_group(&self, actor: &ActorIdentity, group_id: &str) -> DomainResult<Group> {
        let group = self.get_group(group_id).await?;
        if actor.user_id == group.creator_id {
            return Err(DomainError::Forbidden(
                "creator cannot exit; dismiss the group instead".into(),
            ));
        }
        self.repository
            .remove_member(group_id, actor.user_id, now_ms())
            .await
    }

    pub async fn dismiss_group(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
    ) -> DomainResult<Group> {
        let group = self.get_group(group_id).await?;
        if actor.user_id != group.creator_id {
            return Err(DomainError::Forbidden(
                "only the creator can dismiss the group".into(),
            ));
        }
        self.repository.dismiss(group_id, now_ms()).await
    }

    async fn assert_actor_is_member(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
    ) -> DomainResult<Group> {
        let group = self.get_group(group_id).await?;
        if !group.members.contains(&actor.user_id) {
            return Err(DomainError::Forbidden(
                "user is not a member of this group".into(),
            ));
        }
        Ok(group)
    }

    async fn avatar_photos_for(&self, group: &Group) -> DomainResult<Vec<String>> {
        let mut ordered = Vec::with_capacity(MAX_AVATAR_MEMBERS);
        ordered.push(group.creator_id);
        for &member in &group.members {
            if ordered.len() == MAX_AVATAR_MEMBERS {
                break;
            }
            if member != group.creator_id {
                ordered.push(member);
            }
        }

        let mut photos = Vec::with_capacity(ordered.len());
        for user_id in ordered {
            let photo = self
                .profiles
                .get_profile(user_id)
                .await?
                .and_then(|profile| profile.photo)
                .unwrap_or_default();
            photos.push(photo);
        }
        Ok(photos)
    }
}

fn validate_group_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    let length = name.chars().count();
    if length == 0 {
        return Err(DomainError::Validation("name is required".into()));
    }
    if length > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "name exceeds max length of {MAX_NAME_LENGTH}"
        )));
    }
    Ok(name.to_string())
}

fn dedup_with_creator(creator_id: i64, requested: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut members = vec![creator_id];
    seen.insert(creator_id);
    for &user_id in requested {
        if seen.insert(user_id) {
            members.push(user_id);
        }
    }
    members
}

pub fn joined_groups_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_JOINED_GROUPS)
        .clamp(1, MAX_JOINED_GROUPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BoxFuture;
    use crate::ports::profile::{ProfileCacheStore, UserDirectory};
    use crate::profile::UserProfile;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct MockGroupRepo {
        groups: Arc<RwLock<HashMap<String, Group>>>,
    }

    impl GroupRepository for MockGroupRepo {
        fn insert(&self, group: &Group) -> BoxFuture<'_, DomainResult<Group>> {
            let group = group.clone();
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut groups = groups.write().await;
                if groups.contains_key(&group.group_id) {
                    return Err(DomainError::Conflict);
                }
                groups.insert(group.group_id.clone(), group.clone());
                Ok(group)
            })
        }

        fn get(&self, group_id: &str) -> BoxFuture<'_, DomainResult<Option<Group>>> {
            let group_id = group_id.to_string();
            let groups = self.groups.clone();
            Box::pin(async move {
                let groups = groups.read().await;
                Ok(groups.get(&group_id).cloned())
            })
        }

        fn list_joined(
            &self,
            user_id: i64,
            limit: usize,
        ) -> BoxFuture<'_, DomainResult<Vec<Group>>> {
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut joined: Vec<_> = groups
                    .read()
                    .await
                    .values()
                    .filter(|group| {
                        group.state == GroupState::Active && group.members.contains(&user_id)
                    })
                    .cloned()
                    .collect();
                joined.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
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
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut groups = groups.write().await;
                let group = groups.get_mut(&group_id).ok_or(DomainError::NotFound)?;
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
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut groups = groups.write().await;
                let group = groups.get_mut(&group_id).ok_or(DomainError::NotFound)?;
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
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut groups = groups.write().await;
                let group = groups.get_mut(&group_id).ok_or(DomainError::NotFound)?;
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
            let groups = self.groups.clone();
            Box::pin(async move {
                let mut groups = groups.write().await;
                let group = groups.get_mut(&group_id).ok_or(DomainError::NotFound)?;
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
    struct MapCacheStore {
        entries: Arc<RwLock<HashMap<String, String>>>,
    }

    impl ProfileCacheStore for MapCacheStore {
        fn get(&self, key: &str) -> BoxFuture<'_, DomainResult<Option<String>>> {
            let key = key.to_string();
            let entries = self.entries.clone();
            Box::pin(async move {
                let entries = entries.read().await;
                Ok(entries.get(&key).cloned())
            })
        }

        fn set(
            &self,
            key: &str,
            value: &str,
            _expire_secs: u64,
        ) -> BoxFuture<'_, DomainResult<()>> {
            let key = key.to_string();
            let value = value.to_string();
            let entries = self.entries.clone();
            Box::pin(async move {
                let mut entries = entries.write().await;
                entries.insert(key, value);
                Ok(())
            })
        }
    }

    struct MapDirectory {
        users: HashMap<i64, UserProfile>,
    }

    impl UserDirectory for MapDirectory {
        fn get_by_user_id(
            &self,
            user_id: i64,
        ) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
            let profile = self.users.get(&user_id).cloned();
            Box::pin(async move { Ok(profile) })
        }
    }

    fn profile_with_photo(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: format!("name-{id}"),
            photo: Some(format!("photo-{id}")),
        }
    }

    fn service_with_profiles(profiles: Vec<UserProfile>) -> GroupService {
        let directory = MapDirectory {
            users: profiles
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect(),
        };
        let profiles = ProfileCache::new(
            Arc::new(MapCacheStore::default()),
            Arc::new(directory),
            60,
        );
        GroupService::new(Arc::new(MockGroupRepo::default()), profiles)
    }

    fn actor(user_id: i64) -> ActorIdentity {
        ActorIdentity::with_user_id(user_id)
    }

    #[tokio::test]
    async fn create_group_dedups_members_and_counts_match() {
        let service =
            service_with_profiles((1..=3).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "climbing".to_string(),
                    members: vec![2, 3, 3, 1],
                    photo: None,
                },
            )
            .await
            .expect("group");

        assert_eq!(group.members, vec![1, 2, 3]);
        assert_eq!(group.members_count, 3);
        assert_eq!(group.creator_id, 1);
        assert_eq!(group.state, GroupState::Active);
        assert!(group.group_id.starts_with("group_"));
    }

    #[tokio::test]
    async fn add_members_skips_existing_and_unknown_ids() {
        let service =
            service_with_profiles((1..=4).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "climbing".to_string(),
                    members: vec![2, 3],
                    photo: None,
                },
            )
            .await
            .expect("group");

        // 2 is already a member, 99 has no directory record
        let updated = service
            .add_members(&actor(1), &group.group_id, vec![2, 2, 4, 99])
            .await
            .expect("add");

        assert_eq!(updated.members, vec![1, 2, 3, 4]);
        assert_eq!(updated.members_count, 4);
    }

    #[tokio::test]
    async fn creator_cannot_be_removed_or_exit() {
        let service =
            service_with_profiles((1..=2).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: vec![2],
                    photo: None,
                },
            )
            .await
            .expect("group");

        let removed = service.remove_member(&actor(1), &group.group_id, 1).await;
        assert!(matches!(removed, Err(DomainError::Forbidden(_))));

        let exited = service.exit_group(&actor(1), &group.group_id).await;
        assert!(matches!(exited, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn only_creator_removes_members() {
        let service =
            service_with_profiles((1..=3).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: vec![2, 3],
                    photo: None,
                },
            )
            .await
            .expect("group");

        let by_member = service.remove_member(&actor(2), &group.group_id, 3).await;
        assert!(matches!(by_member, Err(DomainError::Forbidden(_))));

        let by_creator = service
            .remove_member(&actor(1), &group.group_id, 3)
            .await
            .expect("remove");
        assert_eq!(by_creator.members, vec![1, 2]);
        assert_eq!(by_creator.members_count, 2);
    }

    #[tokio::test]
    async fn non_creator_exit_decrements_by_one() {
        let service =
            service_with_profiles((1..=3).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: vec![2, 3],
                    photo: None,
                },
            )
            .await
            .expect("group");

        let updated = service
            .exit_group(&actor(2), &group.group_id)
            .await
            .expect("exit");
        assert_eq!(updated.members, vec![1, 3]);
        assert_eq!(updated.members_count, 2);
    }

    #[tokio::test]
    async fn dismissed_group_rejects_mutations() {
        let service =
            service_with_profiles((1..=3).map(profile_with_photo).collect());
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: vec![2],
                    photo: None,
                },
            )
            .await
            .expect("group");

        let dismissed = service
            .dismiss_group(&actor(1), &group.group_id)
            .await
            .expect("dismiss");
        assert_eq!(dismissed.state, GroupState::Dismissed);
        assert!(dismissed.dismissed_at_ms.is_some());

        let again = service.dismiss_group(&actor(1), &group.group_id).await;
        assert!(matches!(again, Err(DomainError::Conflict)));

        let added = service
            .add_members(&actor(1), &group.group_id, vec![3])
            .await;
        assert!(matches!(added, Err(DomainError::Conflict)));

        let renamed = service
            .rename_group(&actor(1), &group.group_id, "other")
            .await;
        assert!(matches!(renamed, Err(DomainError::Conflict)));

        // reads still work after dismissal
        let info = service.group_info(&group.group_id).await.expect("info");
        assert_eq!(info.group.state, GroupState::Dismissed);
    }

    #[tokio::test]
    async fn avatar_is_creator_first_capped_at_nine() {
        let mut profiles: Vec<_> = (1..=11).map(profile_with_photo).collect();
        profiles[1].photo = None; // user 2 has no photo
        let service = service_with_profiles(profiles);
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: (2..=11).collect(),
                    photo: None,
                },
            )
            .await
            .expect("group");

        let photos = service
            .avatar_photos(&group.group_id)
            .await
            .expect("avatar");
        assert_eq!(photos.len(), 9);
        assert_eq!(photos[0], "photo-1");
        assert_eq!(photos[1], "");
        assert_eq!(photos[2], "photo-3");
    }

    #[tokio::test]
    async fn members_listing_synthesizes_placeholder_profiles() {
        let service = service_with_profiles(vec![profile_with_photo(1)]);
        let group = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "g".to_string(),
                    members: vec![8],
                    photo: None,
                },
            )
            .await
            .expect("group");

        let listing = service
            .members_with_profiles(&group.group_id)
            .await
            .expect("members");
        assert_eq!(listing.members.len(), 2);
        assert_eq!(listing.members[0].username, "name-1");
        assert_eq!(listing.members[1].username, "user8");
        assert_eq!(listing.members[1].photo, "");
    }

    #[tokio::test]
    async fn joined_groups_returns_only_active_memberships() {
        let service =
            service_with_profiles((1..=3).map(profile_with_photo).collect());
        let first = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "first".to_string(),
                    members: vec![2],
                    photo: None,
                },
            )
            .await
            .expect("first");
        let _second = service
            .create_group(
                &actor(1),
                GroupCreate {
                    name: "second".to_string(),
                    members: vec![3],
                    photo: None,
                },
            )
            .await
            .expect("second");

        service
            .dismiss_group(&actor(1), &first.group_id)
            .await
            .expect("dismiss");

        let joined = service
            .joined_groups(&actor(1), None)
            .await
            .expect("joined");
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].name, "second");

        let for_other = service
            .joined_groups(&actor(2), None)
            .await
            .expect("joined");
        assert!(for_other.is_empty());
    }

    #[test]
    fn name_validation_bounds() {
        assert!(validate_group_name("").is_err());
        assert!(validate_group_name("   ").is_err());
        assert!(validate_group_name(&"x".repeat(21)).is_err());
        assert_eq!(
            validate_group_name(&"x".repeat(20)).expect("max length"),
            "x".repeat(20)
        );
        assert_eq!(validate_group_name(" padded ").expect("trimmed"), "padded");
    }

    #[test]
    fn joined_limit_is_clamped() {
        assert_eq!(joined_groups_limit(None), 10);
        assert_eq!(joined_groups_limit(Some(0)), 1);
        assert_eq!(joined_groups_limit(Some(500)), 50);
        assert_eq!(joined_groups_limit(Some(25)), 25);
    }
}
