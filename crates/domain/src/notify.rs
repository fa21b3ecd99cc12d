use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::group::GroupRepository;
use crate::ports::notify::NotificationRepository;
use crate::util::now_ms;

const MAX_CONTENT_LENGTH: usize = 2_000;
const MAX_NOTIFICATIONS_PER_REQUEST: usize = 1_000;
const DEFAULT_NOTIFICATIONS_PER_REQUEST: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemNotification {
    pub id: String,
    pub group_id: String,
    pub content: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub action: String,
    pub created_at_ms: i64,
    pub is_system: bool,
}

#[derive(Clone, Debug)]
pub struct SystemNotificationInput {
    pub id: Option<String>,
    pub content: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub action: String,
    pub created_at_ms: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct NotificationQuery {
    pub group_id: String,
    pub before_ms: Option<i64>,
    pub limit: usize,
}

pub fn build_notification_query(
    group_id: &str,
    limit: Option<usize>,
    before_ms: Option<i64>,
) -> NotificationQuery {
    NotificationQuery {
        group_id: group_id.to_string(),
        before_ms,
        limit: limit
            .unwrap_or(DEFAULT_NOTIFICATIONS_PER_REQUEST)
            .clamp(1, MAX_NOTIFICATIONS_PER_REQUEST),
    }
}

#[derive(Clone)]
pub struct NotificationService {
    groups: Arc<dyn GroupRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            groups,
            notifications,
        }
    }

    /// Records a system notification on behalf of the caller. The
    /// declared sender must be the authenticated user; the id defaults
    /// to the creation timestamp in milliseconds.
    pub async fn post(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        input: SystemNotificationInput,
    ) -> DomainResult<SystemNotification> {
        self.assert_actor_is_member(actor, group_id).await?;
        if input.sender_id != actor.user_id {
            return Err(DomainError::Forbidden(
                "sender must be the authenticated user".into(),
            ));
        }
        let content = validate_content(&input.content)?;

        let created_at_ms = input.created_at_ms.unwrap_or_else(now_ms);
        let notification = SystemNotification {
            id: input.id.unwrap_or_else(|| created_at_ms.to_string()),
            group_id: group_id.to_string(),
            content,
            sender_id: input.sender_id,
            sender_name: input.sender_name,
            action: input.action,
            created_at_ms,
            is_system: true,
        };
        self.notifications.append(&notification).await
    }

    /// Notifications for the group, newest first.
    pub async fn list(
        &self,
        actor: &ActorIdentity,
        group_id: &str,
        limit: Option<usize>,
        before_ms: Option<i64>,
    ) -> DomainResult<Vec<SystemNotification>> {
        self.assert_actor_is_member(actor, group_id).await?;
        let query = build_notification_query(group_id, limit, before_ms);
        self.notifications.list(&query).await
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

fn validate_content(content: &str) -> DomainResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::Validation("content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(DomainError::Validation(format!(
            "content exceeds max length of {MAX_CONTENT_LENGTH}"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{Group, GroupState};
    use crate::ports::BoxFuture;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    struct FixedGroupRepo {
        group: Group,
    }

    impl GroupRepository for FixedGroupRepo {
        fn insert(&self, _group: &Group) -> BoxFuture<'_, DomainResult<Group>> {
            unimplemented!()
        }

        fn get(&self, group_id: &str) -> BoxFuture<'_, DomainResult<Option<Group>>> {
            let group = (group_id == self.group.group_id).then(|| self.group.clone());
            Box::pin(async move { Ok(group) })
        }

        fn list_joined(
            &self,
            _user_id: i64,
            _limit: usize,
        ) -> BoxFuture<'_, DomainResult<Vec<Group>>> {
            unimplemented!()
        }

        fn add_members(
            &self,
            _group_id: &str,
            _user_ids: &[i64],
            _updated_at_ms: i64,
        ) -> BoxFuture<'_, DomainResult<Group>> {
            unimplemented!()
        }

        fn remove_member(
            &self,
            _group_id: &str,
            _user_id: i64,
            _updated_at_ms: i64,
        ) -> BoxFuture<'_, DomainResult<Group>> {
            unimplemented!()
        }

        fn rename(
            &self,
            _group_id: &str,
            _name: &str,
            _updated_at_ms: i64,
        ) -> BoxFuture<'_, DomainResult<Group>> {
            unimplemented!()
        }

        fn dismiss(
            &self,
            _group_id: &str,
            _dismissed_at_ms: i64,
        ) -> BoxFuture<'_, DomainResult<Group>> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct MockNotificationRepo {
        entries: Arc<RwLock<Vec<SystemNotification>>>,
    }

    impl NotificationRepository for MockNotificationRepo {
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
                matching.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
                matching.truncate(query.limit);
                Ok(matching)
            })
        }
    }

    fn sample_group() -> Group {
        Group {
            group_id: "group_abc".to_string(),
            name: "g".to_string(),
            creator_id: 1,
            members: vec![1, 2],
            members_count: 2,
            state: GroupState::Active,
            photo: None,
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
            dismissed_at_ms: None,
        }
    }

    fn service() -> NotificationService {
        NotificationService::new(
            Arc::new(FixedGroupRepo {
                group: sample_group(),
            }),
            Arc::new(MockNotificationRepo::default()),
        )
    }

    fn input(sender_id: i64, content: &str, created_at_ms: Option<i64>) -> SystemNotificationInput {
        SystemNotificationInput {
            id: None,
            content: content.to_string(),
            sender_id,
            sender_name: format!("user{sender_id}"),
            action: "member_added".to_string(),
            created_at_ms,
        }
    }

    #[tokio::test]
    async fn post_defaults_id_to_timestamp_and_tags_system() {
        let service = service();
        let actor = ActorIdentity::with_user_id(1);

        let posted = service
            .post(&actor, "group_abc", input(1, "alice joined", Some(5_000)))
            .await
            .expect("post");
        assert_eq!(posted.id, "5000");
        assert_eq!(posted.created_at_ms, 5_000);
        assert!(posted.is_system);
    }

    #[tokio::test]
    async fn sender_must_match_the_authenticated_user() {
        let service = service();
        let actor = ActorIdentity::with_user_id(1);

        let posted = service
            .post(&actor, "group_abc", input(2, "spoofed", None))
            .await;
        assert!(matches!(posted, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_before_bound() {
        let service = service();
        let actor = ActorIdentity::with_user_id(1);

        for at in [1_000, 3_000, 2_000] {
            service
                .post(&actor, "group_abc", input(1, "event", Some(at)))
                .await
                .expect("post");
        }

        let all = service
            .list(&actor, "group_abc", None, None)
            .await
            .expect("list");
        let stamps: Vec<i64> = all.iter().map(|n| n.created_at_ms).collect();
        assert_eq!(stamps, vec![3_000, 2_000, 1_000]);

        let bounded = service
            .list(&actor, "group_abc", None, Some(3_000))
            .await
            .expect("bounded");
        let stamps: Vec<i64> = bounded.iter().map(|n| n.created_at_ms).collect();
        assert_eq!(stamps, vec![2_000, 1_000]);

        let limited = service
            .list(&actor, "group_abc", Some(1), None)
            .await
            .expect("limited");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].created_at_ms, 3_000);
    }

    #[tokio::test]
    async fn non_member_cannot_read_or_post() {
        let service = service();
        let outsider = ActorIdentity::with_user_id(9);

        let listed = service.list(&outsider, "group_abc", None, None).await;
        assert!(matches!(listed, Err(DomainError::Forbidden(_))));

        let posted = service
            .post(&outsider, "group_abc", input(9, "hello", None))
            .await;
        assert!(matches!(posted, Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn query_limit_is_clamped() {
        assert_eq!(build_notification_query("g", None, None).limit, 100);
        assert_eq!(build_notification_query("g", Some(0), None).limit, 1);
        assert_eq!(build_notification_query("g", Some(5_000), None).limit, 1_000);
    }

    #[test]
    fn content_validation_bounds() {
        assert!(validate_content("").is_err());
        assert!(validate_content(&"x".repeat(2_001)).is_err());
        assert_eq!(validate_content(" trimmed ").expect("ok"), "trimmed");
    }
}
