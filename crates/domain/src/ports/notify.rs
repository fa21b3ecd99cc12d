use crate::DomainResult;
use crate::notify::{NotificationQuery, SystemNotification};
use crate::ports::BoxFuture;

pub trait NotificationRepository: Send + Sync {
    fn append(
        &self,
        notification: &SystemNotification,
    ) -> BoxFuture<'_, DomainResult<SystemNotification>>;

    /// System notifications for the query's group, `created_at_ms`
    /// strictly below `before_ms` when set, newest first, at most
    /// `limit` entries.
    fn list(
        &self,
        query: &NotificationQuery,
    ) -> BoxFuture<'_, DomainResult<Vec<SystemNotification>>>;
}
