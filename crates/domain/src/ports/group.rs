use crate::DomainResult;
use crate::group::Group;
use crate::ports::BoxFuture;

/// Storage contract for group documents.
///
/// Every mutation that touches `members` must adjust `members_count` in
/// the same store operation; no caller may observe the set and the count
/// out of sync. Implementations back this with the store's native
/// compound update (or a single write guard for in-memory stores).
pub trait GroupRepository: Send + Sync {
    fn insert(&self, group: &Group) -> BoxFuture<'_, DomainResult<Group>>;

    fn get(&self, group_id: &str) -> BoxFuture<'_, DomainResult<Option<Group>>>;

    /// Active groups containing `user_id`, newest first, at most `limit`.
    fn list_joined(&self, user_id: i64, limit: usize)
    -> BoxFuture<'_, DomainResult<Vec<Group>>>;

    /// Appends only the ids not already present and increments the count
    /// by the number actually appended. `Conflict` if the group is
    /// dismissed.
    fn add_members(
        &self,
        group_id: &str,
        user_ids: &[i64],
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>>;

    /// Removes one member and decrements the count by exactly one.
    /// `NotFound` if the user is not a member, `Conflict` if the group
    /// is dismissed.
    fn remove_member(
        &self,
        group_id: &str,
        user_id: i64,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>>;

    fn rename(
        &self,
        group_id: &str,
        name: &str,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>>;

    /// Marks the group dismissed. `Conflict` if already dismissed.
    fn dismiss(
        &self,
        group_id: &str,
        dismissed_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Group>>;
}
