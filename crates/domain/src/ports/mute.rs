use crate::DomainResult;
use crate::mute::MuteStatus;
use crate::ports::BoxFuture;

pub trait MuteRepository: Send + Sync {
    fn get(
        &self,
        user_id: i64,
        group_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<MuteStatus>>>;

    /// Inserts the record only if no record exists for the
    /// `(user_id, group_id)` pair and returns whatever is stored
    /// afterwards. At most one record per pair ever exists.
    fn put_if_absent(&self, status: &MuteStatus) -> BoxFuture<'_, DomainResult<MuteStatus>>;

    /// Unconditional upsert; `created_at_ms` of an existing record is
    /// preserved.
    fn upsert(&self, status: &MuteStatus) -> BoxFuture<'_, DomainResult<MuteStatus>>;
}
