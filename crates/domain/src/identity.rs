use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub user_id: i64,
    pub username: String,
}

impl ActorIdentity {
    pub fn with_user_id(user_id: i64) -> Self {
        Self {
            user_id,
            username: user_id.to_string(),
        }
    }
}
