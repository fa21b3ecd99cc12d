use std::time::Duration;

use kumpul_domain::DomainResult;
use kumpul_domain::error::DomainError;
use kumpul_domain::ports::BoxFuture;
use kumpul_domain::ports::profile::UserDirectory;
use kumpul_domain::profile::UserProfile;
use reqwest::StatusCode;

use crate::config::AppConfig;

/// Read client for the relational user service. A missing user is
/// `None`; transport failures and upstream 5xx map to `Unavailable`.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_millis(config.directory_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.directory_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl UserDirectory for HttpUserDirectory {
    fn get_by_user_id(&self, user_id: i64) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let url = format!("{}/users/{user_id}", self.base_url);
        Box::pin(async move {
            let response = self
                .http
                .get(&url)
                .header("accept", "application/json")
                .send()
                .await
                .map_err(|err| DomainError::Unavailable(err.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(DomainError::Unavailable(format!(
                    "user directory returned status {}",
                    status.as_u16()
                )));
            }

            let profile = response.json::<UserProfile>().await.map_err(|err| {
                DomainError::Unavailable(format!("user directory decode error: {err}"))
            })?;
            Ok(Some(profile))
        })
    }
}
