//! HTTP-backed decision-engine client.
//!
//! Talks to the external decision API that owns bucketing, audience
//! evaluation, config polling, and impression dispatch. The serving path
//! treats it as opaque: one call, one decision. `connect()` performs a
//! config handshake so a bad endpoint or access key fails the process at
//! startup instead of on the first request.

use std::time::Duration;

use async_trait::async_trait;
use expgate_core::{DecisionEngine, EngineError, UserContext};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::ServiceConfig;

/// Client-side timeout for engine calls; the per-request activation
/// deadline is enforced above this layer and is typically much shorter.
const ENGINE_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup failures against the decision API. All are process-fatal: no
/// decisions can be served without the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineInitError {
    #[error("failed to build decision API client")]
    Client(#[source] reqwest::Error),
    #[error("decision API handshake failed")]
    Handshake(#[source] reqwest::Error),
    #[error("decision API rejected the access key (status {status})")]
    Rejected { status: u16 },
}

/// `DecisionEngine` implementation over the decision API.
pub struct RemoteDecisionEngine {
    http: reqwest::Client,
    base_url: String,
    sdk_key: String,
}

#[derive(Debug, Deserialize)]
struct ConfigInfo {
    revision: String,
}

#[derive(Debug, Deserialize)]
struct ActivateReply {
    variation: String,
}

impl RemoteDecisionEngine {
    /// Builds the client without contacting the API.
    ///
    /// # Errors
    ///
    /// Returns [`EngineInitError::Client`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &ServiceConfig) -> Result<Self, EngineInitError> {
        let http = reqwest::Client::builder()
            .timeout(ENGINE_HTTP_TIMEOUT)
            .build()
            .map_err(EngineInitError::Client)?;
        Ok(Self {
            http,
            base_url: config.decision_api_url.trim_end_matches('/').to_string(),
            sdk_key: config.decision_sdk_key.clone(),
        })
    }

    /// Builds the client and verifies the API with a config handshake,
    /// logging the active config revision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineInitError`] when the client cannot be built, the
    /// API is unreachable, or the access key is rejected.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, EngineInitError> {
        let engine = Self::new(config)?;
        let info = engine.fetch_config().await?;
        info!(revision = %info.revision, "initialized decision engine client");
        Ok(engine)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch_config(&self) -> Result<ConfigInfo, EngineInitError> {
        let response = self
            .http
            .get(self.endpoint("/v1/config"))
            .bearer_auth(&self.sdk_key)
            .send()
            .await
            .map_err(EngineInitError::Handshake)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineInitError::Rejected {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(EngineInitError::Handshake)
    }
}

#[async_trait]
impl DecisionEngine for RemoteDecisionEngine {
    async fn activate(
        &self,
        experiment_key: &str,
        user: &UserContext,
    ) -> Result<String, EngineError> {
        let response = self
            .http
            .post(self.endpoint("/v1/activate"))
            .bearer_auth(&self.sdk_key)
            .json(&json!({
                "experiment_key": experiment_key,
                "user_id": user.id,
                "attributes": user.attributes,
            }))
            .send()
            .await
            .map_err(|err| EngineError::Internal(anyhow::Error::new(err)))?;

        let status = response.status();
        if status.is_success() {
            let reply: ActivateReply = response
                .json()
                .await
                .map_err(|err| EngineError::Internal(anyhow::Error::new(err)))?;
            Ok(reply.variation)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(EngineError::UnknownExperiment {
                key: experiment_key.to_string(),
            })
        } else {
            Err(EngineError::Internal(anyhow::anyhow!(
                "decision API returned status {status}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_against_a_trailing_slash_base() {
        let config = ServiceConfig {
            decision_api_url: "http://decisions.internal/".to_string(),
            ..ServiceConfig::default()
        };
        let engine = RemoteDecisionEngine::new(&config).unwrap();
        assert_eq!(
            engine.endpoint("/v1/activate"),
            "http://decisions.internal/v1/activate"
        );
    }

    #[test]
    fn endpoint_keeps_a_clean_base_untouched() {
        let config = ServiceConfig::default();
        let engine = RemoteDecisionEngine::new(&config).unwrap();
        assert_eq!(
            engine.endpoint("/v1/config"),
            "http://localhost:9100/v1/config"
        );
    }
}
