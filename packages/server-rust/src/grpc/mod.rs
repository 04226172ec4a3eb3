//! gRPC adapter: the `Experiment` service.
//!
//! Thin wire layer over the shared [`ActivationHandler`]: convert the
//! protobuf attribute struct, normalize, dispatch, and map the classified
//! error onto a gRPC status code.

pub mod attributes;

#[allow(clippy::all, clippy::pedantic)]
pub mod pb {
    tonic::include_proto!("expgate.v1");
}

use std::sync::Arc;

use expgate_core::{normalize, ActivationError, ActivationRequest};
use tonic::{Request, Response, Status};

use crate::activation::ActivationHandler;
use crate::network::shutdown::ShutdownController;
use pb::experiment_server::{Experiment, ExperimentServer};

/// Span name for the activate RPC; fixed at service registration.
pub const ACTIVATE_SPAN: &str = "/expgate.v1.Experiment/Activate";

/// gRPC implementation of the `Experiment` service.
pub struct ExperimentService {
    handler: Arc<ActivationHandler>,
    shutdown: Arc<ShutdownController>,
}

impl ExperimentService {
    #[must_use]
    pub fn new(handler: Arc<ActivationHandler>, shutdown: Arc<ShutdownController>) -> Self {
        Self { handler, shutdown }
    }

    /// Wraps the service in the generated tonic server type.
    #[must_use]
    pub fn into_server(self) -> ExperimentServer<Self> {
        ExperimentServer::new(self)
    }
}

#[tonic::async_trait]
impl Experiment for ExperimentService {
    async fn activate(
        &self,
        request: Request<pb::ActivateRequest>,
    ) -> Result<Response<pb::Variation>, Status> {
        let _guard = self.shutdown.in_flight_guard();
        let message = request.into_inner();

        let raw = attributes::struct_to_json(message.attributes)
            .map_err(|err| Status::invalid_argument(err.to_string()))?;
        let user = normalize(&message.user_id, raw)
            .map_err(|err| Status::invalid_argument(err.to_string()))?;

        let activation = ActivationRequest {
            experiment_key: message.experiment_key,
            user,
        };

        match self.handler.activate(&activation).await {
            Ok(result) => Ok(Response::new(pb::Variation {
                variation: result.variation_key,
            })),
            Err(err) => Err(status_from_activation_error(&err)),
        }
    }
}

/// Maps the classified activation failure onto the RPC status channel.
fn status_from_activation_error(err: &ActivationError) -> Status {
    match err {
        ActivationError::Validation { .. } => Status::invalid_argument(err.to_string()),
        ActivationError::DeadlineExceeded { .. } => Status::deadline_exceeded(err.to_string()),
        ActivationError::DecisionUnavailable { .. } => Status::unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use expgate_core::{DecisionEngine, EngineError, UserContext};
    use prost_types::value::Kind;
    use serde_json::json;

    use super::*;

    struct StubEngine {
        variation: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn returning(variation: &str) -> Arc<Self> {
            Arc::new(Self {
                variation: Some(variation.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                variation: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn sleeping(variation: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                variation: Some(variation.to_string()),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DecisionEngine for StubEngine {
        async fn activate(
            &self,
            experiment_key: &str,
            _user: &UserContext,
        ) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.variation {
                Some(v) => Ok(v.clone()),
                None => Err(EngineError::UnknownExperiment {
                    key: experiment_key.to_string(),
                }),
            }
        }
    }

    fn service_with(engine: Arc<StubEngine>, deadline: Duration) -> ExperimentService {
        ExperimentService::new(
            Arc::new(ActivationHandler::new(engine, deadline)),
            Arc::new(ShutdownController::new()),
        )
    }

    fn country_attributes() -> prost_types::Struct {
        let mut fields = BTreeMap::new();
        fields.insert(
            "country".to_string(),
            prost_types::Value {
                kind: Some(Kind::StringValue("US".to_string())),
            },
        );
        fields.insert(
            "platform".to_string(),
            prost_types::Value {
                kind: Some(Kind::StringValue("mobile".to_string())),
            },
        );
        prost_types::Struct { fields }
    }

    #[tokio::test]
    async fn activate_returns_engine_variation() {
        let engine = StubEngine::returning("variation_b");
        let service = service_with(engine.clone(), Duration::from_secs(1));

        let response = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: "us-widget-bff".to_string(),
                user_id: "b5aedcf2-1b91-46c5-a1a6-9e7c34b7a3f0".to_string(),
                attributes: Some(country_attributes()),
            }))
            .await
            .unwrap();

        assert_eq!(response.into_inner().variation, "variation_b");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_experiment_key_returns_invalid_argument() {
        let engine = StubEngine::returning("variation_b");
        let service = service_with(engine.clone(), Duration::from_secs(1));

        let status = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: String::new(),
                user_id: "u1".to_string(),
                attributes: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_user_id_returns_invalid_argument() {
        let engine = StubEngine::returning("variation_b");
        let service = service_with(engine.clone(), Duration::from_secs(1));

        let status = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: "exp".to_string(),
                user_id: String::new(),
                attributes: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_attributes_return_invalid_argument() {
        let engine = StubEngine::returning("variation_b");
        let service = service_with(engine.clone(), Duration::from_secs(1));

        let mut fields = BTreeMap::new();
        fields.insert("ghost".to_string(), prost_types::Value { kind: None });

        let status = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: "exp".to_string(),
                user_id: "u1".to_string(),
                attributes: Some(prost_types::Struct { fields }),
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_failure_returns_unavailable() {
        let service = service_with(StubEngine::failing(), Duration::from_secs(1));

        let status = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: "exp".to_string(),
                user_id: "u1".to_string(),
                attributes: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[tokio::test]
    async fn slow_engine_returns_deadline_exceeded() {
        let service = service_with(
            StubEngine::sleeping("variation_b", Duration::from_secs(5)),
            Duration::from_millis(50),
        );

        let status = service
            .activate(Request::new(pb::ActivateRequest {
                experiment_key: "exp".to_string(),
                user_id: "u1".to_string(),
                attributes: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }

    #[test]
    fn attributes_flatten_into_the_canonical_bag() {
        let raw = attributes::struct_to_json(Some(country_attributes())).unwrap();
        let user = normalize("u1", raw).unwrap();
        assert_eq!(
            serde_json::Value::Object(user.attributes),
            json!({"country": "US", "platform": "mobile"})
        );
    }
}
