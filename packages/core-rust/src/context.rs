//! Request-scoped activation types shared by every protocol adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The user a decision is being made for.
///
/// `attributes` is a plain JSON object: every value is a tagged
/// string/number/bool/null/array/object. Wire-native structured values
/// (protobuf `Struct`, JSON bodies) are flattened into this form by the
/// adapters before a `UserContext` exists, so downstream code never sees a
/// protocol-specific encoding.
///
/// Instances live for a single request and are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// Caller-supplied user identifier. Never empty: construction goes
    /// through [`crate::normalize::normalize`], which rejects empty ids.
    pub id: String,
    /// Attribute bag used for audience targeting. May be empty.
    pub attributes: Map<String, Value>,
}

/// A single activation request: which experiment, for which user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRequest {
    /// Key of the experiment to activate. Must be non-empty; requests
    /// failing this are rejected before the decision engine is invoked.
    pub experiment_key: String,
    /// The user being bucketed.
    pub user: UserContext,
}

impl ActivationRequest {
    /// Checks request well-formedness without touching the decision engine.
    ///
    /// # Errors
    ///
    /// Returns the human-readable reason when the experiment key or the
    /// user id is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.experiment_key.is_empty() {
            return Err("experiment key must not be empty".to_string());
        }
        if self.user.id.is_empty() {
            return Err("user id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Successful outcome of an activation: the variation the user landed in.
///
/// The key is the decision engine's value, unmodified. One per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResult {
    /// Name of the variation the user is bucketed into.
    pub variation_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str) -> UserContext {
        UserContext {
            id: id.to_string(),
            attributes: Map::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let req = ActivationRequest {
            experiment_key: "us-widget-bff".to_string(),
            user: user("b5aedcf2-1b91-46c5-a1a6-9e7c34b7a3f0"),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_experiment_key() {
        let req = ActivationRequest {
            experiment_key: String::new(),
            user: user("u1"),
        };
        let reason = req.validate().unwrap_err();
        assert!(reason.contains("experiment key"));
    }

    #[test]
    fn validate_rejects_empty_user_id() {
        let req = ActivationRequest {
            experiment_key: "exp".to_string(),
            user: user(""),
        };
        let reason = req.validate().unwrap_err();
        assert!(reason.contains("user id"));
    }

    #[test]
    fn user_context_round_trips_through_json() {
        let mut attributes = Map::new();
        attributes.insert("country".to_string(), json!("US"));
        attributes.insert("plan".to_string(), json!({"tier": "pro", "seats": 4}));
        let ctx = UserContext {
            id: "u1".to_string(),
            attributes,
        };

        let encoded = serde_json::to_string(&ctx).unwrap();
        let decoded: UserContext = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ctx);
    }
}
