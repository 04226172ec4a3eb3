//! Attribute normalization: loosely-typed wire bags into [`UserContext`].
//!
//! Both protocol adapters funnel through [`normalize`]: the gRPC adapter
//! after deep-converting its protobuf `Struct`, the HTTP adapter with the
//! JSON body value as-is. Anything that is not a well-formed key/value
//! object is rejected here, so the decision engine only ever sees canonical
//! input.

use serde_json::Value;

use crate::context::UserContext;

/// Rejection reasons for wire input that cannot become a [`UserContext`].
///
/// All variants are client-side faults and map to an invalid-argument
/// classification at the protocol boundary.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("attributes must be a key/value object, got {found}")]
    AttributesNotAnObject {
        /// JSON type name of the rejected payload.
        found: &'static str,
    },
}

/// Builds the canonical [`UserContext`] from a user id and a raw attribute
/// payload.
///
/// `Null` is treated as "no attributes supplied" and yields an empty bag.
/// An object payload is taken over losslessly: no renaming, no coercion.
/// Every other JSON type is malformed input.
///
/// # Errors
///
/// Returns [`NormalizeError::EmptyUserId`] for an empty id and
/// [`NormalizeError::AttributesNotAnObject`] for scalar or array payloads.
pub fn normalize(id: &str, raw: Value) -> Result<UserContext, NormalizeError> {
    if id.is_empty() {
        return Err(NormalizeError::EmptyUserId);
    }
    let attributes = match raw {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(NormalizeError::AttributesNotAnObject {
                found: json_type_name(&other),
            })
        }
    };
    Ok(UserContext {
        id: id.to_string(),
        attributes,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
