//! Deep conversion of protobuf `Struct` values into plain JSON.
//!
//! The wire carries attributes as `google.protobuf.Struct`; everything past
//! the adapter works on `serde_json::Value`. Conversion is lossless for
//! representable values and fails (never panics) on malformed input, which
//! the caller classifies as an invalid argument.

use prost_types::value::Kind;
use prost_types::{ListValue, Struct, Value as ProstValue};
use serde_json::{Map, Value};

/// Malformed structured attribute values.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("attribute {key:?} carries no value")]
    MissingKind { key: String },
    #[error("attribute {key:?} is not a number representable in JSON")]
    NonFiniteNumber { key: String },
}

/// Converts an optional wire-level attribute `Struct` into a JSON value.
///
/// An absent struct means "no attributes supplied" and becomes `Null`,
/// which the normalizer accepts as an empty bag.
///
/// # Errors
///
/// Returns [`ConvertError`] for values with no kind set or non-finite
/// numbers (NaN, infinities), naming the offending field.
pub fn struct_to_json(attributes: Option<Struct>) -> Result<Value, ConvertError> {
    match attributes {
        None => Ok(Value::Null),
        Some(fields) => fields_to_json(fields),
    }
}

fn fields_to_json(fields: Struct) -> Result<Value, ConvertError> {
    let mut map = Map::new();
    for (key, value) in fields.fields {
        let converted = value_to_json(&key, value)?;
        map.insert(key, converted);
    }
    Ok(Value::Object(map))
}

fn value_to_json(key: &str, value: ProstValue) -> Result<Value, ConvertError> {
    match value.kind {
        None => Err(ConvertError::MissingKind {
            key: key.to_string(),
        }),
        Some(Kind::NullValue(_)) => Ok(Value::Null),
        Some(Kind::BoolValue(flag)) => Ok(Value::Bool(flag)),
        Some(Kind::NumberValue(number)) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .ok_or_else(|| ConvertError::NonFiniteNumber {
                key: key.to_string(),
            }),
        Some(Kind::StringValue(text)) => Ok(Value::String(text)),
        Some(Kind::StructValue(nested)) => fields_to_json(nested),
        Some(Kind::ListValue(list)) => list_to_json(key, list),
    }
}

fn list_to_json(key: &str, list: ListValue) -> Result<Value, ConvertError> {
    let items = list
        .values
        .into_iter()
        .map(|value| value_to_json(key, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(items))
}
