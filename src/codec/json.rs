//! JSON method codec
//!
//! ```text
//! call:     {"method": <string>, "args": <value>}
//! success:  [<result>]
//! error:    [<code>, <message>, <details>]
//! ```
//!
//! Typed lists encode as plain arrays and decode as [`Value::List`]. Map keys
//! must be strings and decoded objects come back with sorted keys.

use bytes::Bytes;
use serde_json::{Map as JsonMap, Number, Value as Json};

use super::error::{CodecError, Result};
use super::{MethodCodec, MethodError, MethodResponse, Value};

/// Method codec speaking JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMethodCodec;

impl JsonMethodCodec {
    /// Create the codec
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn to_bytes(json: &Json) -> Result<Bytes> {
    serde_json::to_vec(json)
        .map(Bytes::from)
        .map_err(|e| CodecError::Malformed(e.to_string()))
}

fn parse(message: &[u8]) -> Result<Json> {
    serde_json::from_slice(message).map_err(|e| CodecError::Malformed(e.to_string()))
}

impl MethodCodec for JsonMethodCodec {
    fn encode_method_call(&self, method: &str, args: &Value) -> Result<Bytes> {
        let mut object = JsonMap::new();
        object.insert("method".into(), Json::String(method.to_owned()));
        object.insert("args".into(), to_json(args)?);
        to_bytes(&Json::Object(object))
    }

    fn decode_method_call(&self, message: &[u8]) -> Result<(String, Value)> {
        let Json::Object(mut object) = parse(message)? else {
            return Err(CodecError::Malformed("method call is not an object".into()));
        };
        let method = match object.remove("method") {
            Some(Json::String(method)) => method,
            _ => return Err(CodecError::Malformed("method name is not a string".into())),
        };
        let args = object.remove("args").map_or(Ok(Value::Null), from_json)?;
        Ok((method, args))
    }

    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes> {
        to_bytes(&Json::Array(vec![to_json(result)?]))
    }

    fn encode_error_envelope(&self, code: &str, message: &str, details: &Value) -> Result<Bytes> {
        to_bytes(&Json::Array(vec![
            Json::String(code.to_owned()),
            Json::String(message.to_owned()),
            to_json(details)?,
        ]))
    }

    fn decode_response_envelope(&self, message: &[u8]) -> Result<MethodResponse> {
        let Json::Array(items) = parse(message)? else {
            return Err(CodecError::Malformed("response is not an array".into()));
        };
        let mut items = items.into_iter();
        match (items.next(), items.next(), items.next(), items.next()) {
            (Some(result), None, None, None) => Ok(MethodResponse::Success(from_json(result)?)),
            (Some(Json::String(code)), Some(message), Some(details), None) => {
                let message = match message {
                    Json::String(message) => message,
                    Json::Null => String::new(),
                    _ => {
                        return Err(CodecError::Malformed(
                            "error message is not a string".into(),
                        ));
                    }
                };
                Ok(MethodResponse::Error(MethodError {
                    code,
                    message,
                    details: from_json(details)?,
                }))
            }
            _ => Err(CodecError::Malformed(
                "response must hold one result or a code, message and details".into(),
            )),
        }
    }
}

fn float(value: f64) -> Result<Json> {
    Number::from_f64(value)
        .map(Json::Number)
        .ok_or_else(|| CodecError::Malformed(format!("{value} has no JSON representation")))
}

fn to_json(value: &Value) -> Result<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(value) => Json::Bool(*value),
        Value::Int(value) => Json::from(*value),
        Value::Float(value) => float(*value)?,
        Value::String(value) => Json::String(value.clone()),
        Value::Uint8List(values) => values.iter().copied().map(Json::from).collect(),
        Value::Int32List(values) => values.iter().copied().map(Json::from).collect(),
        Value::Int64List(values) => values.iter().copied().map(Json::from).collect(),
        Value::FloatList(values) => Json::Array(
            values
                .iter()
                .map(|value| float(*value))
                .collect::<Result<_>>()?,
        ),
        Value::List(values) => Json::Array(values.iter().map(to_json).collect::<Result<_>>()?),
        Value::Map(entries) => {
            let mut object = JsonMap::new();
            for (key, value) in entries {
                let Value::String(key) = key else {
                    return Err(CodecError::Malformed(format!(
                        "map key {key} is not a string"
                    )));
                };
                object.insert(key.clone(), to_json(value)?);
            }
            Json::Object(object)
        }
    };
    Ok(json)
}

fn from_json(json: Json) -> Result<Value> {
    let value = match json {
        Json::Null => Value::Null,
        Json::Bool(value) => Value::Bool(value),
        Json::Number(number) => match number.as_i64() {
            Some(value) => Value::Int(value),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(value) => Value::String(value),
        Json::Array(items) => Value::List(items.into_iter().map(from_json).collect::<Result<_>>()?),
        Json::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(key, value)| -> Result<(Value, Value)> {
                    Ok((Value::String(key), from_json(value)?))
                })
                .collect::<Result<_>>()?,
        ),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_layout() {
        let codec = JsonMethodCodec::new();
        let bytes = codec
            .encode_method_call("echo", &Value::from("hi"))
            .unwrap();
        let json: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"method": "echo", "args": "hi"}));

        let (method, args) = codec.decode_method_call(&bytes).unwrap();
        assert_eq!(method, "echo");
        assert_eq!(args, Value::from("hi"));
    }

    #[test]
    fn test_missing_args_is_null() {
        let codec = JsonMethodCodec::new();
        let (method, args) = codec.decode_method_call(br#"{"method":"ping"}"#).unwrap();
        assert_eq!(method, "ping");
        assert!(args.is_null());
    }

    #[test]
    fn test_envelopes() {
        let codec = JsonMethodCodec::new();
        let success = codec.encode_success_envelope(&Value::Int(7)).unwrap();
        assert_eq!(&success[..], b"[7]");
        assert_eq!(
            codec.decode_response(&success).unwrap(),
            MethodResponse::success(7)
        );

        let error = codec
            .encode_error_envelope("E", "bad", &Value::Null)
            .unwrap();
        assert_eq!(&error[..], br#"["E","bad",null]"#);
        assert_eq!(
            codec.decode_response(&error).unwrap(),
            MethodResponse::Error(MethodError::new("E", "bad"))
        );
    }

    #[test]
    fn test_maps_and_typed_lists() {
        let codec = JsonMethodCodec::new();
        let value: Value = [
            ("bytes", Value::Uint8List(vec![1, 2])),
            ("ratio", Value::Float(0.5)),
        ]
        .into_iter()
        .collect();
        let bytes = codec.encode_success_envelope(&value).unwrap();
        let decoded = codec.decode_response(&bytes).unwrap();
        let result = decoded.result().unwrap();
        assert_eq!(
            result.lookup_string("bytes"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(result.lookup_string("ratio"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_rejects_unrepresentable_values() {
        let codec = JsonMethodCodec::new();
        let map: Value = [(Value::Int(1), Value::Null)].into_iter().collect();
        assert!(codec.encode_success_envelope(&map).is_err());
        assert!(codec.encode_success_envelope(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_malformed_responses() {
        let codec = JsonMethodCodec::new();
        assert!(codec.decode_response(b"{}").is_err());
        assert!(codec.decode_response(b"[1, 2]").is_err());
        assert!(codec.decode_response(b"not json").is_err());
        assert_eq!(
            codec.decode_response(b"").unwrap(),
            MethodResponse::NotImplemented
        );
    }
}
