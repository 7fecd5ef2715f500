//! Method codec contract

use bytes::Bytes;

use super::error::Result;
use super::{MethodResponse, Value};

/// Encodes and decodes method calls and response envelopes.
///
/// Implementations must accept every [`Value`] variant. Encoding fails only
/// when storage cannot be allocated; decoding fails only on malformed bytes.
pub trait MethodCodec {
    /// Encode a method invocation
    fn encode_method_call(&self, method: &str, args: &Value) -> Result<Bytes>;

    /// Decode a method invocation into its name and arguments
    fn decode_method_call(&self, message: &[u8]) -> Result<(String, Value)>;

    /// Encode a successful result
    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes>;

    /// Encode an application error
    fn encode_error_envelope(&self, code: &str, message: &str, details: &Value) -> Result<Bytes>;

    /// Decode a non-empty response envelope
    fn decode_response_envelope(&self, message: &[u8]) -> Result<MethodResponse>;

    /// Decode a reply, mapping an empty buffer to
    /// [`MethodResponse::NotImplemented`]
    fn decode_response(&self, message: &[u8]) -> Result<MethodResponse> {
        if message.is_empty() {
            return Ok(MethodResponse::NotImplemented);
        }
        self.decode_response_envelope(message)
    }

    /// Encode a response; not-implemented encodes to an empty buffer
    fn encode_response(&self, response: &MethodResponse) -> Result<Bytes> {
        match response {
            MethodResponse::Success(result) => self.encode_success_envelope(result),
            MethodResponse::Error(error) => {
                self.encode_error_envelope(&error.code, &error.message, &error.details)
            }
            MethodResponse::NotImplemented => Ok(Bytes::new()),
        }
    }
}
