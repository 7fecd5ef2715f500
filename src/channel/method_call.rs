//! Inbound method call

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::error::Result;
use crate::codec::{MethodCodec, MethodResponse, Value};
use crate::messenger::ResponseHandle;

/// A decoded method call awaiting exactly one response.
///
/// Every `respond*` method consumes the call. Dropping it unanswered sends an
/// empty (not-implemented) reply through the underlying [`ResponseHandle`].
pub struct MethodCall {
    name: String,
    args: Value,
    handle: ResponseHandle,
    codec: Rc<dyn MethodCodec>,
}

impl MethodCall {
    pub(crate) fn new(name: String, args: Value, handle: ResponseHandle, codec: Rc<dyn MethodCodec>) -> Self {
        Self {
            name,
            args,
            handle,
            codec,
        }
    }

    /// Method name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method arguments
    #[must_use]
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Take the arguments, leaving [`Value::Null`]
    pub fn take_args(&mut self) -> Value {
        std::mem::take(&mut self.args)
    }

    /// Reply with `response`.
    ///
    /// If the response cannot be encoded the caller still receives an empty
    /// reply and the encode error is returned.
    pub fn respond(self, response: &MethodResponse) -> Result<()> {
        match self.codec.encode_response(response) {
            Ok(message) => Ok(self.handle.respond(&message)?),
            Err(err) => {
                debug!(method = %self.name, error = %err, "response encode failed; replying not implemented");
                self.handle.respond_not_implemented()?;
                Err(err.into())
            }
        }
    }

    /// Reply with a success envelope
    pub fn respond_success(self, result: impl Into<Value>) -> Result<()> {
        self.respond(&MethodResponse::Success(result.into()))
    }

    /// Reply with an error envelope
    pub fn respond_error(
        self,
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<Value>,
    ) -> Result<()> {
        self.respond(&MethodResponse::error(code, message, details))
    }

    /// Reply with an empty (not-implemented) message
    pub fn respond_not_implemented(self) -> Result<()> {
        Ok(self.handle.respond_not_implemented()?)
    }
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("channel", &self.handle.channel())
            .finish_non_exhaustive()
    }
}
