//! Request/response channel

use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use super::error::{ChannelError, Result};
use super::method_call::MethodCall;
use crate::codec::{MethodCodec, MethodResponse, StandardMethodCodec, Value};
use crate::messenger::{BinaryMessenger, Cancellable};

/// Named channel carrying method calls encoded with a [`MethodCodec`].
///
/// The handler registration lives in the messenger: dropping the channel
/// object leaves an installed handler in place until
/// [`clear_method_call_handler`](Self::clear_method_call_handler) runs or
/// another handler replaces it.
pub struct MethodChannel {
    messenger: BinaryMessenger,
    name: String,
    codec: Rc<dyn MethodCodec>,
}

impl MethodChannel {
    /// Create a channel bound to `messenger` and `codec`
    pub fn new(messenger: &BinaryMessenger, name: impl Into<String>, codec: Rc<dyn MethodCodec>) -> Self {
        Self {
            messenger: messenger.clone(),
            name: name.into(),
            codec,
        }
    }

    /// Create a channel using [`StandardMethodCodec`]
    pub fn with_standard_codec(messenger: &BinaryMessenger, name: impl Into<String>) -> Self {
        Self::new(messenger, name, Rc::new(StandardMethodCodec::new()))
    }

    /// Channel name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound codec
    #[must_use]
    pub fn codec(&self) -> &Rc<dyn MethodCodec> {
        &self.codec
    }

    /// Bound messenger
    #[must_use]
    pub fn messenger(&self) -> &BinaryMessenger {
        &self.messenger
    }

    /// Invoke `method` on the other side.
    ///
    /// `completion` receives exactly one outcome. Encode failures complete
    /// synchronously without touching the messenger; undecodable replies
    /// complete with [`ChannelError::Codec`].
    pub fn invoke_method<F>(&self, method: &str, args: &Value, cancellable: Option<&Cancellable>, completion: F)
    where
        F: FnOnce(Result<MethodResponse>) + 'static,
    {
        let message = match self.codec.encode_method_call(method, args) {
            Ok(message) => message,
            Err(err) => {
                debug!(channel = %self.name, method, error = %err, "method call encode failed");
                completion(Err(err.into()));
                return;
            }
        };

        let codec = Rc::clone(&self.codec);
        self.messenger
            .send_on_channel(&self.name, &message, cancellable, move |reply| {
                let outcome = reply
                    .map_err(ChannelError::from)
                    .and_then(|bytes| codec.decode_response(&bytes).map_err(ChannelError::from));
                completion(outcome);
            });
    }

    /// Install the handler for inbound calls, replacing any previous one.
    ///
    /// Calls that cannot be decoded are answered with an empty reply and
    /// never reach `handler`.
    pub fn set_method_call_handler<F>(&self, handler: F)
    where
        F: Fn(MethodCall) + 'static,
    {
        let codec = Rc::clone(&self.codec);
        self.messenger
            .set_message_handler_on_channel(&self.name, move |_, channel, message, handle| {
                match codec.decode_method_call(&message) {
                    Ok((name, args)) => handler(MethodCall::new(name, args, handle, Rc::clone(&codec))),
                    Err(err) => {
                        warn!(channel, error = %err, "undecodable method call");
                        if let Err(err) = handle.respond_not_implemented() {
                            debug!(channel, error = %err, "failed to answer undecodable call");
                        }
                    }
                }
            });
    }

    /// Remove the inbound call handler
    pub fn clear_method_call_handler(&self) {
        self.messenger.clear_message_handler_on_channel(&self.name);
    }
}

impl fmt::Debug for MethodChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodChannel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
