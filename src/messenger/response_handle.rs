//! Single-use reply authority for inbound messages.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use super::binary_messenger::WeakMessenger;
use super::error::{MessengerError, Result};
use super::transport::{MessengerConfig, ResponseToken, Transport};

/// Authority to answer one inbound message.
///
/// [`respond`](Self::respond) consumes the handle, so a message cannot be
/// answered twice. A handle dropped without a reply answers with an empty
/// (not-implemented) message unless
/// [`MessengerConfig::reply_on_drop`](super::MessengerConfig::reply_on_drop)
/// is off.
///
/// The handle keeps the transport alive, so it can still answer after the
/// messenger that dispatched the message is gone.
pub struct ResponseHandle {
    transport: Rc<dyn Transport>,
    messenger: WeakMessenger,
    channel: String,
    token: Option<ResponseToken>,
    max_message_size: usize,
    reply_on_drop: bool,
}

impl ResponseHandle {
    pub(crate) fn new(
        transport: Rc<dyn Transport>,
        messenger: WeakMessenger,
        config: &MessengerConfig,
        channel: &str,
        token: ResponseToken,
    ) -> Self {
        Self {
            transport,
            messenger,
            channel: channel.to_owned(),
            token: Some(token),
            max_message_size: config.max_message_size,
            reply_on_drop: config.reply_on_drop,
        }
    }

    /// Channel the message arrived on
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Send the reply. An empty message means not implemented.
    ///
    /// A reply above the size limit is replaced by an empty one and the
    /// caller gets [`MessengerError::MessageTooLarge`].
    pub fn respond(mut self, message: &[u8]) -> Result<()> {
        match self.token.take() {
            Some(token) => self.send(token, message),
            None => Ok(()),
        }
    }

    /// Reply with an empty (not-implemented) message.
    pub fn respond_not_implemented(self) -> Result<()> {
        self.respond(&[])
    }

    fn send(&self, token: ResponseToken, message: &[u8]) -> Result<()> {
        let max = self.max_message_size;
        if message.len() > max {
            warn!(channel = %self.channel, len = message.len(), max, "response too large; replying not implemented");
            self.transport.respond(token, &[])?;
            self.record_reply();
            return Err(MessengerError::MessageTooLarge {
                channel: self.channel.clone(),
                len: message.len(),
                max,
            });
        }
        self.transport.respond(token, message)?;
        self.record_reply();
        Ok(())
    }

    fn record_reply(&self) {
        if let Some(messenger) = self.messenger.upgrade() {
            messenger.record_reply_sent();
        }
    }
}

impl Drop for ResponseHandle {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if !self.reply_on_drop {
            warn!(channel = %self.channel, "response handle dropped without a reply");
            return;
        }
        warn!(channel = %self.channel, "response handle dropped without a reply; sending empty reply");
        if let Err(err) = self.send(token, &[]) {
            debug!(error = %err, "failed to send empty reply for dropped handle");
        }
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("channel", &self.channel)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
