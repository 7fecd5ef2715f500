//! Channel registry and router.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, instrument, trace, warn};

use super::error::{MessengerError, Result};
use super::metrics::{Counter, MessengerMetrics, MetricsSnapshot};
use super::response_handle::ResponseHandle;
use super::transport::{Cancellable, MessengerConfig, Receiver, ReplyCallback, ReplyHandle, ResponseToken, Transport};

/// Handler installed on a channel.
///
/// State captured by the closure lives as long as the registration and is
/// dropped when the handler is replaced or removed.
pub type MessageHandler = Rc<dyn Fn(&BinaryMessenger, &str, Bytes, ResponseHandle)>;

/// Completion for [`BinaryMessenger::send_on_channel`].
pub type Completion = Box<dyn FnOnce(Result<Bytes>)>;

struct Inner {
    transport: Rc<dyn Transport>,
    handlers: RefCell<HashMap<String, MessageHandler>>,
    config: MessengerConfig,
    metrics: MessengerMetrics,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let channels: Vec<String> = self.handlers.get_mut().keys().cloned().collect();
        for channel in &channels {
            self.transport.set_receiver(channel, None);
        }
        debug!(channels = channels.len(), "messenger dropped; receivers disarmed");
    }
}

/// Routes byte messages between named channels and a [`Transport`].
///
/// Cheap to clone; clones share one registry. Handlers should hold a
/// [`WeakMessenger`] if they need to keep a reference.
#[derive(Clone)]
pub struct BinaryMessenger {
    inner: Rc<Inner>,
}

/// Non-owning reference to a [`BinaryMessenger`].
#[derive(Clone, Default)]
pub struct WeakMessenger {
    inner: Weak<Inner>,
}

impl WeakMessenger {
    /// Upgrade to a strong reference if the messenger is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<BinaryMessenger> {
        self.inner.upgrade().map(|inner| BinaryMessenger { inner })
    }
}

impl fmt::Debug for WeakMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakMessenger")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl BinaryMessenger {
    /// Create a messenger on top of a transport.
    pub fn new(transport: Rc<dyn Transport>, config: MessengerConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                transport,
                handlers: RefCell::new(HashMap::new()),
                config,
                metrics: MessengerMetrics::default(),
            }),
        }
    }

    /// Create a messenger with default configuration.
    pub fn with_transport(transport: Rc<dyn Transport>) -> Self {
        Self::new(transport, MessengerConfig::default())
    }

    /// Create a non-owning reference
    #[must_use]
    pub fn downgrade(&self) -> WeakMessenger {
        WeakMessenger {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &MessengerConfig {
        &self.inner.config
    }

    /// Snapshot of the messenger counters
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Check if a handler is installed on `channel`
    #[must_use]
    pub fn has_handler(&self, channel: &str) -> bool {
        self.inner.handlers.borrow().contains_key(channel)
    }

    /// Check whether two messengers share a registry
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Install `handler` on `channel`, replacing and dropping any previous one.
    pub fn set_message_handler_on_channel<F>(&self, channel: &str, handler: F)
    where
        F: Fn(&Self, &str, Bytes, ResponseHandle) + 'static,
    {
        let handler: MessageHandler = Rc::new(handler);
        self.replace_handler(channel, Some(handler));
    }

    /// Remove the handler on `channel`, dropping its captured state.
    pub fn clear_message_handler_on_channel(&self, channel: &str) {
        self.replace_handler(channel, None);
    }

    /// Install or remove a shared handler.
    pub fn replace_handler(&self, channel: &str, handler: Option<MessageHandler>) {
        let installing = handler.is_some();
        let previous = {
            let mut handlers = self.inner.handlers.borrow_mut();
            match handler {
                Some(handler) => handlers.insert(channel.to_owned(), handler),
                None => handlers.remove(channel),
            }
        };

        if installing {
            if previous.is_none() {
                self.inner.transport.set_receiver(channel, Some(self.receiver()));
            }
            debug!(channel, replaced = previous.is_some(), "message handler installed");
        } else if previous.is_some() {
            self.inner.transport.set_receiver(channel, None);
            debug!(channel, "message handler removed");
        }

        // runs the previous handler's destructor with no borrow held
        drop(previous);
    }

    fn receiver(&self) -> Receiver {
        let messenger = self.downgrade();
        Rc::new(move |channel: &str, message: Bytes, token: ResponseToken| {
            match messenger.upgrade() {
                Some(messenger) => messenger.dispatch(channel, message, token),
                None => debug!(channel, "message arrived after messenger dropped"),
            }
        })
    }

    /// Route an inbound message to the handler for `channel`.
    ///
    /// Channels with no handler are answered with an empty reply.
    #[instrument(level = "trace", skip(self, message, token), fields(len = message.len()))]
    pub fn dispatch(&self, channel: &str, message: Bytes, token: ResponseToken) {
        let handler = self.inner.handlers.borrow().get(channel).cloned();
        let handle = ResponseHandle::new(
            Rc::clone(&self.inner.transport),
            self.downgrade(),
            &self.inner.config,
            channel,
            token,
        );
        match handler {
            Some(handler) => {
                self.inner.metrics.record(Counter::Received);
                handler(self, channel, message, handle);
            }
            None => {
                self.inner.metrics.record(Counter::Unhandled);
                trace!(channel, "no handler; replying not implemented");
                if let Err(err) = handle.respond_not_implemented() {
                    debug!(channel, error = %err, "failed to answer unhandled message");
                }
            }
        }
    }

    /// Answer an inbound message through its [`ResponseHandle`].
    pub fn send_response(&self, handle: ResponseHandle, message: &[u8]) -> Result<()> {
        handle.respond(message)
    }

    pub(crate) fn record_reply_sent(&self) {
        self.inner.metrics.record(Counter::RepliesSent);
    }

    fn check_size(&self, channel: &str, len: usize) -> Result<()> {
        let max = self.inner.config.max_message_size;
        if len > max {
            warn!(channel, len, max, "outbound message too large");
            return Err(MessengerError::MessageTooLarge {
                channel: channel.to_owned(),
                len,
                max,
            });
        }
        Ok(())
    }

    /// Send `message` and deliver the reply to `completion`.
    ///
    /// Never blocks. `completion` runs exactly once: with the reply bytes, or
    /// with an error if the send fails (synchronously, before this returns)
    /// or the transport drops the reply. A cancelled send still completes.
    #[instrument(level = "debug", skip(self, message, cancellable, completion), fields(len = message.len()))]
    pub fn send_on_channel<F>(&self, channel: &str, message: &[u8], cancellable: Option<&Cancellable>, completion: F)
    where
        F: FnOnce(Result<Bytes>) + 'static,
    {
        if let Err(err) = self.check_size(channel, message.len()) {
            self.inner.metrics.record(Counter::SendFailures);
            completion(Err(err));
            return;
        }

        let completion: Completion = Box::new(completion);
        let pending = Rc::new(PendingReply {
            transport: Rc::downgrade(&self.inner.transport),
            channel: channel.to_owned(),
            sent_at: Instant::now(),
            cancellable: cancellable.cloned(),
            completion: Cell::new(Some(completion)),
            handle: Cell::new(None),
            sending: Cell::new(false),
            replied: Cell::new(false),
        });

        let on_reply: ReplyCallback = {
            let pending = Rc::clone(&pending);
            let messenger = self.downgrade();
            Box::new(move |reply| pending.deliver(&messenger, reply))
        };

        let handle = match self.inner.transport.create_reply_handle(on_reply) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(error = %err, "reply handle unavailable");
                self.inner.metrics.record(Counter::SendFailures);
                pending.fail(err.into());
                return;
            }
        };

        pending.sending.set(true);
        let result = self.inner.transport.send(channel, message, Some(&handle));
        pending.sending.set(false);

        match result {
            Ok(()) => {
                self.inner.metrics.record(Counter::Sent);
                if pending.replied.get() {
                    // reply arrived from inside send
                    self.inner.transport.release_reply_handle(handle);
                } else {
                    pending.handle.set(Some(handle));
                }
            }
            Err(err) => {
                debug!(error = %err, "send failed");
                self.inner.metrics.record(Counter::SendFailures);
                self.inner.transport.release_reply_handle(handle);
                pending.fail(err.into());
            }
        }
    }

    /// Send `message` without expecting a reply.
    #[instrument(level = "debug", skip(self, message), fields(len = message.len()))]
    pub fn send_on_channel_no_response(&self, channel: &str, message: &[u8]) -> Result<()> {
        let sent = self
            .check_size(channel, message.len())
            .and_then(|()| {
                self.inner
                    .transport
                    .send(channel, message, None)
                    .map_err(MessengerError::from)
            });
        match &sent {
            Ok(()) => self.inner.metrics.record(Counter::SentNoReply),
            Err(_) => self.inner.metrics.record(Counter::SendFailures),
        }
        sent
    }
}

impl fmt::Debug for BinaryMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryMessenger")
            .field("channels", &self.inner.handlers.borrow().len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Outbound send awaiting its reply.
struct PendingReply {
    // weak: the transport owns the reply callback that owns this
    transport: Weak<dyn Transport>,
    channel: String,
    sent_at: Instant,
    cancellable: Option<Cancellable>,
    completion: Cell<Option<Completion>>,
    handle: Cell<Option<ReplyHandle>>,
    sending: Cell<bool>,
    replied: Cell<bool>,
}

impl PendingReply {
    fn deliver(&self, messenger: &WeakMessenger, reply: Bytes) {
        self.replied.set(true);
        // released even when the messenger is gone; inside send the sender releases it
        if !self.sending.get() {
            if let (Some(handle), Some(transport)) = (self.handle.take(), self.transport.upgrade()) {
                transport.release_reply_handle(handle);
            }
        }
        if let Some(messenger) = messenger.upgrade() {
            messenger.inner.metrics.record(Counter::RepliesReceived);
            messenger.inner.metrics.record_reply_latency(self.sent_at.elapsed());
        }
        if self.cancellable.as_ref().is_some_and(Cancellable::is_cancelled) {
            trace!(channel = %self.channel, "reply delivered to cancelled send");
        }
        if let Some(completion) = self.completion.take() {
            completion(Ok(reply));
        }
    }

    fn fail(&self, err: MessengerError) {
        if let Some(completion) = self.completion.take() {
            completion(Err(err));
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            warn!(channel = %self.channel, "reply callback dropped without a reply");
            completion(Err(MessengerError::ReplyDropped {
                channel: std::mem::take(&mut self.channel),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::{MemoryTransport, TransportError};

    fn recording() -> (Rc<MemoryTransport>, BinaryMessenger) {
        let transport = Rc::new(MemoryTransport::new());
        let messenger = BinaryMessenger::with_transport(transport.clone());
        (transport, messenger)
    }

    fn capture() -> (Rc<RefCell<Vec<Result<Bytes>>>>, impl FnOnce(Result<Bytes>) + 'static) {
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        (results, move |result| sink.borrow_mut().push(result))
    }

    #[test]
    fn test_unregistered_channel_replies_empty() {
        let (transport, messenger) = recording();
        messenger.dispatch("nobody", Bytes::from_static(b"hi"), ResponseToken::new(7));
        let responses = transport.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].token, 7);
        assert!(responses[0].message.is_empty());
        assert_eq!(messenger.metrics().unhandled_messages, 1);
    }

    #[test]
    fn test_handler_receives_and_replies() {
        let (transport, messenger) = recording();
        messenger.set_message_handler_on_channel("echo", |_, channel, message, handle| {
            assert_eq!(channel, "echo");
            handle.respond(&message).unwrap();
        });
        assert!(transport.has_receiver("echo"));

        let token = transport.deliver("echo", b"abc");
        assert_eq!(transport.response_for(token).unwrap(), Bytes::from_static(b"abc"));
        let metrics = messenger.metrics();
        assert_eq!(metrics.received_messages, 1);
        assert_eq!(metrics.replies_sent, 1);
    }

    #[test]
    fn test_replacing_handler_drops_previous_state_once() {
        struct Guard(Rc<Cell<u32>>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let (transport, messenger) = recording();
        let drops = Rc::new(Cell::new(0));
        let first = Guard(Rc::clone(&drops));
        messenger.set_message_handler_on_channel("c", move |_, _, _, handle| {
            let _guard = &first;
            handle.respond(b"first").unwrap();
        });
        messenger.set_message_handler_on_channel("c", |_, _, _, handle| {
            handle.respond(b"second").unwrap();
        });
        assert_eq!(drops.get(), 1);

        let token = transport.deliver("c", b"");
        assert_eq!(transport.response_for(token).unwrap(), Bytes::from_static(b"second"));

        messenger.clear_message_handler_on_channel("c");
        assert!(!messenger.has_handler("c"));
        assert!(!transport.has_receiver("c"));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_dropped_handle_replies_empty() {
        let (transport, messenger) = recording();
        messenger.set_message_handler_on_channel("lazy", |_, _, _, _handle| {});
        let token = transport.deliver("lazy", b"x");
        assert_eq!(transport.response_for(token), Some(Bytes::new()));
    }

    #[test]
    fn test_dropped_handle_silent_when_disabled() {
        let transport = Rc::new(MemoryTransport::new());
        let messenger = BinaryMessenger::new(
            transport.clone(),
            MessengerConfig::default().with_reply_on_drop(false),
        );
        messenger.set_message_handler_on_channel("lazy", |_, _, _, _handle| {});
        let token = transport.deliver("lazy", b"x");
        assert_eq!(transport.response_for(token), None);
    }

    #[test]
    fn test_thousand_inbound_calls_get_one_reply_each() {
        let (transport, messenger) = recording();
        messenger.set_message_handler_on_channel("count", |_, _, message, handle| {
            handle.respond(&message).unwrap();
        });
        for i in 0..1000_u32 {
            transport.deliver("count", &i.to_le_bytes());
        }
        let responses = transport.responses();
        assert_eq!(responses.len(), 1000);
        let mut tokens: Vec<u64> = responses.iter().map(|r| r.token).collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), 1000);
        assert_eq!(messenger.metrics().replies_sent, 1000);
    }

    #[test]
    fn test_handler_may_remove_itself() {
        let (transport, messenger) = recording();
        messenger.set_message_handler_on_channel("once", |messenger, channel, _, handle| {
            messenger.clear_message_handler_on_channel(channel);
            handle.respond(b"bye").unwrap();
        });
        let token = transport.deliver("once", b"");
        assert_eq!(transport.response_for(token).unwrap(), Bytes::from_static(b"bye"));
        assert!(!messenger.has_handler("once"));
    }

    #[test]
    fn test_send_completes_on_reply_and_releases_handle() {
        let (transport, messenger) = recording();
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let handle = sent[0].reply_handle.unwrap();
        assert!(results.borrow().is_empty());

        assert!(transport.complete_reply(handle, b"pong"));
        assert_eq!(results.borrow().len(), 1);
        assert_eq!(results.borrow()[0].as_ref().unwrap(), &Bytes::from_static(b"pong"));
        assert_eq!(transport.released_handles(), vec![handle]);
        assert_eq!(transport.outstanding_handles(), 0);
    }

    #[test]
    fn test_handle_creation_failure_completes_synchronously() {
        let (transport, messenger) = recording();
        transport.fail_next_handle();
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);

        assert!(matches!(
            results.borrow()[0],
            Err(MessengerError::Transport(TransportError::HandlesExhausted { .. }))
        ));
        assert!(transport.sent().is_empty());
        assert_eq!(messenger.metrics().send_failures, 1);
    }

    #[test]
    fn test_send_failure_releases_handle_once() {
        let (transport, messenger) = recording();
        transport.fail_sends(true);
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);

        assert_eq!(results.borrow().len(), 1);
        assert!(results.borrow()[0].is_err());
        assert_eq!(transport.released_handles().len(), 1);
        assert_eq!(transport.outstanding_handles(), 0);
        assert_eq!(transport.double_releases(), 0);
    }

    #[test]
    fn test_reentrant_reply_releases_handle_once() {
        let (transport, messenger) = recording();
        transport.reply_during_send(Bytes::from_static(b"fast"));
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);

        assert_eq!(results.borrow().len(), 1);
        assert_eq!(results.borrow()[0].as_ref().unwrap(), &Bytes::from_static(b"fast"));
        assert_eq!(transport.released_handles().len(), 1);
        assert_eq!(transport.double_releases(), 0);
    }

    #[test]
    fn test_reentrant_reply_then_send_failure_completes_once() {
        let (transport, messenger) = recording();
        transport.reply_during_send(Bytes::from_static(b"fast"));
        transport.fail_sends(true);
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);

        assert_eq!(results.borrow().len(), 1);
        assert!(results.borrow()[0].is_ok());
        assert_eq!(transport.released_handles().len(), 1);
        assert_eq!(transport.double_releases(), 0);
    }

    #[test]
    fn test_dropped_reply_callback_reports_error() {
        let (transport, messenger) = recording();
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);
        let handle = transport.sent()[0].reply_handle.unwrap();

        transport.discard_reply(handle);
        assert!(matches!(
            results.borrow()[0],
            Err(MessengerError::ReplyDropped { .. })
        ));
    }

    #[test]
    fn test_oversize_send_fails_synchronously() {
        let transport = Rc::new(MemoryTransport::new());
        let messenger = BinaryMessenger::new(
            transport.clone(),
            MessengerConfig::default().with_max_message_size(4),
        );
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"too long", None, completion);
        assert!(matches!(
            results.borrow()[0],
            Err(MessengerError::MessageTooLarge { len: 8, max: 4, .. })
        ));
        assert!(messenger.send_on_channel_no_response("out", b"too long").is_err());
        assert!(transport.sent().is_empty());
        assert_eq!(transport.outstanding_handles(), 0);
    }

    #[test]
    fn test_cancelled_send_still_completes() {
        let (transport, messenger) = recording();
        let cancellable = Cancellable::new();
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", Some(&cancellable), completion);
        cancellable.cancel();

        let handle = transport.sent()[0].reply_handle.unwrap();
        transport.complete_reply(handle, b"late");
        assert!(results.borrow()[0].is_ok());
    }

    #[test]
    fn test_fire_and_forget() {
        let (transport, messenger) = recording();
        messenger.send_on_channel_no_response("events", b"tick").unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].channel, "events");
        assert_eq!(sent[0].reply_handle, None);
        assert_eq!(messenger.metrics().sent_without_reply, 1);
        assert_eq!(transport.outstanding_handles(), 0);
    }

    #[test]
    fn test_loopback_roundtrip() {
        let transport = Rc::new(MemoryTransport::loopback());
        let messenger = BinaryMessenger::with_transport(transport.clone());
        messenger.set_message_handler_on_channel("upper", |_, _, message, handle| {
            handle.respond(&message.to_ascii_uppercase()).unwrap();
        });

        let (results, completion) = capture();
        messenger.send_on_channel("upper", b"abc", None, completion);
        assert_eq!(results.borrow()[0].as_ref().unwrap(), &Bytes::from_static(b"ABC"));

        let (results, completion) = capture();
        messenger.send_on_channel("missing", b"abc", None, completion);
        assert!(results.borrow()[0].as_ref().unwrap().is_empty());
        assert_eq!(transport.outstanding_handles(), 0);
        assert_eq!(transport.double_releases(), 0);
    }

    #[test]
    fn test_reply_after_messenger_dropped_releases_handle() {
        let (transport, messenger) = recording();
        let (results, completion) = capture();
        messenger.send_on_channel("out", b"ping", None, completion);
        let handle = transport.sent()[0].reply_handle.unwrap();

        drop(messenger);
        assert!(transport.complete_reply(handle, b"pong"));
        assert_eq!(results.borrow()[0].as_ref().unwrap(), &Bytes::from_static(b"pong"));
        assert_eq!(transport.outstanding_handles(), 0);
        assert_eq!(transport.double_releases(), 0);
    }

    #[test]
    fn test_parked_handle_answers_after_messenger_dropped() {
        let (transport, messenger) = recording();
        let parked: Rc<RefCell<Vec<ResponseHandle>>> = Rc::default();
        let slot = Rc::clone(&parked);
        messenger.set_message_handler_on_channel("slow", move |_, _, _, handle| {
            slot.borrow_mut().push(handle);
        });
        let answered = transport.deliver("slow", b"a");
        let dropped = transport.deliver("slow", b"b");
        drop(messenger);

        let mut handles = parked.borrow_mut();
        let late = handles.pop().unwrap();
        let first = handles.pop().unwrap();
        drop(handles);

        first.respond(b"late").unwrap();
        assert_eq!(transport.response_for(answered).unwrap(), Bytes::from_static(b"late"));

        drop(late);
        assert_eq!(transport.response_for(dropped), Some(Bytes::new()));
    }

    #[test]
    fn test_dropping_messenger_disarms_receivers() {
        let (transport, messenger) = recording();
        messenger.set_message_handler_on_channel("a", |_, _, _, _| {});
        drop(messenger);
        assert!(!transport.has_receiver("a"));
    }
}
