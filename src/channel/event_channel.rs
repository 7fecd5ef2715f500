//! Listen/cancel event stream channel
//!
//! The other side subscribes with a `listen` method call and unsubscribes
//! with `cancel`. While subscribed, events flow back as fire-and-forget
//! success or error envelopes on the same channel; an empty message marks
//! the end of the stream.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::error::{ChannelError, Result};
use crate::codec::{MethodCodec, MethodError, StandardMethodCodec, Value};
use crate::messenger::{BinaryMessenger, MessengerError, ResponseHandle, TransportError, WeakMessenger};

const LISTEN: &str = "listen";
const CANCEL: &str = "cancel";

type ListenFn = dyn Fn(&Value, EventSink) -> std::result::Result<Box<dyn Any>, MethodError>;
type CancelFn = dyn Fn(&Value, Option<&mut dyn Any>) -> std::result::Result<(), MethodError>;

struct StreamHandlers {
    on_listen: Box<ListenFn>,
    on_cancel: Box<CancelFn>,
}

/// Per-subscription state. At most one is live per channel.
struct ListenerState {
    context: RefCell<Option<Box<dyn Any>>>,
}

struct EventCore {
    name: String,
    codec: Rc<dyn MethodCodec>,
    messenger: WeakMessenger,
    handlers: RefCell<Option<Rc<StreamHandlers>>>,
    listener: RefCell<Option<Rc<ListenerState>>>,
}

/// Named channel exposing a stream of events to the other side.
///
/// The messenger handler is installed on construction and stays installed
/// after the channel object is dropped.
pub struct EventChannel {
    messenger: BinaryMessenger,
    core: Rc<EventCore>,
}

impl EventChannel {
    /// Create a channel and start answering `listen`/`cancel` on it
    pub fn new(messenger: &BinaryMessenger, name: impl Into<String>, codec: Rc<dyn MethodCodec>) -> Self {
        let core = Rc::new(EventCore {
            name: name.into(),
            codec,
            messenger: messenger.downgrade(),
            handlers: RefCell::new(None),
            listener: RefCell::new(None),
        });
        let handler_core = Rc::clone(&core);
        messenger.set_message_handler_on_channel(&core.name, move |_, _, message, handle| {
            handler_core.handle_message(&message, handle);
        });
        Self {
            messenger: messenger.clone(),
            core,
        }
    }

    /// Create a channel using [`StandardMethodCodec`]
    pub fn with_standard_codec(messenger: &BinaryMessenger, name: impl Into<String>) -> Self {
        Self::new(messenger, name, Rc::new(StandardMethodCodec::new()))
    }

    /// Channel name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Bound messenger
    #[must_use]
    pub fn messenger(&self) -> &BinaryMessenger {
        &self.messenger
    }

    /// Check if a subscription is active
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.core.listener.borrow().is_some()
    }

    /// Install the subscription callbacks.
    ///
    /// `on_listen` receives the listen arguments and a sink bound to the new
    /// subscription; the context it returns is kept until the subscription
    /// ends and handed to `on_cancel`. `on_cancel` runs for every `cancel`,
    /// with `None` when no subscription is live.
    pub fn set_stream_handlers<C, L, X>(&self, on_listen: L, on_cancel: X)
    where
        C: 'static,
        L: Fn(&Value, EventSink) -> std::result::Result<C, MethodError> + 'static,
        X: Fn(&Value, Option<&mut C>) -> std::result::Result<(), MethodError> + 'static,
    {
        let handlers = StreamHandlers {
            on_listen: Box::new(move |args: &Value, sink: EventSink| {
                on_listen(args, sink).map(|context| Box::new(context) as Box<dyn Any>)
            }),
            on_cancel: Box::new(move |args: &Value, context: Option<&mut dyn Any>| {
                let Some(context) = context else {
                    return on_cancel(args, None);
                };
                match context.downcast_mut::<C>() {
                    Some(context) => on_cancel(args, Some(context)),
                    None => {
                        warn!(
                            expected = std::any::type_name::<C>(),
                            "listener context was created by replaced handlers; cancelling without it"
                        );
                        on_cancel(args, None)
                    }
                }
            }),
        };
        let previous = self.core.handlers.replace(Some(Rc::new(handlers)));
        drop(previous);
    }

    /// Remove the subscription callbacks. An active subscription stays
    /// alive until it is cancelled.
    pub fn clear_stream_handlers(&self) {
        let previous = self.core.handlers.take();
        drop(previous);
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.core.name)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

impl EventCore {
    fn handle_message(self: &Rc<Self>, message: &[u8], handle: ResponseHandle) {
        let (method, args) = match self.codec.decode_method_call(message) {
            Ok(call) => call,
            Err(err) => {
                warn!(channel = %self.name, error = %err, "undecodable event channel call");
                self.reply_not_implemented(handle);
                return;
            }
        };
        match method.as_str() {
            LISTEN => self.listen(&args, handle),
            CANCEL => self.cancel(&args, handle),
            other => {
                debug!(channel = %self.name, method = other, "unknown event channel method");
                self.reply_not_implemented(handle);
            }
        }
    }

    fn listen(self: &Rc<Self>, args: &Value, handle: ResponseHandle) {
        // the previous subscription ends before the new one starts
        let previous = self.listener.take();
        drop(previous);

        let Some(handlers) = self.handlers.borrow().clone() else {
            trace!(channel = %self.name, "listen with no stream handlers");
            self.reply(handle, Ok(()));
            return;
        };

        let state = Rc::new(ListenerState {
            context: RefCell::new(None),
        });
        let sink = EventSink {
            state: Rc::downgrade(&state),
            core: Rc::downgrade(self),
        };
        *self.listener.borrow_mut() = Some(Rc::clone(&state));

        match (handlers.on_listen)(args, sink) {
            Ok(context) => {
                *state.context.borrow_mut() = Some(context);
                debug!(channel = %self.name, "stream listening");
                self.reply(handle, Ok(()));
            }
            Err(err) => {
                // discard the state only if it is still the current one
                let current = {
                    let mut listener = self.listener.borrow_mut();
                    if listener.as_ref().is_some_and(|l| Rc::ptr_eq(l, &state)) {
                        listener.take()
                    } else {
                        None
                    }
                };
                drop(current);
                debug!(channel = %self.name, error = %err, "listen rejected");
                self.reply(handle, Err(err));
            }
        }
    }

    fn cancel(&self, args: &Value, handle: ResponseHandle) {
        let state = self.listener.take();
        let handlers = self.handlers.borrow().clone();
        let mut context = state.as_ref().and_then(|state| state.context.take());
        let outcome = match handlers {
            Some(handlers) => (handlers.on_cancel)(args, context.as_deref_mut()),
            None => Ok(()),
        };
        // context and state are released regardless of the outcome
        drop(context);
        debug!(
            channel = %self.name,
            was_listening = state.is_some(),
            ok = outcome.is_ok(),
            "stream cancelled"
        );
        drop(state);
        self.reply(handle, outcome);
    }

    fn reply(&self, handle: ResponseHandle, outcome: std::result::Result<(), MethodError>) {
        let encoded = match &outcome {
            Ok(()) => self.codec.encode_success_envelope(&Value::Null),
            Err(err) => self
                .codec
                .encode_error_envelope(&err.code, &err.message, &err.details),
        };
        let sent = match encoded {
            Ok(message) => handle.respond(&message),
            Err(err) => {
                debug!(channel = %self.name, error = %err, "event channel reply encode failed");
                handle.respond_not_implemented()
            }
        };
        if let Err(err) = sent {
            debug!(channel = %self.name, error = %err, "event channel reply failed");
        }
    }

    fn reply_not_implemented(&self, handle: ResponseHandle) {
        if let Err(err) = handle.respond_not_implemented() {
            debug!(channel = %self.name, error = %err, "event channel reply failed");
        }
    }
}

/// Sends events for one subscription.
///
/// Only usable while its subscription is live; afterwards every method
/// returns [`ChannelError::ListenerGone`] without touching the wire.
#[derive(Clone)]
pub struct EventSink {
    state: Weak<ListenerState>,
    core: Weak<EventCore>,
}

impl EventSink {
    fn target(&self) -> Result<(Rc<EventCore>, BinaryMessenger)> {
        let core = self.core.upgrade().ok_or_else(|| ChannelError::ListenerGone {
            channel: String::new(),
        })?;
        let live = self
            .state
            .upgrade()
            .zip(core.listener.borrow().clone())
            .is_some_and(|(mine, current)| Rc::ptr_eq(&mine, &current));
        if !live {
            return Err(ChannelError::ListenerGone {
                channel: core.name.clone(),
            });
        }
        let messenger = core
            .messenger
            .upgrade()
            .ok_or(MessengerError::Transport(TransportError::Closed))?;
        Ok((core, messenger))
    }

    /// Check if the subscription is still live
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.target().is_ok()
    }

    /// Send an event
    pub fn success(&self, event: &Value) -> Result<()> {
        let (core, messenger) = self.target()?;
        let message = core.codec.encode_success_envelope(event)?;
        messenger.send_on_channel_no_response(&core.name, &message)?;
        Ok(())
    }

    /// Send an error event
    pub fn error(&self, code: &str, message: &str, details: &Value) -> Result<()> {
        let (core, messenger) = self.target()?;
        let encoded = core.codec.encode_error_envelope(code, message, details)?;
        messenger.send_on_channel_no_response(&core.name, &encoded)?;
        Ok(())
    }

    /// Signal the end of the stream with an empty message
    pub fn end_of_stream(&self) -> Result<()> {
        let (core, messenger) = self.target()?;
        messenger.send_on_channel_no_response(&core.name, &[])?;
        Ok(())
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
