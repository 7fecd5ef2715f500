//! Simulated engine shared by the integration tests.
//!
//! Unlike the in-crate memory transport, nothing is delivered re-entrantly:
//! every message and reply is queued and only runs on `pump`.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use platch::messenger::{Receiver, ReplyCallback, ReplyHandle, ResponseToken};
use platch::{Transport, TransportError};

type EngineHandler = Box<dyn Fn(&[u8]) -> Vec<u8>>;

enum Event {
    Inbound { channel: String, message: Bytes, token: u64 },
    Reply { handle: u64, message: Bytes },
}

#[derive(Default)]
pub struct SimEngine {
    queue: RefCell<VecDeque<Event>>,
    receivers: RefCell<HashMap<String, Receiver>>,
    engine_handlers: RefCell<HashMap<String, EngineHandler>>,
    callbacks: RefCell<HashMap<u64, ReplyCallback>>,
    live_handles: RefCell<HashMap<u64, ()>>,
    next_id: Cell<u64>,
    responses: RefCell<HashMap<u64, Bytes>>,
    events: RefCell<Vec<(String, Bytes)>>,
}

impl SimEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    /// Engine-side handler answering plugin calls on `channel`.
    pub fn handle(&self, channel: &str, handler: impl Fn(&[u8]) -> Vec<u8> + 'static) {
        self.engine_handlers
            .borrow_mut()
            .insert(channel.to_owned(), Box::new(handler));
    }

    /// Queue an engine-to-plugin message and return its token id.
    pub fn call(&self, channel: &str, message: &[u8]) -> u64 {
        let token = self.next_id();
        self.queue.borrow_mut().push_back(Event::Inbound {
            channel: channel.to_owned(),
            message: Bytes::copy_from_slice(message),
            token,
        });
        token
    }

    /// Run queued events until the queue is empty.
    pub fn pump(&self) -> usize {
        let mut processed = 0;
        loop {
            let event = self.queue.borrow_mut().pop_front();
            let Some(event) = event else {
                return processed;
            };
            processed += 1;
            match event {
                Event::Inbound {
                    channel,
                    message,
                    token,
                } => {
                    let receiver = self.receivers.borrow().get(&channel).cloned();
                    match receiver {
                        Some(receiver) => receiver(&channel, message, ResponseToken::new(token)),
                        None => {
                            self.responses.borrow_mut().insert(token, Bytes::new());
                        }
                    }
                }
                Event::Reply { handle, message } => {
                    let callback = self.callbacks.borrow_mut().remove(&handle);
                    if let Some(callback) = callback {
                        callback(message);
                    }
                }
            }
        }
    }

    pub fn response(&self, token: u64) -> Option<Bytes> {
        self.responses.borrow().get(&token).cloned()
    }

    pub fn response_count(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Fire-and-forget messages received from the plugin side.
    pub fn events(&self) -> Vec<(String, Bytes)> {
        self.events.borrow().clone()
    }

    pub fn outstanding_handles(&self) -> usize {
        self.live_handles.borrow().len()
    }
}

impl Transport for SimEngine {
    fn create_reply_handle(&self, on_reply: ReplyCallback) -> Result<ReplyHandle, TransportError> {
        let id = self.next_id();
        self.callbacks.borrow_mut().insert(id, on_reply);
        self.live_handles.borrow_mut().insert(id, ());
        Ok(ReplyHandle::new(id))
    }

    fn release_reply_handle(&self, handle: ReplyHandle) {
        assert!(
            self.live_handles.borrow_mut().remove(&handle.id()).is_some(),
            "handle {} released twice",
            handle.id()
        );
    }

    fn send(&self, channel: &str, message: &[u8], reply: Option<&ReplyHandle>) -> Result<(), TransportError> {
        let Some(reply) = reply else {
            self.events
                .borrow_mut()
                .push((channel.to_owned(), Bytes::copy_from_slice(message)));
            return Ok(());
        };
        let answer = self
            .engine_handlers
            .borrow()
            .get(channel)
            .map(|handler| handler(message))
            .unwrap_or_default();
        self.queue.borrow_mut().push_back(Event::Reply {
            handle: reply.id(),
            message: Bytes::from(answer),
        });
        Ok(())
    }

    fn respond(&self, token: ResponseToken, message: &[u8]) -> Result<(), TransportError> {
        let mut responses = self.responses.borrow_mut();
        if responses.contains_key(&token.id()) {
            return Err(TransportError::UnknownToken { id: token.id() });
        }
        responses.insert(token.id(), Bytes::copy_from_slice(message));
        Ok(())
    }

    fn set_receiver(&self, channel: &str, receiver: Option<Receiver>) {
        let previous = match receiver {
            Some(receiver) => self
                .receivers
                .borrow_mut()
                .insert(channel.to_owned(), receiver),
            None => self.receivers.borrow_mut().remove(channel),
        };
        drop(previous);
    }
}
