mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::SimEngine;
use platch::{
    BinaryMessenger, ChannelError, EventChannel, EventSink, MethodCodec, MethodResponse, StandardMethodCodec, Value,
};

const CHANNEL: &str = "samples/ticks";

struct Subscription {
    _sink: EventSink,
    drops: Rc<Cell<u32>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn control(engine: &SimEngine, method: &str) -> MethodResponse {
    let codec = StandardMethodCodec::new();
    let token = engine.call(CHANNEL, &codec.encode_method_call(method, &Value::Null).unwrap());
    engine.pump();
    codec.decode_response(&engine.response(token).unwrap()).unwrap()
}

fn decoded_events(engine: &SimEngine) -> Vec<MethodResponse> {
    let codec = StandardMethodCodec::new();
    engine
        .events()
        .into_iter()
        .map(|(channel, message)| {
            assert_eq!(channel, CHANNEL);
            codec.decode_response(&message).unwrap()
        })
        .collect()
}

#[test]
fn listen_emit_cancel_lifecycle() {
    let engine = SimEngine::new();
    let messenger = BinaryMessenger::with_transport(engine.clone());
    let channel = EventChannel::with_standard_codec(&messenger, CHANNEL);

    let drops = Rc::new(Cell::new(0));
    let sink_slot: Rc<RefCell<Option<EventSink>>> = Rc::default();
    let (slot, counter) = (Rc::clone(&sink_slot), Rc::clone(&drops));
    channel.set_stream_handlers(
        move |_, sink| {
            *slot.borrow_mut() = Some(sink.clone());
            Ok(Subscription {
                _sink: sink,
                drops: Rc::clone(&counter),
            })
        },
        |_, _| Ok(()),
    );

    assert_eq!(control(&engine, "listen"), MethodResponse::Success(Value::Null));
    let sink = sink_slot.borrow().clone().unwrap();
    for tick in 1..=5 {
        sink.success(&Value::Int(tick)).unwrap();
    }

    assert_eq!(control(&engine, "cancel"), MethodResponse::Success(Value::Null));
    assert_eq!(drops.get(), 1);
    assert!(matches!(
        sink.success(&Value::Int(6)),
        Err(ChannelError::ListenerGone { .. })
    ));

    assert_eq!(
        decoded_events(&engine),
        (1..=5).map(|tick| MethodResponse::Success(Value::Int(tick))).collect::<Vec<_>>()
    );
}

#[test]
fn relisten_drops_first_context_once() {
    let engine = SimEngine::new();
    let messenger = BinaryMessenger::with_transport(engine.clone());
    let channel = EventChannel::with_standard_codec(&messenger, CHANNEL);

    let drops = Rc::new(Cell::new(0));
    let sinks: Rc<RefCell<Vec<EventSink>>> = Rc::default();
    let (collected, counter) = (Rc::clone(&sinks), Rc::clone(&drops));
    channel.set_stream_handlers(
        move |_, sink| {
            collected.borrow_mut().push(sink.clone());
            Ok(Subscription {
                _sink: sink,
                drops: Rc::clone(&counter),
            })
        },
        |_, _| Ok(()),
    );

    control(&engine, "listen");
    control(&engine, "listen");
    assert_eq!(drops.get(), 1);

    let sinks = sinks.borrow();
    assert!(sinks[0].success(&Value::from("first")).is_err());
    sinks[1].success(&Value::from("second")).unwrap();
    assert_eq!(
        decoded_events(&engine),
        vec![MethodResponse::Success(Value::from("second"))]
    );
}

#[test]
fn channel_keeps_answering_after_handle_dropped() {
    let engine = SimEngine::new();
    let messenger = BinaryMessenger::with_transport(engine.clone());
    {
        let channel = EventChannel::with_standard_codec(&messenger, CHANNEL);
        channel.set_stream_handlers(|_, _| Ok(()), |_, _| Ok(()));
    }
    assert_eq!(control(&engine, "listen"), MethodResponse::Success(Value::Null));
    assert_eq!(control(&engine, "cancel"), MethodResponse::Success(Value::Null));
}
