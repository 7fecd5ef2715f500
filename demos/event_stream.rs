//! Event channel subscription driven from the engine side

use std::cell::RefCell;
use std::rc::Rc;

use platch::{
    BinaryMessenger, EventChannel, EventSink, MemoryTransport, MethodCodec, StandardMethodCodec, Value,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("platch Event Stream Example");
    println!("===========================\n");

    let transport = Rc::new(MemoryTransport::new());
    let messenger = BinaryMessenger::with_transport(transport.clone());
    let channel = EventChannel::with_standard_codec(&messenger, "demo/ticks");

    let sink_slot: Rc<RefCell<Option<EventSink>>> = Rc::default();
    let slot = Rc::clone(&sink_slot);
    channel.set_stream_handlers(
        move |args, sink| {
            println!("listen({args})");
            *slot.borrow_mut() = Some(sink);
            Ok(())
        },
        |args, _| {
            println!("cancel({args})");
            Ok(())
        },
    );

    // Engine subscribes
    let codec = StandardMethodCodec::new();
    transport.deliver("demo/ticks", &codec.encode_method_call("listen", &Value::Null)?);

    let sink = sink_slot.borrow().clone().ok_or("listener not installed")?;
    for tick in 1..=3 {
        sink.success(&Value::Int(tick))?;
    }
    sink.end_of_stream()?;

    for sent in transport.take_sent() {
        if sent.message.is_empty() {
            println!("engine received end of stream");
        } else {
            println!("engine received {:?}", codec.decode_response(&sent.message)?);
        }
    }

    // Engine unsubscribes
    transport.deliver("demo/ticks", &codec.encode_method_call("cancel", &Value::Null)?);
    match sink.success(&Value::Int(4)) {
        Ok(()) => println!("unexpected: event sent after cancel"),
        Err(err) => println!("after cancel: {err}"),
    }

    Ok(())
}
