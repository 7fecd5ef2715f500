//! Ping-pong over a method channel on the loopback transport

use std::rc::Rc;

use platch::{BinaryMessenger, MemoryTransport, MethodChannel, MethodResponse, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("platch Ping-Pong Example");
    println!("========================\n");

    let transport = Rc::new(MemoryTransport::loopback());
    let messenger = BinaryMessenger::with_transport(transport.clone());
    let channel = MethodChannel::with_standard_codec(&messenger, "demo/ping");

    channel.set_method_call_handler(|call| {
        let outcome = match call.name() {
            "ping" => {
                let count = call.args().as_int().unwrap_or(0);
                call.respond_success(count + 1)
            }
            _ => call.respond_not_implemented(),
        };
        if let Err(err) = outcome {
            eprintln!("reply failed: {err}");
        }
    });

    for (method, args) in [("ping", Value::Int(1)), ("ping", Value::Int(41)), ("pong", Value::Null)] {
        let label = format!("{method}({args})");
        channel.invoke_method(method, &args, None, move |outcome| match outcome {
            Ok(MethodResponse::Success(result)) => println!("{label} -> {result}"),
            Ok(MethodResponse::Error(err)) => println!("{label} failed: {err}"),
            Ok(MethodResponse::NotImplemented) => println!("{label} -> not implemented"),
            Err(err) => println!("{label} error: {err}"),
        });
    }

    let metrics = messenger.metrics();
    println!(
        "\nsent={} replies={} outstanding handles={}",
        metrics.sent_messages,
        metrics.replies_received,
        transport.outstanding_handles()
    );

    Ok(())
}
