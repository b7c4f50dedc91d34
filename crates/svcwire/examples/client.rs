//! Resolve `serviceTest` and call `reply::(s)` with "plaf".
//!
//! Run with a directory listening on the default address:
//!   cargo run --example client
//!
//! Or point it elsewhere:
//!   cargo run --example client -- tcp://10.0.0.5:5555

use svcwire::frame::Message;
use svcwire::session::Session;
use svcwire::transport::DEFAULT_DIRECTORY;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DIRECTORY.to_string());

    let mut session = Session::new();
    if !session.connect(&address) {
        eprintln!("cannot connect to {address}");
        return Ok(());
    }

    let Some(object) = session.service("serviceTest") else {
        eprintln!("serviceTest is not registered");
        return Ok(());
    };

    let mut message = Message::new();
    message.write_string("plaf");

    let future = object.call("reply::(s)", &message)?;
    future.wait(None)?;

    match future.value() {
        Ok(mut reply) => println!("Reply: {}", reply.read_string()?),
        Err(err) => eprintln!("call failed: {err}"),
    }

    session.disconnect();
    Ok(())
}
