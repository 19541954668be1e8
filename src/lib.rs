// src/lib.rs
//
// portlink: serial port connection management with push notifications.
// Discover ports, open one with fixed framing, send text, and receive
// data and state changes through a caller-supplied event sink.

#[macro_use]
mod logging;

pub mod io;

pub use io::{ChannelSink, EventSink, IoError, ManagerEvent};
pub use io::{
    FlowControl, Parity, PortBackend, PortSettings, SerialManager, SerialStream, SystemBackend,
};
pub use logging::{init_file_logging, stop_file_logging};
