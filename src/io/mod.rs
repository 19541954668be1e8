// src/io/mod.rs
//
// IO layer for the serial connection manager.
// Error taxonomy, event plumbing, and the serial driver itself.

mod error;
pub mod events;
pub mod serial;

pub use error::IoError;
pub use events::{ChannelSink, EventSink, ManagerEvent};
pub use serial::{
    FlowControl, Parity, PortBackend, PortSettings, SerialManager, SerialStream, SystemBackend,
};
