// src/io/events.rs
//
// Event surface for the serial manager. Every state transition is pushed
// through an EventSink; ManagerEvent is the serializable mirror for
// bridges that forward notifications as tagged JSON.

use serde::Serialize;
use tokio::sync::mpsc;

// ============================================================================
// Event Payloads
// ============================================================================

/// Manager notification, tagged for event-bridge consumers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ManagerEvent {
    PortChanged { port: String },
    ConnectionChanged { connected: bool },
    PortsChanged { ports: Vec<String> },
    DataReceived { text: String },
    ErrorOccurred { message: String },
}

// ============================================================================
// Sink Trait
// ============================================================================

/// Receiver of manager notifications.
///
/// Callbacks are invoked synchronously, either on the caller's task or on
/// the read-loop thread, so implementations must not block.
pub trait EventSink: Send + Sync {
    /// Current port selection changed.
    fn on_port_changed(&self, port: &str);
    /// Connection opened (`true`) or closed (`false`).
    fn on_connection_changed(&self, connected: bool);
    /// Available port list was re-enumerated.
    fn on_ports_changed(&self, ports: &[String]);
    /// Text decoded from received bytes.
    fn on_data_received(&self, text: &str);
    /// Human-readable failure description.
    fn on_error(&self, message: &str);
}

// ============================================================================
// Channel Sink
// ============================================================================

/// Sink that forwards every notification into an unbounded channel as a
/// `ManagerEvent`, for async consumers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ManagerEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ManagerEvent) {
        // Receiver gone means nobody is listening; drop the event.
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_port_changed(&self, port: &str) {
        self.forward(ManagerEvent::PortChanged {
            port: port.to_string(),
        });
    }

    fn on_connection_changed(&self, connected: bool) {
        self.forward(ManagerEvent::ConnectionChanged { connected });
    }

    fn on_ports_changed(&self, ports: &[String]) {
        self.forward(ManagerEvent::PortsChanged {
            ports: ports.to_vec(),
        });
    }

    fn on_data_received(&self, text: &str) {
        self.forward(ManagerEvent::DataReceived {
            text: text.to_string(),
        });
    }

    fn on_error(&self, message: &str) {
        self.forward(ManagerEvent::ErrorOccurred {
            message: message.to_string(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = ManagerEvent::ConnectionChanged { connected: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "connection-changed",
                "payload": { "connected": true }
            })
        );

        let event = ManagerEvent::PortsChanged {
            ports: vec!["/dev/ttyUSB0".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "ports-changed",
                "payload": { "ports": ["/dev/ttyUSB0"] }
            })
        );
    }

    #[test]
    fn test_channel_sink_delivery() {
        let (sink, mut rx) = ChannelSink::new();

        sink.on_port_changed("COM3");
        sink.on_data_received("hello");
        sink.on_error("Port not open");

        assert_eq!(
            rx.try_recv().unwrap(),
            ManagerEvent::PortChanged {
                port: "COM3".to_string()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ManagerEvent::DataReceived {
                text: "hello".to_string()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ManagerEvent::ErrorOccurred {
                message: "Port not open".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        // Must not panic with the receiver gone
        sink.on_connection_changed(false);
    }
}
