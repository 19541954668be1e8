// src/io/serial/manager.rs
//
// Serial connection manager.
// Owns the port selection, the connection lifecycle, and a blocking read
// loop that services a transmit queue between reads. All state changes
// are pushed through the caller-supplied EventSink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use super::backend::{PortBackend, PortSettings, SerialStream, SystemBackend};
use crate::io::error::IoError;
use crate::io::events::EventSink;

/// Pending writes the transmit queue holds before `send` reports a failure.
const TRANSMIT_QUEUE_DEPTH: usize = 32;

struct TransmitRequest {
    data: Vec<u8>,
}

// ============================================================================
// Manager
// ============================================================================

/// Single-port connection manager.
///
/// `connect`/`disconnect` drive the lifecycle; `send` queues writes without
/// blocking the caller. Received bytes are decoded as UTF-8 (lossy, since a
/// chunk may split a code point) and delivered through the sink.
pub struct SerialManager {
    backend: Arc<dyn PortBackend>,
    sink: Arc<dyn EventSink>,
    settings: PortSettings,
    current_port: String,
    available_ports: Vec<String>,
    /// Shared with the read loop so a forced disconnect is immediately
    /// visible to the caller.
    connected: Arc<AtomicBool>,
    cancel_flag: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    transmit_tx: Option<std_mpsc::SyncSender<TransmitRequest>>,
}

impl SerialManager {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_backend(Arc::new(SystemBackend), sink)
    }

    pub fn with_backend(backend: Arc<dyn PortBackend>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            backend,
            sink,
            settings: PortSettings::default(),
            current_port: String::new(),
            available_ports: Vec::new(),
            connected: Arc::new(AtomicBool::new(false)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            task_handle: None,
            transmit_tx: None,
        }
    }

    /// Currently selected port name. Empty when nothing is selected.
    pub fn current_port(&self) -> &str {
        &self.current_port
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Port list from the most recent `refresh_ports` call.
    pub fn available_ports(&self) -> &[String] {
        &self.available_ports
    }

    /// Record a new port selection. Emits only when the value changes and
    /// has no effect on an open connection.
    pub fn set_current_port(&mut self, port: &str) {
        if self.current_port == port {
            return;
        }
        self.current_port = port.to_string();
        self.sink.on_port_changed(&self.current_port);
    }

    /// Re-enumerate serial devices and replace the stored list.
    /// Always emits the new list; an enumeration failure degrades to empty.
    pub fn refresh_ports(&mut self) {
        self.available_ports = match self.backend.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tlog!("[serial] {}", e);
                Vec::new()
            }
        };
        self.sink.on_ports_changed(&self.available_ports);
    }

    /// Open the selected port and start the read loop.
    ///
    /// With no port selected, emits one error and leaves any existing
    /// connection untouched. An already-open connection is replaced without
    /// an intermediate connection-changed(false).
    pub async fn connect(&mut self) {
        if self.current_port.is_empty() {
            self.sink
                .on_error(&IoError::configuration("No port selected").to_string());
            return;
        }

        self.shutdown_stream().await;

        let stream = match self.backend.open(&self.current_port, &self.settings) {
            Ok(s) => s,
            Err(e) => {
                self.sink.on_error(&e.to_string());
                return;
            }
        };

        tlog!(
            "[serial] Opened {} at {} baud ({}-N-{})",
            self.current_port,
            self.settings.baud_rate,
            self.settings.data_bits,
            self.settings.stop_bits
        );

        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (transmit_tx, transmit_rx) =
            std_mpsc::sync_channel::<TransmitRequest>(TRANSMIT_QUEUE_DEPTH);
        self.cancel_flag = cancel_flag.clone();
        self.transmit_tx = Some(transmit_tx);
        self.connected.store(true, Ordering::SeqCst);
        self.sink.on_connection_changed(true);

        let sink = self.sink.clone();
        let connected = self.connected.clone();
        let port_name = self.current_port.clone();
        self.task_handle = Some(tokio::task::spawn_blocking(move || {
            run_read_loop(stream, port_name, sink, cancel_flag, connected, transmit_rx);
        }));
    }

    /// Close the port if open. Always ends disconnected and always emits
    /// connection-changed(false), even when already closed.
    pub async fn disconnect(&mut self) {
        self.shutdown_stream().await;
        self.sink.on_connection_changed(false);
    }

    /// Queue the UTF-8 bytes of `text` for transmission without blocking.
    /// Not connected: one error event, nothing written. A write failure
    /// later surfaces through the sink, not a return value.
    pub fn send(&self, text: &str) {
        let tx = match self.transmit_tx.as_ref() {
            Some(tx) if self.connected.load(Ordering::SeqCst) => tx,
            _ => {
                self.sink
                    .on_error(&IoError::configuration("Port not open").to_string());
                return;
            }
        };

        if let Err(e) = tx.try_send(TransmitRequest {
            data: text.as_bytes().to_vec(),
        }) {
            self.sink.on_error(
                &IoError::protocol(
                    &self.current_port,
                    format!("Failed to queue write: {}", e),
                )
                .to_string(),
            );
        }
    }

    /// Stop the read loop and release the port. Emits nothing.
    async fn shutdown_stream(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.transmit_tx = None;

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
            tlog!("[serial] Closed {}", self.current_port);
        }

        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for SerialManager {
    fn drop(&mut self) {
        // Signal the read loop so the port handle is released; the loop
        // thread notices within one read timeout.
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.transmit_tx = None;
    }
}

// ============================================================================
// Read Loop
// ============================================================================

/// Blocking read loop. Owns the port handle; exits on cancellation or on a
/// device error, dropping the handle either way.
fn run_read_loop(
    mut stream: Box<dyn SerialStream>,
    port: String,
    sink: Arc<dyn EventSink>,
    cancel_flag: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    transmit_rx: std_mpsc::Receiver<TransmitRequest>,
) {
    let mut buf = [0u8; 256];

    while !cancel_flag.load(Ordering::SeqCst) {
        // Service queued writes between reads (non-blocking). A failed
        // write is reported but does not end the session.
        while let Ok(req) = transmit_rx.try_recv() {
            if let Err(e) = stream.write_all(&req.data).and_then(|_| stream.flush()) {
                sink.on_error(&IoError::protocol(&port, format!("Write error: {}", e)).to_string());
            }
        }

        match stream.read(&mut buf) {
            Ok(0) => {
                // EOF - device removed
                sink.on_error(&IoError::protocol(&port, "Device disconnected").to_string());
                force_disconnect(&port, &sink, &connected);
                return;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                sink.on_data_received(&text);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Timeout is expected for serial reads
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::NotConnected => {
                // Port-not-open class of error: report it but keep the
                // session state as-is.
                sink.on_error(&IoError::protocol(&port, format!("Read error: {}", e)).to_string());
            }
            Err(e) => {
                sink.on_error(&IoError::protocol(&port, format!("Read error: {}", e)).to_string());
                force_disconnect(&port, &sink, &connected);
                return;
            }
        }
    }
}

fn force_disconnect(port: &str, sink: &Arc<dyn EventSink>, connected: &Arc<AtomicBool>) {
    connected.store(false, Ordering::SeqCst);
    sink.on_connection_changed(false);
    tlog!("[serial] Closed {} after device error", port);
}

// ============================================================================
// Tests
// ============================================================================
