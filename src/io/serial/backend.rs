// src/io/serial/backend.rs
//
// Port access seam for the connection manager.
// SystemBackend drives real hardware through the serialport crate; tests
// substitute a scripted implementation.

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::utils::{
    to_serialport_data_bits, to_serialport_flow_control, to_serialport_parity,
    to_serialport_stop_bits, FlowControl, Parity,
};
use crate::io::error::IoError;

/// Poll interval for the blocking read loop. Short enough that queued
/// writes and cancellation are serviced promptly.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(50);

// ============================================================================
// Port Settings
// ============================================================================

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// Wire parameters used when opening a port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub flow_control: FlowControl,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

// ============================================================================
// Backend Traits
// ============================================================================

/// Blocking byte stream over an open port.
///
/// `read` returns `ErrorKind::TimedOut` as the no-data sentinel; the read
/// loop ignores it and polls again.
pub trait SerialStream: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Port enumeration and opening.
pub trait PortBackend: Send + Sync {
    fn list_ports(&self) -> Result<Vec<String>, IoError>;
    fn open(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn SerialStream>, IoError>;
}

// ============================================================================
// System Backend
// ============================================================================

/// Production backend over the serialport crate.
pub struct SystemBackend;

struct SystemStream {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialStream for SystemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl PortBackend for SystemBackend {
    /// List available serial ports.
    ///
    /// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
    /// The cu (calling unit) devices are non-blocking and preferred for outgoing
    /// connections. The tty (terminal) devices block on open waiting for carrier detect.
    fn list_ports(&self) -> Result<Vec<String>, IoError> {
        let ports = serialport::available_ports()
            .map_err(|e| IoError::protocol("serial", format!("Failed to enumerate ports: {}", e)))?;

        Ok(ports
            .into_iter()
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .map(|p| p.port_name)
            .collect())
    }

    fn open(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn SerialStream>, IoError> {
        let handle = serialport::new(port, settings.baud_rate)
            .data_bits(to_serialport_data_bits(settings.data_bits))
            .stop_bits(to_serialport_stop_bits(settings.stop_bits))
            .parity(to_serialport_parity(&settings.parity))
            .flow_control(to_serialport_flow_control(&settings.flow_control))
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| IoError::connection(port, e.to_string()))?;

        Ok(Box::new(SystemStream { port: handle }))
    }
}

// ============================================================================
// Tests
// ============================================================================
