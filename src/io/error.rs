// src/io/error.rs
//
// Error taxonomy for port operations. Notifications carry only the
// rendered message; the variants exist for construction and logging.

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum IoError {
    /// Caller-supplied configuration is unusable (e.g. no port selected).
    Configuration(String),
    /// The OS refused to open the device.
    Connection { device: String, message: String },
    /// The device failed mid-session (read, write, enumeration).
    Protocol { device: String, message: String },
}

impl IoError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration(message.into())
    }

    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn protocol(device: &str, message: impl Into<String>) -> Self {
        IoError::Protocol {
            device: device.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Configuration(message) => write!(f, "{}", message),
            IoError::Connection { device, message } => {
                write!(f, "Failed to open {}: {}", device, message)
            }
            IoError::Protocol { device, message } => write!(f, "{}: {}", device, message),
        }
    }
}

impl std::error::Error for IoError {}
