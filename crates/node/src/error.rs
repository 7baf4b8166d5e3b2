//! Failure kinds surfaced by the control loop and its collaborators.
//!
//! None of these are fatal to the process: sensor errors degrade a single
//! reading, parse errors drop a single command, and link errors tear down
//! the current session so the main loop can reconnect.

use thiserror::Error;

/// Temperature/humidity read failure.  Recovered locally by treating the
/// reading as absent for the current cycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor did not respond")]
    NoResponse,
    #[error("checksum mismatch")]
    Checksum,
    #[error("reading out of range")]
    OutOfRange,
}

/// Malformed inbound command payload.  The command is logged and dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
}

/// Network or messaging-session failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("session connect failed: {0}")]
    Connect(String),
    #[error("session lost: {0}")]
    Session(String),
    #[error("publish failed: {0}")]
    Publish(String),
}
