//! Error taxonomy for the mixer core
//!
//! Library operations return [`MixerError`]. The binary wraps these in
//! `anyhow` at the edge.

use thiserror::Error;

use crate::types::{ChannelId, Parameter};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixerError {
    /// Transport could not be opened, or was lost while reading/writing
    #[error("Connection error: {0}")]
    Connection(String),

    /// Channel id is malformed or outside the connected device's capabilities
    #[error("Invalid channel '{0}'")]
    InvalidChannel(String),

    /// Client value outside the parameter's normalized domain
    #[error("Value {value} out of range for {parameter} (expected {min}..={max})")]
    OutOfRange {
        parameter: Parameter,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Value cannot be mapped to or from the hardware encoding
    #[error("Translation error: {0}")]
    Translation(String),

    /// Malformed or incomplete wire message
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// Out-of-sequence update; dropped silently by the state manager
    #[error("Stale change for {channel}.{parameter}: seq {sequence} <= {last_applied}")]
    StaleChange {
        channel: ChannelId,
        parameter: Parameter,
        sequence: u64,
        last_applied: u64,
    },

    /// No board registered under the requested protocol identifier
    #[error("Unknown board '{0}'")]
    UnknownBoard(String),

    /// The connected console has no way to carry out the operation
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// Scene number outside the console's scene list
    #[error("Invalid scene {scene} (expected 1..={max})")]
    InvalidScene { scene: u16, max: u16 },
}

impl MixerError {
    /// Errors that end a receive loop (as opposed to per-message failures)
    pub fn is_transport_loss(&self) -> bool {
        matches!(self, MixerError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, MixerError>;
