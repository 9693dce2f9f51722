// src/io/error.rs
//
// Error types for the UDP transport, the frame codecs and the send path.

use thiserror::Error;

/// Failures while bringing a transport session up.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The configured target could not be turned into a socket address.
    #[error("invalid target address '{target}': {reason}")]
    Address { target: String, reason: String },

    /// Socket creation, option setup or bind failed.
    #[error("failed to bind UDP socket on {local}: {source}")]
    Bind {
        local: String,
        #[source]
        source: std::io::Error,
    },

    /// The receive pipeline thread could not be started.
    #[error("failed to start receive thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl TransportError {
    pub fn address(target: impl Into<String>, reason: impl Into<String>) -> Self {
        TransportError::Address {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn bind(local: impl Into<String>, source: std::io::Error) -> Self {
        TransportError::Bind {
            local: local.into(),
            source,
        }
    }
}

/// Malformed frame on either side of the codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes than the fixed header of the active layout.
    #[error("datagram too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// Header present but the data bytes announced by the DLC are missing.
    #[error("datagram truncated: DLC {dlc} needs {needed} bytes, got {len}")]
    Truncated { dlc: u8, needed: usize, len: usize },

    /// A frame handed to the encoder claims more than 8 data bytes.
    #[error("CAN payload too long: {0} bytes (max 8)")]
    OversizedPayload(u8),
}

/// Failures of a single `write_frame` call.
#[derive(Error, Debug)]
pub enum SendError {
    /// The session is not open.
    #[error("transport is not open")]
    Precondition,

    /// The network layer accepted fewer bytes than were encoded.
    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for String {
    fn from(e: TransportError) -> Self {
        e.to_string()
    }
}

impl From<SendError> for String {
    fn from(e: SendError) -> Self {
        e.to_string()
    }
}
