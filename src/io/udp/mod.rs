// src/io/udp/mod.rs
//
// CAN-over-UDP driver for cannelloni-style bridges.
//
// One CAN frame per datagram, no handshake. Loss and reordering are passed
// through to the host unchanged.

pub mod codec;
mod queue;
mod receiver;
mod session;

// Re-export public items
pub use codec::{CompactCodec, FixedCodec};
pub use receiver::{PipelineState, PipelineStats};
pub use session::{
    SessionState, UdpCanConfig, UdpCanTransport, DEFAULT_READ_TIMEOUT, DEFAULT_SERVER_IP,
    DEFAULT_SERVER_PORT,
};
