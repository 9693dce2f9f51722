// src/io/traits.rs
//
// Interface a host CAN stack drives a hardware channel through.

use super::error::{SendError, TransportError};
use super::udp::UdpCanTransport;
use super::CanFrame;

/// A CAN hardware channel as seen by the host stack.
///
/// The host polls `read_frame` periodically; implementations never push
/// frames through a callback.
pub trait CanHardwarePlugin: Send {
    /// Bring the channel up. Calling it while open is a no-op.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Take the channel down. Calling it while closed is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    fn is_valid(&self) -> bool;

    /// Next received frame, or `None` when nothing is waiting.
    fn read_frame(&self) -> Option<CanFrame>;

    fn write_frame(&self, frame: &CanFrame) -> Result<(), SendError>;

    /// Move the channel to a new bridge. An open channel is reopened.
    fn reconfigure(&mut self, server_ip: &str, server_port: u16) -> Result<(), TransportError>;

    fn server_ip(&self) -> &str;

    fn server_port(&self) -> u16;
}

impl CanHardwarePlugin for UdpCanTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        UdpCanTransport::open(self)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        UdpCanTransport::close(self)
    }

    fn is_valid(&self) -> bool {
        UdpCanTransport::is_valid(self)
    }

    fn read_frame(&self) -> Option<CanFrame> {
        UdpCanTransport::read_frame(self)
    }

    fn write_frame(&self, frame: &CanFrame) -> Result<(), SendError> {
        UdpCanTransport::write_frame(self, frame)
    }

    fn reconfigure(&mut self, server_ip: &str, server_port: u16) -> Result<(), TransportError> {
        UdpCanTransport::reconfigure(self, server_ip, server_port)
    }

    fn server_ip(&self) -> &str {
        UdpCanTransport::server_ip(self)
    }

    fn server_port(&self) -> u16 {
        UdpCanTransport::server_port(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
