// src/lib.rs
//
// CAN-over-UDP transport for cannelloni-style bridges.
//
// A host CAN stack opens a `UdpCanTransport`, polls `read_frame` for frames
// received by a background thread and sends with `write_frame`.

#[macro_use]
pub mod logging;
pub mod io;
pub mod settings;

pub use io::{
    CanFrame, CanHardwarePlugin, CodecError, SendError, SessionState, TransportError,
    UdpCanConfig, UdpCanTransport, WireLayout,
};
pub use settings::UdpCanSettings;
