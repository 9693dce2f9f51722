// src/io/udp/session.rs
//
// UDP transport session: socket lifecycle, receive thread ownership and
// the synchronous send path.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use super::queue::ReceiveQueue;
use super::receiver::{PipelineCounters, PipelineState, PipelineStats, ReceivePipeline};
use crate::io::error::{SendError, TransportError};
use crate::io::{CanFrame, WireLayout};
use crate::logging::{default_sink, LogLevel, LogSink};

// ============================================================================
// Types and Configuration
// ============================================================================

/// Default bridge address used when nothing else is configured
pub const DEFAULT_SERVER_IP: &str = "192.168.1.100";
/// Conventional cannelloni bridge port
pub const DEFAULT_SERVER_PORT: u16 = 20000;
/// Receive poll interval; bounds how long `close` waits for the thread
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Requested SO_RCVBUF; the kernel may cap it
const RECV_SOCKET_BUFFER: usize = 256 * 1024;

/// UDP transport configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpCanConfig {
    /// Bridge IP address (textual IPv4 or IPv6)
    pub server_ip: String,
    /// Bridge UDP port
    pub server_port: u16,
    /// Local UDP port to bind. 0 picks an ephemeral port.
    pub local_port: u16,
    /// Wire layout shared with the bridge
    pub layout: WireLayout,
    /// Socket read timeout used by the receive thread
    pub read_timeout: Duration,
}

impl Default for UdpCanConfig {
    fn default() -> Self {
        Self {
            server_ip: DEFAULT_SERVER_IP.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            local_port: DEFAULT_SERVER_PORT,
            layout: WireLayout::Compact,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Session lifecycle: Closed → Opening → Open → Closing → Closed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Closing,
}

// ============================================================================
// Socket Setup
// ============================================================================

/// Parse the textual target into a socket address.
fn resolve_target(ip: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let target = format!("{}:{}", ip, port);
    let addr: IpAddr = ip
        .trim()
        .parse()
        .map_err(|e: std::net::AddrParseError| TransportError::address(&target, e.to_string()))?;
    if port == 0 {
        return Err(TransportError::address(&target, "port 0 is not a valid target"));
    }
    Ok(SocketAddr::new(addr, port))
}

/// Create the UDP socket, bound to the wildcard address of the target's
/// family, with a read timeout so receives return periodically.
fn create_socket(
    target: &SocketAddr,
    local_port: u16,
    read_timeout: Duration,
) -> Result<UdpSocket, TransportError> {
    let bind_ip = match target {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let bind_addr = SocketAddr::new(bind_ip, local_port);
    let local = bind_addr.to_string();

    // Exclusive bind: a port held by another socket is a BindError
    let socket = Socket::new(Domain::for_address(*target), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::bind(&local, e))?;
    // Room for a burst of frames while the host is slow to poll
    socket
        .set_recv_buffer_size(RECV_SOCKET_BUFFER)
        .map_err(|e| TransportError::bind(&local, e))?;
    socket
        .bind(&bind_addr.into())
        .map_err(|e| TransportError::bind(&local, e))?;

    let socket: UdpSocket = socket.into();
    // A zero timeout is rejected by the OS
    let timeout = read_timeout.max(Duration::from_millis(1));
    socket
        .set_read_timeout(Some(timeout))
        .map_err(|e| TransportError::bind(&local, e))?;

    Ok(socket)
}

// ============================================================================
// Transport Session
// ============================================================================

/// CAN-over-UDP transport session.
///
/// `open`, `close` and `reconfigure` take `&mut self` and so are never
/// concurrent with each other. `read_frame` and `write_frame` take `&self`
/// and may run while the receive thread is pushing frames.
pub struct UdpCanTransport {
    config: UdpCanConfig,
    state: SessionState,
    socket: Option<Arc<UdpSocket>>,
    target: Option<SocketAddr>,
    pipeline: Option<ReceivePipeline>,
    queue: ReceiveQueue,
    counters: Arc<PipelineCounters>,
    log: Arc<dyn LogSink>,
}

impl UdpCanTransport {
    /// Create a closed session. Nothing touches the network until `open`.
    pub fn new(config: UdpCanConfig) -> Self {
        Self {
            config,
            state: SessionState::Closed,
            socket: None,
            target: None,
            pipeline: None,
            queue: ReceiveQueue::new(),
            counters: Arc::new(PipelineCounters::default()),
            log: default_sink(),
        }
    }

    /// Replace the default `tlog!` sink.
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Open the session using the configured target.
    ///
    /// Already open: returns `Ok(())` and changes nothing.
    pub fn open(&mut self) -> Result<(), TransportError> {
        if self.state == SessionState::Open {
            return Ok(());
        }

        self.state = SessionState::Opening;
        match self.start() {
            Ok(()) => {
                self.state = SessionState::Open;
                let local = self
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "?".to_string());
                self.log.log(
                    LogLevel::Info,
                    &format!(
                        "Connected to {}:{} from {} ({} layout)",
                        self.config.server_ip, self.config.server_port, local, self.config.layout
                    ),
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                self.log.log(LogLevel::Error, &format!("Open failed: {}", e));
                Err(e)
            }
        }
    }

    fn start(&mut self) -> Result<(), TransportError> {
        let target = resolve_target(&self.config.server_ip, self.config.server_port)?;
        let socket = Arc::new(create_socket(
            &target,
            self.config.local_port,
            self.config.read_timeout,
        )?);

        self.queue.clear();
        self.counters.reset();

        let pipeline = ReceivePipeline::spawn(
            socket.clone(),
            self.config.layout,
            self.queue.clone(),
            self.counters.clone(),
            self.log.clone(),
        )
        .map_err(TransportError::Spawn)?;

        self.socket = Some(socket);
        self.target = Some(target);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Set the target and open. Already open: returns `Ok(())` without
    /// touching the target.
    pub fn open_to(&mut self, server_ip: &str, server_port: u16) -> Result<(), TransportError> {
        if self.state == SessionState::Open {
            return Ok(());
        }
        self.config.server_ip = server_ip.to_string();
        self.config.server_port = server_port;
        self.open()
    }

    /// Stop the receive thread, release the socket and drop queued frames.
    ///
    /// Already closed: returns `Ok(())` and changes nothing.
    pub fn close(&mut self) -> Result<(), TransportError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        self.state = SessionState::Closing;

        // The thread must be gone before the socket is released so no
        // frame is queued after this point.
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        self.socket = None;
        self.target = None;
        let dropped = self.queue.clear();

        self.state = SessionState::Closed;
        if dropped > 0 {
            self.log.log(
                LogLevel::Debug,
                &format!("Dropped {} unread frame(s) on close", dropped),
            );
        }
        self.log.log(LogLevel::Info, "Disconnected");
        Ok(())
    }

    /// True only while open with a live socket.
    pub fn is_valid(&self) -> bool {
        self.state == SessionState::Open && self.socket.is_some()
    }

    /// Pop the oldest received frame without blocking.
    pub fn read_frame(&self) -> Option<CanFrame> {
        self.queue.pop()
    }

    /// Encode `frame` and send it as one datagram to the target.
    ///
    /// No retry and no queuing: the caller decides what to do on failure.
    pub fn write_frame(&self, frame: &CanFrame) -> Result<(), SendError> {
        let (socket, target) = match (&self.socket, self.target) {
            (Some(socket), Some(target)) if self.is_valid() => (socket, target),
            _ => return Err(SendError::Precondition),
        };

        let bytes = self.config.layout.encode(frame).map_err(|e| {
            self.log
                .log(LogLevel::Error, &format!("Invalid CAN frame {}: {}", frame, e));
            e
        })?;

        let sent = socket.send_to(&bytes, target).map_err(|e| {
            self.log
                .log(LogLevel::Warn, &format!("Failed to send frame: {}", e));
            SendError::Io(e)
        })?;

        if sent != bytes.len() {
            self.log.log(
                LogLevel::Warn,
                &format!("Failed to send frame: {} of {} bytes", sent, bytes.len()),
            );
            return Err(SendError::ShortWrite {
                sent,
                expected: bytes.len(),
            });
        }

        Ok(())
    }

    /// Point the session at a new target. An open session is closed and
    /// reopened; a closed one only records the target.
    pub fn reconfigure(&mut self, server_ip: &str, server_port: u16) -> Result<(), TransportError> {
        let was_open = self.state == SessionState::Open;
        if was_open {
            self.close()?;
        }

        self.config.server_ip = server_ip.to_string();
        self.config.server_port = server_port;

        if was_open {
            self.open()?;
        }
        Ok(())
    }

    pub fn server_ip(&self) -> &str {
        &self.config.server_ip
    }

    pub fn server_port(&self) -> u16 {
        self.config.server_port
    }

    /// Applies on the next `open`; an active socket keeps its target.
    pub fn set_server_ip(&mut self, server_ip: &str) {
        self.config.server_ip = server_ip.to_string();
    }

    /// Applies on the next `open`; an active socket keeps its target.
    pub fn set_server_port(&mut self, server_port: u16) {
        self.config.server_port = server_port;
    }

    pub fn config(&self) -> &UdpCanConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Receive thread state; `Stopped` when no thread exists.
    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline
            .as_ref()
            .map(|p| p.state())
            .unwrap_or(PipelineState::Stopped)
    }

    /// Local address of the open socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Frames received but not yet read.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Receive counters since the last `open`.
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }
}

impl Drop for UdpCanTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
