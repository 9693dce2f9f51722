// src/io/udp/receiver.rs
//
// Background receive thread for the UDP transport.
//
// The socket has a read timeout set, so `recv_from` returns at least once
// per timeout interval even on a silent network. That is the only reason
// for the timeout: it lets the loop notice a stop request.

use serde::Serialize;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::queue::ReceiveQueue;
use crate::io::{now_us, WireLayout};
use crate::logging::{LogLevel, LogSink};

// ============================================================================
// Constants
// ============================================================================

/// Pause after a socket error that is not a timeout
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Large enough for any datagram a CAN bridge sends; longer ones are cut
/// by the kernel and then rejected or trimmed by the codec.
const RECV_BUFFER_LEN: usize = 2048;

// ============================================================================
// Pipeline State
// ============================================================================

/// Lifecycle of the receive thread: Running → StopRequested → Stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    StopRequested,
    Stopped,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Running,
            1 => PipelineState::StopRequested,
            _ => PipelineState::Stopped,
        }
    }
}

/// Shared state cell between the session and its receive thread.
#[derive(Default)]
struct PipelineControl {
    state: AtomicU8,
}

impl PipelineControl {
    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    fn request_stop(&self) {
        // Only Running moves to StopRequested; Stopped stays Stopped
        let _ = self.state.compare_exchange(
            PipelineState::Running as u8,
            PipelineState::StopRequested as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn mark_stopped(&self) {
        self.state
            .store(PipelineState::Stopped as u8, Ordering::SeqCst);
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of receive-side counters for one open session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Datagrams returned by the socket, valid or not
    pub datagrams_received: u64,
    /// Frames decoded and pushed onto the receive queue
    pub frames_queued: u64,
    /// Datagrams discarded because they did not decode
    pub decode_errors: u64,
    /// Socket errors other than read timeouts
    pub socket_errors: u64,
}

#[derive(Default)]
pub(crate) struct PipelineCounters {
    datagrams_received: AtomicU64,
    frames_queued: AtomicU64,
    decode_errors: AtomicU64,
    socket_errors: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.datagrams_received.store(0, Ordering::Relaxed);
        self.frames_queued.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.socket_errors.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Receive Pipeline
// ============================================================================

/// Handle to a running receive thread.
pub(crate) struct ReceivePipeline {
    control: Arc<PipelineControl>,
    handle: Option<JoinHandle<()>>,
}

impl ReceivePipeline {
    /// Start the receive thread. The socket must already have a read timeout.
    pub(crate) fn spawn(
        socket: Arc<UdpSocket>,
        layout: WireLayout,
        queue: ReceiveQueue,
        counters: Arc<PipelineCounters>,
        log: Arc<dyn LogSink>,
    ) -> std::io::Result<Self> {
        let control = Arc::new(PipelineControl::default());
        let thread_control = control.clone();

        let handle = thread::Builder::new()
            .name("udpcan-rx".to_string())
            .spawn(move || {
                run_receive_loop(&socket, layout, &queue, &counters, &thread_control, log.as_ref());
                thread_control.mark_stopped();
            })?;

        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    pub(crate) fn state(&self) -> PipelineState {
        self.control.state()
    }

    /// Request a stop and wait for the thread to exit. Returns within about
    /// one socket read timeout. Calling it again is a no-op.
    pub(crate) fn stop(&mut self) {
        self.control.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                // The thread panicked; nothing is left running either way
                self.control.mark_stopped();
            }
        }
    }
}

impl Drop for ReceivePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receive datagrams until a stop is requested.
///
/// Decode failures and socket errors are logged and counted but never end
/// the loop.
fn run_receive_loop(
    socket: &UdpSocket,
    layout: WireLayout,
    queue: &ReceiveQueue,
    counters: &PipelineCounters,
    control: &PipelineControl,
    log: &dyn LogSink,
) {
    let mut buf = [0u8; RECV_BUFFER_LEN];

    while control.is_running() {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                counters.datagrams_received.fetch_add(1, Ordering::Relaxed);
                match layout.decode(&buf[..n]) {
                    Ok(mut frame) => {
                        frame.timestamp_us = now_us();
                        queue.push(frame);
                        counters.frames_queued.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                        log.log(
                            LogLevel::Debug,
                            &format!("Discarding datagram from {} ({} bytes): {}", from, n, e),
                        );
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                // Timeout - re-check the stop request
            }
            Err(e) => {
                counters.socket_errors.fetch_add(1, Ordering::Relaxed);
                log.log(LogLevel::Warn, &format!("Receive error: {}", e));
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
