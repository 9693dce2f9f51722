// tools/udpcan_cli/main.rs
//
// Command-line front end for the UDP CAN transport:
//   monitor - print frames arriving from a bridge
//   send    - transmit one frame (cansend syntax)
//   echo    - reflect every datagram to its sender (loopback test peer)

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use udpcan_lib::io::consts;
use udpcan_lib::logging::{init_file_logging, stop_file_logging};
use udpcan_lib::settings::{get_settings_path, load_settings_from};
use udpcan_lib::{tlog, CanFrame, UdpCanSettings, UdpCanTransport, WireLayout};

/// Poll interval for the host-side read loop
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "udpcan_cli", version, about = "CAN over UDP (cannelloni-style bridges)")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Bridge IP address
    #[arg(long, global = true)]
    ip: Option<String>,
    /// Bridge UDP port
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Local UDP port (0 = ephemeral)
    #[arg(long, global = true)]
    local_port: Option<u16>,
    /// Wire layout: compact or fixed
    #[arg(long, global = true)]
    layout: Option<WireLayout>,
    /// Also write log lines to a timestamped file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print received frames until Ctrl-C
    Monitor {
        /// One JSON object per frame
        #[arg(long)]
        json: bool,
        /// Exit after this many frames
        #[arg(long)]
        count: Option<u64>,
    },
    /// Send one frame, e.g. `123#DEADBEEF` or `18FEF100#01.02`
    Send {
        frame: String,
        /// Force an extended identifier
        #[arg(long)]
        extended: bool,
    },
    /// Reflect every datagram back to its sender until Ctrl-C
    Echo {
        #[arg(long, default_value = "0.0.0.0:20000")]
        bind: SocketAddr,
    },
}

/// Parse cansend-style `<hex id>#<hex data>`. Dots between bytes are allowed.
fn parse_cansend(s: &str, force_extended: bool) -> Result<CanFrame, String> {
    let (id_str, data_str) = s
        .split_once('#')
        .ok_or_else(|| format!("expected <id>#<data>, got '{}'", s))?;

    let identifier = u32::from_str_radix(id_str, 16)
        .map_err(|e| format!("invalid CAN id '{}': {}", id_str, e))?;
    if identifier > consts::CAN_EFF_MASK {
        return Err(format!("CAN id 0x{:X} exceeds 29 bits", identifier));
    }

    let data = hex::decode(data_str.replace('.', ""))
        .map_err(|e| format!("invalid data '{}': {}", data_str, e))?;

    // cansend treats an 8-digit id as extended
    let frame = if force_extended || id_str.len() == 8 {
        CanFrame::new_extended(identifier, &data)
    } else {
        CanFrame::new(identifier, &data)
    };
    frame.ok_or_else(|| format!("payload too long: {} bytes (max 8)", data.len()))
}

fn resolve_settings(cli: &Cli) -> Result<UdpCanSettings, String> {
    let path = match &cli.settings {
        Some(p) => p.clone(),
        None => get_settings_path().map_err(|e| e.to_string())?,
    };
    let mut settings = load_settings_from(&path).map_err(|e| e.to_string())?;

    if let Some(ip) = &cli.ip {
        settings.server_ip = ip.clone();
    }
    if let Some(port) = cli.port {
        settings.server_port = port;
    }
    if let Some(local_port) = cli.local_port {
        settings.local_port = local_port;
    }
    if let Some(layout) = cli.layout {
        settings.layout = layout;
    }
    Ok(settings)
}

async fn run_monitor(settings: &UdpCanSettings, json: bool, count: Option<u64>) -> Result<(), String> {
    let mut transport = UdpCanTransport::new(settings.to_config());
    transport.open().map_err(String::from)?;

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut printed = 0u64;

    'poll: loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break 'poll,
            _ = interval.tick() => {
                while let Some(frame) = transport.read_frame() {
                    if json {
                        let line = serde_json::to_string(&frame).map_err(|e| e.to_string())?;
                        println!("{}", line);
                    } else {
                        println!(
                            " ({:.6})  udp{}  {}",
                            frame.timestamp_us as f64 / 1_000_000.0,
                            frame.channel,
                            frame
                        );
                    }
                    printed += 1;
                    if count.is_some_and(|limit| printed >= limit) {
                        break 'poll;
                    }
                }
            }
        }
    }

    let stats = transport.stats();
    tlog!(
        "[udpcan_cli] {} datagrams, {} frames, {} malformed, {} socket errors",
        stats.datagrams_received,
        stats.frames_queued,
        stats.decode_errors,
        stats.socket_errors
    );
    transport.close().map_err(String::from)
}

fn run_send(settings: &UdpCanSettings, frame: &str, extended: bool) -> Result<(), String> {
    let frame = parse_cansend(frame, extended)?;
    let mut transport = UdpCanTransport::new(settings.to_config());
    transport.open().map_err(String::from)?;
    let result = transport.write_frame(&frame).map_err(String::from);
    transport.close().map_err(String::from)?;
    result
}

async fn run_echo(bind: SocketAddr) -> Result<(), String> {
    let socket = tokio::net::UdpSocket::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", bind, e))?;
    tlog!("[udpcan_cli] Echoing datagrams on {}", bind);

    let mut buf = [0u8; 2048];
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok((n, from)) => {
                    if let Err(e) = socket.send_to(&buf[..n], from).await {
                        tlog!(@Warn, "[udpcan_cli] Echo to {} failed: {}", from, e);
                    }
                }
                Err(e) => tlog!(@Warn, "[udpcan_cli] Receive error: {}", e),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(dir) = &cli.log_dir {
        if let Err(e) = init_file_logging(dir) {
            eprintln!("{}", e);
        }
    }

    let result = match resolve_settings(&cli) {
        Ok(settings) => match &cli.command {
            Command::Monitor { json, count } => run_monitor(&settings, *json, *count).await,
            Command::Send { frame, extended } => run_send(&settings, frame, *extended),
            Command::Echo { bind } => run_echo(*bind).await,
        },
        Err(e) => Err(e),
    };

    stop_file_logging();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tlog!(@Error, "[udpcan_cli] {}", e);
            ExitCode::FAILURE
        }
    }
}
