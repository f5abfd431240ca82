//! Host-side client for an anchor
//!
//! Connects to the control port, queries the batch geometry, requests frames
//! and reassembles them from the data channel.
//!
//! ```sh
//! # Against a local mock anchor
//! cargo run --bin anchor-io -- --config anchor-io/mock.toml &
//! cargo run --example host_client -- --anchor 127.0.0.1:2206 --count 10
//!
//! # Continuous capture for 5 seconds
//! cargo run --example host_client -- --anchor 192.168.1.50:2206 --continuous --seconds 5
//! ```

use anchor_io::streaming::MAX_DATAGRAM_PAYLOAD;
use clap::Parser;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(about = "Request and receive sample batches from an anchor")]
struct Args {
    /// Anchor control address
    #[arg(short, long, default_value = "127.0.0.1:2206")]
    anchor: SocketAddr,

    /// Number of batches to request (1-9999)
    #[arg(short, long, default_value_t = 10)]
    count: u32,

    /// Stream continuously instead of a fixed count
    #[arg(long)]
    continuous: bool,

    /// Capture duration in continuous mode
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Anchor data port offset
    #[arg(long, default_value_t = 1000)]
    port_offset: u16,
}

fn query(control: &mut TcpStream, token: &[u8]) -> Result<String, Box<dyn std::error::Error>> {
    control.write_all(token)?;
    let mut buf = [0u8; 32];
    let n = control.read(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut control = TcpStream::connect(args.anchor)?;
    control.set_read_timeout(Some(Duration::from_secs(2)))?;
    let local = control.local_addr()?;
    let data_port = local
        .port()
        .checked_add(args.port_offset)
        .ok_or("local port + offset overflows")?;
    let data = UdpSocket::bind((local.ip(), data_port))?;
    data.set_read_timeout(Some(Duration::from_secs(2)))?;
    log::info!("Control {} -> {}, data on {}", local, args.anchor, data.local_addr()?);

    let rows: usize = query(&mut control, b"blen")?.parse()?;
    let rate: u64 = query(&mut control, b"rate")?.parse()?;
    log::info!("Anchor: {} rows per batch at {} S/s", rows, rate);

    if args.continuous {
        control.write_all(b"data")?;
    } else {
        if !(1..=9999).contains(&args.count) {
            return Err("count must be 1-9999".into());
        }
        control.write_all(format!("{:04}", args.count).as_bytes())?;
    }

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.seconds);
    let mut buf = vec![0u8; MAX_DATAGRAM_PAYLOAD];
    let mut frame_len = 0usize;
    let (mut frames, mut markers, mut bytes) = (0u64, 0u64, 0u64);

    loop {
        if args.continuous && Instant::now() >= deadline {
            break;
        }
        if !args.continuous && frames >= args.count as u64 {
            break;
        }

        match data.recv_from(&mut buf) {
            Ok((0, _)) if frame_len == 0 => markers += 1,
            Ok((0, _)) => {
                frames += 1;
                bytes += frame_len as u64;
                log::debug!("Frame {}: {} bytes", frames, frame_len);
                frame_len = 0;
            }
            Ok((n, _)) => frame_len += n,
            Err(e) => {
                log::warn!("No data: {}", e);
                break;
            }
        }
    }

    if args.continuous {
        control.write_all(b"stop")?;
    }

    let secs = started.elapsed().as_secs_f64();
    log::info!(
        "{} frames ({} edge markers), {:.1} MB in {:.2} s ({:.1} MB/s)",
        frames,
        markers,
        bytes as f64 / 1e6,
        secs,
        bytes as f64 / 1e6 / secs.max(1e-9)
    );
    Ok(())
}
