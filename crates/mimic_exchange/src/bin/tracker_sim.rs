//! # Tracker Simulator
//!
//! Plays the tracking system's side of the exchange: pushes synthetic
//! model points, camera poses, rays, intersections and debug frames to a
//! client, and logs the commands the client sends back.
//!
//! ## Usage
//!
//! ```bash
//! tracker_sim --push 127.0.0.1:5556 --bind 0.0.0.0:5557 --rate 30 --spotters 4
//! ```

use std::f32::consts::TAU;
use std::net::SocketAddr;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use mimic_exchange::config::DEFAULT_MAX_MESSAGE_BYTES;
use mimic_exchange::transport::{
    Inbound, Outbound, TcpInbound, TcpOutbound, UdpInbound, UdpOutbound,
};
use mimic_exchange::{init_logging, TransportKind};
use mimic_protocol::{
    decode_command, encode_camera_pose, encode_debug_frame, encode_intersections,
    encode_model_points, encode_rays, CommandKind, DebugFrame, DebugFrameInfo, EncodeResult,
    Mat4x4, Point3, Ray,
};
use tracing::{error, info, warn};

/// Number of tracked joints.
const JOINTS: usize = 20;

/// Frames are pushed every this many ticks.
const FRAME_EVERY: u64 = 30;

/// Debug frame size; small enough for a UDP datagram.
const FRAME_WIDTH: i32 = 64;
const FRAME_HEIGHT: i32 = 48;

struct Options {
    push: SocketAddr,
    bind: SocketAddr,
    transport: TransportKind,
    rate_hz: u32,
    spotters: u8,
    duration_secs: Option<u64>,
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        push: SocketAddr::from(([127, 0, 0, 1], 5556)),
        bind: SocketAddr::from(([0, 0, 0, 0], 5557)),
        transport: TransportKind::Tcp,
        rate_hz: 30,
        spotters: 4,
        duration_secs: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--push" | "-p" => {
                options.push = value.and_then(|v| v.parse().ok()).unwrap_or(options.push);
                i += 1;
            }
            "--bind" | "-b" => {
                options.bind = value.and_then(|v| v.parse().ok()).unwrap_or(options.bind);
                i += 1;
            }
            "--udp" => options.transport = TransportKind::Udp,
            "--rate" | "-r" => {
                options.rate_hz = value.and_then(|v| v.parse().ok()).unwrap_or(30).max(1);
                i += 1;
            }
            "--spotters" | "-n" => {
                options.spotters = value.and_then(|v| v.parse().ok()).unwrap_or(4);
                i += 1;
            }
            "--duration" | "-d" => {
                options.duration_secs = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--help" | "-h" => {
                println!("Usage: tracker_sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --push <ADDR>          Client inbound address (default: 127.0.0.1:5556)");
                println!("  -b, --bind <ADDR>          Command endpoint to bind (default: 0.0.0.0:5557)");
                println!("      --udp                  Use UDP instead of TCP");
                println!("  -r, --rate <HZ>            Update rate (default: 30)");
                println!("  -n, --spotters <NUM>       Number of simulated spotters (default: 4)");
                println!("  -d, --duration <SECS>      Run for N seconds then exit");
                println!("  -h, --help                 Show this help");
                return None;
            }
            other => eprintln!("ignoring unknown argument: {other}"),
        }
        i += 1;
    }
    Some(options)
}

/// Synthetic scene advancing one step per tick.
struct Scene {
    tick: u64,
    spotters: u8,
}

impl Scene {
    fn joints(&self) -> Vec<Point3> {
        let phase = self.tick as f32 * 0.05;
        (0..JOINTS)
            .map(|j| {
                let a = phase + j as f32 * TAU / JOINTS as f32;
                Point3::new(a.cos() * 0.5, 1.0 + j as f32 * 0.05, a.sin() * 0.5)
            })
            .collect()
    }

    /// Spotters sit on a circle of radius 3 at head height.
    fn camera_origin(&self, spotter: u8) -> Point3 {
        let a = f32::from(spotter) * TAU / f32::from(self.spotters.max(1));
        Point3::new(a.cos() * 3.0, 2.0, a.sin() * 3.0)
    }

    fn camera_pose(&self, spotter: u8) -> Mat4x4 {
        let o = self.camera_origin(spotter);
        Mat4x4::from_columns([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [o.x, o.y, o.z, 1.0],
        ])
    }

    fn rays(&self, joints: &[Point3]) -> Vec<Ray> {
        let mut rays = Vec::with_capacity(joints.len() * usize::from(self.spotters));
        for spotter in 0..self.spotters {
            let origin = self.camera_origin(spotter);
            for joint in joints {
                rays.push(Ray::new(
                    origin,
                    Point3::new(joint.x - origin.x, joint.y - origin.y, joint.z - origin.z),
                ));
            }
        }
        rays
    }

    fn frame(&self, spotter: u8) -> DebugFrame {
        let info = DebugFrameInfo {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            bytes_per_pixel: 1,
        };
        let shift = (self.tick as usize + usize::from(spotter) * 16) % 256;
        let pixels = (0..(FRAME_WIDTH * FRAME_HEIGHT) as usize)
            .map(|i| ((i + shift) % 256) as u8)
            .collect();
        DebugFrame::new(info, pixels)
    }

    /// Encodes everything for this tick, in the order the tracker sends it.
    fn messages(&self) -> EncodeResult<Vec<Vec<u8>>> {
        let joints = self.joints();
        let mut messages = vec![encode_model_points(&joints)?];

        for spotter in 0..self.spotters {
            // Spotter ids start at 1; 0 means unassigned
            messages.push(encode_camera_pose(spotter + 1, &self.camera_pose(spotter)));
        }
        messages.push(encode_rays(&self.rays(&joints))?);
        messages.push(encode_intersections(&joints)?);

        if self.tick % FRAME_EVERY == 0 {
            for spotter in 0..self.spotters {
                messages.push(encode_debug_frame(spotter + 1, &self.frame(spotter))?);
            }
        }
        Ok(messages)
    }
}

fn open(options: &Options) -> std::io::Result<(Box<dyn Inbound>, Box<dyn Outbound>)> {
    Ok(match options.transport {
        TransportKind::Tcp => (
            Box::new(TcpInbound::bind(options.bind, DEFAULT_MAX_MESSAGE_BYTES)?),
            Box::new(TcpOutbound::new(options.push)),
        ),
        TransportKind::Udp => (
            Box::new(UdpInbound::bind(options.bind)?),
            Box::new(UdpOutbound::connect(options.push)?),
        ),
    })
}

fn main() {
    let Some(options) = parse_args() else {
        return;
    };
    init_logging("info");

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         MIMIC TRACKER SIMULATOR                                  ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Transport:          {:?}", options.transport);
    println!("│ Push To:            {}", options.push);
    println!("│ Commands On:        {}", options.bind);
    println!("│ Rate:               {} Hz", options.rate_hz);
    println!("│ Spotters:           {}", options.spotters);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let (mut commands, mut push) = match open(&options) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "failed to open transports");
            process::exit(1);
        }
    };

    let tick_time = Duration::from_secs(1) / options.rate_hz;
    let start = Instant::now();
    let mut scene = Scene {
        tick: 0,
        spotters: options.spotters,
    };
    let mut debugging = true;

    'run: loop {
        if let Some(duration) = options.duration_secs {
            if start.elapsed().as_secs() >= duration {
                break;
            }
        }
        let tick_start = Instant::now();

        match scene.messages() {
            Ok(messages) => {
                for (index, message) in messages.iter().enumerate() {
                    // Model points always go out; debug messages only while debugging
                    if index > 0 && !debugging {
                        break;
                    }
                    if let Err(e) = push.send(message) {
                        warn!(error = %e, "push failed");
                        break;
                    }
                }
            }
            Err(e) => error!(error = %e, "encode failed"),
        }

        // Drain commands until the tick is used up
        while let Some(rest) = tick_time.checked_sub(tick_start.elapsed()) {
            match commands.recv_timeout(rest) {
                Ok(Some(frame)) => match decode_command(&frame) {
                    Ok((kind, payload)) => {
                        info!(%kind, ?payload, "command received");
                        match kind {
                            CommandKind::StartDebugging => debugging = true,
                            CommandKind::StopDebugging => debugging = false,
                            CommandKind::StopSystem => break 'run,
                            _ => {}
                        }
                    }
                    Err(e) => warn!(error = %e, "bad command frame"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "command receive failed");
                    break;
                }
            }
        }

        scene.tick += 1;
    }

    info!(ticks = scene.tick, "simulator stopped");
}
