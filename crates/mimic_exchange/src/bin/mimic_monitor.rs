//! # MIMIC Monitor
//!
//! Headless stand-in for the visualization client: starts an exchange,
//! polls the entity store like a 60 Hz render loop and logs every update.
//!
//! ## Usage
//!
//! ```bash
//! mimic_monitor --config mimic.toml --send start_debugging --threshold 42 --duration 30
//! ```

use std::net::SocketAddr;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use mimic_exchange::{init_logging, Exchange, ExchangeConfig, TransportKind};
use mimic_protocol::CommandKind;
use tracing::{error, info};

const FRAME_TIME: Duration = Duration::from_micros(16_667);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

struct Options {
    config_path: Option<String>,
    bind: Option<SocketAddr>,
    connect: Option<SocketAddr>,
    transport: Option<TransportKind>,
    commands: Vec<CommandKind>,
    threshold: Option<u8>,
    duration_secs: Option<u64>,
}

fn print_help() {
    println!("Usage: mimic_monitor [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>        TOML config file");
    println!("  -b, --bind <ADDR>          Inbound bind address (default: 0.0.0.0:5556)");
    println!("  -o, --connect <ADDR>       Outbound tracker address (default: 127.0.0.1:5557)");
    println!("      --udp                  Use UDP instead of TCP");
    println!("  -s, --send <COMMAND>       Send a command after start (repeatable)");
    println!("  -t, --threshold <VALUE>    Send a binarization threshold after start");
    println!("  -d, --duration <SECS>      Run for N seconds then exit");
    println!("  -h, --help                 Show this help");
    println!();
    println!("Commands:");
    for kind in CommandKind::ALL {
        println!("  {kind}");
    }
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        config_path: None,
        bind: None,
        connect: None,
        transport: None,
        commands: Vec::new(),
        threshold: None,
        duration_secs: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" | "-c" => {
                options.config_path = value.cloned();
                i += 1;
            }
            "--bind" | "-b" => {
                options.bind = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--connect" | "-o" => {
                options.connect = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--udp" => options.transport = Some(TransportKind::Udp),
            "--send" | "-s" => {
                match value.map(|v| v.parse::<CommandKind>()) {
                    Some(Ok(kind)) => options.commands.push(kind),
                    Some(Err(e)) => eprintln!("ignoring --send: {e}"),
                    None => eprintln!("--send needs a command name"),
                }
                i += 1;
            }
            "--threshold" | "-t" => {
                options.threshold = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--duration" | "-d" => {
                options.duration_secs = value.and_then(|v| v.parse().ok());
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                return None;
            }
            other => eprintln!("ignoring unknown argument: {other}"),
        }
        i += 1;
    }
    Some(options)
}

fn build_config(options: &Options) -> ExchangeConfig {
    let mut config = match &options.config_path {
        Some(path) => match ExchangeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                process::exit(2);
            }
        },
        None => ExchangeConfig::default(),
    };
    if let Some(bind) = options.bind {
        config = config.with_inbound(bind);
    }
    if let Some(connect) = options.connect {
        config = config.with_outbound(connect);
    }
    if let Some(transport) = options.transport {
        config = config.with_transport(transport);
    }
    config
}

fn main() {
    let Some(options) = parse_args() else {
        return;
    };
    init_logging("info");

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         MIMIC MONITOR                                            ║");
    println!("║         TRACKER EXCHANGE PROBE                                   ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = build_config(&options);

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Transport:          {:?}", config.transport);
    println!("│ Inbound:            {}", config.inbound.bind);
    println!("│ Outbound:           {}", config.outbound.connect);
    println!("│ Receive Timeout:    {} ms", config.recv_timeout_ms);
    match options.duration_secs {
        Some(d) => println!("│ Duration:           {d} seconds"),
        None => println!("│ Duration:           infinite"),
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let exchange = Exchange::new(config);
    if let Err(e) = exchange.start() {
        error!(error = %e, "failed to start exchange");
        process::exit(1);
    }

    for kind in &options.commands {
        if let Err(e) = exchange.send_command(*kind, &[]) {
            error!(%kind, error = %e, "command failed");
        }
    }
    if let Some(threshold) = options.threshold {
        let result = exchange
            .sender()
            .and_then(|sender| sender.set_binarization_threshold(threshold));
        if let Err(e) = result {
            error!(threshold, error = %e, "threshold command failed");
        }
    }

    let start = Instant::now();
    let mut last_stats = Instant::now();
    let mut frames = 0u64;

    loop {
        if let Some(duration) = options.duration_secs {
            if start.elapsed().as_secs() >= duration {
                break;
            }
        }

        let frame_start = Instant::now();
        poll_store(&exchange);
        frames += 1;

        if last_stats.elapsed() >= STATS_INTERVAL {
            last_stats = Instant::now();
            let stats = exchange.stats();
            println!("┌─ EXCHANGE STATUS (Frame {frames}) ──────────────────────────────");
            println!("│ Uptime:             {:.1}s", start.elapsed().as_secs_f64());
            println!("│ Received:           {} ({} bytes)", stats.messages_received, stats.bytes_received);
            println!("│ Stored:             {}", stats.messages_decoded);
            println!("│ Malformed:          {}", stats.messages_malformed);
            println!("│ Ignored:            {}", stats.messages_ignored);
            println!("│ Receive Errors:     {}", stats.recv_errors);
            println!(
                "│ Commands Sent:      {} ({} failed, {} dropped)",
                stats.commands_sent, stats.send_errors, stats.commands_dropped
            );
            println!("└──────────────────────────────────────────────────────────────────");
        }

        if let Some(rest) = FRAME_TIME.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    if let Err(e) = exchange.stop() {
        error!(error = %e, "shutdown failed");
        process::exit(1);
    }
}

fn poll_store(exchange: &Exchange) {
    if let Some(points) = exchange.take_model_points() {
        info!(count = points.len(), "model points");
    }
    if let Some(rays) = exchange.take_rays_if_changed() {
        info!(count = rays.len(), "rays");
    }
    if let Some(points) = exchange.take_intersections_if_changed() {
        info!(count = points.len(), "intersections");
    }
    for (camera_id, pose) in exchange.drain_cameras() {
        let t = pose.translation();
        info!(camera_id, x = t.x, y = t.y, z = t.z, "camera pose");
    }
    for (spotter_id, frame) in exchange.store().drain_debug_frames() {
        info!(
            spotter_id,
            width = frame.width,
            height = frame.height,
            bytes = frame.pixels.len(),
            consistent = frame.is_consistent(),
            "debug frame"
        );
    }
}
