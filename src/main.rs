//! netpath - hop-by-hop ICMP path diagnostics
//!
//! This is the command-line interface for the netpath library.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use netpath::config::defaults::{DEFAULT_MAX_SESSIONS, DEFAULT_PROBE_INTERVAL_SECS};
use netpath::traceroute::{TraceFailure, TraceRouteResult};
use netpath::{
    ManagerConfig, PathResult, PathSessionManager, PathTracer, ProbeConfig, Services,
    TracerouteError, Traceroute,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the path diagnostic tool.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Hop-by-hop ICMP path diagnostics", long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Output results in JSON format
    #[clap(long, global = true)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[clap(short = 'l', long = "log-level", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-shot traceroute: three probes per hop, no device inference
    Trace {
        /// Target hostname or IPv4 address
        host: String,

        #[clap(flatten)]
        probe: ProbeArgs,

        /// Give up after this many milliseconds, keeping the hops gathered so far
        #[clap(short = 'W', long)]
        overall_timeout_ms: Option<u64>,
    },

    /// Single NetPath cycle with per-hop statistics and device inference
    Probe {
        /// Target hostname or IPv4 address
        host: String,

        #[clap(flatten)]
        probe: ProbeArgs,

        /// Give up after this many milliseconds, keeping the hops gathered so far
        #[clap(short = 'W', long)]
        overall_timeout_ms: Option<u64>,
    },

    /// Continuously monitor one or more targets until Ctrl+C
    Monitor {
        /// Target hostnames or IPv4 addresses
        #[clap(required = true)]
        hosts: Vec<String>,

        #[clap(flatten)]
        probe: ProbeArgs,

        /// Seconds between cycles of each session
        #[clap(short = 'i', long, default_value_t = DEFAULT_PROBE_INTERVAL_SECS)]
        interval_secs: u64,

        /// Maximum number of concurrent sessions
        #[clap(long, default_value_t = DEFAULT_MAX_SESSIONS)]
        max_sessions: usize,

        /// Exit after every session recorded this many cycles
        #[clap(short = 'c', long)]
        cycles: Option<u64>,
    },
}

/// Probe settings; zero means "use the default"
#[derive(clap::Args, Debug, Clone, Copy)]
struct ProbeArgs {
    /// Maximum number of hops
    #[clap(short = 'm', long, default_value_t = 0)]
    max_hops: i64,

    /// Timeout for individual probes in milliseconds
    #[clap(short = 't', long, default_value_t = 0)]
    timeout_ms: i64,

    /// Number of probes per hop
    #[clap(short = 'q', long, default_value_t = 0)]
    probes: i64,

    /// Cycles retained per monitoring session
    #[clap(long, default_value_t = 0)]
    history_size: i64,
}

impl ProbeArgs {
    fn to_config(self) -> ProbeConfig {
        ProbeConfig::builder()
            .max_hops(self.max_hops)
            .timeout_ms(self.timeout_ms)
            .probes_per_hop(self.probes)
            .history_size(self.history_size)
            .build()
    }
}

fn main() {
    let args = Args::parse();

    let filter = match args.log_level.as_str() {
        "error" => EnvFilter::new("error"),
        "warn" => EnvFilter::new("warn"),
        "debug" => EnvFilter::new("debug"),
        "trace" => EnvFilter::new("trace"),
        _ => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    if let Err(e) = runtime.block_on(async_main(args)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn async_main(args: Args) -> Result<()> {
    let services = Services::new();

    match args.command {
        Command::Trace {
            host,
            probe,
            overall_timeout_ms,
        } => {
            let traceroute = Traceroute::with_config(services, probe.to_config());
            let outcome = match overall_timeout_ms {
                Some(ms) => traceroute.run_within(&host, Duration::from_millis(ms)).await,
                None => traceroute.run(&host).await,
            };
            match outcome {
                Ok(result) => display_trace(&result, args.json)?,
                Err(TraceFailure { error, partial }) => {
                    if let Some(result) = &partial {
                        display_trace(result, args.json)?;
                    }
                    report_error(&error);
                    std::process::exit(1);
                }
            }
        }

        Command::Probe {
            host,
            probe,
            overall_timeout_ms,
        } => {
            let tracer = PathTracer::new(services);
            let config = probe.to_config();
            let outcome = match overall_timeout_ms {
                Some(ms) => {
                    tracer
                        .probe_once_within(&host, &config, Duration::from_millis(ms))
                        .await
                }
                None => tracer.probe_once(&host, &config).await,
            };
            match outcome {
                Ok(result) => display_path(&host, &result, args.json)?,
                Err(e) => {
                    report_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Command::Monitor {
            hosts,
            probe,
            interval_secs,
            max_sessions,
            cycles,
        } => {
            let config = ManagerConfig::default()
                .with_max_sessions(max_sessions)
                .with_probe_interval(Duration::from_secs(interval_secs));
            let manager = PathSessionManager::new(services, config);
            monitor(&manager, &hosts, probe.to_config(), cycles, args.json).await?;
        }
    }

    Ok(())
}

/// Run sessions for `hosts`, printing every new cycle, until Ctrl+C
async fn monitor(
    manager: &PathSessionManager,
    hosts: &[String],
    config: ProbeConfig,
    cycles: Option<u64>,
    json: bool,
) -> Result<()> {
    let outcomes =
        futures::future::join_all(hosts.iter().map(|host| manager.start(host, config))).await;

    let mut started = Vec::new();
    for (host, outcome) in hosts.iter().zip(outcomes) {
        match outcome {
            Ok(session) => {
                if !json {
                    println!(
                        "Monitoring {} ({}) every {}s as {}",
                        session.target, session.target_ip, session.interval_seconds, session.id
                    );
                }
                started.push(session.target);
            }
            Err(e) => eprintln!("Error: {}: {}", host, e),
        }
    }
    started.sort();
    started.dedup();
    if started.is_empty() {
        anyhow::bail!("no session could be started");
    }

    // (successful, failed) cycles already reported per target
    let mut seen: HashMap<String, (u64, u64)> = HashMap::new();
    let mut poll = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {}
        }

        let mut finished = 0;
        for session in manager.list_all().await {
            let (ok_seen, failed_seen) = seen.entry(session.target.clone()).or_default();
            if session.probe_count > *ok_seen {
                *ok_seen = session.probe_count;
                if let Some(result) = &session.current_result {
                    display_path(&session.target, result, json)?;
                }
            }
            if session.failed_cycles > *failed_seen {
                *failed_seen = session.failed_cycles;
                if let Some(error) = &session.last_error {
                    eprintln!("Error: {}: {}", session.target, error);
                }
            }
            // Failed cycles count too, or a process without privileges never finishes
            if cycles.is_some_and(|n| session.cycles_run() >= n) {
                finished += 1;
            }
        }
        if finished == started.len() {
            break;
        }
    }

    manager.shutdown().await;
    let sessions = manager.list_all().await;

    if !json {
        println!();
        for session in &sessions {
            println!(
                "{}: {} cycles ({} failed), {} retained{}",
                session.target,
                session.probe_count,
                session.failed_cycles,
                session.history.len(),
                session
                    .last_error
                    .as_deref()
                    .map(|e| format!(", last error: {}", e))
                    .unwrap_or_default()
            );
        }
    }

    if sessions.iter().all(|s| s.probe_count == 0 && s.failed_cycles > 0) {
        let error = sessions
            .iter()
            .find_map(|s| s.last_error.clone())
            .unwrap_or_default();
        anyhow::bail!("every probe cycle failed: {}", error);
    }
    Ok(())
}

fn report_error(error: &TracerouteError) {
    match error {
        TracerouteError::InsufficientPermissions {
            required,
            suggestion,
        } => {
            eprintln!("\nError: Insufficient permissions");
            eprintln!("Required: {}", required);
            eprintln!("Suggestion: {}", suggestion);
        }
        TracerouteError::ResolutionError(msg) => {
            eprintln!("\nError: {}", msg);
            eprintln!("Please check the hostname and your network connection.");
        }
        other => eprintln!("\nError: {}", other),
    }
}

fn display_trace(result: &TraceRouteResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("traceroute to {} ({})", result.target, result.target_ip);
    for hop in &result.hops {
        if hop.timeout {
            let addr = if hop.ip.is_empty() {
                "* * *"
            } else {
                hop.ip.as_str()
            };
            println!("{:2}  {}", hop.hop, addr);
            continue;
        }
        let host = match &hop.hostname {
            Some(name) => format!("{} ({})", name, hop.ip),
            None => hop.ip.clone(),
        };
        let slots: Vec<String> = [hop.latency1, hop.latency2, hop.latency3]
            .iter()
            .map(|l| {
                if *l < 0.0 {
                    "*".to_string()
                } else {
                    format!("{:.3} ms", l)
                }
            })
            .collect();
        println!("{:2}  {}  {}", hop.hop, host, slots.join("  "));
    }
    println!(
        "\n{} in {:.0} ms",
        if result.completed {
            "Destination reached"
        } else {
            "Destination not reached"
        },
        result.duration_ms
    );
    Ok(())
}

fn display_path(target: &str, result: &PathResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }

    println!("\npath to {} ({})", target, result.target_ip);
    for hop in &result.hops {
        let name = hop.device_name.as_deref().unwrap_or("");
        let addr = hop.ip.map_or("*".to_string(), |ip| ip.to_string());
        if hop.timeout {
            println!("{:2}  {:<32} {:<15} {}", hop.index, name, addr, hop.status);
            continue;
        }
        println!(
            "{:2}  {:<32} {:<15} {:>8.2} ms  jitter {:>6.2}  loss {:>5.1}%  {}{}",
            hop.index,
            name,
            addr,
            hop.avg_latency,
            hop.jitter,
            hop.packet_loss_pct,
            hop.status,
            if hop.is_bottleneck { "  [bottleneck]" } else { "" }
        );
    }
    println!(
        "{}, {} hops, loss {:.1}%, {:.0} ms{}{}",
        if result.completed { "completed" } else { "incomplete" },
        result.total_hops,
        result.overall_packet_loss_pct,
        result.duration_ms,
        if result.has_problems {
            format!(", problems at {:?}", result.problem_hops)
        } else {
            String::new()
        },
        if result.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}
