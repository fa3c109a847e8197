use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use subnet_scan_rs::addrspace::{self, TargetSpec};
use subnet_scan_rs::netdetect;
use subnet_scan_rs::ports;
use subnet_scan_rs::scanner::{run_scan, ScanHooks, ScanMode};
use subnet_scan_rs::types::{ProbeOutcome, ProbeStatus, ScanConfig, ScanSession};

/// subnet-scan-rs — async subnet liveness sweep and TCP port scanner with bounded concurrency.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "subnet-scan-rs",
    version,
    about = "Async subnet liveness sweep and TCP port scanner with bounded concurrency.",
    long_about = None
)]
struct Cli {
    /// Single target (IP or hostname) for a port scan.
    #[arg(long, conflicts_with = "subnet")]
    target: Option<String>,

    /// Subnet prefix (first three octets, e.g. 192.168.1). If omitted and no
    /// --target is given, the local /24 is auto-detected.
    #[arg(long)]
    subnet: Option<String>,

    /// Host octet range within the subnet.
    #[arg(long, default_value = "1-254")]
    range: String,

    /// Port range "start-end" (or a single port). Defaults to the
    /// well-known-ports list when omitted.
    #[arg(long)]
    ports: Option<String>,

    /// Also port-scan the hosts that answered the liveness sweep.
    #[arg(long = "scan-ports", default_value_t = false)]
    scan_ports: bool,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 400)]
    timeout_ms: u64,

    /// Max concurrent probes in flight.
    #[arg(long, default_value_t = 100)]
    concurrency: usize,

    /// Reverse-resolve hostnames for reachable hosts.
    #[arg(long, default_value_t = false)]
    resolve: bool,

    /// Write the full session as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let port_entries = match cli.ports.as_deref() {
        Some(spec) => ports::parse_range(spec)?,
        None => ports::well_known(),
    };

    let (addresses, mode) = if let Some(target) = cli.target.clone() {
        (TargetSpec::single(target).expand(), ScanMode::Port)
    } else {
        let prefix = match cli.subnet.clone() {
            Some(p) => p,
            None => {
                let nets = netdetect::detect_local_nets()
                    .context("failed to detect local networks; pass --subnet explicitly")?;
                let net = nets
                    .first()
                    .context("no non-loopback IPv4 network found; pass --subnet explicitly")?;
                let prefix = netdetect::subnet_prefix(net);
                println!("Auto-detected local subnet: {prefix}.0/24");
                prefix
            }
        };
        let (start, end) = addrspace::parse_octet_range(&cli.range)?;
        let spec = TargetSpec::subnet(&prefix, start, end)?;
        let mode = if cli.scan_ports {
            ScanMode::Combined
        } else {
            ScanMode::Liveness
        };
        (spec.expand(), mode)
    };

    println!("subnet-scan-rs configuration:");
    match mode {
        ScanMode::Port => println!(
            "  mode         : port scan of {} ({} ports)",
            addresses[0],
            port_entries.len()
        ),
        ScanMode::Liveness => println!("  mode         : liveness sweep of {} hosts", addresses.len()),
        ScanMode::Combined => println!(
            "  mode         : liveness sweep of {} hosts, then {} ports per live host",
            addresses.len(),
            port_entries.len()
        ),
    }
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  concurrency  : {}", cli.concurrency);
    println!("  resolve      : {}", cli.resolve);

    let config = ScanConfig {
        addresses,
        ports: port_entries,
        timeout_ms: cli.timeout_ms,
        max_concurrency: cli.concurrency,
        resolve_hostnames: cli.resolve,
    };

    // Ctrl-C stops admitting new probes; in-flight ones drain naturally.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("\ncancelling scan...");
        cancel_ctrlc.cancel();
    });

    let hooks = ScanHooks {
        on_progress: Some(Box::new(|completed, total| {
            print!("\rprobed {completed}/{total}");
            let _ = std::io::stdout().flush();
        })),
        on_result: None,
        ..ScanHooks::default()
    };

    let session = run_scan(config, mode, hooks, cancel).await;
    println!();

    print_results_table(&session);
    print_summary(&session);

    if let Some(path) = cli.output.as_deref() {
        write_session_json(path, &session)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        println!("Wrote JSON session to {}", path.display());
    }

    Ok(())
}

/// Print reachable/open/error outcomes as a fixed-width table, in
/// deterministic (address, port) order. Closed and unreachable entries are
/// counted in the summary but not listed row by row.
fn print_results_table(session: &ScanSession) {
    let rows: Vec<_> = session
        .sorted()
        .into_iter()
        .filter(|o| {
            matches!(
                o.status,
                ProbeStatus::Reachable | ProbeStatus::Open | ProbeStatus::Error
            )
        })
        .collect();

    if rows.is_empty() {
        println!("\nNothing reachable or open to report.");
        return;
    }

    let mut addr_w = "address".len();
    let mut detail_w = "detail".len();
    for o in &rows {
        addr_w = addr_w.max(o.target.address.len());
        detail_w = detail_w.max(detail_of(o).len().min(60));
    }
    let port_w = "port".len().max(5);
    let status_w = "status".len().max(11);
    let lat_w = "latency_ms".len();

    println!();
    println!(
        "{:<addr_w$}  {:>port_w$}  {:<status_w$}  {:>lat_w$}  {:<detail_w$}",
        "address", "port", "status", "latency_ms", "detail"
    );
    println!(
        "{:-<addr_w$}  {:-<port_w$}  {:-<status_w$}  {:-<lat_w$}  {:-<detail_w$}",
        "", "", "", "", ""
    );
    for o in &rows {
        let port = o
            .target
            .port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let latency = o
            .latency_ms
            .map(|ms| format!("{ms:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let mut detail = detail_of(o);
        if detail.len() > 60 {
            detail.truncate(60);
        }
        println!(
            "{:<addr_w$}  {:>port_w$}  {:<status_w$}  {:>lat_w$}  {:<detail_w$}",
            o.target.address,
            port,
            o.status.as_str(),
            latency,
            detail
        );
    }
}

fn detail_of(outcome: &ProbeOutcome) -> String {
    if let Some(err) = &outcome.error_detail {
        return err.clone();
    }
    if let Some(hostname) = &outcome.hostname {
        return hostname.clone();
    }
    match outcome.target.port {
        Some(_) => outcome
            .service
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        None => String::new(),
    }
}

fn print_summary(session: &ScanSession) {
    let summary = session.summary();
    println!(
        "\nprobes: {}/{} completed{}",
        session.completed,
        session.total,
        if session.completed < session.total {
            " (cancelled)"
        } else {
            ""
        }
    );
    if summary.liveness.reachable + summary.liveness.unreachable + summary.liveness.error > 0 {
        println!(
            "hosts : {} reachable, {} unreachable, {} errors",
            summary.liveness.reachable, summary.liveness.unreachable, summary.liveness.error
        );
    }
    if summary.port.open + summary.port.closed + summary.port.error > 0 {
        println!(
            "ports : {} open, {} closed, {} errors",
            summary.port.open, summary.port.closed, summary.port.error
        );
    }
}

fn write_session_json(path: &std::path::Path, session: &ScanSession) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, session)?;
    Ok(())
}
