use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::ports;
use crate::types::{ProbeKind, ProbeOutcome, Target};

/// Probe a single TCP port with an asynchronous connect bounded by `timeout`.
///
/// Connected -> Open with latency and service name; timeout or active
/// refusal/reset -> Closed; any other transport error -> Error with detail.
/// The stream is dropped before returning on every path, so no probe leaks
/// a socket regardless of outcome.
pub async fn probe_port(address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
    let ip = match resolve_address(address, timeout).await {
        Ok(ip) => ip,
        Err(detail) => {
            return ProbeOutcome::error(Target::port(address, port), ProbeKind::Port, detail)
        }
    };

    let addr = SocketAddr::new(ip, port);
    let start = Instant::now();
    trace!("tcp connect {addr}");

    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            drop(stream);
            debug!("{addr} open ({latency_ms:.1} ms)");
            let outcome = ProbeOutcome::open(address, port, latency_ms);
            match ports::service_name(port) {
                Some(name) => outcome.with_service(name),
                None => outcome,
            }
        }
        Ok(Err(e))
            if matches!(
                e.kind(),
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) =>
        {
            trace!("{addr} closed: {e}");
            ProbeOutcome::closed(address, port)
        }
        Ok(Err(e)) => {
            debug!("{addr} probe error: {e}");
            ProbeOutcome::error(Target::port(address, port), ProbeKind::Port, e.to_string())
        }
        Err(_) => {
            trace!("{addr} timed out");
            ProbeOutcome::closed(address, port)
        }
    }
}

/// Probe host liveness with one ICMP echo request bounded by `timeout`.
///
/// Echo reply -> Reachable with round-trip latency; echo timeout ->
/// Unreachable; any other transport failure (including being denied an ICMP
/// socket) -> Error with detail, so "could not probe" stays distinguishable
/// from "probed, no answer". When `resolve` is set, a best-effort reverse
/// DNS lookup runs after a Reachable result; its failure never downgrades
/// the outcome.
pub async fn probe_liveness(address: &str, timeout: Duration, resolve: bool) -> ProbeOutcome {
    let ip = match resolve_address(address, timeout).await {
        Ok(ip) => ip,
        Err(detail) => {
            return ProbeOutcome::error(Target::host(address), ProbeKind::Liveness, detail)
        }
    };

    let payload = [0u8; 56];
    trace!("icmp echo {ip}");

    match time::timeout(timeout, surge_ping::ping(ip, &payload)).await {
        Ok(Ok((_reply, rtt))) => {
            let latency_ms = rtt.as_secs_f64() * 1000.0;
            debug!("{ip} reachable ({latency_ms:.1} ms)");
            let mut outcome = ProbeOutcome::reachable(address, latency_ms);
            if resolve {
                if let Some(hostname) = reverse_lookup(ip).await {
                    outcome = outcome.with_hostname(hostname);
                }
            }
            outcome
        }
        Ok(Err(surge_ping::SurgeError::Timeout { .. })) => {
            trace!("{ip} echo timed out");
            ProbeOutcome::unreachable(address)
        }
        Ok(Err(e)) => {
            debug!("{ip} liveness probe error: {e}");
            ProbeOutcome::error(Target::host(address), ProbeKind::Liveness, e.to_string())
        }
        Err(_) => {
            trace!("{ip} echo timed out");
            ProbeOutcome::unreachable(address)
        }
    }
}

/// Parse `address` as an IP literal, falling back to a DNS lookup bounded by
/// the probe timeout. A failed lookup is reported as a string detail for an
/// Error outcome, never raised.
async fn resolve_address(address: &str, timeout: Duration) -> Result<IpAddr, String> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    match time::timeout(timeout, tokio::net::lookup_host((address, 0u16))).await {
        Ok(Ok(mut addrs)) => addrs
            .next()
            .map(|sa| sa.ip())
            .ok_or_else(|| format!("no addresses found for {address}")),
        Ok(Err(e)) => Err(format!("failed to resolve {address}: {e}")),
        Err(_) => Err(format!("timed out resolving {address}")),
    }
}

/// Best-effort reverse PTR lookup. The libc resolver blocks, so it runs on
/// the blocking pool.
async fn reverse_lookup(ip: IpAddr) -> Option<String> {
    tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip).ok())
        .await
        .ok()
        .flatten()
}
