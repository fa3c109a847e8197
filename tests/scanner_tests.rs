use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use subnet_scan_rs::scanner::{run_scan, ScanHooks, ScanMode};
use subnet_scan_rs::types::{PortEntry, ProbeStatus, ScanConfig};

/// Listener bound to an ephemeral loopback port. Keeping it alive is enough
/// for connects to succeed; no accept loop is needed.
async fn loopback_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

/// A loopback port with nothing listening on it.
fn vacant_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// `n` distinct vacant loopback ports. The listeners are held simultaneously
/// while the ports are read off, so no port repeats.
fn vacant_ports(n: usize) -> Vec<PortEntry> {
    let listeners: Vec<std::net::TcpListener> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").expect("bind"))
        .collect();
    listeners
        .iter()
        .map(|l| PortEntry::new(l.local_addr().expect("local addr").port(), None))
        .collect()
}

fn config(ports: Vec<PortEntry>, max_concurrency: usize) -> ScanConfig {
    ScanConfig {
        addresses: vec!["127.0.0.1".to_string()],
        ports,
        timeout_ms: 200,
        max_concurrency,
        resolve_hostnames: false,
    }
}

#[tokio::test]
async fn open_and_closed_ports_reported_in_sorted_order() {
    let (_listener, open_port) = loopback_listener().await;
    let closed_port = vacant_port();

    let cfg = config(
        vec![
            PortEntry::new(open_port, None),
            PortEntry::new(closed_port, None),
        ],
        2,
    );
    let session = run_scan(cfg, ScanMode::Port, ScanHooks::default(), CancellationToken::new()).await;

    assert_eq!(session.completed, 2);
    assert_eq!(session.total, 2);
    assert_eq!(session.results.len(), 2);
    assert!(session.finished_at.is_some());

    let sorted = session.sorted();
    let expected_first = open_port.min(closed_port);
    assert_eq!(sorted[0].target.port, Some(expected_first));

    for outcome in &sorted {
        match outcome.target.port {
            Some(p) if p == open_port => {
                assert_eq!(outcome.status, ProbeStatus::Open);
                assert!(outcome.latency_ms.expect("open has latency") >= 0.0);
            }
            Some(p) if p == closed_port => {
                assert_eq!(outcome.status, ProbeStatus::Closed);
                assert_eq!(outcome.latency_ms, None);
            }
            other => panic!("unexpected target port {other:?}"),
        }
    }
}

#[tokio::test]
async fn every_probe_counted_exactly_once() {
    let (_listener, open_port) = loopback_listener().await;
    // Sequential bind/drop can hand back the same ephemeral port, so the
    // candidate list is deduplicated before it becomes the scan's port set.
    let mut ports: Vec<PortEntry> = (0..20)
        .map(|_| PortEntry::new(vacant_port(), None))
        .collect();
    ports.push(PortEntry::new(open_port, None));
    ports.sort_by_key(|e| e.number);
    ports.dedup_by_key(|e| e.number);
    let expected = ports.len() as u64;

    let progress = Arc::new(Mutex::new(Vec::<(u64, u64)>::new()));
    let results_seen = Arc::new(Mutex::new(0u64));
    let hooks = ScanHooks {
        on_progress: Some(Box::new({
            let progress = progress.clone();
            move |completed, total| progress.lock().unwrap().push((completed, total))
        })),
        on_result: Some(Box::new({
            let results_seen = results_seen.clone();
            move |_outcome| *results_seen.lock().unwrap() += 1
        })),
        ..ScanHooks::default()
    };

    let session = run_scan(
        config(ports, 8),
        ScanMode::Port,
        hooks,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(session.completed, expected);
    assert_eq!(session.total, expected);
    assert_eq!(session.results.len() as u64, expected);
    assert_eq!(*results_seen.lock().unwrap(), expected);

    // Progress ticks are strictly monotonic, one per probe.
    let ticks = progress.lock().unwrap();
    assert_eq!(ticks.len() as u64, expected);
    for (i, (completed, total)) in ticks.iter().enumerate() {
        assert_eq!(*completed, i as u64 + 1);
        assert_eq!(*total, expected);
    }

    // No (address, port) pair is ever duplicated.
    let mut pairs: Vec<_> = session
        .results
        .iter()
        .map(|o| (o.target.address.clone(), o.target.port))
        .collect();
    pairs.sort();
    let before = pairs.len();
    pairs.dedup();
    assert_eq!(pairs.len(), before);
}

#[tokio::test]
async fn progress_ticks_interleave_with_admission() {
    let ports = vacant_ports(24);
    let total = ports.len() as u64;

    let admitted = Arc::new(AtomicU64::new(0));
    let admitted_at_tick = Arc::new(Mutex::new(Vec::<u64>::new()));
    let hooks = ScanHooks {
        on_admit: Some(Box::new({
            let admitted = admitted.clone();
            move |_target| {
                admitted.fetch_add(1, Ordering::SeqCst);
            }
        })),
        on_progress: Some(Box::new({
            let admitted = admitted.clone();
            let admitted_at_tick = admitted_at_tick.clone();
            move |_completed, _total| {
                admitted_at_tick
                    .lock()
                    .unwrap()
                    .push(admitted.load(Ordering::SeqCst))
            }
        })),
        ..ScanHooks::default()
    };

    let session = run_scan(config(ports, 2), ScanMode::Port, hooks, CancellationToken::new()).await;
    assert_eq!(session.completed, total);

    // Each tick fires promptly: when the i-th completion is drained, at most
    // a window's worth of probes beyond it have been admitted. In particular
    // the first tick arrives long before admission is done.
    let ticks = admitted_at_tick.lock().unwrap();
    assert_eq!(ticks.len() as u64, total);
    assert!(ticks[0] <= 2, "first tick saw {} admissions", ticks[0]);
    for (i, admitted_then) in ticks.iter().enumerate() {
        assert!(
            admitted_then - i as u64 <= 2,
            "tick {i} trailed admission by {}",
            admitted_then - i as u64
        );
    }
}

#[tokio::test]
async fn in_flight_probes_never_exceed_concurrency_cap() {
    let ports = vacant_ports(30);
    let cap = 3;

    let in_flight = Arc::new(AtomicI64::new(0));
    let peak = Arc::new(AtomicI64::new(0));
    let hooks = ScanHooks {
        on_admit: Some(Box::new({
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move |_target| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
            }
        })),
        on_result: Some(Box::new({
            let in_flight = in_flight.clone();
            move |_outcome| {
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })),
        ..ScanHooks::default()
    };

    let session = run_scan(config(ports, cap), ScanMode::Port, hooks, CancellationToken::new()).await;

    assert_eq!(session.completed, 30);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1);
    assert!(peak <= cap as i64, "peak in flight was {peak}, cap {cap}");
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mid_scan_cancellation_admits_no_further_probes() {
    let ports = vacant_ports(40);
    let total = ports.len() as u64;
    let cancel = CancellationToken::new();

    let admitted = Arc::new(AtomicU64::new(0));
    let admitted_at_cancel = Arc::new(AtomicU64::new(0));
    let hooks = ScanHooks {
        on_admit: Some(Box::new({
            let admitted = admitted.clone();
            move |_target| {
                admitted.fetch_add(1, Ordering::SeqCst);
            }
        })),
        on_progress: Some(Box::new({
            let cancel = cancel.clone();
            let admitted = admitted.clone();
            let admitted_at_cancel = admitted_at_cancel.clone();
            move |completed, _total| {
                if completed == 3 {
                    cancel.cancel();
                    admitted_at_cancel.store(admitted.load(Ordering::SeqCst), Ordering::SeqCst);
                }
            }
        })),
        ..ScanHooks::default()
    };

    let session = run_scan(config(ports, 2), ScanMode::Port, hooks, cancel).await;

    // The token is checked before every admission, so nothing is spawned
    // after the cancelling tick.
    assert_eq!(
        admitted.load(Ordering::SeqCst),
        admitted_at_cancel.load(Ordering::SeqCst)
    );
    // Every probe admitted before the cut is still drained and recorded.
    assert_eq!(session.completed, admitted.load(Ordering::SeqCst));
    assert!(session.completed < total);
    assert_eq!(session.total, total);
    assert_eq!(session.results.len() as u64, session.completed);
    assert!(session.finished_at.is_some());
}

#[tokio::test]
async fn rescan_of_static_target_is_idempotent() {
    let (_listener, open_port) = loopback_listener().await;
    let closed_port = vacant_port();
    let ports = vec![
        PortEntry::new(open_port, None),
        PortEntry::new(closed_port, None),
    ];

    let mut observed = Vec::new();
    for _ in 0..2 {
        let session = run_scan(
            config(ports.clone(), 4),
            ScanMode::Port,
            ScanHooks::default(),
            CancellationToken::new(),
        )
        .await;
        let pairs: Vec<_> = session
            .sorted()
            .into_iter()
            .map(|o| (o.target.address, o.target.port, o.status))
            .collect();
        observed.push(pairs);
    }
    assert_eq!(observed[0], observed[1]);
}

#[tokio::test]
async fn cancelled_scan_finishes_early_without_new_admissions() {
    let ports: Vec<PortEntry> = (1..=16).map(|p| PortEntry::new(p, None)).collect();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let session = run_scan(config(ports, 4), ScanMode::Port, ScanHooks::default(), cancel).await;

    assert_eq!(session.total, 16);
    assert_eq!(session.completed, 0);
    assert!(session.results.is_empty());
    assert!(session.finished_at.is_some());
}

#[tokio::test]
async fn combined_mode_skips_ports_for_hosts_that_never_answered() {
    // Liveness probes against unresolvable names yield Error, not Reachable,
    // so the gate admits no port probes at all.
    let cfg = ScanConfig {
        addresses: vec![
            "host-a.does-not-exist.invalid".to_string(),
            "host-b.does-not-exist.invalid".to_string(),
        ],
        ports: vec![PortEntry::new(80, Some("HTTP"))],
        timeout_ms: 200,
        max_concurrency: 4,
        resolve_hostnames: false,
    };

    let session = run_scan(cfg, ScanMode::Combined, ScanHooks::default(), CancellationToken::new()).await;

    assert_eq!(session.total, 2, "total must stay at host count");
    assert_eq!(session.completed, 2);
    assert!(session
        .results
        .iter()
        .all(|o| o.target.port.is_none()), "no port probe may run");
}

// Needs a blackholed route (RFC 5737 test range) to observe timeout pacing;
// network-dependent, so not part of the default run.
#[tokio::test]
#[ignore]
async fn admission_window_paces_timeout_bound_probes() {
    let ports: Vec<PortEntry> = (8000..8006).map(|p| PortEntry::new(p, None)).collect();
    let mut cfg = config(ports, 1);
    cfg.addresses = vec!["203.0.113.1".to_string()];
    cfg.timeout_ms = 300;

    let start = std::time::Instant::now();
    let session = run_scan(cfg, ScanMode::Port, ScanHooks::default(), CancellationToken::new()).await;
    let serial = start.elapsed();

    assert_eq!(session.completed, 6);
    // Six timeout-bound probes through a window of one cannot finish faster
    // than six timeouts back to back.
    assert!(serial >= std::time::Duration::from_millis(6 * 300));
}
