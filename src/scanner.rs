use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aggregate::ResultAggregator;
use crate::probe;
use crate::types::{ProbeKind, ProbeOutcome, ProbeStatus, ScanConfig, ScanSession, Target};

/// Which probes a scan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// One liveness probe per address.
    Liveness,
    /// One port probe per (address, port) pair.
    Port,
    /// Liveness sweep first; ports are probed only on hosts that answered.
    Combined,
}

/// Callbacks fired from the orchestrator loop, once per probe each.
///
/// `on_admit` fires when a probe takes a permit and is spawned. `on_progress`
/// and `on_result` fire as each completion is drained; `on_progress(completed,
/// total)` ticks monotonically and `on_result` sees outcomes in completion
/// order, not address/port order. All three run on the orchestrator's own
/// task, never inside a probe.
#[derive(Default)]
pub struct ScanHooks {
    pub on_admit: Option<Box<dyn FnMut(&Target) + Send>>,
    pub on_progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
    pub on_result: Option<Box<dyn FnMut(&ProbeOutcome) + Send>>,
}

impl ScanHooks {
    fn admit(&mut self, target: &Target) {
        if let Some(cb) = self.on_admit.as_mut() {
            cb(target);
        }
    }

    fn progress(&mut self, completed: u64, total: u64) {
        if let Some(cb) = self.on_progress.as_mut() {
            cb(completed, total);
        }
    }

    fn result(&mut self, outcome: &ProbeOutcome) {
        if let Some(cb) = self.on_result.as_mut() {
            cb(outcome);
        }
    }
}

/// Run a scan to completion (or until `cancel` fires).
///
/// Probes are admitted under a semaphore sized to `max_concurrency`: at most
/// that many are in flight at once, and as each completes the next queued
/// probe takes its permit. Every completion funnels through one mpsc channel
/// drained by this function, which is the only writer of the session and the
/// aggregator. Cancellation stops admitting new probes; in-flight ones
/// finish or time out on their own and are still recorded, so the session
/// ends with `completed < total` but never loses an admitted outcome.
pub async fn run_scan(
    config: ScanConfig,
    mode: ScanMode,
    mut hooks: ScanHooks,
    cancel: CancellationToken,
) -> ScanSession {
    let sem = Arc::new(Semaphore::new(config.max_concurrency.clamp(1, 5_000)));
    let timeout = config.timeout();
    let resolve = config.resolve_hostnames;

    let mut session = ScanSession::begin(config.clone());
    let mut agg = ResultAggregator::new();

    match mode {
        ScanMode::Liveness => {
            let targets: Vec<Target> = config.addresses.iter().cloned().map(Target::host).collect();
            session.total = targets.len() as u64;
            run_phase(
                targets, timeout, resolve, &sem, &cancel, &mut session, &mut agg, &mut hooks,
            )
            .await;
        }
        ScanMode::Port => {
            let targets = port_targets(config.addresses.iter().map(String::as_str), &config);
            session.total = targets.len() as u64;
            run_phase(
                targets, timeout, resolve, &sem, &cancel, &mut session, &mut agg, &mut hooks,
            )
            .await;
        }
        ScanMode::Combined => {
            let sweep: Vec<Target> = config.addresses.iter().cloned().map(Target::host).collect();
            session.total = sweep.len() as u64;
            run_phase(
                sweep, timeout, resolve, &sem, &cancel, &mut session, &mut agg, &mut hooks,
            )
            .await;

            // Dead hosts are not port-scanned.
            let reachable: Vec<String> = agg
                .results()
                .iter()
                .filter(|o| o.kind == ProbeKind::Liveness && o.status == ProbeStatus::Reachable)
                .map(|o| o.target.address.clone())
                .collect();
            debug!(
                "liveness sweep done: {} of {} hosts answered",
                reachable.len(),
                session.total
            );

            if !cancel.is_cancelled() && !reachable.is_empty() {
                let targets = port_targets(reachable.iter().map(String::as_str), &config);
                session.total += targets.len() as u64;
                run_phase(
                    targets, timeout, resolve, &sem, &cancel, &mut session, &mut agg,
                    &mut hooks,
                )
                .await;
            }
        }
    }

    session.results = agg.into_results();
    session.finish();
    session
}

fn port_targets<'a>(addresses: impl Iterator<Item = &'a str>, config: &ScanConfig) -> Vec<Target> {
    let mut targets = Vec::new();
    for address in addresses {
        for entry in &config.ports {
            targets.push(Target::port(address, entry.number));
        }
    }
    targets
}

/// Interleave admission and draining in one loop. Each iteration either
/// drains one completion or spawns the next target under a fresh permit,
/// so progress ticks fire as probes finish rather than after the whole
/// admission pass. The channel is sized to hold every outcome so probe
/// tasks never block on send; this loop is the single writer of session
/// state. The select is biased: a buffered completion is drained before
/// the permit it freed admits the next probe, and a cancelled token wins
/// over a pending permit.
#[allow(clippy::too_many_arguments)]
async fn run_phase(
    targets: Vec<Target>,
    timeout: Duration,
    resolve: bool,
    sem: &Arc<Semaphore>,
    cancel: &CancellationToken,
    session: &mut ScanSession,
    agg: &mut ResultAggregator,
    hooks: &mut ScanHooks,
) {
    if targets.is_empty() {
        return;
    }

    let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(targets.len());
    let mut pending = targets.into_iter();
    let mut next = pending.next();
    let mut admitted: u64 = 0;
    let mut drained: u64 = 0;

    loop {
        if next.is_some() && cancel.is_cancelled() {
            debug!("scan cancelled, no further probes admitted");
            next = None;
        }
        if next.is_none() && drained == admitted {
            break;
        }

        tokio::select! {
            biased;

            outcome = rx.recv(), if drained < admitted => {
                if let Some(outcome) = outcome {
                    drained += 1;
                    session.completed += 1;
                    hooks.progress(session.completed, session.total);
                    hooks.result(&outcome);
                    agg.append(outcome);
                }
            }
            _ = cancel.cancelled(), if next.is_some() => {}
            permit = sem.clone().acquire_owned(), if next.is_some() => {
                let permit = permit.expect("semaphore never closed");
                if let Some(target) = next.take() {
                    admitted += 1;
                    hooks.admit(&target);
                    let tx = tx.clone();

                    tokio::spawn(async move {
                        let _permit = permit; // held until the probe resolves

                        let outcome = match target.port {
                            Some(port) => probe::probe_port(&target.address, port, timeout).await,
                            None => probe::probe_liveness(&target.address, timeout, resolve).await,
                        };
                        let _ = tx.send(outcome).await;
                    });
                    next = pending.next();
                }
            }
        }
    }
}
