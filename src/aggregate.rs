use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::types::{ProbeKind, ProbeOutcome, ProbeStatus, ScanSession};

/// Per-status counters for one probe kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub reachable: u64,
    pub unreachable: u64,
    pub open: u64,
    pub closed: u64,
    pub error: u64,
}

impl KindCounts {
    fn bump(&mut self, status: ProbeStatus) {
        match status {
            ProbeStatus::Reachable => self.reachable += 1,
            ProbeStatus::Unreachable => self.unreachable += 1,
            ProbeStatus::Open => self.open += 1,
            ProbeStatus::Closed => self.closed += 1,
            ProbeStatus::Error => self.error += 1,
        }
    }
}

/// Status counts grouped by probe kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub liveness: KindCounts,
    pub port: KindCounts,
    pub total: u64,
}

/// Count outcomes by status, grouped by kind.
pub fn summarize(results: &[ProbeOutcome]) -> ScanSummary {
    let mut summary = ScanSummary::default();
    for outcome in results {
        match outcome.kind {
            ProbeKind::Liveness => summary.liveness.bump(outcome.status),
            ProbeKind::Port => summary.port.bump(outcome.status),
        }
        summary.total += 1;
    }
    summary
}

/// Sort outcomes by address (numeric per octet, not string-lexicographic)
/// then port ascending, so output is deterministic regardless of the order
/// probes happened to complete in.
pub fn sort_results(results: &mut [ProbeOutcome]) {
    results.sort_by(|a, b| {
        addr_key(&a.target.address)
            .cmp(&addr_key(&b.target.address))
            .then_with(|| a.target.port.cmp(&b.target.port))
    });
}

// IPv4 addresses order by numeric value; anything else (hostnames) sorts
// after them, lexicographically.
fn addr_key(address: &str) -> (u32, String) {
    match address.parse::<Ipv4Addr>() {
        Ok(ip) => (u32::from(ip), String::new()),
        Err(_) => (u32::MAX, address.to_string()),
    }
}

/// Accumulates probe outcomes for one scan.
///
/// `append` is invoked only from the orchestrator's single completion-drain
/// loop, so it needs no synchronization of its own. Outcomes are never
/// mutated after being appended.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<ProbeOutcome>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, outcome: ProbeOutcome) {
        self.results.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[ProbeOutcome] {
        &self.results
    }

    pub fn summary(&self) -> ScanSummary {
        summarize(&self.results)
    }

    pub fn sorted(&self) -> Vec<ProbeOutcome> {
        let mut out = self.results.clone();
        sort_results(&mut out);
        out
    }

    pub fn into_results(self) -> Vec<ProbeOutcome> {
        self.results
    }
}

impl ScanSession {
    /// Status counts by kind over everything recorded so far.
    pub fn summary(&self) -> ScanSummary {
        summarize(&self.results)
    }

    /// Results in deterministic display order (address, then port).
    pub fn sorted(&self) -> Vec<ProbeOutcome> {
        let mut out = self.results.clone();
        sort_results(&mut out);
        out
    }
}
