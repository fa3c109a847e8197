use serde::{Deserialize, Serialize};
use time::{format_description::well_known, OffsetDateTime};

/// One probe request: an address plus an optional TCP port.
///
/// A target with no port is a liveness-only probe (ICMP echo).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub address: String,
    pub port: Option<u16>,
}

impl Target {
    /// Liveness-only target.
    pub fn host(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
        }
    }

    /// TCP port target.
    pub fn port(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port: Some(port),
        }
    }
}

/// What a probe was checking for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Liveness,
    Port,
}

/// What a probe found.
///
/// Reachable/Unreachable apply to liveness probes, Open/Closed to port
/// probes. Error means the probe itself failed to execute (DNS failure,
/// routing failure, permission denial) as opposed to executing and finding
/// nothing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    Unreachable,
    Open,
    Closed,
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Reachable => "reachable",
            ProbeStatus::Unreachable => "unreachable",
            ProbeStatus::Open => "open",
            ProbeStatus::Closed => "closed",
            ProbeStatus::Error => "error",
        }
    }
}

/// Result of one probe. Never mutated after the orchestrator appends it.
///
/// `latency_ms` is set only for Reachable/Open outcomes. `service` is set
/// only for port probes whose port is in the well-known table. `hostname`
/// is set only when reverse DNS was requested and succeeded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub target: Target,
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    pub latency_ms: Option<f64>,
    pub service: Option<String>,
    pub hostname: Option<String>,
    pub error_detail: Option<String>,
    pub observed_at: String,
}

impl ProbeOutcome {
    fn new(target: Target, kind: ProbeKind, status: ProbeStatus) -> Self {
        Self {
            target,
            kind,
            status,
            latency_ms: None,
            service: None,
            hostname: None,
            error_detail: None,
            observed_at: now_rfc3339(),
        }
    }

    pub fn reachable(address: &str, latency_ms: f64) -> Self {
        let mut o = Self::new(
            Target::host(address),
            ProbeKind::Liveness,
            ProbeStatus::Reachable,
        );
        o.latency_ms = Some(latency_ms);
        o
    }

    pub fn unreachable(address: &str) -> Self {
        Self::new(
            Target::host(address),
            ProbeKind::Liveness,
            ProbeStatus::Unreachable,
        )
    }

    pub fn open(address: &str, port: u16, latency_ms: f64) -> Self {
        let mut o = Self::new(
            Target::port(address, port),
            ProbeKind::Port,
            ProbeStatus::Open,
        );
        o.latency_ms = Some(latency_ms);
        o
    }

    pub fn closed(address: &str, port: u16) -> Self {
        Self::new(
            Target::port(address, port),
            ProbeKind::Port,
            ProbeStatus::Closed,
        )
    }

    pub fn error(target: Target, kind: ProbeKind, detail: impl Into<String>) -> Self {
        let mut o = Self::new(target, kind, ProbeStatus::Error);
        o.error_detail = Some(detail.into());
        o
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// One port to probe, with its well-known service name if any.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub number: u16,
    pub service: Option<String>,
}

impl PortEntry {
    pub fn new(number: u16, service: Option<&str>) -> Self {
        Self {
            number,
            service: service.map(str::to_string),
        }
    }
}

/// Caller-supplied scan parameters, immutable for the duration of one scan.
///
/// `timeout_ms` bounds every individual probe; it never bounds the whole
/// scan. `max_concurrency` caps the number of probes in flight at once.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanConfig {
    pub addresses: Vec<String>,
    pub ports: Vec<PortEntry>,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
    pub resolve_hostnames: bool,
}

impl ScanConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms.max(1))
    }
}

/// Aggregate state of one scan: progress counters and the append-only
/// result collection. Mutated only by the orchestrator's completion drain.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanSession {
    pub config: ScanConfig,
    pub completed: u64,
    pub total: u64,
    pub results: Vec<ProbeOutcome>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl ScanSession {
    pub fn begin(config: ScanConfig) -> Self {
        Self {
            config,
            completed: 0,
            total: 0,
            results: Vec::new(),
            started_at: now_rfc3339(),
            finished_at: None,
        }
    }

    /// Mark the session done. Idempotent; the first call wins.
    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(now_rfc3339());
        }
    }
}

/// RFC3339 UTC timestamp using the `time` crate.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
