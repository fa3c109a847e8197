use thiserror::Error;

/// Validation failures raised before any probing begins.
///
/// Per-probe failures are never represented here; they fold into
/// `ProbeOutcome::status` so one bad host can't abort a sweep.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid subnet prefix `{0}`: expected three dotted octets, e.g. 192.168.1")]
    Subnet(String),

    #[error("invalid host octet range `{0}`: expected start-end within 1-254, start <= end")]
    HostRange(String),

    #[error("invalid port range `{0}`: expected start-end within 1-65535, start <= end")]
    PortRange(String),
}
