use crate::error::ConfigError;
use std::net::Ipv4Addr;

/// Which addresses a scan should cover: one host, or a /24-style slice of a
/// subnet given as the first three octets plus an inclusive host-octet range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Single(String),
    Subnet { prefix: String, start: u8, end: u8 },
}

impl TargetSpec {
    /// A single address or hostname. Resolution happens at probe time.
    pub fn single(address: impl Into<String>) -> Self {
        TargetSpec::Single(address.into())
    }

    /// A subnet slice. Validates the prefix and the 1-254 host-octet bounds
    /// up front so no probing starts on a malformed request.
    pub fn subnet(prefix: &str, start: u32, end: u32) -> Result<Self, ConfigError> {
        let octets: Vec<&str> = prefix.split('.').collect();
        if octets.len() != 3 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
            return Err(ConfigError::Subnet(prefix.to_string()));
        }
        if start < 1 || end > 254 || start > end {
            return Err(ConfigError::HostRange(format!("{start}-{end}")));
        }
        Ok(TargetSpec::Subnet {
            prefix: prefix.to_string(),
            start: start as u8,
            end: end as u8,
        })
    }

    /// Expand into an ordered, duplicate-free list of dotted-quad strings
    /// (or the single address verbatim).
    pub fn expand(&self) -> Vec<String> {
        match self {
            TargetSpec::Single(addr) => vec![addr.clone()],
            TargetSpec::Subnet { prefix, start, end } => (*start..=*end)
                .map(|octet| format!("{prefix}.{octet}"))
                .collect(),
        }
    }
}

/// Parse a "start-end" host-octet range string (e.g. "1-254").
pub fn parse_octet_range(spec: &str) -> Result<(u32, u32), ConfigError> {
    let bad = || ConfigError::HostRange(spec.to_string());
    let (a, b) = spec.split_once('-').ok_or_else(bad)?;
    let start: u32 = a.trim().parse().map_err(|_| bad())?;
    let end: u32 = b.trim().parse().map_err(|_| bad())?;
    if start < 1 || end > 254 || start > end {
        return Err(bad());
    }
    Ok((start, end))
}

/// True when `addr` is a syntactically valid IPv4 dotted quad.
pub fn is_dotted_quad(addr: &str) -> bool {
    addr.parse::<Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_expands_to_one() {
        let spec = TargetSpec::single("10.0.0.5");
        assert_eq!(spec.expand(), vec!["10.0.0.5".to_string()]);
    }

    #[test]
    fn subnet_expands_inclusive() {
        let spec = TargetSpec::subnet("192.168.1", 10, 12).unwrap();
        assert_eq!(
            spec.expand(),
            vec!["192.168.1.10", "192.168.1.11", "192.168.1.12"]
        );
    }

    #[test]
    fn subnet_full_range_count_and_validity() {
        let spec = TargetSpec::subnet("10.1.2", 1, 254).unwrap();
        let addrs = spec.expand();
        assert_eq!(addrs.len(), 254);
        assert!(addrs.iter().all(|a| is_dotted_quad(a)));
        let mut dedup = addrs.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), addrs.len());
    }

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(
            TargetSpec::subnet("192.168.1", 20, 10),
            Err(ConfigError::HostRange("20-10".to_string()))
        );
    }

    #[test]
    fn out_of_bounds_rejected() {
        assert!(TargetSpec::subnet("192.168.1", 0, 10).is_err());
        assert!(TargetSpec::subnet("192.168.1", 1, 255).is_err());
    }

    #[test]
    fn malformed_prefix_rejected() {
        assert!(TargetSpec::subnet("192.168", 1, 10).is_err());
        assert!(TargetSpec::subnet("192.168.1.0", 1, 10).is_err());
        assert!(TargetSpec::subnet("192.abc.1", 1, 10).is_err());
        assert!(TargetSpec::subnet("300.168.1", 1, 10).is_err());
    }

    #[test]
    fn octet_range_parses() {
        assert_eq!(parse_octet_range("1-254").unwrap(), (1, 254));
        assert_eq!(parse_octet_range(" 5 - 9 ").unwrap(), (5, 9));
        assert!(parse_octet_range("254").is_err());
        assert!(parse_octet_range("9-5").is_err());
        assert!(parse_octet_range("0-254").is_err());
    }
}
