use crate::error::ConfigError;
use crate::types::PortEntry;

/// Well-known TCP ports and their canonical service names.
///
/// This table is a static constant; callers may extend the `PortEntry` list
/// they build from it but never mutate the table itself.
pub const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (20, "FTP-DATA"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (67, "DHCP-Server"),
    (68, "DHCP-Client"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPCBind"),
    (119, "NNTP"),
    (123, "NTP"),
    (135, "MSRPC"),
    (137, "NetBIOS-NS"),
    (138, "NetBIOS-DGM"),
    (139, "NetBIOS-SSN"),
    (143, "IMAP"),
    (161, "SNMP"),
    (162, "SNMP-Trap"),
    (389, "LDAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (514, "Syslog"),
    (587, "SMTP-Submission"),
    (636, "LDAPS"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (5985, "WinRM-HTTP"),
    (5986, "WinRM-HTTPS"),
    (6379, "Redis"),
    (8080, "HTTP-Alt"),
    (8443, "HTTPS-Alt"),
    (9090, "Prometheus"),
    (9200, "Elasticsearch"),
    (27017, "MongoDB"),
];

/// Canonical service name for a well-known port. Display layers render
/// `None` as "Unknown".
pub fn service_name(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS
        .iter()
        .find(|&&(p, _)| p == port)
        .map(|&(_, name)| name)
}

/// The curated well-known-ports list, in table order.
pub fn well_known() -> Vec<PortEntry> {
    WELL_KNOWN_PORTS
        .iter()
        .map(|&(port, name)| PortEntry::new(port, Some(name)))
        .collect()
}

/// Parse an explicit port range.
///
/// Accepts `start-end` (inclusive) or a bare single port. Ports must be
/// within 1-65535 and start <= end; anything else is a `ConfigError` and no
/// probing happens.
pub fn parse_range(spec: &str) -> Result<Vec<PortEntry>, ConfigError> {
    let bad = || ConfigError::PortRange(spec.to_string());
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => {
            let start: u32 = a.trim().parse().map_err(|_| bad())?;
            let end: u32 = b.trim().parse().map_err(|_| bad())?;
            (start, end)
        }
        None => {
            let port: u32 = spec.trim().parse().map_err(|_| bad())?;
            (port, port)
        }
    };
    if start < 1 || end > 65535 || start > end {
        return Err(bad());
    }
    Ok((start..=end)
        .map(|p| {
            let p = p as u16;
            PortEntry::new(p, service_name(p))
        })
        .collect())
}
