use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Detect local non-loopback IPv4 networks as /24s, sorted and deduplicated.
///
/// An interface IP `192.168.1.42` yields `192.168.1.0/24`. Used by the CLI
/// to pick a default sweep subnet when none is given.
pub fn detect_local_nets() -> Result<Vec<Ipv4Net>> {
    let mut set = HashSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() {
                continue;
            }
            set.insert(ipv4_to_default_net(ip));
        }
    }
    let mut nets: Vec<Ipv4Net> = set.into_iter().collect();
    nets.sort_by_key(|n| u32::from(n.network()));
    Ok(nets)
}

/// The subnet prefix (first three octets) of a /24 network, e.g. "192.168.1".
pub fn subnet_prefix(net: &Ipv4Net) -> String {
    let o = net.network().octets();
    format!("{}.{}.{}", o[0], o[1], o[2])
}

fn ipv4_to_default_net(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    let net = Ipv4Addr::new(o[0], o[1], o[2], 0);
    Ipv4Net::new(net, 24).expect("/24 is always valid")
}
