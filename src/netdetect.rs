use anyhow::{bail, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Derive the scan subnet from the host's own interfaces.
///
/// Picks the first non-loopback IPv4 interface and masks its address down to
/// the network address, e.g. IP `192.168.1.42` with netmask `255.255.255.0`
/// becomes `192.168.1.0/24`.
pub fn detect_local_subnet() -> Result<Ipv4Net> {
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            if let Some(net) = subnet_for(v4.ip, v4.netmask) {
                return Ok(net);
            }
        }
    }
    bail!("no non-loopback IPv4 interface found")
}

/// Network for an interface address/netmask pair. The prefix length is the
/// number of set bits in the mask; a non-contiguous mask yields `None`.
pub fn subnet_for(ip: Ipv4Addr, netmask: Ipv4Addr) -> Option<Ipv4Net> {
    Ipv4Net::with_netmask(ip, netmask).ok().map(|n| n.trunc())
}

/// Strict dotted-quad `a.b.c.d/prefix` check for operator-supplied subnets.
/// The address is truncated to its network address, so `10.0.0.7/24` scans
/// `10.0.0.0/24`.
pub fn parse_subnet(s: &str) -> Result<Ipv4Net> {
    match s.trim().parse::<Ipv4Net>() {
        Ok(net) => Ok(net.trunc()),
        Err(_) => bail!("invalid subnet format: {s:?} (expected e.g. 192.168.1.0/24)"),
    }
}
