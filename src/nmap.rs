use std::net::IpAddr;

use crate::types::Device;

/// Single-pass parser for nmap host-discovery output.
///
/// Handles both output families:
/// - grepable (`-oG`): `Host: 10.0.0.5 (router)  Status: Up`
/// - normal: `Nmap scan report for router (10.0.0.5)` optionally followed by
///   `MAC Address: AA:BB:CC:DD:EE:FF (Vendor)` for the same host.
///
/// A `MAC Address:` line attaches to the most recently started host purely by
/// stream position, which matches how nmap orders its output. Lines matching
/// neither pattern are ignored, and hosts without a parsable IP are dropped
/// from the result.
pub fn parse_scan_output(output: &str) -> Vec<Device> {
    let mut devices: Vec<Device> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Host:") {
            if let Some(device) = parse_grepable_host(rest) {
                devices.push(device);
            }
        } else if let Some(rest) = line.strip_prefix("Nmap scan report for ") {
            devices.push(parse_report_host(rest));
        } else if let Some(rest) = line.strip_prefix("MAC Address:") {
            // Positional: the MAC line always follows the host it belongs to.
            if let Some(current) = devices.last_mut() {
                attach_mac(current, rest);
            }
        }
    }

    devices.retain(|d| !d.ip.is_empty());
    devices
}

fn parse_grepable_host(rest: &str) -> Option<Device> {
    let mut parts = rest.split_whitespace();
    let ip = parts.next()?;
    if ip.parse::<IpAddr>().is_err() {
        return None;
    }
    let mut device = Device::with_ip(ip);
    if let Some(token) = parts.next() {
        if let Some(hostname) = strip_parens(token) {
            if !hostname.is_empty() {
                device.hostname = Some(hostname.to_string());
            }
        }
    }
    Some(device)
}

fn parse_report_host(rest: &str) -> Device {
    let rest = rest.trim();
    // "router (10.0.0.5)" puts the hostname first and the address in parens;
    // a bare "10.0.0.5" is just the address.
    if let Some((hostname, paren)) = rest.rsplit_once(" (") {
        if let Some(ip) = paren.strip_suffix(')') {
            if ip.parse::<IpAddr>().is_ok() {
                let mut device = Device::with_ip(ip);
                device.hostname = Some(hostname.trim().to_string());
                return device;
            }
        }
    }
    if rest.parse::<IpAddr>().is_ok() {
        return Device::with_ip(rest);
    }
    // Hostname resolved but no address on the line; filtered out at the end.
    let mut device = Device::with_ip("");
    device.hostname = Some(rest.to_string());
    device
}

fn attach_mac(device: &mut Device, rest: &str) {
    let rest = rest.trim();
    let mut parts = rest.splitn(2, ' ');
    if let Some(mac) = parts.next() {
        if !mac.is_empty() {
            device.mac = Some(mac.to_string());
        }
    }
    if let Some(vendor) = parts.next() {
        if let Some(vendor) = strip_parens(vendor.trim()) {
            if !vendor.is_empty() {
                device.name = Some(vendor.to_string());
            }
        }
    }
}

fn strip_parens(s: &str) -> Option<&str> {
    s.strip_prefix('(')?.strip_suffix(')')
}
