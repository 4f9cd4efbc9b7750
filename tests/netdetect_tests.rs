use home_dash_rs::netdetect::{parse_subnet, subnet_for};
use std::net::Ipv4Addr;

#[test]
fn derives_network_from_ip_and_mask() {
    let net = subnet_for(
        Ipv4Addr::new(192, 168, 1, 42),
        Ipv4Addr::new(255, 255, 255, 0),
    )
    .unwrap();
    assert_eq!(net.to_string(), "192.168.1.0/24");
}

#[test]
fn prefix_length_is_mask_popcount() {
    let net = subnet_for(
        Ipv4Addr::new(10, 20, 30, 40),
        Ipv4Addr::new(255, 255, 0, 0),
    )
    .unwrap();
    assert_eq!(net.prefix_len(), 16);
    assert_eq!(net.to_string(), "10.20.0.0/16");
}

#[test]
fn strict_subnet_format_check() {
    assert!(parse_subnet("192.168.1.0/24").is_ok());
    assert!(parse_subnet("  192.168.1.0/24  ").is_ok());
    assert!(parse_subnet("192.168.1.0").is_err());
    assert!(parse_subnet("192.168.1/24").is_err());
    assert!(parse_subnet("300.1.1.0/24").is_err());
    assert!(parse_subnet("192.168.1.0/24 && reboot").is_err());
}
