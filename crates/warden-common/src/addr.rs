//! Address codec: sortable keys and CIDR expansion.

use crate::error::{Error, Result};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// Four numeric octets, compared lexicographically
pub type SortKey = [u8; 4];

/// Sortable key for an address string. Malformed input yields the lowest
/// key instead of an error, so listing stays robust on imported data.
pub fn sort_key(ip: &str) -> SortKey {
    match ip.parse::<Ipv4Addr>() {
        Ok(addr) => addr.octets(),
        Err(_) => [0, 0, 0, 0],
    }
}

/// Sortable key for a CIDR string: network address then prefix length.
/// Unparseable text sorts first.
pub fn cidr_sort_key(cidr: &str) -> (u32, u8) {
    match cidr.trim().parse::<Ipv4Network>() {
        Ok(net) => (u32::from(net.network()), net.prefix()),
        Err(_) => (0, 0),
    }
}

/// Parse and validate CIDR text. Host bits set after the prefix are
/// rejected, so `192.168.1.5/24` is an error rather than silently masked.
pub fn parse_cidr(text: &str) -> Result<Ipv4Network> {
    let trimmed = text.trim();
    let net: Ipv4Network = trimmed
        .parse()
        .map_err(|e| Error::Validation(format!("invalid subnet {trimmed:?}: {e}")))?;
    if net.ip() != net.network() {
        return Err(Error::Validation(format!(
            "invalid subnet {trimmed:?}: host bits set, expected {}/{}",
            net.network(),
            net.prefix()
        )));
    }
    Ok(net)
}

/// Whether two networks share any address
pub fn overlaps(a: Ipv4Network, b: Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Enumerate usable host addresses, excluding network and broadcast.
/// A /31 yields the single non-network address; a /32 yields nothing.
pub fn expand_hosts(net: Ipv4Network) -> Vec<String> {
    let network = u32::from(net.network());
    let broadcast = u32::from(net.broadcast());
    match net.prefix() {
        32 => Vec::new(),
        31 => vec![Ipv4Addr::from(broadcast).to_string()],
        _ => (network + 1..broadcast)
            .map(|raw| Ipv4Addr::from(raw).to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_orders_numerically() {
        let mut ips = vec!["192.168.1.100", "192.168.1.2", "192.168.1.10", "10.0.0.1"];
        ips.sort_by_key(|ip| sort_key(ip));
        assert_eq!(ips, vec!["10.0.0.1", "192.168.1.2", "192.168.1.10", "192.168.1.100"]);
    }

    #[test]
    fn test_sort_key_malformed_sorts_first() {
        assert_eq!(sort_key("not-an-ip"), [0, 0, 0, 0]);
        assert_eq!(sort_key("300.1.1.1"), [0, 0, 0, 0]);
        assert_eq!(sort_key("192.168.1"), [0, 0, 0, 0]);
        assert!(sort_key("garbage") < sort_key("0.0.0.1"));
    }

    #[test]
    fn test_parse_cidr_valid() {
        let net = parse_cidr("192.168.1.0/24").unwrap();
        assert_eq!(net.prefix(), 24);
        assert_eq!(net.network(), Ipv4Addr::new(192, 168, 1, 0));
        // surrounding whitespace is tolerated
        assert!(parse_cidr(" 10.0.0.0/8 ").is_ok());
    }

    #[test]
    fn test_parse_cidr_invalid() {
        let cases = vec![
            "192.168.1.0/33", // prefix out of range
            "192.168.1.5/24", // host bits set
            "not-a-subnet",
            "",
        ];
        for text in cases {
            assert!(parse_cidr(text).is_err(), "should reject {:?}", text);
        }
    }

    #[test]
    fn test_overlaps() {
        let a = parse_cidr("192.168.1.0/24").unwrap();
        let b = parse_cidr("192.168.1.128/25").unwrap();
        let c = parse_cidr("192.168.2.0/24").unwrap();
        assert!(overlaps(a, b));
        assert!(overlaps(b, a));
        assert!(!overlaps(a, c));
    }

    #[test]
    fn test_expand_hosts_slash_24() {
        let hosts = expand_hosts(parse_cidr("192.168.1.0/24").unwrap());
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first().map(String::as_str), Some("192.168.1.1"));
        assert_eq!(hosts.last().map(String::as_str), Some("192.168.1.254"));
    }

    #[test]
    fn test_expand_hosts_small_prefixes() {
        let hosts = expand_hosts(parse_cidr("10.0.0.0/30").unwrap());
        assert_eq!(hosts, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);

        let hosts = expand_hosts(parse_cidr("10.0.0.0/31").unwrap());
        assert_eq!(hosts, vec!["10.0.0.1".to_string()]);

        assert!(expand_hosts(parse_cidr("10.0.0.0/32").unwrap()).is_empty());
    }
}
