//! IPv4 integer and CIDR arithmetic.
//!
//! Everything here works on dotted-quad strings as they arrive from the probe
//! executor. Malformed input never panics or errors; it simply yields `None`
//! (or `false` for containment).

use serde::{Deserialize, Serialize};

/// RFC1918 private blocks
const PRIVATE_BLOCKS: [&str; 3] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Inclusive address range covered by a CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub start: u32,
    pub end: u32,
}

impl IpRange {
    /// Check if an integer address falls inside the range (both ends included)
    pub fn contains(&self, ip: u32) -> bool {
        self.start <= ip && ip <= self.end
    }
}

/// Convert a dotted-quad IPv4 string to its integer form.
///
/// Exactly four dot-separated decimal octets, each in 0..=255. Signs,
/// whitespace inside octets and empty octets are rejected.
pub fn ip_to_int(ip: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut count = 0;

    for part in ip.trim().split('.') {
        count += 1;
        if count > 4 || part.is_empty() || part.len() > 3 {
            return None;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let octet: u32 = part.parse().ok()?;
        if octet > 255 {
            return None;
        }
        value = (value << 8) | octet;
    }

    (count == 4).then_some(value)
}

/// Compute the inclusive range of a `base/prefix` block.
///
/// The prefix must be an integer in 0..=32. The base is masked, so
/// `10.1.2.3/8` covers the same range as `10.0.0.0/8`.
pub fn cidr_to_range(cidr: &str) -> Option<IpRange> {
    let (base, prefix) = cidr.trim().split_once('/')?;
    let base = ip_to_int(base)?;

    let prefix = prefix.trim();
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let prefix: u32 = prefix.parse().ok()?;
    if prefix > 32 {
        return None;
    }

    // Shifting a u32 by 32 overflows, so /0 gets an explicit zero mask
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let start = base & mask;
    let end = start | !mask;

    Some(IpRange { start, end })
}

/// True when both inputs parse and `ip` lies within the block
pub fn cidr_contains(cidr: &str, ip: &str) -> bool {
    match (cidr_to_range(cidr), ip_to_int(ip)) {
        (Some(range), Some(ip)) => range.contains(ip),
        _ => false,
    }
}

/// True for valid addresses inside 10/8, 172.16/12 or 192.168/16
pub fn is_private(ip: &str) -> bool {
    ip_to_int(ip).is_some() && PRIVATE_BLOCKS.iter().any(|block| cidr_contains(block, ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_to_int() {
        assert_eq!(ip_to_int("0.0.0.0"), Some(0));
        assert_eq!(ip_to_int("255.255.255.255"), Some(u32::MAX));
        assert_eq!(ip_to_int("192.168.1.1"), Some(0xC0A8_0101));
        assert_eq!(ip_to_int(" 8.8.8.8 "), Some(0x0808_0808));
    }

    #[test]
    fn test_ip_to_int_rejects_malformed() {
        assert_eq!(ip_to_int(""), None);
        assert_eq!(ip_to_int("*"), None);
        assert_eq!(ip_to_int("1.2.3"), None);
        assert_eq!(ip_to_int("1.2.3.4.5"), None);
        assert_eq!(ip_to_int("1.2.3.256"), None);
        assert_eq!(ip_to_int("1.2..4"), None);
        assert_eq!(ip_to_int("a.b.c.d"), None);
        assert_eq!(ip_to_int("-1.2.3.4"), None);
        assert_eq!(ip_to_int("1.2.3.4/24"), None);
    }

    #[test]
    fn test_cidr_to_range() {
        let range = cidr_to_range("192.168.1.0/24").unwrap();
        assert_eq!(range.start, ip_to_int("192.168.1.0").unwrap());
        assert_eq!(range.end, ip_to_int("192.168.1.255").unwrap());

        // Host bits in the base are masked off
        let range = cidr_to_range("10.1.2.3/8").unwrap();
        assert_eq!(range.start, ip_to_int("10.0.0.0").unwrap());
        assert_eq!(range.end, ip_to_int("10.255.255.255").unwrap());

        let all = cidr_to_range("0.0.0.0/0").unwrap();
        assert_eq!(all.start, 0);
        assert_eq!(all.end, u32::MAX);
    }

    #[test]
    fn test_cidr_to_range_invalid() {
        assert_eq!(cidr_to_range("10.0.0.0"), None);
        assert_eq!(cidr_to_range("10.0.0.0/33"), None);
        assert_eq!(cidr_to_range("10.0.0.0/-1"), None);
        assert_eq!(cidr_to_range("10.0.0.0/abc"), None);
        assert_eq!(cidr_to_range("10.0.0/8"), None);
        assert_eq!(cidr_to_range("10.0.0.0/"), None);
    }

    #[test]
    fn test_cidr_contains_inclusive_boundaries() {
        let cidr = "192.168.1.0/24";
        assert!(cidr_contains(cidr, "192.168.1.0"));
        assert!(cidr_contains(cidr, "192.168.1.255"));
        assert!(cidr_contains(cidr, "192.168.1.77"));
        assert!(!cidr_contains(cidr, "192.168.2.0"));
        assert!(!cidr_contains(cidr, "192.168.0.255"));
    }

    #[test]
    fn test_cidr_contains_single_host() {
        assert!(cidr_contains("10.0.0.5/32", "10.0.0.5"));
        assert!(!cidr_contains("10.0.0.5/32", "10.0.0.4"));
        assert!(!cidr_contains("10.0.0.5/32", "10.0.0.6"));
    }

    #[test]
    fn test_cidr_contains_invalid_inputs() {
        assert!(!cidr_contains("bogus", "10.0.0.1"));
        assert!(!cidr_contains("10.0.0.0/8", "*"));
    }

    #[test]
    fn test_private_range_boundaries() {
        assert!(is_private("172.16.0.0"));
        assert!(is_private("172.31.255.255"));
        assert!(!is_private("172.15.255.255"));
        assert!(!is_private("172.32.0.0"));
        assert!(is_private("10.0.0.1"));
        assert!(is_private("192.168.100.1"));
        assert!(!is_private("8.8.8.8"));
        assert!(!is_private("no response"));
    }
}
