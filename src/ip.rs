//! IP address validation.
//!
//! Lookups only make sense for publicly routable addresses; anything in a
//! private or reserved range can never appear in a geolocation database, so
//! it is rejected before the cache or any provider is consulted.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Parses `raw` and returns the address only if it is publicly routable.
///
/// Malformed strings (including surrounding whitespace) and addresses in
/// private/reserved ranges yield `None`.
pub fn validate_public_ip(raw: &str) -> Option<IpAddr> {
    let ip: IpAddr = raw.parse().ok()?;
    if is_public(ip) {
        Some(ip)
    } else {
        None
    }
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    !(addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.is_unspecified()
        // shared address space, RFC 6598 (100.64.0.0/10)
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // benchmarking, RFC 2544 (198.18.0.0/15)
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // reserved, 240.0.0.0/4
        || octets[0] >= 240)
}

fn is_public_v6(addr: Ipv6Addr) -> bool {
    // An IPv4-mapped address is only as public as the IPv4 it embeds.
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_public_v4(v4);
    }
    let segments = addr.segments();
    !(addr.is_loopback()
        || addr.is_unspecified()
        // unique local, fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // link local, fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
        // documentation, 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_ipv4() {
        assert!(validate_public_ip("8.8.8.8").is_some());
        assert!(validate_public_ip("185.65.134.1").is_some());
    }

    #[test]
    fn accepts_public_ipv6() {
        assert!(validate_public_ip("2606:4700:4700::1111").is_some());
    }

    #[test]
    fn rejects_private_and_reserved_ipv4() {
        let disallowed = [
            "10.0.0.1",
            "172.16.5.4",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.10.10",
            "0.0.0.0",
            "255.255.255.255",
            "192.0.2.44",    // documentation
            "100.64.0.9",    // shared address space
            "198.18.0.1",    // benchmarking
            "240.0.0.1",     // reserved
        ];
        for ip in disallowed {
            assert!(validate_public_ip(ip).is_none(), "{} should be rejected", ip);
        }
    }

    #[test]
    fn rejects_private_and_reserved_ipv6() {
        let disallowed = ["::1", "::", "fc00::1", "fd12:3456::1", "fe80::1", "2001:db8::1"];
        for ip in disallowed {
            assert!(validate_public_ip(ip).is_none(), "{} should be rejected", ip);
        }
    }

    #[test]
    fn mapped_ipv6_follows_embedded_ipv4() {
        assert!(validate_public_ip("::ffff:192.168.1.1").is_none());
        assert!(validate_public_ip("::ffff:8.8.8.8").is_some());
    }

    #[test]
    fn rejects_malformed_input() {
        let malformed = [
            "",
            "not.an.ip",
            "256.1.1.1",
            "1.2.3",
            "1.2.3.4.5",
            " 8.8.8.8 ",
            "8.8.8.8\n",
        ];
        for ip in malformed {
            assert!(validate_public_ip(ip).is_none(), "{:?} should be rejected", ip);
        }
    }
}
