//! Address classification for outbound fetches.
//!
//! An address is blocked when it is private, loopback, link-local, multicast,
//! broadcast, reserved, documentation, benchmarking, shared (CGNAT) or
//! unspecified. IPv6 forms that embed an IPv4 address are judged by the
//! embedded address so both families follow the same policy.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Check whether an address must never be fetched from.
#[must_use]
pub fn is_blocked(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 0.0.0.0/8 ("this network")
        || a == 0
        // 100.64.0.0/10 (shared address space)
        || (a == 100 && (b & 0xC0) == 64)
        // 192.0.0.0/24 (IETF protocol assignments)
        || (a == 192 && b == 0 && c == 0)
        // 198.18.0.0/15 (benchmarking)
        || (a == 198 && (b & 0xFE) == 18)
        // 240.0.0.0/4 (reserved)
        || a >= 240
}

fn is_blocked_v6(ip: &Ipv6Addr) -> bool {
    if ip.is_unspecified() || ip.is_loopback() || ip.is_multicast() {
        return true;
    }

    if let Some(v4) = embedded_ipv4(ip) {
        return is_blocked_v4(&v4);
    }

    let seg = ip.segments();
    // Outside 2000::/3 everything is link-local, unique-local, or reserved
    if (seg[0] & 0xE000) != 0x2000 {
        return true;
    }

    // 2001::/23 (IETF protocol assignments, includes Teredo)
    (seg[0] == 0x2001 && seg[1] < 0x0200)
        // 2001:db8::/32 (documentation)
        || (seg[0] == 0x2001 && seg[1] == 0x0db8)
}

/// IPv4 address carried inside an IPv6 address, if any.
fn embedded_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    let seg = ip.segments();
    let tail = |hi: u16, lo: u16| {
        Ipv4Addr::new((hi >> 8) as u8, hi as u8, (lo >> 8) as u8, lo as u8)
    };

    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    // ::a.b.c.d (deprecated IPv4-compatible)
    if seg[..6].iter().all(|s| *s == 0) {
        return Some(tail(seg[6], seg[7]));
    }
    // 64:ff9b::/96 (NAT64 well-known prefix)
    if seg[0] == 0x0064 && seg[1] == 0xff9b && seg[2..6].iter().all(|s| *s == 0) {
        return Some(tail(seg[6], seg[7]));
    }
    // 2002::/16 (6to4)
    if seg[0] == 0x2002 {
        return Some(tail(seg[1], seg[2]));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blocked(addr: &str) -> bool {
        is_blocked(&addr.parse().unwrap())
    }

    #[test]
    fn test_ipv4_blocked_ranges() {
        for addr in [
            "127.0.0.1",
            "127.255.255.254",
            "10.0.0.1",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "0.1.2.3",
            "100.64.0.1",
            "100.127.255.255",
            "192.0.0.8",
            "192.0.2.1",
            "198.18.0.1",
            "198.19.255.255",
            "198.51.100.7",
            "203.0.113.9",
            "224.0.0.1",
            "239.255.255.250",
            "240.0.0.1",
            "255.255.255.255",
        ] {
            assert!(blocked(addr), "{addr} should be blocked");
        }
    }

    #[test]
    fn test_ipv4_public() {
        for addr in [
            "93.184.216.34",
            "8.8.8.8",
            "1.1.1.1",
            "172.32.0.1",
            "100.128.0.1",
            "198.20.0.1",
            "223.255.255.255",
        ] {
            assert!(!blocked(addr), "{addr} should be allowed");
        }
    }

    #[test]
    fn test_ipv6_blocked_ranges() {
        for addr in [
            "::",
            "::1",
            "fe80::1",
            "fc00::1",
            "fd12:3456::1",
            "fec0::1",
            "ff02::1",
            "2001:db8::1",
            "2001::1",
            "100::1",
            "::ffff:127.0.0.1",
            "::ffff:10.1.2.3",
            "::192.168.0.1",
            "64:ff9b::a9fe:a9fe",
            "2002:c0a8:0101::1",
        ] {
            assert!(blocked(addr), "{addr} should be blocked");
        }
    }

    #[test]
    fn test_ipv6_public() {
        for addr in [
            "2607:f8b0:4004:800::200e",
            "2606:4700:4700::1111",
            "::ffff:93.184.216.34",
            "64:ff9b::808:808",
            "2002:5db8:d822::1",
        ] {
            assert!(!blocked(addr), "{addr} should be allowed");
        }
    }

    proptest! {
        #[test]
        fn prop_mapped_v6_matches_v4(octets in any::<[u8; 4]>()) {
            let v4 = Ipv4Addr::from(octets);
            let mapped = IpAddr::V6(v4.to_ipv6_mapped());
            prop_assert_eq!(is_blocked(&IpAddr::V4(v4)), is_blocked(&mapped));
        }

        #[test]
        fn prop_private_v4_always_blocked(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            prop_assert!(is_blocked(&IpAddr::V4(Ipv4Addr::new(10, b, c, d))));
            prop_assert!(is_blocked(&IpAddr::V4(Ipv4Addr::new(127, b, c, d))));
            prop_assert!(is_blocked(&IpAddr::V4(Ipv4Addr::new(192, 168, c, d))));
            prop_assert!(is_blocked(&IpAddr::V4(Ipv4Addr::new(169, 254, c, d))));
        }

        #[test]
        fn prop_outside_global_unicast_blocked(segments in any::<[u16; 8]>()) {
            let ip = Ipv6Addr::from(segments);
            prop_assume!(embedded_ipv4(&ip).is_none());
            if (segments[0] & 0xE000) != 0x2000 {
                prop_assert!(is_blocked(&IpAddr::V6(ip)));
            }
        }
    }
}
