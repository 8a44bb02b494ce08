//! IPv4 broadcast address computation for the discovery service (§4.2).
//!
//! Enumerates non-loopback, operational IPv4 interfaces and their subnet
//! masks, computing each one's directed broadcast address. Falls back to
//! the limited broadcast address `255.255.255.255` if enumeration fails or
//! yields nothing, as the spec explicitly allows.

use std::net::Ipv4Addr;

use tracing::warn;

/// Returns the set of IPv4 broadcast addresses to send discovery datagrams
/// to: one per non-loopback operational interface, or `255.255.255.255` as
/// a fallback.
pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let addrs: Vec<Ipv4Addr> = interfaces
                .into_iter()
                .filter(|iface| !iface.is_loopback())
                .filter_map(|iface| match iface.addr {
                    if_addrs::IfAddr::V4(v4) => Some(directed_broadcast(v4.ip, v4.netmask)),
                    if_addrs::IfAddr::V6(_) => None,
                })
                .collect();

            if addrs.is_empty() {
                warn!("no usable IPv4 interfaces found, falling back to limited broadcast");
                vec![Ipv4Addr::BROADCAST]
            } else {
                addrs
            }
        }
        Err(e) => {
            warn!("interface enumeration failed ({e}), falling back to limited broadcast");
            vec![Ipv4Addr::BROADCAST]
        }
    }
}

fn directed_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    let ip_bits = u32::from(ip);
    let mask_bits = u32::from(netmask);
    Ipv4Addr::from(ip_bits | !mask_bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directed_broadcast_for_slash_24() {
        let ip = Ipv4Addr::new(192, 168, 1, 42);
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert_eq!(directed_broadcast(ip, mask), Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn directed_broadcast_for_slash_16() {
        let ip = Ipv4Addr::new(10, 1, 2, 3);
        let mask = Ipv4Addr::new(255, 255, 0, 0);
        assert_eq!(directed_broadcast(ip, mask), Ipv4Addr::new(10, 1, 255, 255));
    }

    #[test]
    fn broadcast_addresses_never_returns_empty() {
        // Whatever the host's real interfaces are, the fallback guarantees
        // at least one address comes back.
        assert!(!broadcast_addresses().is_empty());
    }
}
