use local_ip_address::list_afinet_netifas;

use std::net::{IpAddr, Ipv4Addr};

/**
 * Collects the externally reachable IPv4 addresses of this host, as
 * `(interface name, address)` pairs. Loopback and link-local addresses are
 * filtered out. Enumeration failure degrades to an empty list; printing the
 * interfaces is purely cosmetic and must never keep the forwarder from
 * running.
 */
pub fn reachable_ipv4_addresses() -> Vec<(String, Ipv4Addr)> {
    let netifas = match list_afinet_netifas() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    netifas
        .into_iter()
        .filter_map(|(name, ip)| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_link_local() => Some((name, v4)),
            _ => None,
        })
        .collect()
}

/// Prints one `name: address` line per reachable interface address.
pub fn print_reachable_interfaces() {
    let addresses = reachable_ipv4_addresses();
    if addresses.is_empty() {
        return;
    }

    println!("  -----------------------------");
    for (name, address) in addresses {
        println!("  {:<22} {}", format!("{name}:"), address);
    }
}
