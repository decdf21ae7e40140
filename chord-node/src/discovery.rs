//! Container IP discovery (§6): read the IPv4 address bound to a named
//! network interface. This peer's dial address is `{discovered_ip}:{port}`.

use nix::ifaddrs::getifaddrs;
use nix::sys::socket::SockaddrLike;

/// Resolve the IPv4 address bound to `interface`. Fails the process startup
/// (per §6: "non-zero on startup failure") if the interface doesn't exist or
/// has no IPv4 address.
pub fn discover_ipv4(interface: &str) -> anyhow::Result<std::net::Ipv4Addr> {
    let addrs = getifaddrs().map_err(|e| anyhow::anyhow!("enumerating interfaces: {e}"))?;
    for ifaddr in addrs {
        if ifaddr.interface_name != interface {
            continue;
        }
        let Some(address) = ifaddr.address else { continue };
        if let Some(sin) = address.as_sockaddr_in() {
            return Ok(std::net::Ipv4Addr::from(sin.ip()));
        }
    }
    anyhow::bail!("no IPv4 address found on interface {interface}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interface_fails() {
        let result = discover_ipv4("chord-test-nonexistent-iface-0");
        assert!(result.is_err());
    }
}
