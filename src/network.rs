extern crate nix;

use nix::net::if_::InterfaceFlags;

pub type LinkFn = fn() -> bool;

/// True if some non-loopback interface is up, running and has an IP address.
/// Association itself (wpa_supplicant, NetworkManager, ...) is the OS's business.
pub fn link_up() -> bool {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            warn!("getifaddrs failed: {}", err);
            return false;
        }
    };

    for ifaddr in addrs {
        if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK) {
            continue;
        }
        if !ifaddr.flags.contains(InterfaceFlags::IFF_UP | InterfaceFlags::IFF_RUNNING) {
            continue;
        }
        let has_ip = ifaddr.address.as_ref()
            .map(|a| a.as_sockaddr_in().is_some() || a.as_sockaddr_in6().is_some())
            .unwrap_or(false);
        if has_ip {
            debug!("Link up on {}", ifaddr.interface_name);
            return true;
        }
    }

    return false;
}
