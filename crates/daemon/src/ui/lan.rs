//! LAN address discovery and the share URL.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

/// Public address used only to pick the outbound interface. No packets are
/// sent; connecting a UDP socket just selects a route.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// Best-effort address other machines on the LAN can reach this host at.
///
/// Falls back to the loopback address when there is no route.
pub fn lan_ip() -> IpAddr {
    match probe_local_addr() {
        Ok(addr) => addr.ip(),
        Err(e) => {
            debug!(error = %e, "LAN address discovery failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn probe_local_addr() -> std::io::Result<SocketAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(ROUTE_PROBE)?;
    socket.local_addr()
}

/// Address advertised to clients for a listener bound to `bind`.
///
/// Wildcard binds advertise the LAN address; anything else is advertised
/// as bound.
pub fn advertised_ip(bind: IpAddr) -> IpAddr {
    if bind.is_unspecified() {
        lan_ip()
    } else {
        bind
    }
}

/// `http://<ip>:<port>/`
pub fn share_url(ip: IpAddr, port: u16) -> String {
    format!("http://{}/", SocketAddr::new(ip, port))
}
