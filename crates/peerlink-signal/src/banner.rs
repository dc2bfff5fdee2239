//! Startup banner listing where the relay can be reached

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Detect the primary local IPv4 address
///
/// Connecting a UDP socket sends no packets but makes the OS pick the
/// outbound interface.
pub fn detect_local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// URLs at which a relay bound to `addr` is reachable
pub fn listening_urls(addr: SocketAddr, local_ip: Option<Ipv4Addr>) -> Vec<String> {
    let port = addr.port();
    if !addr.ip().is_unspecified() {
        return vec![format!("ws://{}/", addr)];
    }

    let mut urls = vec![format!("ws://{}:{}/", Ipv4Addr::LOCALHOST, port)];
    if let Some(ip) = local_ip.filter(|ip| !ip.is_loopback()) {
        urls.push(format!("ws://{}:{}/", ip, port));
    }
    urls
}

/// Render the banner text
pub fn render(addr: SocketAddr, local_ip: Option<Ipv4Addr>) -> String {
    let urls = listening_urls(addr, local_ip);
    format!(
        "Relay available at:\n\n    -> {}\n\nPeers join a namespace at <url><namespace>, e.g. {}abcd-efgh-ijkl",
        urls.join("\n    -> "),
        urls[0]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_bind_address() {
        let addr: SocketAddr = "192.168.1.10:3000".parse().unwrap();
        assert_eq!(
            listening_urls(addr, Some("10.0.0.2".parse().unwrap())),
            vec!["ws://192.168.1.10:3000/"]
        );
    }

    #[test]
    fn test_unspecified_bind_address() {
        let addr: SocketAddr = "0.0.0.0:3000".parse().unwrap();
        assert_eq!(
            listening_urls(addr, Some("10.0.0.2".parse().unwrap())),
            vec!["ws://127.0.0.1:3000/", "ws://10.0.0.2:3000/"]
        );
        assert_eq!(listening_urls(addr, None), vec!["ws://127.0.0.1:3000/"]);
    }

    #[test]
    fn test_render() {
        let addr: SocketAddr = "0.0.0.0:3000".parse().unwrap();
        let banner = render(addr, None);
        assert!(banner.contains("-> ws://127.0.0.1:3000/"));
        assert!(banner.contains("ws://127.0.0.1:3000/abcd-efgh-ijkl"));
    }
}
