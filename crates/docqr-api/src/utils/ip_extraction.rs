//! Client address resolution for audit entries.
//!
//! `X-Forwarded-For` is only honoured up to the configured number of trusted proxies so a
//! client cannot pick its own recorded address by prepending entries.

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};

/// Best guess at the originating client address, or `None` when nothing usable is known.
///
/// Order: `X-Forwarded-For` (skipping `trusted_proxy_count` hops from the right), then
/// `X-Real-IP`, then the socket peer.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| from_forwarded_chain(chain, trusted_proxy_count))
        .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip))
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

/// `client, proxy1, proxy2`: with N trusted proxies the client sits N+1 from the end.
/// With none trusted, or a chain shorter than expected, only the nearest hop is used.
fn from_forwarded_chain(chain: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    let index = if trusted_proxy_count == 0 || hops.len() <= trusted_proxy_count {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxy_count - 1
    };

    hops.get(index).and_then(|hop| parse_ip(hop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn forwarded_chain_skips_trusted_hops() {
        assert_eq!(
            from_forwarded_chain("203.0.113.7, 10.0.0.1", 1),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(
            from_forwarded_chain("203.0.113.7, 10.0.0.1, 10.0.0.2", 2),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn untrusted_chain_uses_nearest_hop() {
        assert_eq!(
            from_forwarded_chain("1.2.3.4, 10.0.0.1", 0),
            Some("10.0.0.1".parse().unwrap())
        );
        assert_eq!(
            from_forwarded_chain("10.0.0.1", 3),
            Some("10.0.0.1".parse().unwrap())
        );
    }

    #[test]
    fn garbage_in_chain_is_ignored() {
        assert_eq!(from_forwarded_chain("not-an-ip", 0), None);
        assert_eq!(from_forwarded_chain(" , ", 1), None);
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let h = headers("x-real-ip", " ::1 ");
        assert_eq!(client_ip(&h, None, 1).as_deref(), Some("::1"));

        let peer = SocketAddr::from(([127, 0, 0, 1], 40000));
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer), 1).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_ip(&HeaderMap::new(), None, 1), None);
    }

    #[test]
    fn invalid_forwarded_header_falls_through() {
        let h = headers("x-forwarded-for", "bogus");
        let peer = SocketAddr::from(([192, 0, 2, 1], 1));
        assert_eq!(client_ip(&h, Some(peer), 1).as_deref(), Some("192.0.2.1"));
    }
}
