use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use http::Request;

/// Best-effort client address: proxy headers first, then the socket peer.
///
/// Behind a proxy the peer address is the proxy itself, so
/// `x-forwarded-for` (first hop) and `x-real-ip` take precedence when
/// they parse as addresses.
pub fn client_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    forwarded_for(request)
        .or_else(|| real_ip(request))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

fn forwarded_for<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn real_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .headers()
        .get("x-real-ip")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
