use super::PersonalizeError;
use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::{IpAddr, SocketAddr};

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Determine the caller's address.
///
/// The first entry of `X-Forwarded-For` wins and is returned verbatim. Without
/// that header the host part of `peer` is used. An unparsable peer yields an
/// empty string.
pub fn client_address(headers: &HeaderMap, peer: &str) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    if let Some(forwarded) = forwarded {
        return forwarded
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
    }

    split_host_port(peer)
        .map(|(host, _port)| host.to_string())
        .unwrap_or_default()
}

/// Split `host:port` or `[host]:port`.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains([':', '[', ']']) || port.contains([']', '[']) {
        return None;
    }
    Some((host, port))
}

/// Raw peer address recorded by `into_make_service_with_connect_info`, or an
/// empty string when the server was built without it.
pub fn peer_address(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

/// Client addresses end up in filesystem paths, so only literal IPs pass.
pub fn parse_client_ip(address: &str) -> Result<IpAddr, PersonalizeError> {
    address
        .parse::<IpAddr>()
        .map_err(|_| PersonalizeError::InvalidClientAddress(address.to_string()))
}

/// File name stem for an artifact belonging to `ip`.
pub fn artifact_stem(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => v6.to_string().replace(':', "-"),
    }
}
