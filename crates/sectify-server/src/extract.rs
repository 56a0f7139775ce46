use std::net::IpAddr;

use axum::http::HeaderMap;
use sectify_auth::IpPrefix;

/// Pulls the bearer token out of `Authorization: Bearer <token>`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}

/// The coarse binding granularity used for `AccessGrant` checks: first
/// two octets of an IPv4 address, or first 32 bits of an IPv6 address.
pub fn ip_to_prefix(ip: IpAddr) -> IpPrefix {
    match ip {
        IpAddr::V4(v4) => IpPrefix::from_ipv4_octets(v4.octets()),
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            let bytes = [
                (segments[0] >> 8) as u8,
                (segments[0] & 0xff) as u8,
                (segments[1] >> 8) as u8,
                (segments[1] & 0xff) as u8,
            ];
            IpPrefix::from_ipv6_segment(bytes)
        }
    }
}
