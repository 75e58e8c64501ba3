//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Cart and catalog endpoints share one per-IP limiter (~100/min). Cart
//! mutations fan out into Tebex calls, so this also bounds basket traffic.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers naming the client, most specific first. Only the first
/// address of a comma-separated chain is the client.
const CLIENT_IP_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

// =============================================================================
// Player IP Key Extractor
// =============================================================================

/// Keys requests by the player's address: the reverse proxy's headers when
/// present, otherwise the peer address.
///
/// The peer address only exists when the server runs with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Clone, Copy)]
pub struct PlayerIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for PlayerIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    })
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<PlayerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the storefront rate limiter: ~100 requests per minute per IP.
///
/// One request per second replenishes a burst of 50, enough for the handful
/// of catalog and cart calls a store page load makes.
///
/// # Panics
///
/// Never in practice: the quota values are fixed positive integers, which
/// `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(PlayerIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}
