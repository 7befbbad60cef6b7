//! Access gate for the HTTP API.
//!
//! Behavior:
//! - Exempt routes (matched route paths) skip every check
//! - The client IP must fall inside an allowed network, otherwise 403
//! - With `require_token`, an `Authorization: Bearer <token>` header must carry
//!   a known token, otherwise 401
//!
//! Tokens are kept only as SHA-256 digests.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use axum::Json;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::AccessConfig;

/// Headers consulted for the client address when the peer address is not trusted.
const FORWARDING_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "remote-addr"];

// ============================================================================
// Networks
// ============================================================================

#[derive(Debug, Error)]
#[error("invalid network '{0}'")]
pub struct InvalidNetwork(String);

/// An IP network in CIDR notation. Host bits are allowed and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix))
                    .unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = InvalidNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidNetwork(s.to_string());
        let s = s.trim();

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
                let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
                (addr, prefix)
            }
            None => {
                let addr = IpAddr::from_str(s).map_err(|_| invalid())?.to_canonical();
                let prefix = if addr.is_ipv4() { 32 } else { 128 };
                (addr, prefix)
            }
        };

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denied {
    pub status: StatusCode,
    pub message: String,
}

impl Denied {
    fn forbidden(message: String) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message,
        }
    }

    fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }
}

#[derive(Serialize)]
struct DeniedBody<'a> {
    error: &'static str,
    message: &'a str,
}

impl IntoResponse for Denied {
    fn into_response(self) -> Response {
        let body = DeniedBody {
            error: "Unauthorized",
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

struct Rules {
    networks: Vec<IpNetwork>,
    token_digests: HashSet<[u8; 32]>,
    exempt_routes: HashSet<String>,
    trust_proxy: bool,
    require_token: bool,
}

/// IP allow-list and bearer token check, shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct AccessGate {
    rules: Arc<RwLock<Rules>>,
}

impl AccessGate {
    pub fn from_config(config: &AccessConfig) -> Result<Self, InvalidNetwork> {
        let networks = config
            .allowed_networks
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<IpNetwork>, _>>()?;

        let rules = Rules {
            networks,
            token_digests: config.tokens.iter().map(|t| digest(t)).collect(),
            exempt_routes: config.exempt_routes.iter().cloned().collect(),
            trust_proxy: config.trust_proxy,
            require_token: config.require_token,
        };
        Ok(Self {
            rules: Arc::new(RwLock::new(rules)),
        })
    }

    pub fn add_token(&self, token: &str) {
        self.write().token_digests.insert(digest(token));
    }

    pub fn add_allowed_network(&self, network: &str) -> Result<(), InvalidNetwork> {
        let network = network.parse()?;
        self.write().networks.push(network);
        Ok(())
    }

    pub fn exempt_route(&self, route: impl Into<String>) {
        self.write().exempt_routes.insert(route.into());
    }

    /// Decide whether a request to `route` may proceed.
    pub fn check(
        &self,
        route: &str,
        peer: Option<IpAddr>,
        headers: &HeaderMap,
    ) -> Result<(), Denied> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        if rules.exempt_routes.contains(route) {
            return Ok(());
        }

        let client = client_ip(rules.trust_proxy, peer, headers);
        let allowed = client
            .parse::<IpAddr>()
            .is_ok_and(|ip| rules.networks.iter().any(|n| n.contains(ip)));
        if !allowed {
            return Err(Denied::forbidden(format!("IP {client} is not allowed")));
        }

        if !rules.require_token {
            return Ok(());
        }

        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| Denied::unauthorized("Missing Authorization header"))?;
        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or_else(|| Denied::unauthorized("Invalid Authorization header format"))?;
        if !rules.token_digests.contains(&digest(token)) {
            return Err(Denied::unauthorized("Invalid token"));
        }
        Ok(())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Rules> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Middleware guarding every routed request.
pub async fn require_access(
    State(gate): State<AccessGate>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str)
        .to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match gate.check(&route, peer, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            debug!(route = %route, status = %denied.status, reason = %denied.message, "Request denied");
            denied.into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Client address as text. Unparseable header values are returned as-is and fail the allow-list.
fn client_ip(trust_proxy: bool, peer: Option<IpAddr>, headers: &HeaderMap) -> String {
    let from_peer = || peer.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
    if trust_proxy {
        return from_peer();
    }

    FORWARDING_HEADERS
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map_or_else(from_peer, str::to_string)
}

fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

fn digest(token: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(token.as_bytes()));
    out
}
