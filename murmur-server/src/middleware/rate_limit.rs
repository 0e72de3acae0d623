//! Fixed-window request admission for the `/api` surface.
//!
//! Client identity is the first `X-Forwarded-For` entry when present
//! (the expected deployment sits behind a reverse proxy), falling back
//! to the peer address, then to a shared global bucket. Quota headers
//! are attached to every response, admitted or not, so well-behaved
//! clients can pace themselves.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use murmur_core::GLOBAL_CLIENT_KEY;
use tracing::warn;

use crate::error::{apply_rate_limit_headers, ServerError};
use crate::state::AppState;

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let client = client_key(req.headers(), peer);

    match state.limiter.check(&client) {
        Ok(info) => {
            let mut response = next.run(req).await;
            apply_rate_limit_headers(&mut response, &info);
            response
        }
        Err(denied) => {
            warn!(
                client = %client,
                retry_after_secs = denied.retry_after_secs,
                "request rejected by rate limiter"
            );
            ServerError::RateLimited(denied).into_response()
        }
    }
}

fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_owned();
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => GLOBAL_CLIENT_KEY.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.9");
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let peer: SocketAddr = "192.0.2.4:1234".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer)), "192.0.2.4");
    }

    #[test]
    fn global_bucket_when_identity_is_unknown() {
        assert_eq!(client_key(&HeaderMap::new(), None), GLOBAL_CLIENT_KEY);
    }
}
