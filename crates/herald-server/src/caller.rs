//! Identity of the caller behind an HTTP request.

use crate::error::ApiError;
use crate::handlers::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use herald_core::Identity;
use std::net::{IpAddr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The identity a request is made as.
///
/// A bearer token resolves to its account; an unknown token is rejected
/// rather than downgraded to anonymous. Without a token the caller is
/// anonymous and keyed by the peer address, or by the first
/// `X-Forwarded-For` entry when running behind a proxy.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(bearer) = parts.headers.typed_get::<Authorization<Bearer>>() {
            let identity = state.service.authenticate(bearer.token()).await?;
            return Ok(Self(identity));
        }

        let ConnectInfo(peer) = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::internal("peer address unavailable"))?;

        let ip = if state.service.config().server.behind_proxy {
            forwarded_for(&parts.headers).unwrap_or(peer.ip())
        } else {
            peer.ip()
        };
        Ok(Self(Identity::anonymous(ip)))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
