//! Request extractors.

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

use super::AppState;
use crate::services::rate_limiter::resolve_client_key;

/// Raw `location` query parameter.
///
/// `None` unless the parameter appears exactly once: a repeated parameter
/// is not a single text value.
#[derive(Debug, Clone)]
pub(crate) struct LocationParam(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for LocationParam
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();

        Ok(LocationParam(
            single_value(&params, "location").map(str::to_string),
        ))
    }
}

/// Rate-limit identity of the caller.
#[derive(Debug, Clone)]
pub(crate) struct ClientKey(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Present when served through `into_make_service_with_connect_info`
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientKey(resolve_client_key(
            &parts.headers,
            peer,
            state.config.trust_forwarded_for,
        )))
    }
}

fn single_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    let mut values = params
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.as_str());

    match (values.next(), values.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}
