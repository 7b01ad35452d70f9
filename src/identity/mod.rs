//! Client identity resolution
//!
//! Derives the rate limit bucket for a request from its transport metadata.
//! Requests without a forwarded address all land in the shared `"unknown"`
//! bucket, so one anonymous client can lock out every other anonymous client.
//! Deployments that need stronger isolation must have the edge proxy set
//! `x-forwarded-for`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// How a client identifier was derived
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Network address
    Address,
    /// Browser / app session
    Session,
    /// Authenticated account
    Account,
}

/// Rate limit subject for a single request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClientIdentifier {
    pub id: String,
    pub kind: ClientKind,
}

impl ClientIdentifier {
    pub fn new(id: impl Into<String>, kind: ClientKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Resolve the client from request headers.
    ///
    /// Takes the first hop of `x-forwarded-for`; never fails.
    pub fn resolve(headers: &HeaderMap) -> Self {
        let id = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|chain| chain.split(',').next())
            .map(|first| first.trim().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

        Self::new(id, ClientKind::Address)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIdentifier
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_single_address() {
        let client = ClientIdentifier::resolve(&headers_with("203.0.113.7"));
        assert_eq!(client.id, "203.0.113.7");
        assert_eq!(client.kind, ClientKind::Address);
    }

    #[test]
    fn test_forwarding_chain_takes_first_hop() {
        let client = ClientIdentifier::resolve(&headers_with("203.0.113.7, 10.0.0.1, 10.0.0.2"));
        assert_eq!(client.id, "203.0.113.7");
    }

    #[test]
    fn test_missing_header_is_unknown() {
        let client = ClientIdentifier::resolve(&HeaderMap::new());
        assert_eq!(client.id, UNKNOWN_CLIENT);
        assert_eq!(client.kind, ClientKind::Address);
    }

    #[test]
    fn test_empty_header_yields_empty_id() {
        let client = ClientIdentifier::resolve(&headers_with(""));
        assert_eq!(client.id, "");
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ClientKind::Account).unwrap(),
            "\"account\""
        );
    }
}
