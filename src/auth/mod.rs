//! Authorization capabilities injected by the embedder.
//!
//! [`TokenAuthorizer`] turns the token of a register message into the
//! identity the connection is routed under. [`PushAuthorizer`] decides
//! whether an admin request (push or drop) is honored at all. Both are
//! implemented for plain closures; the built-ins cover the configured
//! behavior.

use std::collections::HashMap;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::config::Settings;

pub trait TokenAuthorizer: Send + Sync {
    /// Returns the identity for `token`, or `None` to reject the registration.
    fn authorize(&self, token: &str) -> Option<String>;
}

impl<F> TokenAuthorizer for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn authorize(&self, token: &str) -> Option<String> {
        self(token)
    }
}

/// The token is the identity. Empty tokens are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl TokenAuthorizer for PassThrough {
    fn authorize(&self, token: &str) -> Option<String> {
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// Fixed token -> identity table.
#[derive(Debug, Default, Clone)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl TokenAuthorizer for StaticTokens {
    fn authorize(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

pub trait PushAuthorizer: Send + Sync {
    /// Returns true when the request may proceed.
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

impl<F> PushAuthorizer for F
where
    F: Fn(&HeaderMap) -> bool + Send + Sync,
{
    fn authorize(&self, headers: &HeaderMap) -> bool {
        self(headers)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PushAuthorizer for AllowAll {
    fn authorize(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Requires `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl PushAuthorizer for BearerToken {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| presented.trim() == self.token)
    }
}

/// Token authorizer described by `auth.tokens`.
pub fn token_authorizer_from(settings: &Settings) -> Box<dyn TokenAuthorizer> {
    if settings.auth.tokens.is_empty() {
        Box::new(PassThrough)
    } else {
        Box::new(StaticTokens::new(settings.auth.tokens.clone()))
    }
}

/// Push authorizer described by `push.auth_token`.
pub fn push_authorizer_from(settings: &Settings) -> Box<dyn PushAuthorizer> {
    match &settings.push.auth_token {
        Some(token) => Box::new(BearerToken::new(token.clone())),
        None => Box::new(AllowAll),
    }
}

#[cfg(test)]
mod tests;
