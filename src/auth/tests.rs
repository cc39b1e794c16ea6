use std::collections::HashMap;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};

use super::*;
use crate::config::Settings;

fn bearer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
    headers
}

#[test]
fn pass_through_uses_token_as_identity() {
    assert_eq!(PassThrough.authorize("jack").as_deref(), Some("jack"));
    assert_eq!(PassThrough.authorize(""), None);
}

#[test]
fn static_tokens_resolve_known_tokens_only() {
    let auth = StaticTokens::new(HashMap::from([("aaa".to_string(), "jack".to_string())]));
    assert_eq!(auth.authorize("aaa").as_deref(), Some("jack"));
    assert_eq!(auth.authorize("bbb"), None);
}

#[test]
fn closures_are_token_authorizers() {
    let auth = |token: &str| token.strip_prefix("user:").map(str::to_string);
    assert_eq!(TokenAuthorizer::authorize(&auth, "user:u1").as_deref(), Some("u1"));
    assert_eq!(TokenAuthorizer::authorize(&auth, "u1"), None);
}

#[test]
fn bearer_token_checks_header() {
    let auth = BearerToken::new("s3cret");
    assert!(auth.authorize(&bearer("Bearer s3cret")));
    assert!(!auth.authorize(&bearer("Bearer wrong")));
    assert!(!auth.authorize(&bearer("s3cret")));
    assert!(!auth.authorize(&HeaderMap::new()));
}

#[test]
fn authorizers_follow_settings() {
    let mut settings = Settings::default();
    assert!(push_authorizer_from(&settings).authorize(&HeaderMap::new()));
    assert_eq!(
        token_authorizer_from(&settings).authorize("abc").as_deref(),
        Some("abc")
    );

    settings.push.auth_token = Some("s3cret".to_string());
    settings
        .auth
        .tokens
        .insert("aaa".to_string(), "jack".to_string());

    let push = push_authorizer_from(&settings);
    assert!(!push.authorize(&HeaderMap::new()));
    assert!(push.authorize(&bearer("Bearer s3cret")));

    let tokens = token_authorizer_from(&settings);
    assert_eq!(tokens.authorize("aaa").as_deref(), Some("jack"));
    assert_eq!(tokens.authorize("abc"), None);
}
