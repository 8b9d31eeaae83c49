//! Integration tests for OAuth helpers

#![cfg(feature = "foundation")]

use chrono::Utc;
use finsync_common::auth::{
    code_challenge, generate_state, validate_state, PkceChallenge, TokenResponse, TokenSet,
};

/// Validates a full authorize-then-exchange round of helper usage.
///
/// Assertions:
/// - The echoed state validates; a foreign state does not.
/// - The challenge sent up front matches the verifier revealed later.
/// - The normalized token set carries the server-provided expiry.
#[test]
fn test_authorization_round_trip_helpers() {
    let pkce = PkceChallenge::generate();
    let echoed = pkce.state.clone();
    assert!(validate_state(&pkce.state, &echoed));
    assert!(!validate_state(&pkce.state, &generate_state()));
    assert_eq!(code_challenge(&pkce.code_verifier), pkce.code_challenge);

    let response: TokenResponse = serde_json::from_value(serde_json::json!({
        "access_token": "at-1",
        "refresh_token": "rt-1",
        "token_type": "Bearer",
        "expires_in": 1800
    }))
    .expect("valid token response");

    let received = Utc::now();
    let tokens = TokenSet::from_response(response, received, 3600);
    assert_eq!(tokens.expires_at, received + chrono::Duration::seconds(1800));
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
}
