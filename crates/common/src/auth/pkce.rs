//! Anti-replay `state` and PKCE values for the OAuth authorization-code flow
//!
//! Every authorization request carries a fresh `state`; the callback must echo
//! it back unchanged. Providers that support RFC 7636 additionally receive a
//! S256 code challenge whose verifier is only revealed at token exchange.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const RANDOM_BYTES: usize = 32;

fn random_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh opaque `state` value: 32 random bytes, base64url without padding
/// (43 characters).
#[must_use]
pub fn generate_state() -> String {
    random_token()
}

/// Compare the `state` sent with the one received in the callback.
///
/// Runs in time independent of where the strings first differ.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    let (a, b) = (expected.as_bytes(), actual.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Code verifier (43 characters, within the RFC 7636 43-128 range)
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token()
}

/// `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verifier/challenge pair plus the request's `state`.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl PkceChallenge {
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = code_challenge(&code_verifier);
        Self { code_verifier, code_challenge, state: generate_state() }
    }

    /// Always `S256`
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates that generated state values are URL safe and unique.
    ///
    /// Assertions:
    /// - Each state is 43 characters of base64url without padding.
    /// - Two consecutive states differ.
    #[test]
    fn test_state_is_urlsafe_and_unique() {
        let first = generate_state();
        let second = generate_state();

        assert_eq!(first.len(), 43);
        assert!(!first.contains('=') && !first.contains('+') && !first.contains('/'));
        assert_ne!(first, second);
    }

    /// Validates state comparison.
    ///
    /// Assertions:
    /// - Identical values match.
    /// - Values differing in one character or in length do not.
    #[test]
    fn test_validate_state() {
        let state = generate_state();
        assert!(validate_state(&state, &state.clone()));

        let mut tampered = state.clone();
        tampered.pop();
        assert!(!validate_state(&state, &tampered));
        tampered.push(if state.ends_with('A') { 'B' } else { 'A' });
        assert!(!validate_state(&state, &tampered));
    }

    /// Validates the RFC 7636 appendix B test vector.
    ///
    /// Assertions:
    /// - The S256 challenge of the reference verifier equals the published value.
    #[test]
    fn test_code_challenge_rfc_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    /// Validates that a generated challenge is derived from its verifier.
    ///
    /// Assertions:
    /// - Recomputing the challenge from the verifier gives the same value.
    /// - Debug output does not include the verifier.
    #[test]
    fn test_pkce_challenge_consistency() {
        let challenge = PkceChallenge::generate();
        assert_eq!(challenge.code_challenge, code_challenge(&challenge.code_verifier));
        assert_eq!(challenge.challenge_method(), "S256");
        assert!(!format!("{challenge:?}").contains(&challenge.code_verifier));
    }
}
