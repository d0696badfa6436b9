//! PIN token issuing and comparison.

use rand::Rng;
use rand::distr::Alphanumeric;

const TOKEN_LENGTH: usize = 24;

/// Generate a fresh opaque PIN token.
///
/// Tokens are bearer credentials: issuing a new one invalidates every device
/// holding the old one.
pub fn generate_pin_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Whether a client-supplied token matches the stored one. Absent stored
/// tokens never match.
pub fn token_matches(stored: Option<&str>, provided: Option<&str>) -> bool {
    match (stored, provided) {
        (Some(stored), Some(provided)) => stored == provided,
        _ => false,
    }
}
