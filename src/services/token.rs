//! Invitation token generation

use rand::RngCore;

/// Number of random bytes in an invitation token (hex-encoded to twice as many chars)
pub const TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure invitation token.
///
/// The token is the sole credential needed to accept an invitation, so it is
/// drawn from the thread-local CSPRNG and hex-encoded.
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check before a token hits the database
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}
