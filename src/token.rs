//! Random identifiers for session ids and CSRF token values.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

/// 32 bytes = 256 bits of entropy.
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Generate an OS-entropy token, URL-safe base64 without padding.
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
