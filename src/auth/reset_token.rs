use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in every reset token.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Opaque, URL-safe reset token drawn from the OS CSPRNG.
pub fn generate() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Link the front-end opens to show the new-password form.
pub fn reset_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/forgot-password?token={}",
        public_base_url.trim_end_matches('/'),
        token
    )
}
