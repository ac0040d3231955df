//! Asterisk REST Interface client (§4.3, §6): REST commands plus the events
//! WebSocket consumer.

pub mod events;
pub mod rest;

pub use events::{connect, AriEvent};
pub use rest::{AriError, AriResult, AriRestClient};

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Builds a `Basic` authorization header value from ARI credentials.
pub(crate) fn basic_auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_encodes_user_and_pass() {
        let header = basic_auth_header("asterisk", "secret");
        assert!(header.starts_with("Basic "));
        let decoded = STANDARD.decode(header.trim_start_matches("Basic ")).unwrap();
        assert_eq!(decoded, b"asterisk:secret");
    }
}
