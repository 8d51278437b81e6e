//! Deterministic access tokens for the GUI remote-display endpoint.
//!
//! A token is an HMAC-SHA256 of `{user, project, run}` keyed with the server
//! secret, truncated to 128 bits and rendered in UUID shape. Regenerating it
//! for the same triple always yields the same value, so the display URL can
//! be rebuilt on every poll without persisting anything.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::DbId;

type HmacSha256 = Hmac<Sha256>;

/// Derive the access token for one run.
pub fn access_token(secret: &str, user_id: DbId, project_id: DbId, run_id: DbId) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{user_id}:{project_id}:{run_id}").as_bytes());
    let digest = mac.finalize().into_bytes();

    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Remote-display URL for a GUI container whose display port is published
/// on `host_port`.
pub fn display_url(host: &str, host_port: u16, token: &str) -> String {
    format!("http://{host}:{host_port}/vnc/{token}/vnc.html?path=/vnc/{token}/websockify")
}
