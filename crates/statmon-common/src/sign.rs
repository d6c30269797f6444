//! Body-integrity signing shared by the agent client and the server ingress.
//!
//! The signature is `hex(HMAC-SHA256(key, body))` over the bytes that
//! actually travel on the wire (post-compression, post-encryption).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs `body` with `key`, returning the lowercase hex digest.
pub fn sign(key: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex digest produced by [`sign`]. Comparison is constant-time.
///
/// Returns `false` for digests that are not valid hex.
pub fn verify(key: &[u8], body: &[u8], hex_digest: &str) -> bool {
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
