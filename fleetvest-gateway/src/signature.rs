use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the provider's hex-encoded HMAC-SHA512 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Check a provider signature against the raw request body.
///
/// Comparison happens inside `Mac::verify_slice`, which is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    match hex::decode(signature) {
        Ok(expected) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

/// Produce the signature the provider would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_rejects_tampering() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("shh", body);
        assert!(verify_signature("shh", body, &signature));
        assert!(!verify_signature("shh", b"{}", &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("shh", body, "not-hex"));
    }
}
