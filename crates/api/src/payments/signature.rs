//! Local verification of processor payment signatures.
//!
//! The processor signs `order_id|payment_id` with HMAC-SHA256 using the key
//! secret and hands the hex digest to the client.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

/// Signs and verifies payment signatures with the processor key secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Hex-encoded `HMAC_SHA256(secret, "{order_id}|{payment_id}")`.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        // HMAC accepts keys of any length, so construction cannot fail.
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            return String::new();
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Whether `signature` is the processor's signature for this payment.
    #[must_use]
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let expected = self.sign(order_id, payment_id);
        let ok = !expected.is_empty() && constant_time_compare(&expected, signature.trim());
        debug!(verified = ok, "Payment signature checked");
        ok
    }
}

/// Compare two strings without short-circuiting on the first difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("Zx81mQpL02vNc7Rt"))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_known_signature() {
        assert_eq!(
            verifier().sign("order_Kq81", "pay_29XbL"),
            "ccab8d525e27f4077b1d9a3cdbb14a99a6f1c6878c8f929a9bb879c37d6572c3"
        );
    }

    #[test]
    fn test_signature_round_trip() {
        let v = verifier();
        let sig = v.sign("order_Kq81", "pay_29XbL");
        assert!(v.verify("order_Kq81", "pay_29XbL", &sig));
    }

    #[test]
    fn test_any_single_character_mutation_fails() {
        let v = verifier();
        let sig = v.sign("order_Kq81", "pay_29XbL");
        for (i, c) in sig.char_indices() {
            let replacement = if c == '0' { "1" } else { "0" };
            let mut mutated = sig.clone();
            mutated.replace_range(i..=i, replacement);
            assert!(!v.verify("order_Kq81", "pay_29XbL", &mutated), "position {i}");
        }
    }

    #[test]
    fn test_signature_binds_both_ids() {
        let v = verifier();
        let sig = v.sign("order_A", "pay_B");
        assert!(!v.verify("order_B", "pay_A", &sig));
        assert!(!v.verify("order_A", "pay_C", &sig));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", verifier());
        assert!(!debug.contains("Zx81mQpL02vNc7Rt"));
    }
}
