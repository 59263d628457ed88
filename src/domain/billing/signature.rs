//! Webhook signature verification.
//!
//! The provider signs the raw request body with HMAC-SHA256 using a shared
//! secret and sends the hex digest in `X-Webhook-Signature`, optionally
//! prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::BillingError;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Verifier for signed webhook bodies.
#[derive(Clone)]
pub struct WebhookSignatureVerifier {
    secret: SecretString,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Checks `header` against the HMAC of `payload`.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` when the header is missing, not hex, or wrong.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), BillingError> {
        let header = header.ok_or(BillingError::InvalidSignature)?.trim();
        let hex_digest = header.strip_prefix("sha256=").unwrap_or(header);
        let provided = hex::decode(hex_digest).map_err(|_| BillingError::InvalidSignature)?;

        let expected = self.compute(payload)?;
        if !constant_time_compare(&expected, &provided) {
            return Err(BillingError::InvalidSignature);
        }
        Ok(())
    }

    /// Hex signature for `payload`.
    #[cfg(test)]
    pub fn sign(&self, payload: &[u8]) -> Result<String, BillingError> {
        Ok(hex::encode(self.compute(payload)?))
    }

    fn compute(&self, payload: &[u8]) -> Result<Vec<u8>, BillingError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| BillingError::InvalidSignature)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for WebhookSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_club_test_12345";
    const BODY: &[u8] = br#"{"event-type":"purchase.approved"}"#;

    fn verifier() -> WebhookSignatureVerifier {
        WebhookSignatureVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    #[test]
    fn accepts_valid_signature() {
        let v = verifier();
        let sig = v.sign(BODY).unwrap();
        assert!(v.verify(BODY, Some(&sig)).is_ok());
    }

    #[test]
    fn accepts_prefixed_signature() {
        let v = verifier();
        let sig = format!("sha256={}", v.sign(BODY).unwrap());
        assert!(v.verify(BODY, Some(&sig)).is_ok());
    }

    #[test]
    fn rejects_missing_header() {
        assert!(matches!(
            verifier().verify(BODY, None),
            Err(BillingError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let v = verifier();
        let sig = v.sign(BODY).unwrap();
        let result = v.verify(br#"{"event-type":"purchase.refunded"}"#, Some(&sig));
        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }

    #[test]
    fn rejects_non_hex_header() {
        assert!(verifier().verify(BODY, Some("zz-not-hex")).is_err());
    }

    #[test]
    fn rejects_signature_from_other_secret() {
        let other = WebhookSignatureVerifier::new(SecretString::new("other".to_string()));
        let sig = other.sign(BODY).unwrap();
        assert!(verifier().verify(BODY, Some(&sig)).is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        let debug = format!("{:?}", verifier());
        assert!(!debug.contains(TEST_SECRET));
    }
}
