//! HMAC-SHA256 verification of `X-Hub-Signature-256`
//!
//! The header format is `sha256=<hex>`. Comparison is constant-time and the
//! secret never leaves its [`SecretString`].

use crate::error::WebhookError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Verifies webhook payload signatures against a shared secret
#[derive(Clone)]
pub struct SignatureValidator {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator").finish_non_exhaustive()
    }
}

impl SignatureValidator {
    /// Create validator
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify `signature_header` over the raw `payload`
    ///
    /// # Errors
    /// - [`WebhookError::InvalidSignatureFormat`] on a malformed header
    /// - [`WebhookError::InvalidSignature`] if the digest does not match
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let signature_hex = signature_header
            .strip_prefix(PREFIX)
            .ok_or_else(|| WebhookError::InvalidSignatureFormat("missing sha256= prefix".into()))?;
        let expected = hex::decode(signature_hex)
            .map_err(|e| WebhookError::InvalidSignatureFormat(format!("invalid hex: {e}")))?;

        let computed = self.digest(payload)?;
        if computed.ct_eq(&expected).into() {
            Ok(())
        } else {
            tracing::warn!("webhook signature verification failed");
            Err(WebhookError::InvalidSignature)
        }
    }

    /// Header value for `payload`, as the tracker would send it
    ///
    /// # Errors
    /// [`WebhookError::InvalidSignature`] if the MAC cannot be keyed
    pub fn sign(&self, payload: &[u8]) -> Result<String, WebhookError> {
        Ok(format!("{PREFIX}{}", hex::encode(self.digest(payload)?)))
    }

    fn digest(&self, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SignatureValidator {
        SignatureValidator::new(SecretString::from("It's a Secret to Everybody"))
    }

    #[test]
    fn known_github_vector() {
        // Published example from the GitHub webhook documentation.
        let header = "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert!(validator().verify(b"Hello, World!", header).is_ok());
    }

    #[test]
    fn sign_then_verify() {
        let v = validator();
        let header = v.sign(b"{\"action\":\"opened\"}").unwrap();
        assert!(v.verify(b"{\"action\":\"opened\"}", &header).is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let v = validator();
        let header = v.sign(b"original").unwrap();
        assert!(matches!(
            v.verify(b"tampered", &header),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_fails() {
        let header = SignatureValidator::new(SecretString::from("other"))
            .sign(b"payload")
            .unwrap();
        assert!(validator().verify(b"payload", &header).is_err());
    }

    #[test]
    fn malformed_headers() {
        let v = validator();
        assert!(matches!(
            v.verify(b"x", "sha1=abcd"),
            Err(WebhookError::InvalidSignatureFormat(_))
        ));
        assert!(matches!(
            v.verify(b"x", "sha256=zz"),
            Err(WebhookError::InvalidSignatureFormat(_))
        ));
    }

    #[test]
    fn truncated_signature_fails() {
        let v = validator();
        let header = v.sign(b"payload").unwrap();
        assert!(v.verify(b"payload", &header[..header.len() - 2]).is_err());
    }
}
