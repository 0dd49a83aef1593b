//! HMAC-SHA256 webhook signature validation.

use std::sync::Arc;

use crate::auth::SecretProvider;
use crate::error::ValidationError;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Validates GitHub webhook signatures against the shared webhook secret.
///
/// The secret is fetched from the provider per validation, so rotations
/// take effect without a restart.
#[derive(Clone)]
pub struct SignatureValidator {
    secrets: Arc<dyn SecretProvider>,
}

impl SignatureValidator {
    /// Create a new signature validator.
    pub fn new(secrets: Arc<dyn SecretProvider>) -> Self {
        Self { secrets }
    }

    /// Validate a webhook signature.
    ///
    /// # Arguments
    ///
    /// * `payload` - The raw webhook payload bytes, exactly as received
    /// * `signature` - The `X-Hub-Signature-256` header value (`sha256=<hex>`)
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Signature is valid
    /// * `Ok(false)` - Signature is well-formed but does not match
    /// * `Err` - Malformed signature header or secret retrieval failure
    pub async fn validate(&self, payload: &[u8], signature: &str) -> Result<bool, ValidationError> {
        let signature_bytes = parse_signature(signature)?;

        let secret = self.secrets.get_webhook_secret().await.map_err(|e| {
            ValidationError::InvalidSignatureFormat {
                message: format!("Failed to retrieve webhook secret: {}", e),
            }
        })?;

        let expected = compute_hmac(payload, &secret)?;

        Ok(constant_time_compare(&signature_bytes, &expected))
    }
}

/// Extract the hex-encoded digest from GitHub's `sha256=<hex>` format.
fn parse_signature(signature: &str) -> Result<Vec<u8>, ValidationError> {
    let hex_signature = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        ValidationError::InvalidSignatureFormat {
            message: format!(
                "Signature must start with '{}', got: '{}'",
                SIGNATURE_PREFIX,
                signature.chars().take(10).collect::<String>()
            ),
        }
    })?;

    hex::decode(hex_signature).map_err(|e| ValidationError::InvalidSignatureFormat {
        message: format!("Invalid hex encoding in signature: {}", e),
    })
}

fn compute_hmac(payload: &[u8], secret: &str) -> Result<Vec<u8>, ValidationError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        ValidationError::HmacError {
            message: format!("Failed to create HMAC instance: {}", e),
        }
    })?;
    mac.update(payload);

    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    // Length is public information; only the contents need constant time.
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("secrets", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
