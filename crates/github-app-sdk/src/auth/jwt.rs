//! JWT (JSON Web Token) generation for GitHub App authentication.
//!
//! JWTs are used to authenticate as a GitHub App and exchange for
//! installation tokens.
//!
//! # GitHub Requirements
//!
//! - JWTs must use RS256 algorithm (RSA Signature with SHA-256)
//! - Maximum expiration time is 10 minutes from issuance
//! - Claims must include `iss` (app ID), `iat` (issued at), and `exp` (expiration)

use crate::auth::{GitHubAppId, JsonWebToken, JwtClaims, KeyAlgorithm, PrivateKey};
use crate::error::{AuthError, ValidationError};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;

/// Interface for JWT token generation and signing.
///
/// This trait abstracts JWT generation to allow for different implementations
/// (production RSA signing, mock generators for testing, etc.).
#[async_trait::async_trait]
pub trait JwtGenerator: Send + Sync {
    /// Generate a JWT token for GitHub App authentication.
    ///
    /// Creates a JWT with the following claims:
    /// - `iss`: GitHub App ID
    /// - `iat`: Current timestamp (issued at)
    /// - `exp`: Expiration timestamp (issued at + duration, max 10 minutes)
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the private key is invalid or signing fails.
    async fn generate_jwt(&self, app_id: GitHubAppId) -> Result<JsonWebToken, AuthError>;

    /// Get the JWT expiration duration configured for this generator.
    ///
    /// Returns the duration from issuance to expiration. This value should not
    /// exceed 10 minutes (GitHub's maximum).
    fn expiration_duration(&self) -> Duration;
}

/// RS256 JWT generator using RSA private keys.
///
/// This is the standard implementation for GitHub App authentication. It uses
/// RSA-SHA256 signing as required by GitHub's API.
pub struct RS256JwtGenerator {
    private_key: PrivateKey,
    expiration_duration: Duration,
}

impl RS256JwtGenerator {
    /// Create a new RS256 JWT generator.
    ///
    /// # Arguments
    ///
    /// * `private_key` - RSA private key for signing JWTs
    pub fn new(private_key: PrivateKey) -> Self {
        Self {
            private_key,
            expiration_duration: Duration::minutes(10), // GitHub's maximum
        }
    }

    /// Create a new RS256 JWT generator with custom expiration duration.
    ///
    /// # Arguments
    ///
    /// * `private_key` - RSA private key for signing JWTs
    /// * `expiration_duration` - How long JWTs should be valid (max 10 minutes)
    ///
    /// # Panics
    ///
    /// Panics if `expiration_duration` exceeds 10 minutes.
    pub fn with_expiration(private_key: PrivateKey, expiration_duration: Duration) -> Self {
        assert!(
            expiration_duration <= Duration::minutes(10),
            "JWT expiration cannot exceed 10 minutes (GitHub requirement)"
        );

        Self {
            private_key,
            expiration_duration,
        }
    }

    /// Build JWT claims for the given app ID.
    fn build_claims(&self, app_id: GitHubAppId) -> JwtClaims {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + self.expiration_duration).timestamp();

        JwtClaims {
            iss: app_id,
            iat,
            exp,
        }
    }
}

#[async_trait::async_trait]
impl JwtGenerator for RS256JwtGenerator {
    async fn generate_jwt(&self, app_id: GitHubAppId) -> Result<JsonWebToken, AuthError> {
        let claims = self.build_claims(app_id);
        let expires_at = Utc::now() + self.expiration_duration;

        // Key material may be PEM text or PKCS#8 DER bytes
        let key_data = self.private_key.key_data();
        let encoding_key = if key_data.starts_with(b"-----BEGIN") {
            EncodingKey::from_rsa_pem(key_data).map_err(|e| AuthError::InvalidPrivateKey {
                message: format!("Failed to create encoding key: {}", e),
            })?
        } else {
            EncodingKey::from_rsa_der(key_data)
        };

        // Set up JWT header for RS256
        let header = Header::new(Algorithm::RS256);

        // Encode the JWT
        let token_string =
            encode(&header, &claims, &encoding_key).map_err(|e| AuthError::JwtGenerationFailed {
                message: format!("Failed to encode JWT: {}", e),
            })?;

        Ok(JsonWebToken::new(token_string, app_id, expires_at))
    }

    fn expiration_duration(&self) -> Duration {
        self.expiration_duration
    }
}

impl PrivateKey {
    /// Create a private key from PEM-encoded string.
    ///
    /// Accepts both PKCS#1 (`BEGIN RSA PRIVATE KEY`, the format GitHub App
    /// key downloads use) and PKCS#8 (`BEGIN PRIVATE KEY`) encodings.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the PEM format is invalid, the key type
    /// is not RSA, or the key data is corrupted.
    pub fn from_pem(pem: &str) -> Result<Self, ValidationError> {
        let pem = pem.trim();

        if pem.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "private_key".to_string(),
                message: "PEM string cannot be empty".to_string(),
            });
        }

        if !pem.contains("-----BEGIN") || !pem.contains("-----END") {
            return Err(ValidationError::InvalidFormat {
                field: "private_key".to_string(),
                message: "Invalid PEM format: missing BEGIN/END markers".to_string(),
            });
        }

        // Attempt to parse the RSA private key to validate it
        RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ValidationError::InvalidFormat {
                field: "private_key".to_string(),
                message: format!("Failed to parse RSA private key: {}", e),
            })?;

        // Store the PEM bytes
        Ok(Self::new(pem.as_bytes().to_vec(), KeyAlgorithm::RS256))
    }

    /// Create a private key from PKCS#8 DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the DER format is invalid or the key
    /// type is not RSA.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, ValidationError> {
        // Validate by attempting to parse
        RsaPrivateKey::from_pkcs8_der(der).map_err(|e| ValidationError::InvalidFormat {
            field: "private_key".to_string(),
            message: format!("Failed to parse PKCS#8 DER private key: {}", e),
        })?;

        Ok(Self::new(der.to_vec(), KeyAlgorithm::RS256))
    }
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
