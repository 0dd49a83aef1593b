//! GitHub webhook signature validation.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body and sends
//! the result in `X-Hub-Signature-256`. The HTTP layer must verify that
//! header against the shared webhook secret before trusting a payload.
//!
//! Validation uses constant-time comparison so response timing leaks
//! nothing about the expected signature.

mod validation;

pub use validation::SignatureValidator;
