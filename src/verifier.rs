//! Signature verification for endorsements
//!
//! The verifier distinguishes two outcomes the rest of the system must not
//! confuse: a well-formed signature that simply does not match returns
//! `Ok(false)`, while malformed input (bad address, bad encoding) is a
//! `Verification` error. Risk sharing never proceeds on either.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::{LendingError, LendingResult};

/// Verifies that `signer_id` signed `message`
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, signer_id: &str, message: &str, signature: &str)
        -> LendingResult<bool>;
}

/// Ed25519 verifier over strkey-style base32 addresses
#[derive(Clone, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Decode a G-address to Ed25519 public key bytes.
    ///
    /// Layout is version byte, 32 key bytes, 2 checksum bytes.
    fn decode_address(address: &str) -> LendingResult<[u8; 32]> {
        if !address.starts_with('G') {
            return Err(LendingError::Verification(
                "invalid address format: must start with G".to_string(),
            ));
        }

        let decoded = base32::decode(base32::Alphabet::Rfc4648 { padding: true }, address)
            .ok_or_else(|| {
                LendingError::Verification("failed to decode address".to_string())
            })?;

        if decoded.len() < 35 {
            return Err(LendingError::Verification(
                "invalid address length".to_string(),
            ));
        }

        // Skip version byte (1) and take public key (32 bytes)
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&decoded[1..33]);
        Ok(key_bytes)
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn verify(
        &self,
        signer_id: &str,
        message: &str,
        signature: &str,
    ) -> LendingResult<bool> {
        let public_key_bytes = Self::decode_address(signer_id)?;
        let verifying_key = VerifyingKey::from_bytes(&public_key_bytes)
            .map_err(|e| LendingError::Verification(format!("invalid public key: {}", e)))?;

        let signature_bytes =
            base32::decode(base32::Alphabet::Rfc4648 { padding: true }, signature).ok_or_else(
                || LendingError::Verification("invalid base32 signature encoding".to_string()),
            )?;

        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|e| LendingError::Verification(format!("invalid signature format: {}", e)))?;

        // A mismatch here is a negative answer, not an error
        Ok(verifying_key.verify(message.as_bytes(), &signature).is_ok())
    }
}
