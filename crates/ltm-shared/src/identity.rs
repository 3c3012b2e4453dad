//! Identity tokens issued by the identity provider.
//!
//! A token is a JSON document carrying the principal's claims plus an
//! Ed25519 signature over the serialized claims, transported as a
//! base64url string in the `Authorization: Bearer` header.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Claims about an authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Stable subject identifier of the principal.
    pub sub: String,
    pub email: String,
    pub nickname: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityToken {
    pub claims: IdentityClaims,
    pub signature: Vec<u8>,
}

impl IdentityToken {
    /// Sign a set of claims with the identity provider's key.
    pub fn issue(claims: IdentityClaims, provider_key: &SigningKey) -> Result<Self, IdentityError> {
        let payload = serde_json::to_vec(&claims)?;
        let signature = provider_key.sign(&payload);
        Ok(Self {
            claims,
            signature: signature.to_bytes().to_vec(),
        })
    }

    /// Encode as a base64url string suitable for a bearer header.
    pub fn encode(&self) -> Result<String, IdentityError> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let bytes = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(token: &str) -> Result<Self, IdentityError> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| IdentityError::Base64Decode)?;
        serde_json::from_slice(&bytes).map_err(|_| IdentityError::InvalidFormat)
    }

    /// Verify signature, expiry and required claims.
    pub fn verify(&self, provider_pubkey: &[u8; 32]) -> Result<&IdentityClaims, IdentityError> {
        if Utc::now() > self.claims.expires_at {
            return Err(IdentityError::Expired);
        }
        if self.claims.sub.trim().is_empty() {
            return Err(IdentityError::MissingClaim("sub"));
        }

        let verifying_key =
            VerifyingKey::from_bytes(provider_pubkey).map_err(|_| IdentityError::InvalidSignature)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| IdentityError::InvalidSignature)?;
        let payload =
            serde_json::to_vec(&self.claims).map_err(|_| IdentityError::InvalidFormat)?;

        verifying_key
            .verify(&payload, &signature)
            .map_err(|_| IdentityError::InvalidSignature)?;

        Ok(&self.claims)
    }
}

/// Decode and verify a bearer token in one step.
pub fn verify_bearer(token: &str, provider_pubkey: &[u8; 32]) -> Result<IdentityClaims, IdentityError> {
    let token = IdentityToken::decode(token)?;
    token.verify(provider_pubkey).cloned()
}
