use thiserror::Error;

/// A stored or submitted enum value that matches no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Base64 decode error")]
    Base64Decode,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    #[error("Failed to serialize token: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PaymentEventError {
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Event payload is missing {0}")]
    MissingField(&'static str),
}
