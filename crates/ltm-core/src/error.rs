use ltm_shared::PaymentEventError;
use ltm_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed reference: {0}")]
    BadReference(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl ChatError {
    /// The caller sent something that will fail the same way every time.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ChatError::Store(_))
    }

    /// Redelivering the same request may succeed. Safe for webhook events
    /// because applied events are recorded in the ledger.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Store(_))
    }
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ChatError::NotFound("record"),
            StoreError::Conflict(msg) => ChatError::Conflict(msg),
            other => ChatError::Store(other),
        }
    }
}

impl From<PaymentEventError> for ChatError {
    fn from(e: PaymentEventError) -> Self {
        match e {
            PaymentEventError::MissingField(field) => ChatError::MissingField(field),
            PaymentEventError::Malformed(err) => ChatError::InvalidInput(err.to_string()),
        }
    }
}

/// Turn a store-level "no rows" into a not-found error naming the entity.
pub(crate) fn missing(entity: &'static str) -> impl FnOnce(StoreError) -> ChatError {
    move |e| match e {
        StoreError::NotFound => ChatError::NotFound(entity),
        other => other.into(),
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ChatError::MissingField("type").is_client_error());
        assert!(ChatError::NotFound("group").is_client_error());
        assert!(!ChatError::NotFound("group").is_retryable());

        let storage = ChatError::Store(StoreError::Migration("boom".into()));
        assert!(!storage.is_client_error());
        assert!(storage.is_retryable());
    }

    #[test]
    fn test_store_not_found_is_named() {
        let err = missing("group")(StoreError::NotFound);
        assert!(matches!(err, ChatError::NotFound("group")));
        assert_eq!(err.to_string(), "group not found");
    }
}
