use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid input: {field} ({reason})")]
    InvalidInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context}")]
    Overflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PaymentError {
    fn from(e: serde_json::Error) -> Self {
        PaymentError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for PaymentError {
    fn from(e: csv::Error) -> Self {
        PaymentError::SerializationError(e.to_string())
    }
}

impl PaymentError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        PaymentError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(context: &str) -> Self {
        PaymentError::Overflow {
            context: context.into(),
        }
    }
}
