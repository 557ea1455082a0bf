use thiserror::Error;

/// Any way a single exchange with the device can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{endpoint}: network failure: {message}")]
    Network { endpoint: String, message: String },

    #[error("{endpoint}: device answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{endpoint}: malformed response: {message}")]
    Decode { endpoint: String, message: String },
}

impl TransportError {
    pub fn endpoint(&self) -> &str {
        match self {
            TransportError::Network { endpoint, .. }
            | TransportError::Status { endpoint, .. }
            | TransportError::Decode { endpoint, .. } => endpoint,
        }
    }
}
