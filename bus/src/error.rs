//! Error taxonomy for the bus adapter.

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus configuration error: {0}")]
    Configuration(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;
