//! Error types shared by the gateway, the local stores and the controllers

/// Failures raised by the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request URL could not be composed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Network or connectivity failure.
    #[error("Network error: {0}")]
    Transport(String),
    /// Non-2xx status, or an empty body where content was expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The body did not match the expected JSON shape.
    #[error("Decoding error: {0}")]
    Decoding(String),
}

/// Failures raised by the on-device stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The connection mutex was poisoned by a panicking holder.
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Path error: {0}")]
    Path(String),
}

/// Umbrella error for operations that touch both the network and local state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
