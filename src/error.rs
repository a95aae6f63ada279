use thiserror::Error;

/// Failure talking to the block explorer API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: status={status}, message={message}")]
    Api { status: String, message: String },

    #[error("rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failure in the local tag / assessment store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid Ethereum address: {0}")]
    Invalid(String),
}
