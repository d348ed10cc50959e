pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid document payload: {message}")]
    Payload { message: String },

    #[error("Invalid document payload ({row}): {message}")]
    PayloadRow { row: String, message: String },

    #[error("Missing collection configuration: {what}")]
    MissingConfiguration { what: String },

    #[error("Payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
