#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid layout model: {message}")]
    InvalidModel { message: String },
    #[error("parse tree syntax error at byte {pos}: {message}")]
    ParseTree { pos: usize, message: String },
    #[error("model JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
