use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid reference: rule {rule_id} points at unknown card {card_id}")]
    InvalidReference { rule_id: String, card_id: String },

    #[error("Unknown card: {0}")]
    UnknownCard(String),

    #[error("Too many candidates: more than {limit} rules to evaluate")]
    TooManyCandidates { limit: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
