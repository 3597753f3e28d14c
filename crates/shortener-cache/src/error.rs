use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid capacity: the cache must hold at least one entry")]
    InvalidCapacity,

    #[error("Negative TTL: {0}ms")]
    NegativeTtl(i64),

    #[error("Invalid sweep interval: must be greater than zero")]
    InvalidSweepInterval,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
