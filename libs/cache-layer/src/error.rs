use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Neither the primary store nor the stale shadow had a copy (§4.5.3).
    #[error("{0} unavailable and no stale copy on hand")]
    Unavailable(String),
}
