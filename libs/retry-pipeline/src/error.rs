use thiserror::Error;

pub type RetryResult<T> = Result<T, RetryError>;

#[derive(Error, Debug)]
pub enum RetryError {
    #[error("malformed retry envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
}
