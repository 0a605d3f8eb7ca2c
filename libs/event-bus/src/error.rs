use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("handler error: {0}")]
    Handler(#[from] anyhow::Error),
}
