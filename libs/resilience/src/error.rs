use thiserror::Error;

/// Uniform outcome for anything wrapped by the resilience fabric: the
/// caller's own error type, or one of the fabric's own admission refusals.
#[derive(Error, Debug)]
pub enum ResilienceError<E> {
    #[error(transparent)]
    Inner(E),

    #[error("circuit open for {dependency}, retry after {retry_after_seconds}s")]
    CircuitOpen {
        dependency: String,
        retry_after_seconds: u64,
    },

    #[error("bulkhead full for {name}: {in_flight}/{max} in flight")]
    BulkheadFull {
        name: String,
        in_flight: usize,
        max: usize,
    },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, ResilienceError::BulkheadFull { .. })
    }
}
