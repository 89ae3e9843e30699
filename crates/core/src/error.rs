use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("aggregation invariant violated: {0}")]
    AggregationInvariant(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
