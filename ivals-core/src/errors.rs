use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Operation requires a non-empty collection")]
    EmptyCollection,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Collection is read-only")]
    ReadOnlyViolation,

    #[error("Corrupted collection state: {0}")]
    CorruptState(String),
}
