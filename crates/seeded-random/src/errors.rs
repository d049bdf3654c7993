use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RandomError {
    #[error("cannot choose from an empty set")]
    EmptyChoices,

    #[error("weights must be finite, non-negative and sum to more than zero")]
    InvalidWeights,
}

pub type RandomResult<T> = std::result::Result<T, RandomError>;
