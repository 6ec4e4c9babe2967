use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid owner id {0}: must be a positive integer")]
    InvalidOwner(i64),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True for caller mistakes, as opposed to storage failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidOwner(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
