use thiserror::Error;

use crosspost_db::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found")]
    UnknownUser,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            Self::Store(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
