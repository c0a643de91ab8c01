use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database Error: {0}")]
    Db(#[from] diesel::result::Error),

    #[error("Database Pool Error: {0}")]
    DbPool(#[from] deadpool_diesel::PoolError),

    #[error("Database Error: {0}")]
    DeadpoolInteract(String),
}

impl From<deadpool_diesel::InteractError> for Error {
    fn from(e: deadpool_diesel::InteractError) -> Self {
        Error::DeadpoolInteract(format!("{e:?}"))
    }
}
