use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failed. The one failure class that must surface to the
    /// caller: masking it would silently corrupt later turns.
    #[error("session store failure: {0}")]
    Store(#[from] palaver_sessions::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
