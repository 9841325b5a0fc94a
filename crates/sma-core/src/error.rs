use crate::archive::PackageError;
use crate::history::HistoryError;
use crate::users::UsersError;

/// Why a save produced no archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("token is required")]
    MissingToken,
    #[error("channel is required")]
    MissingChannel,
    #[error("no messages found")]
    NoMessages,
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Users(#[from] UsersError),
    #[error("writing archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("packaging archive: {0}")]
    Packaging(#[from] PackageError),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ArchiveError {
    fn from(e: tokio::task::JoinError) -> Self {
        ArchiveError::Task(e.to_string())
    }
}
