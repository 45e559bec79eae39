//! Types d'erreurs pour curplaylist

use std::path::PathBuf;

/// Erreurs du pipeline de playlists et du stockage des sets
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Set not found: {0}")]
    SetNotFound(String),

    #[error("Invalid set name: {0:?}")]
    InvalidSetName(String),

    #[error("No folders given")]
    NoFolders,

    #[error("Background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Type Result spécialisé pour curplaylist
pub type Result<T> = std::result::Result<T, Error>;
