use std::path::PathBuf;

use hummingbird_types::Height;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("tape {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint regression: tape is at {current}, refusing to record {attempted}")]
    Regression { current: Height, attempted: Height },
}

impl TapeError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
