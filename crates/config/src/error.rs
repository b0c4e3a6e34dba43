use std::path::PathBuf;

use thiserror::Error;

/// Failure loading a flow file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported flow file format: .{ext}")]
    UnsupportedFormat { ext: String },

    #[error("invalid flow file {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error(transparent)]
    Registry(#[from] keyflow_routing::RegistryConfigError),
}

impl Error {
    pub(crate) fn parse(origin: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
