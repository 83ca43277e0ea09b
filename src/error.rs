use std::path::PathBuf;

use thiserror::Error;

/// The source image could not be opened. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// A failure while writing exported tiles. The run stops at the first one and
/// whatever already landed on disk stays there.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write tile {}: {source}", path.display())]
    WriteTile {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("export is not in the writing state")]
    NotWriting,
}
