use std::path::PathBuf;

/// A timestamp that matched none of the recognised formats.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Encountered non standard timestring: '{0}'")]
pub struct TimeParseError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fatal problem with a show config: unresolvable reference, a category
    /// with no matches, unusable weights.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    TimeParse(#[from] TimeParseError),

    #[error("Cannot fit {target} from '{source_name}': items add no playable time")]
    Unfittable { source_name: String, target: String },

    #[error("Row {row} not in playlist '{playlist}'")]
    UnknownRow { playlist: String, row: u64 },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read '{}': {message}", .path.display())]
    Audio { path: PathBuf, message: String },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
