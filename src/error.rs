use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feature file violates the binary layout or disagrees with the run's scales
    #[error("invalid feature file {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("usage error: {0}")]
    Usage(String),

    /// The trainer could not produce a separator
    #[error("training failed: {0}")]
    Training(String),

    /// Parameter blob could not be decoded
    #[error("parameter codec error: {0}")]
    Codec(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Render(err.to_string())
    }
}
