use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Input file '{}' not found.", .0.display())]
    InputNotFound(PathBuf),

    #[error("Error creating output directory '{}': {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no browser download allowed and no local browser found")]
    BrowserNotFound,

    #[error("failed to download browser: {0}")]
    BrowserDownload(String),

    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("failed to navigate to file: {0}")]
    Navigation(String),

    #[error("failed to generate PDF: {0}")]
    Render(String),

    #[error("failed to create output file '{}': {source}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write PDF data: {0}")]
    Write(#[from] std::io::Error),

    #[error("conversion cancelled")]
    Cancelled,

    #[error("Operation timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidArgument(_) => 2,
            AppError::InputNotFound(_)
            | AppError::OutputDirectory { .. }
            | AppError::BrowserNotFound
            | AppError::BrowserDownload(_)
            | AppError::BrowserLaunch(_)
            | AppError::Navigation(_)
            | AppError::Render(_)
            | AppError::CreateOutput { .. }
            | AppError::Write(_)
            | AppError::Cancelled
            | AppError::Timeout(_)
            | AppError::Internal(_) => 1,
        }
    }

    /// Pre-flight and timeout errors are reported on their own; everything
    /// else comes out of the conversion itself.
    pub fn is_conversion_failure(&self) -> bool {
        !matches!(
            self,
            AppError::InvalidArgument(_)
                | AppError::InputNotFound(_)
                | AppError::OutputDirectory { .. }
                | AppError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
