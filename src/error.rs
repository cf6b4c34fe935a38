use std::time::Duration;

/// Failures a poll can end with. Everything else travels as a plain
/// `anyhow::Error` and is reported with exit status 1.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unable to load plugin '{0}'")]
    PluginLoad(String),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => 2,
            Error::PluginLoad(_) => 3,
            Error::Connection(_) => 4,
            Error::Timeout(_) => 5,
            Error::MalformedFrame(_) => 6,
        }
    }

    /// Exit status for any error coming out of the application. Errors outside
    /// the taxonomy above map to 1.
    pub fn exit_code_for(err: &anyhow::Error) -> i32 {
        err.downcast_ref::<Error>().map_or(1, Error::exit_code)
    }
}

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}

/// Creates an anyhow error with the current file and line number, and includes a source error
#[macro_export]
macro_rules! file_error_with_source {
    ($source:expr, $($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}: {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*),
            $source
        )
    };
}
