use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Command failed with exit code {exit_code}: {command}")]
    CommandFailed { command: String, exit_code: i32 },

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Exit code the process terminates with when this error reaches main.
    /// A failed command propagates its own exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommandFailed { exit_code, .. } => *exit_code,
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}
