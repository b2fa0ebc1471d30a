use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    /// The child exited nonzero and the caller asked for strict checking.
    #[error("bunker-convert {operation} failed with code {code}: {stderr}")]
    ProcessFailed {
        operation: String,
        code: i32,
        stderr: String,
    },

    #[error("bunker-convert {operation} produced unexpected output: {detail}")]
    UnexpectedOutput { operation: String, detail: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Exit code of the failed child, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SdkError::ProcessFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
