//! Application error type.
//!
//! Every fallible path in the crate returns `AppError`. The exit code is chosen
//! at the failure site so the binary can map it straight to a process status:
//!
//! - `2`: invalid input or usage (job files, validation, I/O)
//! - `3`: not enough data to fit
//! - `4`: numerical failure (non-finite residuals, solver breakdown)

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Invalid input or usage.
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Numerical failure.
    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
