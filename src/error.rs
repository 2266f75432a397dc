//! The error type shared across every subsystem.
//!
//! Each subsystem converts whatever went wrong into one of the five kinds
//! below rather than unwinding; only programming invariants (strategy
//! registration conflicts detected at startup) are allowed to propagate as
//! an unrecoverable `Result` out of `main`.

pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of user-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PathNotFound,
    NoCompatibleStrategy,
    StrategyConflict,
    InvalidRequest,
    AnalyzerToolMissing,
    AnalyzerTimeout,
    AnalyzerExitNonzero,
    ConfigUnsupported,
    ConfigParse,
    ConfigInvalid,
    ConfigSecurity,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// An error carrying a closed-set code, a severity, and a human message.
///
/// Mirrors the five error kinds in the design: `Validation`, `NotFound`,
/// `Parse`, `External`, `Fatal` are all represented as variants here rather
/// than as distinct types, since every one of them eventually needs the
/// same `(code, severity, message)` shape to be reported to a caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("not found: {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("parse error: {message}")]
    Parse { code: ErrorCode, message: String },

    #[error("external failure: {message}")]
    External { code: ErrorCode, message: String },

    #[error("fatal: {message}")]
    Fatal { code: ErrorCode, message: String },

    #[error("{0}")]
    Io(String),
}

impl Error {
    pub fn validation<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Error::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Error::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Error::Parse {
            code,
            message: message.into(),
        }
    }

    pub fn external<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Error::External {
            code,
            message: message.into(),
        }
    }

    pub fn fatal<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Error::Fatal {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation { code, .. } => *code,
            Error::NotFound { code, .. } => *code,
            Error::Parse { code, .. } => *code,
            Error::External { code, .. } => *code,
            Error::Fatal { code, .. } => *code,
            Error::Io(_) => ErrorCode::Io,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Error::Validation { .. } => Severity::Error,
            Error::NotFound { .. } => Severity::Warning,
            Error::Parse { .. } => Severity::Warning,
            Error::External { .. } => Severity::Error,
            Error::Fatal { .. } => Severity::Critical,
            Error::Io(_) => Severity::Error,
        }
    }

    /// Per §7: Error/Critical is the blocking boundary.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::External { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// A limited analogue of `anyhow!`, for `Error::fatal` call sites that want
/// a formatted message without naming the `ErrorCode` explicitly at each
/// call site (defaults to an internal-invariant style code).
#[macro_export]
macro_rules! ura_error {
    ($code:expr, $msg:literal $(,)?) => {
        $crate::error::Error::fatal($code, $msg)
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::fatal($code, format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_severities_are_error_or_critical() {
        let err = Error::validation(ErrorCode::InvalidRequest, "bad");
        assert_eq!(err.severity(), Severity::Error);
        let fatal = Error::fatal(ErrorCode::PathNotFound, "gone");
        assert_eq!(fatal.severity(), Severity::Critical);
    }

    #[test]
    fn not_found_and_external_are_retryable() {
        assert!(Error::not_found(ErrorCode::PathNotFound, "x").is_retryable());
        assert!(Error::external(ErrorCode::AnalyzerTimeout, "x").is_retryable());
        assert!(!Error::validation(ErrorCode::InvalidRequest, "x").is_retryable());
    }
}
