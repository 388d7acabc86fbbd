//! The closed error taxonomy shared by every fallible operation in the
//! library. There is exactly one `Result` type in this crate; algorithms,
//! the scheduler, and the public API all propagate the same [`Error`].

use std::fmt;

use thiserror::Error;

/// Every fallible call in the crate returns this.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of error kinds. New variants are not meant to be added
/// casually — every call site that matches on `Error` is expected to be
/// exhaustive over this list.
#[derive(Debug, Error)]
pub enum Error {
    /// Null/empty where prohibited, out-of-range index, mismatched dimensions.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation issued against an entity in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Cycle detected, unlinked concurrent writes, unknown node kind.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// No algorithm registered for a given (kind, types, formats).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// All registered algorithms rejected the current operands at dispatch time.
    #[error("no algorithm selected for dispatch: {0}")]
    NoAlgorithm(String),

    /// Accelerator platform/device selection failed.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Accelerator queue/kernel-launch failure.
    #[error("device error: {0}")]
    DeviceError(String),

    /// Kernel program failed to compile.
    #[error("kernel compile error: {message}\n--- source ---\n{source_text}")]
    CompileError { message: String, source_text: String },

    /// Duplicate type identifier at registration.
    #[error("type already exists: {0}")]
    AlreadyExists(String),

    /// Expression was aborted due to a prior failure in the same graph.
    #[error("expression aborted: {0}")]
    Aborted(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub fn invalid_expression(msg: impl Into<String>) -> Self {
        Error::InvalidExpression(msg.into())
    }

    /// A short, stable name for the error kind, used by the message callback
    /// and by log lines so downstream tooling can filter on it without
    /// string-matching the full message.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidState(_) => "InvalidState",
            Error::InvalidExpression(_) => "InvalidExpression",
            Error::NotImplemented(_) => "NotImplemented",
            Error::NoAlgorithm(_) => "NoAlgorithm",
            Error::DeviceNotFound(_) => "DeviceNotFound",
            Error::DeviceError(_) => "DeviceError",
            Error::CompileError { .. } => "CompileError",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::Aborted(_) => "Aborted",
        }
    }
}

/// Severity attached to a message delivered to a user-installed callback.
/// Mirrors the levels the original passed through its logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single record delivered to [`crate::library::Library::set_message_callback`].
#[derive(Debug, Clone)]
pub struct Message {
    pub severity: Severity,
    pub file: &'static str,
    pub function: &'static str,
    pub line: u32,
    pub text: String,
}

/// Type of a user-installed message callback. Must be `Send + Sync` since it
/// may be invoked from any worker thread.
pub type MessageCallback = dyn Fn(&Message) + Send + Sync + 'static;

/// Emits a message both through `tracing` (so normal log sinks pick it up)
/// and through the library-wide callback, if one is installed.
macro_rules! emit_message {
    ($severity:expr, $($arg:tt)*) => {{
        let text = format!($($arg)*);
        match $severity {
            $crate::error::Severity::Info => tracing::info!("{}", text),
            $crate::error::Severity::Warn => tracing::warn!("{}", text),
            $crate::error::Severity::Error => tracing::error!("{}", text),
        }
        $crate::library::dispatch_message($crate::error::Message {
            severity: $severity,
            file: file!(),
            function: "",
            line: line!(),
            text,
        });
    }};
}

pub(crate) use emit_message;
