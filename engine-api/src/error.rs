/// The kinds of failure every fallible public operation can report.
///
/// One-to-one with §7 of the specification this crate implements. Kept as a separate
/// enum (rather than folding the discriminant into `EngineError`'s variant list
/// one-to-one with `Display` messages) so that callers can match on "what kind of
/// problem is this" without caring about the exact wording.
#[derive(Copy, Clone, Eq, PartialEq, Debug, strum::Display)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AccessDenied,
    Io,
    UnsupportedFormat,
    CorruptChunk,
    HeaderNotFound,
    DuplicateRequest,
    ObjectDisposed,
    Host,
    InvalidOperation,
}

/// The crate-wide error type returned from every fallible public operation.
#[derive(thiserror::Error, Clone, Debug)]
#[error("{kind}: {message}")]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation, message)
    }

    pub fn object_disposed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectDisposed, message)
    }

    pub fn duplicate_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateRequest, message)
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedFormat, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Host, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

/// Convenience alias used throughout the engine for fallible public operations.
pub type EngineResult<T> = Result<T, EngineError>;
