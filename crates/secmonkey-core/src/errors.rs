use secmonkey_core_types::RunId;
use thiserror::Error;

/// Result type alias using the canonical [`ExError`]
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the change-detection engine. Each kind maps to a stable error
/// code that can be used for programmatic error handling and testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    /// Ephemeral path with empty segments or no segments at all
    InvalidPath,
    /// The two roots handed to the structural diff are of different shape
    TypeMismatch,
    NotFound,

    // Technology registry
    DuplicateTechnology,
    UnknownTechnology,

    // Collection
    CollectionFailed,
    Throttled,
    /// Throttling persisted past the configured retry cap
    RetryExhausted,

    // Store integrity
    IntegrityViolation,

    // Configuration
    InvalidConfig,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidPath => "ERR_INVALID_PATH",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::DuplicateTechnology => "ERR_DUPLICATE_TECHNOLOGY",
            ExErrorKind::UnknownTechnology => "ERR_UNKNOWN_TECHNOLOGY",
            ExErrorKind::CollectionFailed => "ERR_COLLECTION_FAILED",
            ExErrorKind::Throttled => "ERR_THROTTLED",
            ExErrorKind::RetryExhausted => "ERR_RETRY_EXHAUSTED",
            ExErrorKind::IntegrityViolation => "ERR_INTEGRITY_VIOLATION",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Look up a kind by its stable code (used when reading persisted exception rows)
    pub fn from_code(code: &str) -> Option<Self> {
        ALL_KINDS.iter().copied().find(|k| k.code() == code)
    }
}

const ALL_KINDS: [ExErrorKind; 15] = [
    ExErrorKind::InvalidInput,
    ExErrorKind::InvalidPath,
    ExErrorKind::TypeMismatch,
    ExErrorKind::NotFound,
    ExErrorKind::DuplicateTechnology,
    ExErrorKind::UnknownTechnology,
    ExErrorKind::CollectionFailed,
    ExErrorKind::Throttled,
    ExErrorKind::RetryExhausted,
    ExErrorKind::IntegrityViolation,
    ExErrorKind::InvalidConfig,
    ExErrorKind::Io,
    ExErrorKind::Serialization,
    ExErrorKind::Persistence,
    ExErrorKind::Internal,
];

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    technology: Option<String>,
    location: Option<String>,
    run_id: Option<RunId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            technology: None,
            location: None,
            run_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add technology context
    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    /// Add location context (rendered `technology/account/region/name`)
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Add run ID context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the technology context, if any
    pub fn technology(&self) -> Option<&str> {
        self.technology.as_deref()
    }

    /// Get the location context, if any
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Get the run ID context, if any
    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.code(), self.kind)?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(technology) = &self.technology {
            write!(f, " (technology: {})", technology)?;
        }
        if let Some(location) = &self.location {
            write!(f, " (location: {})", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Errors surfaced by external collectors (cloud SDK wrappers)
///
/// Only [`FetchError::Throttled`] is retried by the rate limiter; every other
/// variant is recorded against the failing scope and the cycle moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Provider asked us to slow down
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Credentials rejected or missing permission for the call
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Endpoint unreachable or returned a server error
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// True for throttling-class errors
    pub fn is_throttle(&self) -> bool {
        matches!(self, FetchError::Throttled(_))
    }
}

impl From<FetchError> for ExError {
    fn from(err: FetchError) -> Self {
        let kind = if err.is_throttle() {
            ExErrorKind::Throttled
        } else {
            ExErrorKind::CollectionFailed
        };
        ExError::new(kind).with_message(err.to_string())
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

impl From<std::io::Error> for ExError {
    fn from(err: std::io::Error) -> Self {
        ExError::new(ExErrorKind::Io).with_message(err.to_string())
    }
}
