use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Wiring-time failures never travel through this type; they surface as
/// `RepositoryBuildError` before any call executes.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a query-origin invariant violation.
    pub(crate) fn query_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Query,
            message.into(),
        )
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a store-origin internal error.
    pub(crate) fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a store-origin unsupported error.
    pub(crate) fn store_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Store, message.into())
    }

    /// Construct a session-origin invariant violation.
    pub(crate) fn session_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Session,
            message.into(),
        )
    }

    /// Construct a serialize-origin corruption error.
    pub(crate) fn serialize_corruption(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Corruption,
            ErrorOrigin::Serialize,
            message.into(),
        )
    }

    pub fn store_not_found(key: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("data key not found: {key}"),
            detail: Some(ErrorDetail::Store(StoreError::NotFound { key })),
        }
    }

    /// A write-exclusive lock could not be acquired before the deadline.
    pub fn lock_timeout(entity: &'static str, waited_ms: u64) -> Self {
        Self {
            class: ErrorClass::Timeout,
            origin: ErrorOrigin::Store,
            message: format!("lock wait on {entity} exceeded {waited_ms}ms"),
            detail: Some(ErrorDetail::Store(StoreError::LockTimeout {
                entity,
                waited_ms,
            })),
        }
    }

    /// The store signalled that query execution exceeded the caller's deadline.
    pub fn query_timeout(entity: &'static str, limit_ms: u64) -> Self {
        Self {
            class: ErrorClass::Timeout,
            origin: ErrorOrigin::Store,
            message: format!("query on {entity} exceeded {limit_ms}ms"),
            detail: Some(ErrorDetail::Store(StoreError::QueryTimeout {
                entity,
                limit_ms,
            })),
        }
    }

    /// A row changed (or vanished) between read and lock/bulk application.
    pub fn stale_state(entity: &'static str, key: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Store,
            message: format!("stale state on {entity}: row {key} was concurrently modified"),
            detail: Some(ErrorDetail::Store(StoreError::Stale { entity, key })),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_lock_timeout(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::LockTimeout { .. }))
        )
    }

    #[must_use]
    pub const fn is_query_timeout(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::QueryTimeout { .. }))
        )
    }

    #[must_use]
    pub const fn is_stale_state(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Store(StoreError::Stale { .. })))
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
/// This enum is intentionally extensible.
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
}

///
/// StoreError
///
/// Store-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Store`].
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("lock wait on {entity} exceeded {waited_ms}ms")]
    LockTimeout { entity: &'static str, waited_ms: u64 },

    #[error("query on {entity} exceeded {limit_ms}ms")]
    QueryTimeout { entity: &'static str, limit_ms: u64 },

    #[error("stale state on {entity}: row {key}")]
    Stale { entity: &'static str, key: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    NotFound,
    Internal,
    Conflict,
    Timeout,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Serialize,
    Store,
    Query,
    Response,
    Executor,
    Session,
    Repository,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Store => "store",
            Self::Query => "query",
            Self::Response => "response",
            Self::Executor => "executor",
            Self::Session => "session",
            Self::Repository => "repository",
        };
        write!(f, "{label}")
    }
}
