//! The error taxonomy (spec.md §3, §7): [`ValidationError`],
//! [`DetailedValidationError`], [`ErrorKind`], and [`MalformedMessageError`].
//!
//! These are data, not [`std::error::Error`] failures — the pipeline's job
//! is to turn them into a wire response (via
//! [`crate::response::build_error_response`]), not to propagate them as
//! Rust errors. This mirrors the teacher's split between typed collaborator
//! errors (`thiserror`, see [`crate::collaborators`]) and plain protocol
//! data carried by value, as in `transaction::TransactionError` versus the
//! `Transaction` reply values built in `commands::mod::privilege_error_reply`.

use std::collections::BTreeMap;

/// Closed taxonomy of fault categories (spec.md §3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Malformed bytes; could not be parsed or failed structural checks.
    Parse,
    /// A typed validator rejected the message.
    Validation,
    /// Handler-layer failure (collaborator error, internal bug).
    Processing,
    /// Send failure, connection loss, or downstream timeout.
    Transport,
    /// Specialization of validation: Digest authentication failure.
    Authentication,
    /// Specialization of validation: RFC 4028 session-timer failure.
    SessionTimer,
}

impl ErrorKind {
    /// All six variants, in the fixed order used to index statistics
    /// counters (spec.md §3, `ErrorStatistics`).
    pub const ALL: [Self; 6] = [
        Self::Parse,
        Self::Validation,
        Self::Processing,
        Self::Transport,
        Self::Authentication,
        Self::SessionTimer,
    ];

    /// Index into the fixed six-counter array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Parse => 0,
            Self::Validation => 1,
            Self::Processing => 2,
            Self::Transport => 3,
            Self::Authentication => 4,
            Self::SessionTimer => 5,
        }
    }

    /// The `tracing` level the logging surface emits records at for this
    /// kind (spec.md §4.I: "parse/processing/transport → Error,
    /// validation/auth/session-timer → Warn").
    #[must_use]
    pub const fn log_level(self) -> tracing::Level {
        match self {
            Self::Parse | Self::Processing | Self::Transport => tracing::Level::ERROR,
            Self::Validation | Self::Authentication | Self::SessionTimer => tracing::Level::WARN,
        }
    }
}

/// A validator's rejection of a request (spec.md §3).
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Name of the validator that produced this error.
    pub validator_name: String,
    /// Numeric SIP status code to respond with.
    pub status_code: u16,
    /// Reason phrase to respond with.
    pub reason_phrase: String,
    /// Header name hint, e.g. carrying an effective `Min-SE` value.
    pub header_hint: Option<String>,
    /// Free-form human-readable detail (never sent on the wire).
    pub details: String,
    /// Suggestion strings for operator-facing diagnostics.
    pub suggestions: Vec<String>,
}

impl ValidationError {
    /// Construct a bare validation error with no hint or suggestions.
    #[must_use]
    pub fn new(
        validator_name: impl Into<String>,
        status_code: u16,
        reason_phrase: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            validator_name: validator_name.into(),
            status_code,
            reason_phrase: reason_phrase.into(),
            header_hint: None,
            details: details.into(),
            suggestions: Vec::new(),
        }
    }

    /// Attach a header-name hint (e.g. `"Min-SE"`).
    #[must_use]
    pub fn with_header_hint(mut self, hint: impl Into<String>) -> Self {
        self.header_hint = Some(hint.into());
        self
    }

    /// Attach suggestion strings.
    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

/// Free-form context values attached to a [`DetailedValidationError`].
///
/// Kept as an open map of JSON values rather than a closed sum type: the
/// logger treats every value as opaque for serialization (spec.md §9
/// design notes permit this), and the response builder only ever reads
/// the two well-known keys it documents (`min_se`, `allowed_methods`).
pub type Context = BTreeMap<String, serde_json::Value>;

/// A [`ValidationError`] wrapped with richer diagnostic context
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct DetailedValidationError {
    /// The underlying validation error.
    pub error: ValidationError,
    /// Category this fault belongs to.
    pub kind: ErrorKind,
    /// Headers that were required but absent.
    pub missing_headers: Vec<String>,
    /// Headers present but structurally invalid.
    pub invalid_headers: Vec<String>,
    /// Free-form key/value context (e.g. `min_se`, `allowed_methods`).
    pub context: Context,
    /// Suggestion strings, duplicated here for callers that only see the
    /// detailed error.
    pub suggestions: Vec<String>,
}

impl DetailedValidationError {
    /// Wrap a [`ValidationError`] with a kind and no further context.
    #[must_use]
    pub fn new(error: ValidationError, kind: ErrorKind) -> Self {
        let suggestions = error.suggestions.clone();
        Self {
            error,
            kind,
            missing_headers: Vec::new(),
            invalid_headers: Vec::new(),
            context: Context::new(),
            suggestions,
        }
    }

    /// Attach missing-header names.
    #[must_use]
    pub fn with_missing_headers(mut self, headers: Vec<String>) -> Self {
        self.missing_headers = headers;
        self
    }

    /// Attach invalid-header names.
    #[must_use]
    pub fn with_invalid_headers(mut self, headers: Vec<String>) -> Self {
        self.invalid_headers = headers;
        self
    }

    /// Attach a single context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Structural fault category detected by the malformed-message detector
/// (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMessageKind {
    /// The start line could not be parsed into a valid request or
    /// response form.
    StartLine,
    /// A header line lacked a colon or an empty/non-visible name.
    Header,
    /// A header's value failed its per-header structural check.
    HeaderValue,
    /// The body did not match `Content-Length`.
    Body,
    /// A line terminated with bare LF or mixed endings.
    LineEnding,
    /// Null bytes or non-ASCII bytes were found in the header region.
    Encoding,
}

/// Location of a [`MalformedMessageError`] within the raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultLocation {
    /// A specific zero-based line index.
    Line(usize),
    /// A byte-range region (start, end) when no single line applies.
    Region(usize, usize),
}

/// A single structural fault found by the malformed-message detector.
#[derive(Debug, Clone)]
pub struct MalformedMessageError {
    /// Fault category.
    pub kind: MalformedMessageKind,
    /// Human-readable description.
    pub description: String,
    /// Where in the raw message the fault was found.
    pub location: FaultLocation,
    /// A suggestion for fixing the fault.
    pub suggestion: String,
}

/// Outcome of running a request through the validation chain
/// (spec.md §3, §4.C).
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether the request passed every applicable validator.
    pub valid: bool,
    /// A pre-built response to send, when `valid` is false and the
    /// validator chose to build one directly.
    pub response: Option<crate::message::SipMessage>,
    /// The validation error responsible for rejection, when `valid` is
    /// false.
    pub error: Option<ValidationError>,
}

impl ValidationResult {
    /// The passing result.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            valid: true,
            response: None,
            error: None,
        }
    }

    /// A failing result carrying only an error (the caller builds the
    /// response).
    #[must_use]
    pub fn fail(error: ValidationError) -> Self {
        Self {
            valid: false,
            response: None,
            error: Some(error),
        }
    }
}
