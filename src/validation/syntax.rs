//! Syntax validator (spec.md §4.D, priority 1).

use async_trait::async_trait;

use crate::error::{ErrorKind, ValidationError, ValidationResult};
use crate::message::SipMessage;
use crate::validation::Validator;

/// Headers every request must carry (spec.md §3 invariant, §4.D).
const REQUIRED_HEADERS: [&str; 5] = ["Via", "From", "To", "Call-ID", "CSeq"];

fn missing_headers(request: &SipMessage) -> Vec<String> {
    REQUIRED_HEADERS
        .iter()
        .filter(|name| !request.headers.contains(name))
        .map(|name| (*name).to_owned())
        .collect()
}

/// Re-checks the parsed message view for the required headers
/// (spec.md §4.D). The byte-level checks already ran in
/// [`crate::detector`]; this validator only needs to confirm the parser
/// preserved what the message is required to carry.
pub struct SyntaxValidator;

impl SyntaxValidator {
    /// Construct the syntax validator. It has no configuration.
    #[must_use]
    pub const fn new() -> Self { Self }
}

impl Default for SyntaxValidator {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Validator for SyntaxValidator {
    fn name(&self) -> &str { "syntax" }

    fn priority(&self) -> u32 { 1 }

    fn applies_to(&self, _request: &SipMessage) -> bool { true }

    async fn validate(&self, request: &SipMessage) -> ValidationResult {
        let detailed = validate_detailed(request);
        if detailed.missing_headers.is_empty() {
            return ValidationResult::pass();
        }

        let error = detailed
            .error
            .with_suggestions(detailed.missing_headers.iter().map(|name| format!("add a \"{name}\" header")).collect());
        ValidationResult::fail(error)
    }
}

/// Detailed counterpart driving [`SyntaxValidator::validate`], for callers
/// that want the [`crate::error::DetailedValidationError`] shape directly
/// (missing-header names included) instead of re-deriving it from the
/// plain [`ValidationError`] — used by the chain's own detailed-error
/// logging path alongside the pass/fail result above.
#[must_use]
pub fn validate_detailed(request: &SipMessage) -> crate::error::DetailedValidationError {
    let missing = missing_headers(request);
    let error = if missing.is_empty() {
        ValidationError::new("syntax", 200, "OK", "no missing headers")
    } else {
        ValidationError::new(
            "syntax",
            400,
            "Bad Request",
            format!("missing required headers: {}", missing.join(", ")),
        )
    };
    crate::error::DetailedValidationError::new(error, ErrorKind::Validation).with_missing_headers(missing)
}
