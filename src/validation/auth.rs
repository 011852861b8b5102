//! Authentication validator (RFC 2617 Digest, spec.md §4.D, priority 20).

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::AuthProcessor;
use crate::config::AuthConfig;
use crate::error::ValidationError;
use crate::error::ValidationResult;
use crate::message::{Method, SipMessage};
use crate::validation::Validator;

/// Methods the authentication validator applies to; ACK and unknown
/// methods are never challenged (spec.md §4.D).
fn applies_to_method(method: &Method) -> bool {
    matches!(
        method,
        Method::Register | Method::Invite | Method::Bye | Method::Cancel | Method::Options | Method::Info
    )
}

/// Delegates credential processing to the injected [`AuthProcessor`]
/// (spec.md §4.D).
pub struct AuthenticationValidator {
    config: AuthConfig,
    processor: Arc<dyn AuthProcessor>,
}

impl AuthenticationValidator {
    /// Construct the validator against `config` and the injected
    /// [`AuthProcessor`].
    #[must_use]
    pub fn new(config: AuthConfig, processor: Arc<dyn AuthProcessor>) -> Self { Self { config, processor } }
}

#[async_trait]
impl Validator for AuthenticationValidator {
    fn name(&self) -> &str { "authentication" }

    fn priority(&self) -> u32 { 20 }

    fn applies_to(&self, request: &SipMessage) -> bool {
        self.config.require_auth && request.method().is_some_and(applies_to_method)
    }

    async fn validate(&self, request: &SipMessage) -> ValidationResult {
        let outcome = match self.processor.process_incoming(request).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return ValidationResult::fail(ValidationError::new(
                    self.name(),
                    500,
                    "Server Internal Error",
                    "authentication processor failed",
                ));
            }
        };

        let Some(challenge) = outcome.challenge_response else {
            return ValidationResult::pass();
        };

        if request.headers.contains("Authorization") {
            return ValidationResult::fail(ValidationError::new(
                self.name(),
                403,
                "Forbidden",
                "credentials were rejected",
            ));
        }

        ValidationResult::fail(
            ValidationError::new(self.name(), 401, "Unauthorized", "credentials required").with_header_hint(challenge.realm),
        )
    }
}
