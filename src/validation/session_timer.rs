//! Session-Timer validator (RFC 4028, spec.md §4.D, priority 10).

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::SessionTimerManager;
use crate::config::SessionTimerConfig;
use crate::error::ValidationError;
use crate::error::ValidationResult;
use crate::message::{Method, SipMessage};
use crate::validation::Validator;

/// Token that marks support for the session-timer extension in
/// `Supported`/`Require`.
const TIMER_TOKEN: &str = "timer";

/// Enforces RFC 4028's `Session-Expires`/`Min-SE` negotiation, applying
/// only to INVITE (spec.md §4.D).
pub struct SessionTimerValidator {
    config: SessionTimerConfig,
    manager: Arc<dyn SessionTimerManager>,
}

impl SessionTimerValidator {
    /// Construct the validator against `config` and the injected
    /// [`SessionTimerManager`] used to decide whether this server mandates
    /// the extension.
    #[must_use]
    pub fn new(config: SessionTimerConfig, manager: Arc<dyn SessionTimerManager>) -> Self {
        Self { config, manager }
    }

    fn client_supports_extension(request: &SipMessage) -> bool {
        request.headers.has_token("Supported", TIMER_TOKEN) || request.headers.has_token("Require", TIMER_TOKEN)
    }

    fn effective_min_se(&self, request: &SipMessage) -> u32 {
        let request_min_se = request
            .headers
            .first("Min-SE")
            .and_then(|value| value.trim().parse::<u32>().ok());
        match request_min_se {
            Some(value) => value.max(self.config.min_se),
            None => self.config.min_se,
        }
    }

    /// Parse `Session-Expires`, taking the substring up to the first `;`
    /// (spec.md §4.D).
    fn session_expires(request: &SipMessage) -> Option<Result<u32, ()>> {
        request.headers.first("Session-Expires").map(|value| {
            let head = value.split(';').next().unwrap_or(value).trim();
            head.parse::<u32>().map_err(|_| ()).and_then(|parsed| if parsed > 0 { Ok(parsed) } else { Err(()) })
        })
    }
}

#[async_trait]
impl Validator for SessionTimerValidator {
    fn name(&self) -> &str { "session-timer" }

    fn priority(&self) -> u32 { 10 }

    fn applies_to(&self, request: &SipMessage) -> bool { matches!(request.method(), Some(Method::Invite)) }

    async fn validate(&self, request: &SipMessage) -> ValidationResult {
        let server_requires = self.manager.is_required(request);
        let client_supports = Self::client_supports_extension(request);
        let session_expires_present = request.headers.contains("Session-Expires");

        if server_requires && !client_supports {
            return ValidationResult::fail(
                ValidationError::new(self.name(), 421, "Extension Required", "client does not support session timers"),
            );
        }

        if !(client_supports || session_expires_present) {
            return ValidationResult::pass();
        }

        match Self::session_expires(request) {
            None => ValidationResult::fail(ValidationError::new(
                self.name(),
                400,
                "Bad Request",
                "session timer in use but Session-Expires is missing",
            )),
            Some(Err(())) => ValidationResult::fail(ValidationError::new(
                self.name(),
                400,
                "Bad Request",
                "Session-Expires must be a positive integer",
            )),
            Some(Ok(value)) => {
                let effective_min = self.effective_min_se(request);
                if value < effective_min {
                    return ValidationResult::fail(
                        ValidationError::new(self.name(), 423, "Interval Too Brief", "Session-Expires below effective minimum")
                            .with_header_hint(effective_min.to_string()),
                    );
                }
                if self.config.max_se > 0 && value > self.config.max_se {
                    return ValidationResult::fail(ValidationError::new(
                        self.name(),
                        400,
                        "Bad Request",
                        "Session-Expires above configured maximum",
                    ));
                }
                ValidationResult::pass()
            }
        }
    }
}
