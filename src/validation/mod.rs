//! Validator Interface & Chain (spec.md §4.C).
//!
//! A validator is a pure function of the request plus its injected
//! collaborators: `applies_to` gates whether it runs at all, `validate`
//! either passes the request through or reports a [`ValidationError`]. The
//! chain keeps validators sorted by ascending `priority()`, ties broken by
//! insertion order, and short-circuits on the first failure — the same
//! ordered-registry shape the teacher uses for its command table in
//! `commands::mod::HandlerContext`, just keyed by priority instead of
//! method.
//!
//! `validate` is async (`#[async_trait]`, as with every collaborator trait
//! in [`crate::collaborators`]) because `AuthenticationValidator` must
//! await `AuthProcessor::process_incoming`; `applies_to` stays a plain
//! sync predicate over the message.

pub mod auth;
pub mod session_timer;
pub mod syntax;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProxyConfig;
use crate::error::ValidationResult;
use crate::message::SipMessage;

/// A single, independent request-level validator.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable validator name, surfaced in [`crate::error::ValidationError`]
    /// and error-log fields.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs earlier.
    fn priority(&self) -> u32;

    /// Whether this validator has an opinion on `request` at all.
    fn applies_to(&self, request: &SipMessage) -> bool;

    /// Validate `request`, assuming [`Validator::applies_to`] returned
    /// `true`.
    async fn validate(&self, request: &SipMessage) -> ValidationResult;
}

/// Priority-ordered, short-circuiting sequence of [`Validator`]s
/// (spec.md §4.C).
///
/// Mutation (`add`/`remove`) is not expected to run concurrently with
/// [`ValidationChain::validate`]; callers configure the chain at startup,
/// matching spec.md §5's stated discipline.
#[derive(Default)]
pub struct ValidationChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidationChain {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self { Self { validators: Vec::new() } }

    /// Build the chain spec.md §9's priority table mandates: Syntax (1),
    /// Session-Timer (10), Auth (20), in that ascending order
    /// (SPEC_FULL.md "Supplemented features").
    #[must_use]
    pub fn standard(
        config: &ProxyConfig,
        session_timer_manager: Arc<dyn crate::collaborators::SessionTimerManager>,
        auth_processor: Arc<dyn crate::collaborators::AuthProcessor>,
    ) -> Self {
        let mut chain = Self::new();
        chain.add(Arc::new(syntax::SyntaxValidator::new()));
        if config.session_timer.enabled {
            chain.add(Arc::new(session_timer::SessionTimerValidator::new(
                config.session_timer.clone(),
                session_timer_manager,
            )));
        }
        if config.auth.enabled {
            chain.add(Arc::new(auth::AuthenticationValidator::new(config.auth.clone(), auth_processor)));
        }
        chain
    }

    /// Insert `validator`, keeping the list sorted by ascending priority;
    /// ties keep their relative insertion order (a stable sort achieves
    /// this given validators are always appended, never reordered
    /// in-place).
    pub fn add(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
        self.validators.sort_by_key(|validator| validator.priority());
    }

    /// Remove the validator named `name`, returning whether one was found.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.validators.len();
        self.validators.retain(|validator| validator.name() != name);
        self.validators.len() != before
    }

    /// A snapshot of the validators currently in the chain, in run order.
    #[must_use]
    pub fn validators(&self) -> Vec<Arc<dyn Validator>> { self.validators.clone() }

    /// Run every applicable validator in priority order, returning the
    /// first failure unchanged, or a passing result if all succeed
    /// (spec.md §4.C, §8 invariant 2-3).
    pub async fn validate(&self, request: &SipMessage) -> ValidationResult {
        for validator in &self.validators {
            if validator.applies_to(request) {
                let result = validator.validate(request).await;
                if !result.valid {
                    return result;
                }
            }
        }
        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::message::Method;

    struct RecordingValidator {
        name: &'static str,
        priority: u32,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        passes: bool,
    }

    #[async_trait]
    impl Validator for RecordingValidator {
        fn name(&self) -> &str { self.name }
        fn priority(&self) -> u32 { self.priority }
        fn applies_to(&self, _request: &SipMessage) -> bool { true }
        async fn validate(&self, _request: &SipMessage) -> ValidationResult {
            self.order.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(self.name);
            if self.passes {
                ValidationResult::pass()
            } else {
                ValidationResult::fail(crate::error::ValidationError::new(self.name, 400, "Bad Request", "no"))
            }
        }
    }

    #[tokio::test]
    async fn chain_runs_in_ascending_priority_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = ValidationChain::new();
        chain.add(Arc::new(RecordingValidator { name: "b", priority: 20, order: order.clone(), passes: true }));
        chain.add(Arc::new(RecordingValidator { name: "a", priority: 1, order: order.clone(), passes: true }));
        chain.add(Arc::new(RecordingValidator { name: "c", priority: 10, order: order.clone(), passes: true }));

        let request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        let result = chain.validate(&request).await;
        assert!(result.valid);
        assert_eq!(*order.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn chain_short_circuits_on_first_failure() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = ValidationChain::new();
        chain.add(Arc::new(RecordingValidator { name: "first", priority: 1, order: order.clone(), passes: false }));
        chain.add(Arc::new(RecordingValidator { name: "second", priority: 2, order: order.clone(), passes: true }));

        let request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        let result = chain.validate(&request).await;
        assert!(!result.valid);
        assert_eq!(result.error.map(|error| error.validator_name), Some("first".to_owned()));
        assert_eq!(*order.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec!["first"]);
    }

    #[tokio::test]
    async fn ties_break_by_insertion_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = ValidationChain::new();
        chain.add(Arc::new(RecordingValidator { name: "first", priority: 5, order: order.clone(), passes: true }));
        chain.add(Arc::new(RecordingValidator { name: "second", priority: 5, order: order.clone(), passes: true }));

        let request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        chain.validate(&request).await;
        assert_eq!(*order.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec!["first", "second"]);
    }

    #[test]
    fn remove_reports_whether_a_validator_was_found() {
        let mut chain = ValidationChain::new();
        chain.add(Arc::new(RecordingValidator {
            name: "only",
            priority: 1,
            order: Arc::new(std::sync::Mutex::new(Vec::new())),
            passes: true,
        }));
        assert!(chain.remove("only"));
        assert!(!chain.remove("only"));
    }

    #[test]
    fn validators_snapshot_reflects_current_membership() {
        let mut chain = ValidationChain::new();
        chain.add(Arc::new(RecordingValidator {
            name: "a",
            priority: 1,
            order: Arc::new(std::sync::Mutex::new(Vec::new())),
            passes: true,
        }));
        assert_eq!(chain.validators().len(), 1);
    }
}
