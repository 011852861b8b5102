//! Method-Dispatch Manager (spec.md §4.E).
//!
//! Maps a request's method to the first registered handler that claims
//! it, synthesizing 405 when nothing matches — the same first-match
//! ordered-registry shape the teacher uses for `HandlerContext` dispatch
//! over its `Command` variants in `commands::mod`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::{Method, SipMessage};
use crate::response::{build_error_response, ResponseDetail};

/// The fixed candidate set `GetSupportedMethods` draws from (spec.md
/// §4.E).
pub const CANDIDATE_METHODS: [&str; 13] = [
    "INVITE", "ACK", "BYE", "CANCEL", "REGISTER", "OPTIONS", "INFO", "PRACK", "UPDATE",
    "SUBSCRIBE", "NOTIFY", "REFER", "MESSAGE",
];

/// Failure propagated from a handler, converted to a 500 by the caller
/// (spec.md §4.E).
#[derive(Debug, Clone)]
pub struct HandlerError {
    /// Human-readable description, never sent to the peer verbatim.
    pub message: String,
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.message) }
}

impl std::error::Error for HandlerError {}

/// A method-specific request handler (spec.md §3 "Handler registry").
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Whether this handler accepts `method`.
    fn can_handle(&self, method: &Method) -> bool;

    /// The methods this handler advertises, for `Allow` aggregation.
    fn advertised_methods(&self) -> &[&str];

    /// Process `request`, optionally sending a response via `transaction`.
    ///
    /// # Errors
    /// Returns an error on handler/collaborator failure; the caller
    /// converts this into a 500.
    async fn handle(
        &self,
        request: &SipMessage,
        transaction: &dyn crate::collaborators::Transaction,
    ) -> Result<(), HandlerError>;
}

/// Ordered handler registry with first-match dispatch (spec.md §4.E).
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Arc<dyn MethodHandler>>,
}

impl Dispatcher {
    /// An empty dispatcher.
    #[must_use]
    pub fn new() -> Self { Self { handlers: Vec::new() } }

    /// Register a handler at the end of the list.
    pub fn register(&mut self, handler: Arc<dyn MethodHandler>) { self.handlers.push(handler); }

    /// Deduplicated union of every registered handler's advertised
    /// methods.
    #[must_use]
    pub fn registered_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .handlers
            .iter()
            .flat_map(|handler| handler.advertised_methods())
            .map(|method| (*method).to_owned())
            .collect();
        methods.sort_unstable();
        methods.dedup();
        methods
    }

    /// The deduplicated union over the fixed candidate set (spec.md
    /// §4.E); here that is simply every candidate a registered handler
    /// claims.
    #[must_use]
    pub fn supported_methods(&self) -> Vec<String> {
        CANDIDATE_METHODS
            .iter()
            .filter(|candidate| {
                self.handlers
                    .iter()
                    .any(|handler| handler.advertised_methods().contains(candidate))
            })
            .map(|candidate| (*candidate).to_owned())
            .collect()
    }

    /// Dispatch `request` to the first handler whose `can_handle` returns
    /// true, sending a 405 via `transaction` when nothing matches
    /// (spec.md §4.E).
    ///
    /// # Errors
    /// Propagates the matched handler's error unchanged, or a send
    /// failure from the synthesized 405.
    pub async fn handle_request(
        &self,
        request: &SipMessage,
        transaction: &dyn crate::collaborators::Transaction,
    ) -> Result<(), HandlerError> {
        let Some(method) = request.method() else {
            return Err(HandlerError { message: "dispatch requires a request".to_owned() });
        };

        if let Some(handler) = self.handlers.iter().find(|handler| handler.can_handle(method)) {
            return handler.handle(request, transaction).await;
        }

        let allowed = self.registered_methods();
        let allowed_refs: Vec<&str> = allowed.iter().map(String::as_str).collect();
        let mut detail = ResponseDetail::default();
        detail
            .context
            .insert("allowed_methods".to_owned(), serde_json::Value::from(allowed.clone()));
        let response = build_error_response(405, Some(request), Some(&detail), &allowed_refs, "sip-server");
        transaction
            .send_response(response)
            .await
            .map_err(|error| HandlerError { message: format!("failed to send 405: {error}") })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::collaborators::TransactionSendError;

    struct RecordingTransaction {
        sent: Mutex<Vec<SipMessage>>,
    }

    #[async_trait]
    impl crate::collaborators::Transaction for RecordingTransaction {
        fn id(&self) -> &str { "txn-1" }
        fn is_client(&self) -> bool { false }
        async fn send_response(&self, response: SipMessage) -> Result<(), TransactionSendError> {
            self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(response);
            Ok(())
        }
        async fn process_message(&self, _message: SipMessage) -> Result<(), TransactionSendError> { Ok(()) }
    }

    struct StubHandler {
        methods: &'static [&'static str],
    }

    #[async_trait]
    impl MethodHandler for StubHandler {
        fn can_handle(&self, method: &Method) -> bool { self.methods.contains(&method.as_str()) }
        fn advertised_methods(&self) -> &[&str] { self.methods }
        async fn handle(
            &self,
            _request: &SipMessage,
            _transaction: &dyn crate::collaborators::Transaction,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_matching_handler_wins() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(StubHandler { methods: &["INVITE", "ACK", "BYE"] }));
        let request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        let transaction = RecordingTransaction { sent: Mutex::new(Vec::new()) };
        assert!(dispatcher.handle_request(&request, &transaction).await.is_ok());
        assert!(transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
    }

    #[tokio::test]
    async fn no_match_sends_405_with_allow() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(StubHandler { methods: &["INVITE", "ACK", "BYE"] }));
        let request = SipMessage::request(Method::Options, "sip:bob@example.com");
        let transaction = RecordingTransaction { sent: Mutex::new(Vec::new()) };
        assert!(dispatcher.handle_request(&request, &transaction).await.is_ok());
        let sent = transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].headers.first("Allow"), Some("ACK, BYE, INVITE"));
    }

    #[test]
    fn supported_methods_is_union_over_candidate_set() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(StubHandler { methods: &["INVITE", "ACK", "BYE", "CANCEL"] }));
        dispatcher.register(Arc::new(StubHandler { methods: &["OPTIONS", "INFO"] }));
        assert_eq!(
            dispatcher.supported_methods(),
            vec!["INVITE", "ACK", "BYE", "CANCEL", "OPTIONS", "INFO"]
        );
    }
}
