//! Transport Adapter (spec.md §4.H).
//!
//! The boundary component: parses raw bytes, stamps transport metadata,
//! finds or creates a transaction, and routes the message through
//! validation and dispatch, guaranteeing that for any well-parseable
//! request either a response was sent or an error was returned to the
//! caller. Mirrors the teacher's `wireframe::routes::process_transaction_bytes`
//! boundary function, generalized from Hotline framing to SIP's
//! parse/validate/dispatch pipeline.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::collaborators::{MessageParser, TransactionManager};
use crate::dispatch::Dispatcher;
use crate::message::TransportKind;
use crate::response::build_error_response;
use crate::validation::ValidationChain;

/// Combined failure from [`TransportAdapter::handle_message`]: a handler
/// or send failure, or a structural adapter-level failure (parse error,
/// stray response, missing transaction).
#[derive(Debug)]
pub enum AdapterError {
    /// The message could not be parsed.
    Parse(crate::collaborators::ParseFailure),
    /// A response arrived with no matching transaction.
    StrayResponse,
    /// The handler failed and the adapter's attempt to send a 500 also
    /// failed.
    HandlerAndSendFailed {
        /// The handler's own failure.
        handler: crate::dispatch::HandlerError,
        /// The failure sending the synthesized 500, if sending was
        /// attempted and failed.
        send: Option<crate::collaborators::TransactionSendError>,
    },
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(error) => write!(f, "parse failure: {error}"),
            Self::StrayResponse => write!(f, "response with no matching transaction"),
            Self::HandlerAndSendFailed { handler, send: Some(send) } => {
                write!(f, "handler failed ({handler}) and sending the 500 also failed ({send})")
            }
            Self::HandlerAndSendFailed { handler, send: None } => write!(f, "handler failed: {handler}"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Wires the parser, transaction manager, validation chain, and
/// dispatcher together at the transport boundary.
pub struct TransportAdapter {
    parser: Arc<dyn MessageParser>,
    transaction_manager: Arc<dyn TransactionManager>,
    validation_chain: ValidationChain,
    dispatcher: Dispatcher,
    realm: String,
}

impl TransportAdapter {
    /// Construct the adapter from its collaborators and the pipeline
    /// stages built elsewhere.
    #[must_use]
    pub fn new(
        parser: Arc<dyn MessageParser>,
        transaction_manager: Arc<dyn TransactionManager>,
        validation_chain: ValidationChain,
        dispatcher: Dispatcher,
        realm: impl Into<String>,
    ) -> Self {
        Self { parser, transaction_manager, validation_chain, dispatcher, realm: realm.into() }
    }

    /// Handle one inbound datagram/segment (spec.md §4.H).
    ///
    /// # Errors
    /// Returns [`AdapterError::Parse`] on a parse failure,
    /// [`AdapterError::StrayResponse`] for a response with no matching
    /// transaction, or [`AdapterError::HandlerAndSendFailed`] when the
    /// matched handler failed (optionally compounded by a failure sending
    /// the synthesized 500).
    pub async fn handle_message(
        &self,
        bytes: &[u8],
        transport_kind: TransportKind,
        source_addr: SocketAddr,
    ) -> Result<(), AdapterError> {
        let mut message = self.parser.parse(bytes).map_err(AdapterError::Parse)?;
        message.transport = Some(transport_kind);
        message.source = Some(source_addr);

        if message.is_request() {
            let transaction = match self.transaction_manager.find_transaction(&message).await {
                Some(transaction) => transaction,
                None => self.transaction_manager.create_transaction(&message).await,
            };

            let validation = self.validation_chain.validate(&message).await;
            if !validation.valid {
                let response = validation.response.unwrap_or_else(|| {
                    let detail = validation.error.as_ref().map(|error| crate::response::ResponseDetail {
                        header_hint: error.header_hint.clone(),
                        context: crate::error::Context::new(),
                    });
                    let status = validation.error.as_ref().map_or(400, |error| error.status_code);
                    build_error_response(status, Some(&message), detail.as_ref(), &[], &self.realm)
                });
                return transaction
                    .send_response(response)
                    .await
                    .map_err(|send| AdapterError::HandlerAndSendFailed {
                        handler: crate::dispatch::HandlerError { message: "validation failed".to_owned() },
                        send: Some(send),
                    });
            }

            if let Err(handler_error) = self.dispatcher.handle_request(&message, transaction.as_ref()).await {
                let response = build_error_response(500, Some(&message), None, &[], &self.realm);
                return transaction.send_response(response).await.map_err(|send| AdapterError::HandlerAndSendFailed {
                    handler: handler_error,
                    send: Some(send),
                });
            }
            Ok(())
        } else {
            let Some(transaction) = self.transaction_manager.find_transaction(&message).await else {
                return Err(AdapterError::StrayResponse);
            };
            transaction
                .process_message(message)
                .await
                .map_err(|send| AdapterError::HandlerAndSendFailed {
                    handler: crate::dispatch::HandlerError { message: "response delivery failed".to_owned() },
                    send: Some(send),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::{ParseFailure, Transaction, TransactionSendError};
    use crate::message::{Method, SipMessage};

    struct StubParser {
        result: Result<SipMessage, ()>,
    }

    impl MessageParser for StubParser {
        fn parse(&self, _bytes: &[u8]) -> Result<SipMessage, ParseFailure> {
            self.result.clone().map_err(|()| ParseFailure { message: "bad bytes".to_owned() })
        }
        fn serialize(&self, _message: &SipMessage) -> Vec<u8> { Vec::new() }
    }

    #[derive(Default)]
    struct RecordingTransaction {
        sent: Mutex<Vec<SipMessage>>,
    }

    #[async_trait]
    impl Transaction for RecordingTransaction {
        fn id(&self) -> &str { "txn-1" }
        fn is_client(&self) -> bool { false }
        async fn send_response(&self, response: SipMessage) -> Result<(), TransactionSendError> {
            self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(response);
            Ok(())
        }
        async fn process_message(&self, _message: SipMessage) -> Result<(), TransactionSendError> { Ok(()) }
    }

    struct StubTransactionManager;

    #[async_trait]
    impl TransactionManager for StubTransactionManager {
        async fn find_transaction(&self, _message: &SipMessage) -> Option<Arc<dyn Transaction>> { None }
        async fn create_transaction(&self, _request: &SipMessage) -> Arc<dyn Transaction> {
            Arc::new(RecordingTransaction::default())
        }
    }

    fn complete_invite() -> SipMessage {
        let mut request = SipMessage::request(Method::Invite, "sip:bob@example.com");
        request.headers.append("Via", "SIP/2.0/UDP pc1;branch=z9hG4bKabc");
        request.headers.append("From", "<sip:alice@example.com>;tag=1");
        request.headers.append("To", "<sip:bob@example.com>");
        request.headers.append("Call-ID", "abc123");
        request.headers.append("CSeq", "1 INVITE");
        request
    }

    #[tokio::test]
    async fn parse_failure_surfaces_as_adapter_error() {
        let adapter = TransportAdapter::new(
            Arc::new(StubParser { result: Err(()) }),
            Arc::new(StubTransactionManager),
            ValidationChain::new(),
            Dispatcher::new(),
            "sip-server",
        );
        let result = adapter
            .handle_message(b"garbage", TransportKind::Udp, "127.0.0.1:5060".parse().unwrap())
            .await;
        assert!(matches!(result, Err(AdapterError::Parse(_))));
    }

    #[tokio::test]
    async fn stray_response_is_reported() {
        let response = SipMessage {
            start_line: crate::message::StartLine::Response {
                version: "SIP/2.0".to_owned(),
                status_code: 200,
                reason_phrase: "OK".to_owned(),
            },
            headers: crate::message::HeaderMap::new(),
            body: Vec::new(),
            transport: None,
            source: None,
        };
        let adapter = TransportAdapter::new(
            Arc::new(StubParser { result: Ok(response) }),
            Arc::new(StubTransactionManager),
            ValidationChain::new(),
            Dispatcher::new(),
            "sip-server",
        );
        let result = adapter
            .handle_message(b"SIP/2.0 200 OK\r\n\r\n", TransportKind::Udp, "127.0.0.1:5060".parse().unwrap())
            .await;
        assert!(matches!(result, Err(AdapterError::StrayResponse)));
    }

    #[tokio::test]
    async fn request_with_no_handler_still_sends_a_response() {
        let adapter = TransportAdapter::new(
            Arc::new(StubParser { result: Ok(complete_invite()) }),
            Arc::new(StubTransactionManager),
            ValidationChain::new(),
            Dispatcher::new(),
            "sip-server",
        );
        let result = adapter
            .handle_message(b"INVITE sip:bob@example.com SIP/2.0\r\n\r\n", TransportKind::Udp, "127.0.0.1:5060".parse().unwrap())
            .await;
        assert!(result.is_ok());
    }
}
