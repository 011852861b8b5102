//! Session Handler: INVITE/ACK/BYE, plus CANCEL (spec.md §4.F,
//! SPEC_FULL.md CANCEL supplement).

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{Registrar, SessionTimerManager, Transaction, TransactionManager};
use crate::dispatch::{HandlerError, MethodHandler};
use crate::handlers::address_of_record;
use crate::message::{Method, SipMessage};
use crate::response::build_error_response;

/// Methods this handler advertises (spec.md §4.F, SPEC_FULL.md CANCEL).
const METHODS: [&str; 4] = ["INVITE", "ACK", "BYE", "CANCEL"];

/// Processes INVITE/ACK/BYE/CANCEL end-to-end against the registrar and
/// session-timer collaborators.
pub struct SessionHandler {
    registrar: Arc<dyn Registrar>,
    session_timer_manager: Arc<dyn SessionTimerManager>,
    transaction_manager: Arc<dyn TransactionManager>,
}

impl SessionHandler {
    /// Construct the handler from its collaborators.
    #[must_use]
    pub fn new(
        registrar: Arc<dyn Registrar>,
        session_timer_manager: Arc<dyn SessionTimerManager>,
        transaction_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self { registrar, session_timer_manager, transaction_manager }
    }

    fn call_id(request: &SipMessage) -> String { request.headers.first("Call-ID").unwrap_or_default().to_owned() }

    fn session_expires_seconds(request: &SipMessage) -> Option<u32> {
        request
            .headers
            .first("Session-Expires")
            .and_then(|value| value.split(';').next().unwrap_or(value).trim().parse::<u32>().ok())
    }

    async fn send_status(
        &self,
        status: u16,
        request: &SipMessage,
        transaction: &dyn Transaction,
    ) -> Result<(), HandlerError> {
        let response = build_error_response(status, Some(request), None, &[], "sip-server");
        transaction
            .send_response(response)
            .await
            .map_err(|error| HandlerError { message: format!("failed to send {status}: {error}") })
    }

    async fn handle_invite(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        let Some(request_uri) = request.request_uri() else {
            return Err(HandlerError { message: "INVITE without a request-URI".to_owned() });
        };
        let aor = address_of_record(request_uri).to_owned();

        let contacts = match self.registrar.find_contacts(&aor).await {
            Ok(contacts) => contacts,
            Err(_) => return self.send_status(500, request, transaction).await,
        };
        if contacts.is_empty() {
            return self.send_status(404, request, transaction).await;
        }

        if let Some(seconds) = Self::session_expires_seconds(request) {
            self.session_timer_manager.create_session(&Self::call_id(request), seconds).await;
        }

        match self.registrar.forward_request(request, &contacts).await {
            Ok(()) => Ok(()),
            Err(_) => self.send_status(500, request, transaction).await,
        }
    }

    async fn handle_ack(&self, request: &SipMessage, _transaction: &dyn Transaction) -> Result<(), HandlerError> {
        let Some(request_uri) = request.request_uri() else {
            return Ok(());
        };
        let aor = address_of_record(request_uri).to_owned();
        if let Ok(contacts) = self.registrar.find_contacts(&aor).await {
            if !contacts.is_empty() {
                let _ = self.registrar.forward_request(request, &contacts).await;
            }
        }
        Ok(())
    }

    async fn handle_bye(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        self.session_timer_manager.remove_session(&Self::call_id(request)).await;

        let Some(request_uri) = request.request_uri() else {
            return self.send_status(200, request, transaction).await;
        };
        let aor = address_of_record(request_uri).to_owned();
        let contacts = match self.registrar.find_contacts(&aor).await {
            Ok(contacts) => contacts,
            Err(_) => return self.send_status(500, request, transaction).await,
        };
        if contacts.is_empty() {
            return self.send_status(200, request, transaction).await;
        }
        match self.registrar.forward_request(request, &contacts).await {
            Ok(()) => Ok(()),
            Err(_) => self.send_status(500, request, transaction).await,
        }
    }

    async fn handle_cancel(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        let matching_invite = self.transaction_manager.find_transaction(request).await;
        let Some(_invite_transaction) = matching_invite else {
            return self.send_status(481, request, transaction).await;
        };

        let Some(request_uri) = request.request_uri() else {
            return Ok(());
        };
        let aor = address_of_record(request_uri).to_owned();
        if let Ok(contacts) = self.registrar.find_contacts(&aor).await {
            if !contacts.is_empty() {
                let _ = self.registrar.forward_request(request, &contacts).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MethodHandler for SessionHandler {
    fn can_handle(&self, method: &Method) -> bool { METHODS.contains(&method.as_str()) }

    fn advertised_methods(&self) -> &[&str] { &METHODS }

    async fn handle(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        match request.method() {
            Some(Method::Invite) => self.handle_invite(request, transaction).await,
            Some(Method::Ack) => self.handle_ack(request, transaction).await,
            Some(Method::Bye) => self.handle_bye(request, transaction).await,
            Some(Method::Cancel) => self.handle_cancel(request, transaction).await,
            _ => Err(HandlerError { message: "session handler invoked for an unsupported method".to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::collaborators::{Contact, RegistrarError, TransactionSendError};

    struct ScriptedRegistrar {
        contacts: Result<Vec<Contact>, ()>,
        forwarded: Mutex<usize>,
    }

    #[async_trait]
    impl Registrar for ScriptedRegistrar {
        async fn find_contacts(&self, _aor: &str) -> Result<Vec<Contact>, RegistrarError> {
            self.contacts.clone().map_err(|()| RegistrarError { message: "registrar down".to_owned() })
        }
        async fn forward_request(&self, _request: &SipMessage, _contacts: &[Contact]) -> Result<(), RegistrarError> {
            *self.forwarded.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
            Ok(())
        }
    }

    struct CountingSessionTimerManager {
        created: Mutex<Vec<(String, u32)>>,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionTimerManager for CountingSessionTimerManager {
        fn is_required(&self, _request: &SipMessage) -> bool { false }
        async fn create_session(&self, call_id: &str, seconds: u32) {
            self.created
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((call_id.to_owned(), seconds));
        }
        async fn remove_session(&self, call_id: &str) {
            self.removed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(call_id.to_owned());
        }
    }

    struct StubTransactionManager {
        found: bool,
    }

    #[async_trait]
    impl TransactionManager for StubTransactionManager {
        async fn find_transaction(&self, _message: &SipMessage) -> Option<Arc<dyn Transaction>> {
            if self.found {
                Some(Arc::new(RecordingTransaction::default()))
            } else {
                None
            }
        }
        async fn create_transaction(&self, _request: &SipMessage) -> Arc<dyn Transaction> {
            Arc::new(RecordingTransaction::default())
        }
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

    fn request(method: Method, call_id: &str) -> SipMessage {
        let mut request = SipMessage::request(method, "sip:bob@example.com");
        request.headers.append("Call-ID", call_id.to_owned());
        request
    }

    fn handler(
        contacts: Result<Vec<Contact>, ()>,
        found_transaction: bool,
    ) -> (SessionHandler, Arc<CountingSessionTimerManager>) {
        let registrar = Arc::new(ScriptedRegistrar { contacts, forwarded: Mutex::new(0) });
        let session_timer = Arc::new(CountingSessionTimerManager {
            created: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        });
        let transaction_manager = Arc::new(StubTransactionManager { found: found_transaction });
        (SessionHandler::new(registrar, session_timer.clone(), transaction_manager), session_timer)
    }

    #[tokio::test]
    async fn invite_with_empty_registrar_sends_404() {
        let (handler, _) = handler(Ok(Vec::new()), false);
        let request = request(Method::Invite, "call-1");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        let sent = transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(sent.len(), 1);
        match &sent[0].start_line {
            crate::message::StartLine::Response { status_code, .. } => assert_eq!(*status_code, 404),
            crate::message::StartLine::Request { .. } => unreachable!(),
        }
    }

    #[tokio::test]
    async fn invite_with_registrar_error_sends_500() {
        let (handler, _) = handler(Err(()), false);
        let request = request(Method::Invite, "call-2");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        let sent = transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &sent[0].start_line {
            crate::message::StartLine::Response { status_code, .. } => assert_eq!(*status_code, 500),
            crate::message::StartLine::Request { .. } => unreachable!(),
        }
    }

    #[tokio::test]
    async fn invite_with_contacts_creates_session_and_forwards_without_response() {
        let (handler, session_timer) = handler(Ok(vec![Contact { uri: "sip:bob@host".to_owned() }]), false);
        let mut request = request(Method::Invite, "call-3");
        request.headers.append("Session-Expires", "1800");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        assert!(transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
        assert_eq!(
            *session_timer.created.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
            vec![("call-3".to_owned(), 1800)]
        );
    }

    #[tokio::test]
    async fn bye_removes_session_exactly_once_and_forwards() {
        let (handler, session_timer) = handler(Ok(vec![Contact { uri: "sip:bob@host".to_owned() }]), false);
        let request = request(Method::Bye, "call-4");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        assert!(transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
        assert_eq!(
            *session_timer.removed.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
            vec!["call-4".to_owned()]
        );
    }

    #[tokio::test]
    async fn bye_with_no_contacts_sends_200() {
        let (handler, _) = handler(Ok(Vec::new()), false);
        let request = request(Method::Bye, "call-5");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        let sent = transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &sent[0].start_line {
            crate::message::StartLine::Response { status_code, .. } => assert_eq!(*status_code, 200),
            crate::message::StartLine::Request { .. } => unreachable!(),
        }
    }

    #[tokio::test]
    async fn cancel_without_matching_invite_sends_481() {
        let (handler, _) = handler(Ok(Vec::new()), false);
        let request = request(Method::Cancel, "call-6");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        let sent = transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &sent[0].start_line {
            crate::message::StartLine::Response { status_code, .. } => assert_eq!(*status_code, 481),
            crate::message::StartLine::Request { .. } => unreachable!(),
        }
    }

    #[tokio::test]
    async fn cancel_with_matching_invite_forwards_without_response() {
        let (handler, _) = handler(Ok(vec![Contact { uri: "sip:bob@host".to_owned() }]), true);
        let request = request(Method::Cancel, "call-7");
        let transaction = RecordingTransaction::default();
        handler.handle(&request, &transaction).await.unwrap();
        assert!(transaction.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
    }

    #[test]
    fn advertises_invite_ack_bye_cancel() {
        let (handler, _) = handler(Ok(Vec::new()), false);
        assert!(handler.can_handle(&Method::Invite));
        assert!(handler.can_handle(&Method::Ack));
        assert!(handler.can_handle(&Method::Bye));
        assert!(handler.can_handle(&Method::Cancel));
        assert!(!handler.can_handle(&Method::Options));
    }
}
