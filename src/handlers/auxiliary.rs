//! Auxiliary Handler: OPTIONS and INFO (spec.md §4.G).

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{Registrar, Transaction};
use crate::dispatch::{HandlerError, MethodHandler};
use crate::handlers::address_of_record;
use crate::message::{HeaderMap, Method, SipMessage, StartLine};
use crate::response::build_error_response;

/// Methods this handler advertises (spec.md §4.G).
const METHODS: [&str; 2] = ["OPTIONS", "INFO"];

/// Domains this server answers OPTIONS for directly, rather than
/// forwarding as a proxy.
///
/// spec.md §9 design notes flag the source's `isRequestForServer` check
/// as hard-coded string matching against two domains; real deployments
/// must compare against a configured local-domain set. We preserve the
/// flagged behavior rather than re-specify it.
const LOCAL_DOMAINS: [&str; 2] = ["test.local", "sipserver.local"];

fn is_request_for_server(request_uri: &str) -> bool {
    let aor = address_of_record(request_uri);
    aor.rsplit('@').next().is_some_and(|domain| LOCAL_DOMAINS.contains(&domain))
}

/// Handles OPTIONS (server capability advertisement or proxied) and INFO
/// (in-dialog forwarding).
pub struct AuxiliaryHandler {
    registrar: Arc<dyn Registrar>,
    supported_methods: Vec<String>,
}

impl AuxiliaryHandler {
    /// Construct the handler against the registrar collaborator and the
    /// methods to advertise in a server-OPTIONS `Allow` header.
    #[must_use]
    pub fn new(registrar: Arc<dyn Registrar>, supported_methods: Vec<String>) -> Self {
        Self { registrar, supported_methods }
    }

    fn server_capabilities_response(&self, request: &SipMessage) -> SipMessage {
        let mut headers = HeaderMap::new();
        for name in ["Via", "From", "To", "Call-ID", "CSeq"] {
            for value in request.headers.all(name) {
                headers.append(name, value.to_owned());
            }
        }
        headers.set("Allow", self.supported_methods.join(", "));
        headers.set("Supported", "timer, replaces");
        headers.set("Accept", "application/sdp, text/plain");
        headers.set("Accept-Encoding", "gzip");
        headers.set("Accept-Language", "en");
        headers.set("Server", "sip-proxy-core/0.1");
        headers.set("Content-Length", "0");

        SipMessage {
            start_line: StartLine::Response {
                version: "SIP/2.0".to_owned(),
                status_code: 200,
                reason_phrase: "OK".to_owned(),
            },
            headers,
            body: Vec::new(),
            transport: request.transport,
            source: request.source,
        }
    }

    async fn handle_options(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        let targets_server = request.request_uri().is_some_and(is_request_for_server);

        if targets_server {
            let response = self.server_capabilities_response(request);
            return transaction
                .send_response(response)
                .await
                .map_err(|error| HandlerError { message: format!("failed to send OPTIONS response: {error}") });
        }

        let Some(request_uri) = request.request_uri() else {
            return Err(HandlerError { message: "OPTIONS without a request-URI".to_owned() });
        };
        let aor = address_of_record(request_uri).to_owned();
        let contacts = match self.registrar.find_contacts(&aor).await {
            Ok(contacts) => contacts,
            Err(_) => return self.send_status(500, request, transaction).await,
        };
        if contacts.is_empty() {
            return self.send_status(404, request, transaction).await;
        }
        match self.registrar.forward_request(request, &contacts).await {
            Ok(()) => Ok(()),
            Err(_) => self.send_status(500, request, transaction).await,
        }
    }

    async fn handle_info(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        let Some(request_uri) = request.request_uri() else {
            return self.send_status(404, request, transaction).await;
        };
        let aor = address_of_record(request_uri).to_owned();
        let contacts = match self.registrar.find_contacts(&aor).await {
            Ok(contacts) => contacts,
            Err(_) => return self.send_status(500, request, transaction).await,
        };
        if contacts.is_empty() {
            return self.send_status(404, request, transaction).await;
        }
        match self.registrar.forward_request(request, &contacts).await {
            Ok(()) => Ok(()),
            Err(_) => self.send_status(500, request, transaction).await,
        }
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
}

#[async_trait]
impl MethodHandler for AuxiliaryHandler {
    fn can_handle(&self, method: &Method) -> bool { METHODS.contains(&method.as_str()) }

    fn advertised_methods(&self) -> &[&str] { &METHODS }

    async fn handle(&self, request: &SipMessage, transaction: &dyn Transaction) -> Result<(), HandlerError> {
        match request.method() {
            Some(Method::Options) => self.handle_options(request, transaction).await,
            Some(Method::Info) => self.handle_info(request, transaction).await,
            _ => Err(HandlerError { message: "auxiliary handler invoked for an unsupported method".to_owned() }),
        }
    }
}
