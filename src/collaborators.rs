//! External collaborator interfaces (spec.md §6).
//!
//! Everything in this module is a seam: the raw-byte parser, the
//! transport, the transaction state machine, the registrar/user/session
//! databases, and the Digest authenticator all live outside this crate.
//! The validation chain, dispatcher, and handlers depend only on these
//! traits, never on a concrete implementation, matching the teacher's
//! pattern of depending on `wireframe::middleware::{Service, Transform}`
//! trait objects rather than a specific transport (see
//! `src/wireframe/routes/mod.rs`'s `TransactionMiddleware`).

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{SipMessage, TransportKind};

/// Parses raw bytes into a [`SipMessage`] and serializes one back to bytes.
///
/// Implemented outside this crate; out of scope per spec.md §1.
pub trait MessageParser: Send + Sync {
    /// Parse a complete message from `bytes`.
    ///
    /// # Errors
    /// Returns an error describing why the bytes could not be parsed.
    fn parse(&self, bytes: &[u8]) -> Result<SipMessage, ParseFailure>;

    /// Serialize `message` back to wire bytes.
    fn serialize(&self, message: &SipMessage) -> Vec<u8>;
}

/// Opaque parse failure surfaced by [`MessageParser::parse`].
///
/// `thiserror`-derived, the teacher's own convention for collaborator-facing
/// errors (see `transaction::TransactionError`) — distinct from the plain,
/// peer-facing data types in [`crate::error`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Human-readable description of the failure.
    pub message: String,
}

/// A single SIP transaction (RFC 3261 §17), owned by the transport layer.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Stable transaction identifier.
    fn id(&self) -> &str;

    /// Whether this transaction is on the client (requesting) side.
    fn is_client(&self) -> bool;

    /// Send a response on this transaction.
    ///
    /// # Errors
    /// Returns an error if the response could not be sent (e.g. the
    /// connection was lost).
    async fn send_response(&self, response: SipMessage) -> Result<(), TransactionSendError>;

    /// Feed an in-flight message (typically a response) into the state
    /// machine.
    ///
    /// # Errors
    /// Returns an error if the message does not belong to this
    /// transaction or the state machine rejects it.
    async fn process_message(&self, message: SipMessage) -> Result<(), TransactionSendError>;
}

/// Failure sending or processing a message on a transaction.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransactionSendError {
    /// Human-readable description of the failure.
    pub message: String,
}

/// Looks up or creates [`Transaction`] instances for inbound messages.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Find the transaction this message belongs to, if any.
    async fn find_transaction(
        &self,
        message: &SipMessage,
    ) -> Option<std::sync::Arc<dyn Transaction>>;

    /// Create a new transaction for an inbound request.
    async fn create_transaction(&self, request: &SipMessage) -> std::sync::Arc<dyn Transaction>;
}

/// Registers handlers with, and hands outbound bytes to, the transport.
#[async_trait]
pub trait TransportManager: Send + Sync {
    /// Send raw bytes to `addr` over `kind`.
    ///
    /// # Errors
    /// Returns an error if the bytes could not be sent.
    async fn send(
        &self,
        bytes: &[u8],
        kind: TransportKind,
        addr: SocketAddr,
    ) -> Result<(), TransactionSendError>;
}

/// Outcome of delegating Digest authentication to the user/credential
/// database (spec.md §4.D, `AuthenticationValidator`).
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// Present when the request must be challenged or was already
    /// challenged and rejected.
    pub challenge_response: Option<ChallengeResponse>,
    /// The authenticated user, when credentials were accepted.
    pub user: Option<String>,
}

/// A challenge that should be (or was) issued to the peer.
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    /// Realm to advertise in `WWW-Authenticate`.
    pub realm: String,
}

/// Digest authentication processor (RFC 2617), out of scope per spec.md §1.
#[async_trait]
pub trait AuthProcessor: Send + Sync {
    /// Process an incoming request's credentials (or lack thereof).
    ///
    /// # Errors
    /// Returns an error when the processor itself fails (not when
    /// credentials are merely absent or rejected — those are represented
    /// in the returned [`AuthOutcome`]).
    async fn process_incoming(&self, request: &SipMessage) -> Result<AuthOutcome, AuthError>;
}

/// Internal failure of the authentication processor.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AuthError {
    /// Human-readable description, never sent to the peer (spec.md §7).
    pub message: String,
}

/// A registered contact for an Address-of-Record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Contact URI, e.g. `sip:bob@192.0.2.4:5060`.
    pub uri: String,
}

/// Registrar contact store, out of scope per spec.md §1.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Look up the contacts registered for `aor`.
    ///
    /// # Errors
    /// Returns an error on registrar/store failure (not on an empty
    /// result, which is a plain empty `Vec`).
    async fn find_contacts(&self, aor: &str) -> Result<Vec<Contact>, RegistrarError>;

    /// Forward `request` to `contacts` as a proxy would.
    ///
    /// # Errors
    /// Returns an error if forwarding fails.
    async fn forward_request(
        &self,
        request: &SipMessage,
        contacts: &[Contact],
    ) -> Result<(), RegistrarError>;
}

/// Registrar or forwarding failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RegistrarError {
    /// Human-readable description of the failure.
    pub message: String,
}

/// RFC 4028 session-timer lifecycle manager, out of scope per spec.md §1.
#[async_trait]
pub trait SessionTimerManager: Send + Sync {
    /// Whether the server mandates the session-timer extension for `request`.
    fn is_required(&self, request: &SipMessage) -> bool;

    /// Record that a session timer of `seconds` has been negotiated for
    /// `call_id`.
    async fn create_session(&self, call_id: &str, seconds: u32);

    /// Tear down any session timer tracked for `call_id`.
    async fn remove_session(&self, call_id: &str);
}
