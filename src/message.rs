//! The SIP message data model the core reads and writes.
//!
//! The byte-level parser and serializer live outside this crate (consumed
//! as [`crate::collaborators::MessageParser`]); this module only defines the
//! in-memory shape every other component operates on.

use std::fmt;
use std::net::SocketAddr;

/// Transport the message arrived on or should be sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Unreliable datagram transport.
    Udp,
    /// Reliable stream transport.
    Tcp,
}

/// The SIP request methods named throughout spec.md's handler registry
/// (§3) and dispatch candidate set (§4.E).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// Establish a session.
    Invite,
    /// Acknowledge a final response to INVITE.
    Ack,
    /// Terminate a session.
    Bye,
    /// Cancel a pending INVITE transaction.
    Cancel,
    /// Register a contact binding.
    Register,
    /// Query server/peer capabilities.
    Options,
    /// In-dialog informational message.
    Info,
    /// Provisional reliability acknowledgement.
    Prack,
    /// Update session parameters mid-dialog.
    Update,
    /// Subscribe to event notifications.
    Subscribe,
    /// Deliver an event notification.
    Notify,
    /// Ask a peer to initiate a new request.
    Refer,
    /// Deliver an instant message.
    Message,
    /// Any token not in the RFC 3261 core/extension set handled above.
    Unknown(String),
}

impl Method {
    /// Parse a method token as it appears in a request line.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "INVITE" => Self::Invite,
            "ACK" => Self::Ack,
            "BYE" => Self::Bye,
            "CANCEL" => Self::Cancel,
            "REGISTER" => Self::Register,
            "OPTIONS" => Self::Options,
            "INFO" => Self::Info,
            "PRACK" => Self::Prack,
            "UPDATE" => Self::Update,
            "SUBSCRIBE" => Self::Subscribe,
            "NOTIFY" => Self::Notify,
            "REFER" => Self::Refer,
            "MESSAGE" => Self::Message,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Render the method as its wire token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Invite => "INVITE",
            Self::Ack => "ACK",
            Self::Bye => "BYE",
            Self::Cancel => "CANCEL",
            Self::Register => "REGISTER",
            Self::Options => "OPTIONS",
            Self::Info => "INFO",
            Self::Prack => "PRACK",
            Self::Update => "UPDATE",
            Self::Subscribe => "SUBSCRIBE",
            Self::Notify => "NOTIFY",
            Self::Refer => "REFER",
            Self::Message => "MESSAGE",
            Self::Unknown(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The request-line or status-line half of a [`SipMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// `<method> <request-uri> SIP/2.0`.
    Request {
        /// Request method.
        method: Method,
        /// Request-URI, verbatim (e.g. `sip:bob@example.com`).
        request_uri: String,
        /// SIP version token, normally `SIP/2.0`.
        version: String,
    },
    /// `SIP/2.0 <status> <reason>`.
    Response {
        /// SIP version token.
        version: String,
        /// Numeric status code.
        status_code: u16,
        /// Reason phrase.
        reason_phrase: String,
    },
}

/// Insertion-ordered, case-insensitive multimap of header name to values.
///
/// Lookup folds case; emission uses the canonical form of whichever name
/// was first inserted for a given header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    /// An empty header map.
    #[must_use]
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    /// Append a value under `name`, preserving insertion order. Reuses an
    /// existing entry (by case-insensitive name) rather than creating a
    /// duplicate.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let folded = name.to_ascii_lowercase();
        if let Some((_, values)) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.to_ascii_lowercase() == folded)
        {
            values.push(value.into());
        } else {
            self.entries.push((name.to_owned(), vec![value.into()]));
        }
    }

    /// Replace all values for `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.append(name, value);
    }

    /// Remove every value stored under `name`.
    pub fn remove(&mut self, name: &str) {
        let folded = name.to_ascii_lowercase();
        self.entries
            .retain(|(existing, _)| existing.to_ascii_lowercase() != folded);
    }

    /// The first value stored under `name`, if any.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.all(name).next()
    }

    /// Every value stored under `name`, in insertion order.
    pub fn all(&self, name: &str) -> impl Iterator<Item = &str> {
        let folded = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(existing, _)| existing.to_ascii_lowercase() == folded)
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }

    /// Whether any value is stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.first(name).is_some() }

    /// Iterate all entries in insertion order, canonical name plus values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Split a comma-separated header value into trimmed tokens.
    ///
    /// Used for `Supported`/`Require`/`Allow`-style headers where a single
    /// value may itself carry a comma-joined list, and for headers that
    /// were appended multiple times.
    #[must_use]
    pub fn tokens(&self, name: &str) -> Vec<String> {
        self.all(name)
            .flat_map(|value| value.split(','))
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Whether `token` appears (case-insensitively) among the comma-joined
    /// values under `name`.
    #[must_use]
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.tokens(name)
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(token))
    }
}

/// The in-memory SIP message every component in this crate operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    /// Request or response start line.
    pub start_line: StartLine,
    /// Headers, case-insensitive on lookup, insertion-ordered on emission.
    pub headers: HeaderMap,
    /// Opaque message body.
    pub body: Vec<u8>,
    /// Transport the message arrived on, stamped by the adapter.
    pub transport: Option<TransportKind>,
    /// Peer address, stamped by the adapter.
    pub source: Option<SocketAddr>,
}

impl SipMessage {
    /// Build a request message with empty headers and body.
    #[must_use]
    pub fn request(method: Method, request_uri: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Request {
                method,
                request_uri: request_uri.into(),
                version: "SIP/2.0".to_owned(),
            },
            headers: HeaderMap::new(),
            body: Vec::new(),
            transport: None,
            source: None,
        }
    }

    /// The request method, if this is a request.
    #[must_use]
    pub const fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    /// The request-URI, if this is a request.
    #[must_use]
    pub fn request_uri(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { request_uri, .. } => Some(request_uri.as_str()),
            StartLine::Response { .. } => None,
        }
    }

    /// Whether this message is a request.
    #[must_use]
    pub const fn is_request(&self) -> bool { matches!(self.start_line, StartLine::Request { .. }) }
}
