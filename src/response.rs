//! Error Response Builder (spec.md §4.A).
//!
//! Turns a status code plus optional request/detail context into a
//! syntactically valid [`SipMessage`]. This is the only place status-code
//! reason phrases and extension-header augmentation are decided, mirroring
//! the teacher's single `header_util::reply_header` choke point for
//! building replies from an inbound transaction.

use crate::error::DetailedValidationError;
use crate::message::{HeaderMap, SipMessage, StartLine};

/// Product token sent in every synthesized response's `Server` header.
const SERVER_TOKEN: &str = "sip-proxy-core/0.1";

/// The headers copied verbatim from a request onto any response
/// synthesized from it (spec.md §3 invariant, §4.A).
const COPIED_REQUEST_HEADERS: [&str; 5] = ["Via", "From", "To", "Call-ID", "CSeq"];

/// Canonical reason phrase for a status code, per spec.md §6's emitted set.
///
/// Falls back to a generic phrase for any other well-formed code, since
/// validators are free to report any numeric status.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        421 => "Extension Required",
        // Supplemented per SPEC_FULL.md's CANCEL handling: the standard
        // RFC 3261 §9.2 response for a CANCEL with no matching transaction.
        481 => "Call/Transaction Does Not Exist",
        423 => "Interval Too Brief",
        500 => "Server Internal Error",
        503 => "Service Unavailable",
        _ => "Unspecified",
    }
}

/// Diagnostic input to [`build_error_response`], distinct from the
/// pipeline-internal [`DetailedValidationError`] so callers that only have
/// a bare header hint (no full validation error) can still build a
/// response.
#[derive(Debug, Clone, Default)]
pub struct ResponseDetail {
    /// Header-name-keyed hint, e.g. an effective `Min-SE` value as a string.
    pub header_hint: Option<String>,
    /// Context entries consulted for status-specific augmentation
    /// (`min_se`, `allowed_methods`).
    pub context: crate::error::Context,
}

impl ResponseDetail {
    /// Build a detail carrying only a header hint.
    #[must_use]
    pub fn with_hint(hint: impl Into<String>) -> Self {
        Self {
            header_hint: Some(hint.into()),
            context: crate::error::Context::new(),
        }
    }

    fn min_se_value(&self) -> Option<String> {
        self.header_hint.clone().or_else(|| {
            self.context
                .get("min_se")
                .and_then(|value| value.as_u64())
                .map(|value| value.to_string())
        })
    }

    fn allowed_methods(&self) -> Option<String> {
        self.context
            .get("allowed_methods")
            .and_then(|value| value.as_array())
            .map(|methods| {
                methods
                    .iter()
                    .filter_map(|method| method.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
    }
}

impl From<&DetailedValidationError> for ResponseDetail {
    fn from(error: &DetailedValidationError) -> Self {
        Self {
            header_hint: error.error.header_hint.clone(),
            context: error.context.clone(),
        }
    }
}

/// Build a syntactically valid error response (spec.md §4.A).
///
/// When `request` is present, the mandatory headers (Via/From/To/Call-ID/
/// CSeq) are copied verbatim. `Content-Length: 0` and `Server` are always
/// set. `status` drives mandatory extension-header augmentation for 421,
/// 423, 405, and 401.
#[must_use]
pub fn build_error_response(
    status: u16,
    request: Option<&SipMessage>,
    detail: Option<&ResponseDetail>,
    allowed_methods_fallback: &[&str],
    realm: &str,
) -> SipMessage {
    let mut headers = HeaderMap::new();

    if let Some(request) = request {
        for name in COPIED_REQUEST_HEADERS {
            for value in request.headers.all(name) {
                headers.append(name, value.to_owned());
            }
        }
    }

    augment_for_status(&mut headers, status, detail, allowed_methods_fallback, realm);

    headers.set("Content-Length", "0");
    headers.set("Server", SERVER_TOKEN);

    SipMessage {
        start_line: StartLine::Response {
            version: "SIP/2.0".to_owned(),
            status_code: status,
            reason_phrase: reason_phrase(status).to_owned(),
        },
        headers,
        body: Vec::new(),
        transport: request.and_then(|request| request.transport),
        source: request.and_then(|request| request.source),
    }
}

fn augment_for_status(
    headers: &mut HeaderMap,
    status: u16,
    detail: Option<&ResponseDetail>,
    allowed_methods_fallback: &[&str],
    realm: &str,
) {
    match status {
        421 => {
            headers.set("Require", "timer");
            headers.set("Supported", "timer");
        }
        423 => {
            let min_se = detail
                .and_then(ResponseDetail::min_se_value)
                .unwrap_or_else(|| "90".to_owned());
            headers.set("Min-SE", min_se);
        }
        405 => {
            let allow = detail
                .and_then(ResponseDetail::allowed_methods)
                .filter(|allow| !allow.is_empty())
                .unwrap_or_else(|| allowed_methods_fallback.join(", "));
            headers.set("Allow", allow);
        }
        401 => {
            let nonce = generate_nonce();
            headers.set(
                "WWW-Authenticate",
                format!(r#"Digest realm="{realm}", nonce="{nonce}", algorithm=MD5, qop="auth""#),
            );
        }
        _ => {}
    }
}

/// Generate a nonce for a `WWW-Authenticate` challenge.
///
/// Stubbed per spec.md §9 design notes: this counter-based placeholder is
/// NOT cryptographically strong and must not be used in production; a real
/// deployment must bind the nonce to a server-side timestamp/key from a
/// cryptographically strong random source to thwart replay.
fn generate_nonce() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let value = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("nonce-{value:016x}")
}
