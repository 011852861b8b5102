//! Sanitization rules for anything that might reach a log sink
//! (spec.md §4.I "Sanitization").

use crate::message::SipMessage;

/// Headers allowed into a debug-mode header snapshot; everything else is
/// dropped. `Authorization` is not in this list — it is handled
/// separately by [`header_snapshot`], which always redacts rather than
/// drops it (spec.md §4.I).
pub const DEBUG_HEADER_WHITELIST: [&str; 12] = [
    "Via", "From", "To", "Call-ID", "CSeq", "Content-Type", "Content-Length", "Session-Expires",
    "Min-SE", "Supported", "Require", "Allow",
];

/// Longer whitelist variant including Contact/Expires, matching the full
/// list spec.md §4.I enumerates (kept distinct from
/// [`DEBUG_HEADER_WHITELIST`] only for readability of the 12-vs-14 split
/// above; both are consulted together by [`header_snapshot`]).
const DEBUG_HEADER_WHITELIST_EXTRA: [&str; 2] = ["Contact", "Expires"];

/// Cap applied to sanitized message previews.
const PREVIEW_CAP: usize = 200;

/// Build a sanitized, whitelisted header snapshot for debug logging.
/// `Authorization`'s raw value is never included; when the header is
/// present its value is replaced with [`redacted_authorization_marker`]
/// so a debug snapshot still shows the header existed.
#[must_use]
pub fn header_snapshot(message: &SipMessage) -> Vec<(String, String)> {
    let mut snapshot = Vec::new();
    for name in DEBUG_HEADER_WHITELIST.iter().chain(DEBUG_HEADER_WHITELIST_EXTRA.iter()) {
        for value in message.headers.all(name) {
            snapshot.push(((*name).to_owned(), sanitize_value(value)));
        }
    }
    if message.headers.contains("Authorization") {
        snapshot.push(("Authorization".to_owned(), redacted_authorization_marker().to_owned()));
    }
    snapshot
}

/// Mask `password=...`/`response=...` substrings up to the next
/// whitespace, comma, or end of string.
#[must_use]
pub fn sanitize_value(value: &str) -> String {
    mask_sensitive_substrings(value)
}

fn mask_sensitive_substrings(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    loop {
        let Some(position) = find_sensitive_key(rest) else {
            result.push_str(rest);
            break;
        };
        let (key_start, key_len) = position;
        result.push_str(&rest[..key_start + key_len]);
        result.push_str("***");
        let after_key = &rest[key_start + key_len..];
        let end = after_key.find([',', ' ', '\t']).unwrap_or(after_key.len());
        rest = &after_key[end..];
    }
    result
}

fn find_sensitive_key(text: &str) -> Option<(usize, usize)> {
    for key in ["password=", "response="] {
        if let Some(index) = text.find(key) {
            return Some((index, key.len()));
        }
    }
    None
}

/// Cap a preview string at [`PREVIEW_CAP`] characters and escape CR/LF
/// (spec.md §4.I).
#[must_use]
pub fn sanitize_preview(raw: &str) -> String {
    let escaped = raw.replace('\r', "\\r").replace('\n', "\\n");
    escaped.chars().take(PREVIEW_CAP).collect()
}

/// Never emit raw `Authorization` values; replace with a fixed
/// placeholder indicating only that the header was present.
#[must_use]
pub fn redacted_authorization_marker() -> &'static str { "<redacted>" }

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::message::Method;

    #[rstest]
    fn masks_password_and_response_substrings() {
        let value = r#"Digest username="bob", response="abcdef", password=hunter2"#;
        let sanitized = sanitize_value(value);
        assert!(!sanitized.contains("abcdef"));
        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("response=***"));
        assert!(sanitized.contains("password=***"));
    }

    #[rstest]
    fn preview_caps_length_and_escapes_newlines() {
        let raw = format!("{}\r\n{}", "a".repeat(250), "trailer");
        let preview = sanitize_preview(&raw);
        assert_eq!(preview.chars().count(), PREVIEW_CAP);
        assert!(!preview.contains('\r'));
        assert!(!preview.contains('\n'));
    }

    #[rstest]
    fn header_snapshot_redacts_authorization_instead_of_leaking_it() {
        let mut message = SipMessage::request(Method::Invite, "sip:bob@example.com");
        message.headers.append("Authorization", "Digest response=\"abcdef\"");
        message.headers.append("Via", "SIP/2.0/UDP pc1;branch=z9hG4bKabc");
        let snapshot = header_snapshot(&message);
        let authorization = snapshot.iter().find(|(name, _)| name.eq_ignore_ascii_case("authorization"));
        assert_eq!(authorization.map(|(_, value)| value.as_str()), Some(redacted_authorization_marker()));
        assert!(snapshot.iter().any(|(name, _)| name == "Via"));
    }

    #[rstest]
    fn header_snapshot_omits_authorization_when_absent() {
        let mut message = SipMessage::request(Method::Invite, "sip:bob@example.com");
        message.headers.append("Via", "SIP/2.0/UDP pc1;branch=z9hG4bKabc");
        let snapshot = header_snapshot(&message);
        assert!(snapshot.iter().all(|(name, _)| !name.eq_ignore_ascii_case("authorization")));
    }

    #[rstest]
    fn header_snapshot_excludes_non_whitelisted_headers() {
        let mut message = SipMessage::request(Method::Invite, "sip:bob@example.com");
        message.headers.append("X-Custom-Secret", "top-secret");
        let snapshot = header_snapshot(&message);
        assert!(snapshot.is_empty());
    }
}
