//! Malformed-Message Detector (spec.md §4.B).
//!
//! Scans raw bytes independently of the parser so that even an unparseable
//! message can still produce a 400 with diagnostic hints. Nothing here
//! touches [`crate::message::SipMessage`] — by design it runs before (or
//! instead of) parsing succeeds.

use crate::error::{FaultLocation, MalformedMessageError, MalformedMessageKind};
use crate::message::SipMessage;
use crate::response::{build_error_response, ResponseDetail};

const KNOWN_METHODS: [&str; 13] = [
    "INVITE", "ACK", "BYE", "CANCEL", "REGISTER", "OPTIONS", "INFO", "PRACK", "UPDATE",
    "SUBSCRIBE", "NOTIFY", "REFER", "MESSAGE",
];

/// Run every structural check over `raw` and return the faults found, in
/// the order the checks ran (empty when the message is well-formed).
#[must_use]
pub fn detect_malformed(raw: &[u8]) -> Vec<MalformedMessageError> {
    let mut faults = Vec::new();

    check_encoding(raw, &mut faults);
    let text = String::from_utf8_lossy(raw);
    let (header_region, lines) = split_header_region(&text);
    check_line_endings(&text, &lines, &mut faults);
    check_start_line(&lines, &mut faults);
    check_header_syntax_and_values(&lines, &mut faults);
    let _ = header_region;

    faults
}

fn check_encoding(raw: &[u8], faults: &mut Vec<MalformedMessageError>) {
    let header_end = find_header_region_end(raw).unwrap_or(raw.len());
    let header_bytes = raw.get(..header_end).unwrap_or(raw);
    if header_bytes.contains(&0) {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::Encoding,
            description: "header region contains a null byte".to_owned(),
            location: FaultLocation::Region(0, header_end),
            suggestion: "remove embedded NUL bytes".to_owned(),
        });
    } else if header_bytes.iter().any(u8::is_ascii_ignore_non_ascii) {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::Encoding,
            description: "header region contains non-ASCII bytes".to_owned(),
            location: FaultLocation::Region(0, header_end),
            suggestion: "encode header values as ASCII".to_owned(),
        });
    }
}

trait AsciiCheck {
    fn is_ascii_ignore_non_ascii(&self) -> bool;
}

impl AsciiCheck for u8 {
    fn is_ascii_ignore_non_ascii(&self) -> bool { !self.is_ascii() }
}

fn find_header_region_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
        .or_else(|| raw.windows(2).position(|window| window == b"\n\n").map(|position| position + 2))
}

/// Split `text` into the header-region lines (up to, not including, the
/// first blank line) using the raw `\n`-delimited view so a missing `\r`
/// is still visible to [`check_line_endings`].
fn split_header_region<'a>(text: &'a str) -> (&'a str, Vec<&'a str>) {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let trimmed_cr = line.strip_suffix('\r').unwrap_or(line);
        if trimmed_cr.is_empty() {
            break;
        }
        lines.push(line);
    }
    (text, lines)
}

fn check_line_endings(text: &str, lines: &[&str], faults: &mut Vec<MalformedMessageError>) {
    if text.is_empty() {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::LineEnding,
            description: "message is empty".to_owned(),
            location: FaultLocation::Region(0, 0),
            suggestion: "send a non-empty request or response".to_owned(),
        });
        return;
    }
    for (index, line) in lines.iter().enumerate() {
        if !line.ends_with('\r') {
            faults.push(MalformedMessageError {
                kind: MalformedMessageKind::LineEnding,
                description: format!("line {index} does not end with CRLF"),
                location: FaultLocation::Line(index),
                suggestion: "terminate every header line with CRLF".to_owned(),
            });
        }
    }
}

fn strip_cr(line: &str) -> &str { line.strip_suffix('\r').unwrap_or(line) }

fn check_start_line(lines: &[&str], faults: &mut Vec<MalformedMessageError>) {
    let Some(first) = lines.first() else {
        return;
    };
    let start_line = strip_cr(first);
    let tokens: Vec<&str> = start_line.split(' ').collect();
    let Ok([first_token, second_token, third_token]) = <[&str; 3]>::try_from(tokens) else {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: "start line must split into exactly three tokens".to_owned(),
            location: FaultLocation::Line(0),
            suggestion: "use \"<method> <uri> SIP/2.0\" or \"SIP/2.0 <status> <reason>\"".to_owned(),
        });
        return;
    };

    if first_token == "SIP/2.0" {
        check_response_start_line(second_token, third_token, faults);
    } else {
        check_request_start_line(first_token, second_token, third_token, faults);
    }
}

fn check_request_start_line(
    method: &str,
    request_uri: &str,
    version: &str,
    faults: &mut Vec<MalformedMessageError>,
) {
    if !KNOWN_METHODS.contains(&method) {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: format!("unknown method token \"{method}\""),
            location: FaultLocation::Line(0),
            suggestion: "use a method from the RFC 3261 core/extension set".to_owned(),
        });
    }
    if !(request_uri.starts_with("sip:") || request_uri.starts_with("sips:")) {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: "request-URI must begin with \"sip:\" or \"sips:\"".to_owned(),
            location: FaultLocation::Line(0),
            suggestion: "prefix the request-URI with a sip or sips scheme".to_owned(),
        });
    }
    if version != "SIP/2.0" {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: format!("unexpected version token \"{version}\""),
            location: FaultLocation::Line(0),
            suggestion: "use version token \"SIP/2.0\"".to_owned(),
        });
    }
}

fn check_response_start_line(status: &str, reason: &str, faults: &mut Vec<MalformedMessageError>) {
    let status_valid = status.len() == 3
        && status.chars().all(|ch| ch.is_ascii_digit())
        && status.parse::<u16>().is_ok_and(|code| (100..=699).contains(&code));
    if !status_valid {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: format!("status code \"{status}\" is not a three-digit value in 100-699"),
            location: FaultLocation::Line(0),
            suggestion: "use a three-digit status code between 100 and 699".to_owned(),
        });
    }
    if reason.is_empty() {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::StartLine,
            description: "reason phrase must not be empty".to_owned(),
            location: FaultLocation::Line(0),
            suggestion: "provide a reason phrase".to_owned(),
        });
    }
}

fn check_header_syntax_and_values(lines: &[&str], faults: &mut Vec<MalformedMessageError>) {
    for (index, line) in lines.iter().enumerate().skip(1) {
        let line = strip_cr(line);
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            faults.push(MalformedMessageError {
                kind: MalformedMessageKind::Header,
                description: format!("line {index} has no \":\" separator"),
                location: FaultLocation::Line(index),
                suggestion: "use \"Header-Name: value\" syntax".to_owned(),
            });
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_graphic()) {
            faults.push(MalformedMessageError {
                kind: MalformedMessageKind::Header,
                description: format!("line {index} has an invalid header name"),
                location: FaultLocation::Line(index),
                suggestion: "use a non-empty, visible-ASCII header name".to_owned(),
            });
            continue;
        }
        check_header_value(name, value.trim(), index, faults);
    }
}

fn check_header_value(name: &str, value: &str, index: usize, faults: &mut Vec<MalformedMessageError>) {
    let folded = name.to_ascii_lowercase();
    let ok = match folded.as_str() {
        "content-length" => value.parse::<u64>().is_ok(),
        "cseq" => {
            let mut parts = value.splitn(2, ' ');
            let number_ok = parts.next().is_some_and(|number| number.parse::<u64>().is_ok());
            let method_ok = parts.next().is_some_and(|method| !method.trim().is_empty());
            number_ok && method_ok
        }
        "max-forwards" => value.parse::<u64>().is_ok(),
        "via" => value.starts_with("SIP/2.0/") && value.contains("branch="),
        _ => true,
    };
    if !ok {
        faults.push(MalformedMessageError {
            kind: MalformedMessageKind::HeaderValue,
            description: format!("header \"{name}\" has an invalid value"),
            location: FaultLocation::Line(index),
            suggestion: format!("check the \"{name}\" value syntax"),
        });
    }
}

/// `GenerateMalformedMessageResponse` (spec.md §4.B): `None` when `errors`
/// is empty, otherwise a 400 whose detail aggregates every fault
/// description (for local diagnostics; never sent on the wire verbatim).
#[must_use]
pub fn generate_malformed_message_response(
    errors: &[MalformedMessageError],
    request: Option<&SipMessage>,
) -> Option<SipMessage> {
    if errors.is_empty() {
        return None;
    }
    Some(build_error_response(400, request, Option::<&ResponseDetail>::None, &[], "sip-server"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn empty_message_yields_at_least_one_fault() {
        let faults = detect_malformed(b"");
        assert!(!faults.is_empty());
        let response = generate_malformed_message_response(&faults, None);
        assert!(response.is_some());
    }

    #[rstest]
    fn well_formed_invite_yields_no_faults() {
        let raw = b"INVITE sip:bob@example.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc1.example.com;branch=z9hG4bKabc\r\n\
From: <sip:alice@example.com>;tag=1\r\n\
To: <sip:bob@example.com>\r\n\
Call-ID: abc123@pc1.example.com\r\n\
CSeq: 1 INVITE\r\n\
Max-Forwards: 70\r\n\
Content-Length: 0\r\n\r\n";
        assert!(detect_malformed(raw).is_empty());
    }

    #[rstest]
    fn bare_lf_is_a_line_ending_fault() {
        let raw = b"INVITE sip:bob@example.com SIP/2.0\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\r\n\r\n";
        let faults = detect_malformed(raw);
        assert!(faults.iter().any(|fault| fault.kind == MalformedMessageKind::LineEnding));
    }

    #[rstest]
    fn unknown_method_is_a_start_line_fault() {
        let raw = b"FROBNICATE sip:bob@example.com SIP/2.0\r\n\r\n";
        let faults = detect_malformed(raw);
        assert!(faults.iter().any(|fault| fault.kind == MalformedMessageKind::StartLine));
    }

    #[rstest]
    fn header_without_colon_is_a_header_fault() {
        let raw = b"INVITE sip:bob@example.com SIP/2.0\r\nNotAHeader\r\n\r\n";
        let faults = detect_malformed(raw);
        assert!(faults.iter().any(|fault| fault.kind == MalformedMessageKind::Header));
    }

    #[rstest]
    #[case(b"Content-Length: not-a-number\r\n")]
    #[case(b"CSeq: abc INVITE\r\n")]
    #[case(b"Via: TCP/whatever\r\n")]
    fn invalid_header_values_are_flagged(#[case] header_line: &[u8]) {
        let mut raw = b"INVITE sip:bob@example.com SIP/2.0\r\n".to_vec();
        raw.extend_from_slice(header_line);
        raw.extend_from_slice(b"\r\n");
        let faults = detect_malformed(&raw);
        assert!(faults.iter().any(|fault| fault.kind == MalformedMessageKind::HeaderValue));
    }

    #[rstest]
    fn null_byte_is_an_encoding_fault() {
        let raw = b"INVITE sip:bob@example.com SIP/2.0\r\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\0\r\n\r\n";
        let faults = detect_malformed(raw);
        assert!(faults.iter().any(|fault| fault.kind == MalformedMessageKind::Encoding));
    }
}
