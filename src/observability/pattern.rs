//! Error-pattern extraction (spec.md §4.I "Pattern extraction").
//!
//! Intentionally lossy, single-pass normalization rather than repeated
//! substring replacement (spec.md §9 design notes); the only observable
//! contract is idempotence (spec.md §8 invariant 8).

/// Canonicalized template plus the faults that collapsed into it
/// (spec.md §3 `ErrorPattern`).
#[derive(Debug, Clone)]
pub struct ErrorPattern {
    /// The canonicalized pattern string.
    pub pattern_string: String,
    /// Count of errors collapsing to this pattern.
    pub count: u64,
    /// Timestamp of the most recent occurrence.
    pub last_seen: chrono::DateTime<chrono::Utc>,
    /// Up to five example raw messages (spec.md §3, §8 invariant 6).
    pub example_list: Vec<String>,
    /// Severity, mirrored from the triggering [`crate::error::ErrorKind`]
    /// log level.
    pub severity: tracing::Level,
}

const MAX_EXAMPLES: usize = 5;

impl ErrorPattern {
    /// Start a new pattern entry from its first sighting.
    #[must_use]
    pub fn new(pattern_string: String, example: String, severity: tracing::Level, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self { pattern_string, count: 1, last_seen: now, example_list: vec![example], severity }
    }

    /// Record another occurrence, retaining up to
    /// [`MAX_EXAMPLES`] example messages.
    pub fn record(&mut self, example: String, now: chrono::DateTime<chrono::Utc>) {
        self.count += 1;
        self.last_seen = now;
        if self.example_list.len() < MAX_EXAMPLES {
            self.example_list.push(example);
        }
    }
}

/// Normalize a raw error message into its pattern string
/// (spec.md §4.I):
/// - every decimal digit becomes `N`.
/// - `sip:`/`sips:` URIs become `sip:USER@DOMAIN`.
/// - private-IP dotted prefixes (`10.`, `172.`, `192.`) become `IP.`.
#[must_use]
pub fn extract_pattern(message: &str) -> String {
    let with_uris = replace_sip_uris(message);
    let with_ips = replace_private_ip_prefixes(&with_uris);
    replace_digits(&with_ips)
}

fn replace_digits(input: &str) -> String {
    input.chars().map(|ch| if ch.is_ascii_digit() { 'N' } else { ch }).collect()
}

fn replace_sip_uris(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        let Some(scheme_start) = find_sip_scheme(rest) else {
            result.push_str(rest);
            break;
        };
        let (start, scheme_len) = scheme_start;
        result.push_str(&rest[..start]);
        result.push_str("sip:USER@DOMAIN");
        let after_scheme = &rest[start + scheme_len..];
        let end = after_scheme
            .find(|ch: char| ch.is_whitespace() || ch == ',' || ch == ';' || ch == '>' || ch == '"')
            .unwrap_or(after_scheme.len());
        rest = &after_scheme[end..];
    }
    result
}

fn find_sip_scheme(text: &str) -> Option<(usize, usize)> {
    for scheme in ["sips:", "sip:"] {
        if let Some(index) = text.find(scheme) {
            return Some((index, scheme.len()));
        }
    }
    None
}

fn replace_private_ip_prefixes(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        let Some(index) = find_private_prefix(rest) else {
            result.push_str(rest);
            break;
        };
        let (start, prefix_len) = index;
        result.push_str(&rest[..start]);
        result.push_str("IP.");
        let after_prefix = &rest[start + prefix_len..];
        let end = after_prefix.find(|ch: char| !(ch.is_ascii_digit() || ch == '.')).unwrap_or(after_prefix.len());
        rest = &after_prefix[end..];
    }
    result
}

fn find_private_prefix(text: &str) -> Option<(usize, usize)> {
    for prefix in ["10.", "172.", "192."] {
        if let Some(index) = text.find(prefix) {
            return Some((index, prefix.len()));
        }
    }
    None
}
