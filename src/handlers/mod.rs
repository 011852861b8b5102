//! Method-specific handlers (spec.md §4.F, §4.G, SPEC_FULL.md CANCEL
//! supplement).

pub mod auxiliary;
pub mod session;

/// Strip a SIP/SIPS Request-URI down to its bare Address-of-Record:
/// drop the `sip:`/`sips:` scheme and everything from the first `;` or
/// `?` onward (spec.md §4.F).
#[must_use]
pub fn address_of_record(request_uri: &str) -> &str {
    let without_scheme = request_uri
        .strip_prefix("sips:")
        .or_else(|| request_uri.strip_prefix("sip:"))
        .unwrap_or(request_uri);
    let cut = without_scheme
        .find(|ch| ch == ';' || ch == '?')
        .unwrap_or(without_scheme.len());
    without_scheme.get(..cut).unwrap_or(without_scheme)
}
