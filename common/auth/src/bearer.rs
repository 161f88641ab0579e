const BEARER_PREFIX: &str = "Bearer ";

/// Pull the raw token out of an `Authorization` header value.
///
/// The prefix match is exact and case-sensitive and the remainder is returned
/// untouched; malformed tokens are left for the verifier to reject.
pub fn extract(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix(BEARER_PREFIX)
}
