//! URL helpers for building endpoint URLs from a configured base URL.

/// Join an endpoint path onto a base URL, tolerating stray slashes on
/// either side so the result never contains doubled separators.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
