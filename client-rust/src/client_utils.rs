use crate::{transport::HttpResponse, ClientError, ClientResult};
use serde::de::DeserializeOwned;

/// Join an API-relative path onto the base URL. Absolute URLs (such as the
/// `next` links of a paginated envelope) pass through untouched.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Append query parameters, skipping empty values.
pub fn with_query(url: &str, query: &[(String, String)]) -> String {
    let pairs: Vec<String> = query
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect();
    if pairs.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", pairs.join("&"))
}

/// Decode a 2xx body. Empty bodies (204, bare action endpoints) decode as
/// JSON `null` so callers asking for `Value` or `Option<_>` still succeed.
pub fn decode_body<R: DeserializeOwned>(response: &HttpResponse) -> ClientResult<R> {
    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body)
        .map_err(|e| ClientError::Decode(format!("Failed to decode response body: {e}")))
}
