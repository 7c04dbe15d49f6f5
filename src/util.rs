const MAX_LOG_BODY_LENGTH: usize = 200;

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Appends a `;`-separated query fragment, e.g. `limit=10;offset=20`.
pub(crate) fn append_query(url: &str, query: &str) -> String {
    let query = query.trim_start_matches(['?', ';', '&']);
    if query.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { ';' } else { '?' };
    format!("{}{}{}", url, sep, query)
}

pub(crate) fn auth_query(username: &str, api_key: &str) -> String {
    format!("username={};api_key={}", username.trim(), api_key.trim())
}

/// Truncates a response body so error logs stay readable.
pub(crate) fn truncate_for_log(body: &str) -> String {
    if body.len() <= MAX_LOG_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_LOG_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
}

pub(crate) fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
