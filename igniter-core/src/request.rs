use crate::body::ParsedBody;
use crate::cookie::CookieJar;
use bytes::Bytes;
use std::collections::HashMap;
use uuid::Uuid;

/// The transport-neutral request a host adapter hands to the processor.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: String,
    /// Path plus optional query string, e.g. `/api/v1/users/1?expand=posts`.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Per-request envelope. Params, query, and headers are read-only after
/// context assembly; the body is replaced at most once, by schema
/// validation.
#[derive(Debug)]
pub struct RequestEnvelope {
    pub id: String,
    pub method: String,
    pub url: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    headers: HashMap<String, String>,
    pub cookies: CookieJar,
    pub body: ParsedBody,
    pub raw_body: Option<Bytes>,
}

impl RequestEnvelope {
    /// Split the URL, parse the query string, and derive the cookie jar.
    /// Body parsing happens separately because it is async.
    pub fn from_raw(raw: &RawRequest) -> Self {
        let (path, query_str) = match raw.url.find('?') {
            Some(pos) => (raw.url[..pos].to_string(), &raw.url[pos + 1..]),
            None => (raw.url.clone(), ""),
        };

        let query: HashMap<String, String> = form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let headers: HashMap<String, String> = raw
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();

        let cookies = CookieJar::from_header(headers.get("cookie").map(String::as_str));

        Self {
            id: Uuid::new_v4().to_string(),
            method: raw.method.to_ascii_uppercase(),
            url: raw.url.clone(),
            path,
            params: HashMap::new(),
            query,
            headers,
            cookies,
            body: ParsedBody::Empty,
            raw_body: raw.body.clone(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// The transport-neutral response the processor hands back to the adapter.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl WireResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// First value for a header name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header name (e.g. `Set-Cookie`).
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_splits_path_and_query() {
        let raw = RawRequest::new("get", "/users/1?expand=posts&page=2");
        let envelope = RequestEnvelope::from_raw(&raw);
        assert_eq!(envelope.method, "GET");
        assert_eq!(envelope.path, "/users/1");
        assert_eq!(envelope.query_param("expand"), Some("posts"));
        assert_eq!(envelope.query_param("page"), Some("2"));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let raw = RawRequest::new("GET", "/")
            .with_header("X-Custom", "1")
            .with_header("Content-Type", "application/json");
        let envelope = RequestEnvelope::from_raw(&raw);
        assert_eq!(envelope.header("x-custom"), Some("1"));
        assert_eq!(envelope.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(envelope.header("missing"), None);
    }

    #[test]
    fn test_cookies_derived_from_header() {
        let raw = RawRequest::new("GET", "/").with_header("Cookie", "session=abc; theme=dark");
        let envelope = RequestEnvelope::from_raw(&raw);
        assert_eq!(envelope.cookies.get("session"), Some("abc"));
        assert_eq!(envelope.cookies.get("theme"), Some("dark"));
    }

    #[test]
    fn test_query_decoding() {
        let raw = RawRequest::new("GET", "/search?q=a%20b&tag=x%2By");
        let envelope = RequestEnvelope::from_raw(&raw);
        assert_eq!(envelope.query_param("q"), Some("a b"));
        assert_eq!(envelope.query_param("tag"), Some("x+y"));
    }

    #[test]
    fn test_each_envelope_gets_a_fresh_id() {
        let raw = RawRequest::new("GET", "/");
        let a = RequestEnvelope::from_raw(&raw);
        let b = RequestEnvelope::from_raw(&raw);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_wire_response_header_all() {
        let mut response = WireResponse::new(200);
        response.headers.push(("Set-Cookie".into(), "a=1".into()));
        response.headers.push(("Set-Cookie".into(), "b=2".into()));
        assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.header("set-cookie"), Some("a=1"));
    }
}
