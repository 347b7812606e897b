//! W3C trace-context and baggage propagation over HTTP headers.
//!
//! The server extracts from axum's `http` 1.x header map; the client injects
//! into reqwest's `http` 0.2 header map, hence the two concrete carrier
//! types instead of one generic impl.

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::{global, Context};

/// Reads propagation headers from an incoming request.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

/// Writes propagation headers onto an outgoing request.
pub struct HeaderInjector<'a>(pub &'a mut reqwest::header::HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let name = match reqwest::header::HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => return,
        };
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&value) {
            self.0.insert(name, value);
        }
    }
}

/// Extract the caller's execution context from request headers using the
/// globally installed propagator.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Inject `cx` into outgoing request headers using the globally installed
/// propagator.
pub fn inject_context(cx: &Context, headers: &mut reqwest::header::HeaderMap) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(headers))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extractor_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
        );

        let extractor = HeaderExtractor(&headers);
        assert_eq!(
            extractor.get("traceparent"),
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
        );
        assert_eq!(extractor.get("baggage"), None);
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }

    #[test]
    fn test_injector_writes_headers() {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut injector = HeaderInjector(&mut headers);
        injector.set("traceparent", "00-x-y-01".to_string());
        injector.set("bad header name\n", "ignored".to_string());

        assert_eq!(headers.get("traceparent").unwrap(), "00-x-y-01");
        assert_eq!(headers.len(), 1);
    }
}
