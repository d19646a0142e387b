//! Header manipulation for cross-host redirects

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION, WWW_AUTHENTICATE};
use url::Url;

/// Removes sensitive headers when redirecting across hosts or ports.
pub(crate) fn remove_sensitive_headers(headers: &mut HeaderMap, next: &Url, previous: &[Url]) {
    if let Some(previous) = previous.last() {
        let cross_host = next.host_str() != previous.host_str()
            || next.port_or_known_default() != previous.port_or_known_default();
        if cross_host {
            headers.remove(AUTHORIZATION);
            headers.remove(COOKIE);
            headers.remove("cookie2");
            headers.remove(PROXY_AUTHORIZATION);
            headers.remove(WWW_AUTHENTICATE);
        }
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use http::header::ACCEPT;

    use super::*;

    #[test]
    fn cross_host_strips_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("let me in"));
        headers.insert(COOKIE, HeaderValue::from_static("foo=bar"));

        let previous = vec![Url::parse("http://a.example/path").expect("url")];
        let next = Url::parse("http://b.example/path").expect("url");
        remove_sensitive_headers(&mut headers, &next, &previous);

        assert!(headers.contains_key(ACCEPT));
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(COOKIE));
    }

    #[test]
    fn same_host_keeps_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("let me in"));

        let previous = vec![Url::parse("http://a.example/old").expect("url")];
        let next = Url::parse("http://a.example/new").expect("url");
        remove_sensitive_headers(&mut headers, &next, &previous);

        assert!(headers.contains_key(AUTHORIZATION));
    }
}
