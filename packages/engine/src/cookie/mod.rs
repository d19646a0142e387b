//! Cookie decisions
//!
//! The engine owns only the *when*: which requests send stored cookies,
//! which responses persist them, and how malformed multi-line `Set-Cookie`
//! headers are re-joined before they reach the store. The store itself is a
//! collaborator behind [`CookieStore`]; [`Jar`] is the in-memory default.

use std::collections::HashMap;
use std::sync::RwLock;

use http::{header, HeaderMap, HeaderValue};
use url::Url;

/// Actions for a persistent cookie store providing session support.
pub trait CookieStore: Send + Sync {
    /// Store a set of `Set-Cookie` header values received from `url`.
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url);
    /// Get any `Cookie` values in the store for `url`.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;
}

/// A good default `CookieStore` implementation.
///
/// Cookies are kept in memory per host; persistence formats are the host
/// application's business.
#[derive(Debug, Default)]
pub struct Jar {
    by_host: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl Jar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for Jar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        let Ok(mut by_host) = self.by_host.write() else {
            return;
        };
        let jar = by_host.entry(host.to_string()).or_default();
        for header in cookie_headers {
            let Ok(text) = std::str::from_utf8(header.as_bytes()) else {
                continue;
            };
            match cookie::Cookie::parse(text.to_string()) {
                Ok(parsed) => {
                    let expired = parsed
                        .max_age()
                        .is_some_and(|age| age.is_zero() || age.is_negative());
                    if expired {
                        jar.remove(parsed.name());
                    } else {
                        jar.insert(parsed.name().to_string(), parsed.value().to_string());
                    }
                }
                Err(e) => {
                    tracing::debug!("ignoring unparsable set-cookie header: {e}");
                }
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let by_host = self.by_host.read().ok()?;
        let jar = by_host.get(host)?;
        if jar.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

/// True when `line` opens a new cookie, i.e. begins with a `name=` token.
fn starts_new_cookie(line: &str) -> bool {
    let Some(eq) = line.find('=') else {
        return false;
    };
    let name = &line[..eq];
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Re-joins `Set-Cookie` fragments that belong to one cookie.
///
/// Some servers split a single cookie's attributes over several header
/// lines; a line that does not begin with a `name=` token is treated as a
/// continuation of the previous one. Best effort.
#[must_use]
pub fn rejoin_set_cookie_lines<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a HeaderValue>,
{
    let mut joined: Vec<String> = Vec::new();
    for line in lines {
        let Ok(text) = std::str::from_utf8(line.as_bytes()) else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if starts_new_cookie(text) || joined.is_empty() {
            joined.push(text.to_string());
        } else if let Some(last) = joined.last_mut() {
            last.push_str(", ");
            last.push_str(text);
        }
    }
    joined
}

/// Adds the stored cookie header for `url`, when the store has one.
pub(crate) fn add_cookie_header(headers: &mut HeaderMap, store: &dyn CookieStore, url: &Url) {
    if let Some(value) = store.cookies(url) {
        headers.insert(header::COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str) -> HeaderValue {
        HeaderValue::from_str(text).expect("header value")
    }

    #[test]
    fn jar_round_trips_per_host() {
        let jar = Jar::new();
        let url = Url::parse("http://a.example/x").expect("url");
        let headers = [value("sid=abc; Path=/"), value("theme=dark")];
        jar.set_cookies(&mut headers.iter(), &url);

        let sent = jar.cookies(&url).expect("cookie header");
        assert_eq!(sent.to_str().expect("ascii"), "sid=abc; theme=dark");

        let other = Url::parse("http://b.example/").expect("url");
        assert!(jar.cookies(&other).is_none());
    }

    #[test]
    fn jar_honours_zero_max_age_as_deletion() {
        let jar = Jar::new();
        let url = Url::parse("http://a.example/").expect("url");
        jar.set_cookies(&mut [value("sid=abc")].iter(), &url);
        jar.set_cookies(&mut [value("sid=gone; Max-Age=0")].iter(), &url);
        assert!(jar.cookies(&url).is_none());
    }

    #[test]
    fn continuation_lines_are_rejoined() {
        let lines = [
            value("big=1; Expires=Wed"),
            value("21 Oct 2026 07:28:00 GMT; Path=/"),
            value("small=2"),
        ];
        let joined = rejoin_set_cookie_lines(lines.iter());
        assert_eq!(
            joined,
            vec![
                "big=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT; Path=/".to_string(),
                "small=2".to_string(),
            ]
        );
    }

    #[test]
    fn leading_continuation_is_kept_rather_than_dropped() {
        let lines = [value("orphan fragment"), value("a=1")];
        let joined = rejoin_set_cookie_lines(lines.iter());
        assert_eq!(joined, vec!["orphan fragment".to_string(), "a=1".to_string()]);
    }
}
