//! Redirect policies

use std::sync::Arc;

use http::StatusCode;
use url::Url;

use super::attempt::{Action, ActionKind, Attempt};

/// A policy on how to handle redirect chains.
///
/// The default follows up to 10 hops.
#[derive(Clone)]
pub struct Policy {
    inner: PolicyKind,
}

#[derive(Clone)]
enum PolicyKind {
    Limit(usize),
    None,
    Custom(Arc<dyn Fn(Attempt<'_>) -> Action + Send + Sync>),
}

impl Policy {
    /// Follow at most `max` redirects.
    #[must_use]
    pub fn limited(max: usize) -> Self {
        Self {
            inner: PolicyKind::Limit(max),
        }
    }

    /// Never follow redirects; 3xx responses are returned as-is.
    #[must_use]
    pub fn none() -> Self {
        Self {
            inner: PolicyKind::None,
        }
    }

    /// Decide each hop with a custom closure.
    pub fn custom<F>(policy: F) -> Self
    where
        F: Fn(Attempt<'_>) -> Action + Send + Sync + 'static,
    {
        Self {
            inner: PolicyKind::Custom(Arc::new(policy)),
        }
    }

    pub(crate) fn check(
        &self,
        status: StatusCode,
        next: &Url,
        previous: &[Url],
    ) -> ActionKind {
        let attempt = Attempt {
            status,
            next,
            previous,
        };
        match &self.inner {
            PolicyKind::Limit(max) => {
                if previous.len() >= *max {
                    attempt.error(TooManyRedirects).inner
                } else {
                    attempt.follow().inner
                }
            }
            PolicyKind::None => attempt.stop().inner,
            PolicyKind::Custom(custom) => custom(attempt).inner,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::limited(10)
    }
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            PolicyKind::Limit(max) => f.debug_tuple("Limit").field(max).finish(),
            PolicyKind::None => f.write_str("None"),
            PolicyKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Debug)]
struct TooManyRedirects;

impl std::fmt::Display for TooManyRedirects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("too many redirects")
    }
}

impl std::error::Error for TooManyRedirects {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_follows_then_errors() {
        let policy = Policy::default();
        let next = Url::parse("http://x.example/z").expect("url");
        let mut previous = (0..=9)
            .map(|i| Url::parse(&format!("http://a.example/{i}")).expect("url"))
            .collect::<Vec<_>>();

        match policy.check(StatusCode::FOUND, &next, &previous[..5]) {
            ActionKind::Follow => {}
            other => panic!("unexpected {other:?}"),
        }

        previous.push(Url::parse("http://a.example/10").expect("url"));
        match policy.check(StatusCode::FOUND, &next, &previous) {
            ActionKind::Error(err) if err.to_string().contains("too many redirects") => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn none_always_stops() {
        let policy = Policy::none();
        let next = Url::parse("http://x.example/z").expect("url");
        match policy.check(StatusCode::MOVED_PERMANENTLY, &next, &[]) {
            ActionKind::Stop => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn custom_decides_per_host() {
        let policy = Policy::custom(|attempt| {
            if attempt.url().host_str() == Some("blocked") {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let allowed = Url::parse("http://ok/x").expect("url");
        match policy.check(StatusCode::FOUND, &allowed, &[]) {
            ActionKind::Follow => {}
            other => panic!("unexpected {other:?}"),
        }

        let blocked = Url::parse("http://blocked/x").expect("url");
        match policy.check(StatusCode::FOUND, &blocked, &[]) {
            ActionKind::Stop => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
