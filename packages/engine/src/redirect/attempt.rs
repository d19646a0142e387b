//! Attempt and Action types for redirect handling
//!
//! An `Attempt` holds what is known about one hop of a redirect chain; the
//! `Action` it returns controls what happens next.

use std::error::Error as StdError;

use http::StatusCode;
use url::Url;

/// A type that holds information on the next request and previous requests
/// in a redirect chain.
#[derive(Debug)]
pub struct Attempt<'a> {
    pub(crate) status: StatusCode,
    pub(crate) next: &'a Url,
    pub(crate) previous: &'a [Url],
}

/// An action to perform when a redirect status code is found.
#[derive(Debug)]
pub struct Action {
    pub(crate) inner: ActionKind,
}

#[derive(Debug)]
pub(crate) enum ActionKind {
    Follow,
    Stop,
    Error(Box<dyn StdError + Send + Sync>),
}

impl<'a> Attempt<'a> {
    /// Get the redirect status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the next URL to redirect to.
    pub fn url(&self) -> &Url {
        self.next
    }

    /// Get the list of previous URLs already requested in this chain.
    pub fn previous(&self) -> &[Url] {
        self.previous
    }

    /// Returns an action meaning the engine should follow the next URL.
    pub fn follow(self) -> Action {
        Action {
            inner: ActionKind::Follow,
        }
    }

    /// Returns an action meaning the engine should not follow the next URL.
    ///
    /// The 30x response is kept as the final result.
    pub fn stop(self) -> Action {
        Action {
            inner: ActionKind::Stop,
        }
    }

    /// Returns an action failing the redirect chain with an error.
    pub fn error<E: Into<Box<dyn StdError + Send + Sync>>>(self, error: E) -> Action {
        Action {
            inner: ActionKind::Error(error.into()),
        }
    }
}
