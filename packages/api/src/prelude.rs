//! Quiver prelude
//!
//! Re-exports the engine prelude plus the request helpers of this crate.

pub use quiver_engine::prelude::*;

pub use crate::{delete, get, head, patch, post, post_json, put};
