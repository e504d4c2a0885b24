//! Handler Module
//!
//! Scoped references to logical databases.
//!
//! ## Responsibilities
//! - Count handlers per (database, scope) in a [`HandlerCollection`]
//! - Give each scope a [`KvdbHandler`] whose lifetime is its reference
//! - Report usage both ways: by database and by scope
//!
//! ## Release
//! A handler returns its reference exactly once: through
//! [`KvdbHandler::release`] or, failing that, when it is dropped.

mod collection;
mod handle;

use std::collections::BTreeMap;

pub use collection::{transpose, HandlerCollection};
pub use handle::KvdbHandler;

/// Reference counts keyed by scope (or by database, in the transposed view)
pub type RefInfo = BTreeMap<String, usize>;
