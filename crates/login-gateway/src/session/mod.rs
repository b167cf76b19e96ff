//! Server-side sessions.
//!
//! This module provides:
//! - `SessionStore`, the get/set/destroy capability handlers depend on
//! - `MemoryStore`, the default in-process backend
//! - Signed session cookies that carry only the opaque session id

mod cookie;
mod store;

pub use cookie::SessionCookie;
pub use store::{MemoryStore, SessionData, SessionId, SessionStore};
