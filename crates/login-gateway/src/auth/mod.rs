//! Authentication against the Microsoft identity platform.
//!
//! This module provides:
//! - The `IdentityProvider` seam and its `MicrosoftIdentity` implementation
//! - Login, OAuth callback and logout handlers
//! - `require_session` middleware for pages behind sign-in

mod handlers;
mod identity;
mod middleware;
pub mod types;

pub use handlers::{login, logout, redirect};
pub use identity::{IdentityProvider, MicrosoftIdentity};
pub use middleware::{current_session, require_session, CurrentSession};
