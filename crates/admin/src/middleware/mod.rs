//! HTTP middleware and extractors for the admin server.
//!
//! # Layer Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. `CorsLayer` (configured origins only)
//!
//! Handlers that act on behalf of a staff member take the [`CurrentUser`]
//! extractor.

pub mod identity;

pub use identity::{CurrentUser, RequireSupervisor, RequireUserManager, USER_ID_HEADER};
