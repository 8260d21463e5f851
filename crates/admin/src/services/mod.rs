//! Business logic services for the admin server.
//!
//! # Services
//!
//! - `sync` - Shopify order sync loop and manual syncs
//! - `recurring` - Recurring task spawner
//! - `password` - Argon2 password hashing

pub mod password;
pub mod recurring;
pub mod sync;

pub use password::{PasswordHashError, hash_password};
pub use recurring::{spawn_due_tasks, spawn_ticker};
pub use sync::{FullSyncOutcome, PgSyncStore, SyncError, SyncOutcome, SyncService, SyncStore};
