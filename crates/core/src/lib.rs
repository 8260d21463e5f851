//! Lumen Core - domain types and rules.
//!
//! Shared by the Lumen Orders components:
//! - `admin` - JSON API server, Shopify sync and background jobs
//! - `cli` - migrations and user management
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. Database and HTTP concerns live in the
//! server crate; this one only decides things like which status an order is
//! in, when it breaches its SLA, and whether a kanban move is legal.
//!
//! # Modules
//!
//! - [`types`] - IDs, email, money helpers and user enums
//! - [`orders`] - order status engine, SLA targets and labelling
//! - [`pagination`] - cursor and page arithmetic
//! - [`tasks`] - kanban board rules
//! - [`attendance`] - worked hours and overtime

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod attendance;
pub mod orders;
pub mod pagination;
pub mod tasks;
pub mod types;

pub use orders::{OrderSignals, OrderStatus, PaymentMethod, StatusDisplay};
pub use pagination::Page;
pub use tasks::{Board, TaskPriority, TaskStatus};
pub use types::*;
