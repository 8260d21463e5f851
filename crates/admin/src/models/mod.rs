//! Domain models for the admin server.
//!
//! Repositories convert database rows into these types; handlers serialize
//! them (or views built from them) as JSON.

pub mod attendance;
pub mod order;
pub mod shopify;
pub mod task;
pub mod user;

pub use attendance::{ActiveEmployee, AttendanceRecord, EmployeeHours};
pub use order::{
    Order, OrderDetail, OrderEvent, OrderEventType, OrderFilter, OrderUpsert, OrderView,
    WorkflowChange,
};
pub use shopify::{ShopifyConfig, SyncState, SyncStatus};
pub use task::{
    Activity, Announcement, Comment, NewRecurringTemplate, NewTask, RecurringTemplate, Task,
    TaskChanges, TaskFilter,
};
pub use user::{NewUser, SortOrder, User, UserChanges, UserListQuery, UserSort};
