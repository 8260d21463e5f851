//! Order workflow rules: internal status, SLA targets and labelling.

pub mod presentation;
pub mod sla;
pub mod status;

pub use presentation::{PaymentMethod, customer_name, financial_status_display};
pub use sla::{is_sla_breached, sla_due_at};
pub use status::{
    OrderSignals, OrderStatus, PackingAction, StatusDisplay, TransitionError,
    compute_current_status,
};
