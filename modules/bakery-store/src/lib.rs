//! Persistence for orders and notifications.
//!
//! Every mutation is a single-record conditional write: orders are guarded by
//! their `version`, notifications by their unique `dedupe_key`. No caller needs
//! a multi-record transaction, so concurrent scanners converge through the
//! store alone.

pub mod memory;
pub mod postgres;
pub mod query;
pub mod traits;

pub use memory::{MemoryNotificationStore, MemoryOrderStore};
pub use postgres::{PgNotificationStore, PgOrderStore};
pub use query::OverdueQuery;
pub use traits::{NotificationStore, OrderStore};
