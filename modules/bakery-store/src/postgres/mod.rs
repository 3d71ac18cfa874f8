//! Postgres-backed stores. Schema lives in `migrations/` at the workspace root.

mod notifications;
mod orders;

pub use notifications::PgNotificationStore;
pub use orders::PgOrderStore;

use bakery_common::BakeryError;

pub(crate) fn store_err(e: sqlx::Error) -> BakeryError {
    BakeryError::StoreUnavailable(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// A row held text the domain enums cannot parse.
pub(crate) fn corrupt_row(e: BakeryError) -> BakeryError {
    BakeryError::StoreUnavailable(format!("corrupt row: {e}"))
}
