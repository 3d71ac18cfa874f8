pub mod escalations;
pub mod notifications;
pub mod orders;
