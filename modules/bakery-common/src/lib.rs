#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod events;
pub mod file_config;
pub mod roles;
pub mod types;

pub use config::AppConfig;
pub use error::{BakeryError, BakeryResult};
pub use events::LifecycleEvent;
pub use file_config::{load_config, parse_config, EscalationPolicy, FileConfig, NotificationSettings};
pub use roles::{Actor, Capability, Role};
pub use types::*;
