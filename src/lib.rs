pub mod activities;
pub mod analytics;
pub mod auth;
pub mod core;
pub mod leads;
pub mod main_module;
pub mod security;
pub mod store;
pub mod tasks;
pub mod users;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::error::{CrmError, StoreError};
pub use crate::core::shared::state::AppState;
pub use crate::main_module::build_router;
