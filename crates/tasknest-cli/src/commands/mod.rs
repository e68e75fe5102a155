//! CLI command implementations.

pub mod config;
pub mod serve;
pub mod status;
pub mod users;

pub use config::run_config;
pub use serve::run_serve;
pub use status::run_status;
pub use users::run_users;
