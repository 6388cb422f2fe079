pub mod announcer;
pub mod config;
pub mod extract;
pub mod herald;
pub mod models;
pub mod plugins;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use herald::Herald;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
