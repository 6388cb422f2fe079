pub mod platform;
pub mod post;

// Re-exports for convenience
pub use platform::*;
pub use post::*;
