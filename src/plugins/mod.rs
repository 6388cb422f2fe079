pub mod notifiers;
pub mod sources;
pub mod traits;

pub use traits::{AnnouncementNotifier, PostSource, StrategyKind, TitleFetcher};
