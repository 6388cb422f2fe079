pub mod notifier;
pub mod source;

pub use notifier::AnnouncementNotifier;
pub use source::{PostSource, StrategyKind, TitleFetcher};

#[cfg(test)]
pub use source::{MockPostSource, MockTitleFetcher};
