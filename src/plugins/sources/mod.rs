// Network-backed post sources
pub mod api;
pub mod feed;
pub mod page_title;

pub use api::ApiSource;
pub use feed::FeedSource;
pub use page_title::PageTitleFetcher;
