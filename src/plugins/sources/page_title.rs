use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::config::HttpConfig;
use crate::plugins::traits::TitleFetcher;
use crate::utils::text::{strip_site_suffix, truncate_title};
use crate::Result;

/// Fetches a page and reads its Open Graph, Twitter card or `<title>` title.
pub struct PageTitleFetcher {
    client: Client,
}

impl PageTitleFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.title_timeout())
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TitleFetcher for PageTitleFetcher {
    async fn fetch_title(&self, url: &str) -> Result<Option<String>> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(extract_page_title(&html))
    }
}

/// Cleaned page title: `og:title`, then `twitter:title`, then `<title>`, with
/// any trailing site name removed and truncated to the title limit.
pub fn extract_page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let meta = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let raw = meta(r#"meta[property="og:title"]"#)
        .or_else(|| meta(r#"meta[name="twitter:title"]"#))
        .or_else(|| {
            let selector = Selector::parse("title").ok()?;
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
        })?;

    let cleaned = strip_site_suffix(&raw);
    if cleaned.is_empty() {
        return None;
    }
    Some(truncate_title(&cleaned))
}
