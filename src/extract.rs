//! Structural extraction rules, one per scrape-capable platform.
//!
//! Each rule works on the rendered DOM as an HTML string so it can be
//! exercised without a browser. Third-party markup changes break these
//! rules; a broken rule only ever costs its own platform a result.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{Platform, ResolvedPost};
use crate::utils::text::first_line;

/// Fragments of a document title that mean we were shown a login page.
const AUTH_WALL_MARKERS: &[&str] = &["log in", "login", "sign in", "sign up", "log into"];

pub fn is_auth_wall(title: &str) -> bool {
    let title = title.to_lowercase();
    AUTH_WALL_MARKERS.iter().any(|marker| title.contains(marker))
}

/// Selector a scrape waits for before extracting, if the platform has one.
pub fn ready_selector(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::Facebook => Some(r#"div[role="article"]"#),
        Platform::Instagram => Some(r#"a[href*="/p/"]"#),
        Platform::X => Some(r#"article[data-testid="tweet"]"#),
        Platform::Linkedin => Some(r#"a[href*="/feed/update/"], a[href*="/posts/"]"#),
        Platform::Threads => Some(r#"a[href*="/post/"]"#),
        _ => None,
    }
}

/// Absolute link without query string or fragment.
pub fn canonical_link(href: &str, page_url: &str) -> Option<String> {
    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(page_url).ok()?.join(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).next()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("\n")
}

/// Apply the platform's rule to a rendered page.
pub fn extract_post(platform: Platform, html: &str, page_url: &str) -> Option<ResolvedPost> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let (href, text) = match platform {
        Platform::Facebook => {
            let article = select_first(root, r#"div[role="article"]"#)?;
            let link = select_first(article, r#"a[href*="/posts/"], a[href*="/permalink/"]"#)?;
            let text = select_first(article, r#"div[dir="auto"]"#).map(element_text);
            (link.value().attr("href")?.to_string(), text)
        }
        Platform::Instagram => {
            let link = select_first(root, r#"article a[href^="/p/"]"#)
                .or_else(|| select_first(root, r#"a[href*="/p/"]"#))?;
            (link.value().attr("href")?.to_string(), None)
        }
        Platform::X => {
            let article = select_first(root, r#"article[data-testid="tweet"]"#)?;
            let link = select_first(article, r#"a[href*="/status/"]"#)?;
            let text = select_first(article, r#"div[data-testid="tweetText"]"#).map(element_text);
            (link.value().attr("href")?.to_string(), text)
        }
        Platform::Linkedin => {
            let link = select_first(root, r#"a[href*="/feed/update/"]"#)
                .or_else(|| select_first(root, r#"a[href*="/posts/"]"#))?;
            let text = select_first(
                root,
                ".update-components-text, .feed-shared-update-v2__description, .attributed-text-segment-list__content",
            )
            .map(element_text);
            (link.value().attr("href")?.to_string(), text)
        }
        Platform::Threads => {
            let link = select_first(root, r#"a[href*="/post/"]"#)?;
            (link.value().attr("href")?.to_string(), None)
        }
        Platform::Youtube | Platform::Blogger | Platform::Tumblr | Platform::Bluesky => return None,
    };

    let link = canonical_link(&href, page_url)?;
    let title = text.as_deref().and_then(first_line).unwrap_or_default();
    // Scraped pages carry no reliable publish time.
    Some(ResolvedPost::new(platform, &title, link, None))
}
