use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::AppError;

/// A tracked content service. Variant order is the polling order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Blogger,
    Tumblr,
    Bluesky,
    X,
    Linkedin,
    Threads,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Youtube,
        Platform::Blogger,
        Platform::Tumblr,
        Platform::Bluesky,
        Platform::X,
        Platform::Linkedin,
        Platform::Threads,
        Platform::Facebook,
        Platform::Instagram,
    ];

    /// Stable identifier used as the key in persisted documents.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Blogger => "blogger",
            Platform::Tumblr => "tumblr",
            Platform::Bluesky => "bluesky",
            Platform::X => "x",
            Platform::Linkedin => "linkedin",
            Platform::Threads => "threads",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Blogger => "Blogger",
            Platform::Tumblr => "Tumblr",
            Platform::Bluesky => "Bluesky",
            Platform::X => "X",
            Platform::Linkedin => "LinkedIn",
            Platform::Threads => "Threads",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
        }
    }

    /// Title used when a post carries no usable text of its own.
    pub fn placeholder_title(&self) -> String {
        format!("New {} Post", self.display_name())
    }

    /// Title used for a manual override whose page title could not be fetched.
    pub fn override_title(&self) -> String {
        format!("Latest {} Post", self.display_name())
    }

    /// Infer the platform from a link's host. Subdomains match their parent
    /// (`m.facebook.com`, `someone.tumblr.com`).
    pub fn from_url(link: &str) -> Option<Platform> {
        let parsed = url::Url::parse(link.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if matches("x.com") || matches("twitter.com") {
            Some(Platform::X)
        } else if matches("threads.net") || matches("threads.com") {
            Some(Platform::Threads)
        } else if matches("linkedin.com") {
            Some(Platform::Linkedin)
        } else if matches("facebook.com") || matches("fb.watch") {
            Some(Platform::Facebook)
        } else if matches("instagram.com") {
            Some(Platform::Instagram)
        } else if matches("youtube.com") || matches("youtu.be") {
            Some(Platform::Youtube)
        } else if matches("bsky.app") {
            Some(Platform::Bluesky)
        } else if matches("tumblr.com") {
            Some(Platform::Tumblr)
        } else if matches("blogspot.com") || matches("blogger.com") {
            Some(Platform::Blogger)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.id())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = if wanted == "twitter" { "x".to_string() } else { wanted };
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| AppError::Validation(format!("Unknown platform: {}", s)))
    }
}
