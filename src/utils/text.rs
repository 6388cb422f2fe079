//! Title normalization shared by every source driver.

/// Longest title, in characters, a resolved post may carry.
pub const MAX_TITLE_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Truncate to [`MAX_TITLE_CHARS`] characters, replacing the tail with `...`
/// when the input is longer. Counts chars, not bytes.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let keep = MAX_TITLE_CHARS - ELLIPSIS.len();
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// First non-empty line with inner whitespace collapsed.
pub fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|line| !line.is_empty())
}

/// Strip trailing site-name suffixes such as `Post title | Site` or
/// `Post title - Site`.
pub fn strip_site_suffix(title: &str) -> String {
    let head = title.split('|').next().unwrap_or(title).trim();
    head.split(" - ").next().unwrap_or(head).trim().to_string()
}
