//! Detection of `sourceMappingURL` comments embedded in file content.
//!
//! Recognizes `//# sourceMappingURL=<url>`, the block form
//! `/*# sourceMappingURL=<url> */` (optionally split over a line break), and
//! the legacy `@` marker. Trailing whitespace after the comment is removed
//! together with it.

use std::sync::LazyLock;

use regex::Regex;

static MAP_URL_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:/\*(?:\s*\r?\n(?://)?)?(?:[#@] sourceMappingURL=([^\s'"]*))\s*\*/|//(?:[#@] sourceMappingURL=([^\s'"]*)))\s*"#,
    )
    .expect("sourceMappingURL pattern is valid")
});

/// How the output references its own map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
    /// `//# sourceMappingURL=<url>`
    #[default]
    Line,
    /// `/*# sourceMappingURL=<url> */`
    Block,
}

impl CommentStyle {
    pub fn render(self, url: &str) -> String {
        match self {
            CommentStyle::Line => format!("//# sourceMappingURL={url}\n"),
            CommentStyle::Block => format!("/*# sourceMappingURL={url} */\n"),
        }
    }
}

/// Strip the first map reference comment. Returns the remaining content and
/// the URL, or `None` when the content carries no reference.
pub fn extract(content: &str) -> Option<(String, String)> {
    let caps = MAP_URL_COMMENT.captures(content)?;
    let whole = caps.get(0)?;
    let url = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
        .to_string();

    let mut stripped = String::with_capacity(content.len() - whole.len());
    stripped.push_str(&content[..whole.start()]);
    stripped.push_str(&content[whole.end()..]);

    Some((stripped, url))
}
