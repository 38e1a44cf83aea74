//! Image reference scanning and classification.
//!
//! Two syntaxes are recognised: Markdown `![alt](url "title")` and HTML
//! `<img src="...">` with single or double quotes. Matches from both are
//! merged in order of appearance; duplicates are kept.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use url::Url;

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#)
        .expect("markdown image pattern is valid")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("html image pattern is valid")
});

/// One image reference found in a body, with the byte span of its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMatch {
    pub url: String,
    pub span: Range<usize>,
}

/// Where an image reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// A path relative to the post, e.g. `img/a.png`.
    Relative,
    /// A site-rooted path (`/img/a.png`) or an absolute URL on the site's own domain.
    SiteAbsolute,
    /// Hosted somewhere else; left untouched.
    External,
}

/// All image references in `body` with their spans, ordered by position.
///
/// A match that starts inside an earlier match (e.g. Markdown syntax inside an
/// `<img src>` value) is dropped, so spans never overlap.
pub fn find_image_references(body: &str) -> Vec<ImageMatch> {
    let markdown = MARKDOWN_IMAGE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1));
    let html = HTML_IMAGE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)));

    let mut found: Vec<ImageMatch> = markdown
        .chain(html)
        .filter(|m| !m.as_str().trim().is_empty())
        .map(|m| ImageMatch {
            url: m.as_str().to_string(),
            span: m.range(),
        })
        .collect();
    found.sort_by_key(|m| m.span.start);

    let mut end = 0;
    found.retain(|m| {
        let keep = m.span.start >= end;
        if keep {
            end = m.span.end;
        }
        keep
    });
    found
}

/// Every image URL or path in `body`, in order of appearance, duplicates included.
pub fn extract_image_references(body: &str) -> Vec<String> {
    find_image_references(body)
        .into_iter()
        .map(|m| m.url)
        .collect()
}

/// Classify a reference relative to the site's canonical domain.
pub fn classify(reference: &str, site_domain: &str) -> ImageKind {
    let reference = reference.trim();
    let absolute = if reference.starts_with("//") {
        Url::parse(&format!("https:{reference}"))
    } else {
        Url::parse(reference)
    };
    match absolute {
        Ok(url) if matches!(url.scheme(), "http" | "https") => match url.host_str() {
            Some(host) if same_domain(host, site_domain) => ImageKind::SiteAbsolute,
            _ => ImageKind::External,
        },
        Ok(_) => ImageKind::External,
        Err(_) if reference.starts_with('/') => ImageKind::SiteAbsolute,
        Err(_) => ImageKind::Relative,
    }
}

/// Keep references with no host or with the site's own host.
pub fn filter_uploadable(urls: &[String], site_domain: &str) -> Vec<String> {
    urls.iter()
        .filter(|u| classify(u, site_domain) != ImageKind::External)
        .cloned()
        .collect()
}

fn same_domain(host: &str, site_domain: &str) -> bool {
    let strip = |h: &str| h.strip_prefix("www.").unwrap_or(h).to_ascii_lowercase();
    strip(host) == strip(site_domain)
}
