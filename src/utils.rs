use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Url;
use scraper::Selector;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";
pub const VIDEO_NS: &str = "http://www.google.com/schemas/sitemap-video/1.1";

// maximum number of <url> entries the sitemap protocol allows in a single file
pub const SITEMAP_URL_LIMIT: usize = 50_000;
pub const CHANGE_FREQUENCY: &str = "weekly";
pub const LASTMOD_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HEAD_TIMEOUT_SECS: u64 = 10;

lazy_static! {
    pub static ref BACKGROUND_IMAGE_RE: Regex =
        Regex::new(r#"background-image\s*:\s*url\(\s*["']?([^"')]*?)["']?\s*\)"#)
            .expect("background-image regex is valid");
    pub static ref ANCHOR_OR_VIDEO: Selector =
        Selector::parse("a[href], video").expect("anchor/video selector is valid");
    pub static ref IMG_SRC: Selector = Selector::parse("img[src]").expect("img selector is valid");
    pub static ref BACKGROUND_STYLE: Selector =
        Selector::parse(r#"[style*="background-image"]"#).expect("style selector is valid");
    pub static ref BASE_HREF: Selector =
        Selector::parse("base[href]").expect("base selector is valid");
    pub static ref SOURCE_SRC: Selector =
        Selector::parse("source[src]").expect("source selector is valid");
    pub static ref IN_DOCKER: bool = std::env::var("IN_DOCKER").is_ok();
}

/// Resolves `url` against `base` the way a browser resolves an `href` property.
/// Empty and unparsable values yield `None`.
pub fn resolve_url(base: &Url, url: &str) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    match base.join(url) {
        Ok(u) => Some(u),
        Err(e) => {
            debug!("could not resolve {} against {}: {}", url, base, e);
            None
        }
    }
}

/// Two-tier priority heuristic: root and top-level pages get "1", anything deeper "0.8".
pub fn get_priority(url: &Url) -> &'static str {
    path_priority(url.path())
}

pub fn path_priority(path: &str) -> &'static str {
    let path = path.trim_matches('/');
    if path.is_empty() || !path.contains('/') {
        "1"
    } else {
        "0.8"
    }
}

pub fn format_lastmod(ts: DateTime<Utc>) -> String {
    ts.format(LASTMOD_FORMAT).to_string()
}

pub fn now_lastmod() -> String {
    format_lastmod(Utc::now())
}
