use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::LAST_MODIFIED, Client, Url};

use crate::{
    types::UrlEntry,
    utils::{format_lastmod, get_priority, now_lastmod, CHANGE_FREQUENCY},
};

/// Annotates page links with a last-modified date and a priority.
pub struct MetadataEnricher {
    client: Client,
}

impl MetadataEnricher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(MetadataEnricher { client })
    }

    pub async fn enrich(&self, loc: &Url) -> UrlEntry {
        let lastmod = match self.last_modified(loc).await {
            Some(ts) => ts,
            None => now_lastmod(),
        };

        UrlEntry {
            loc: loc.clone(),
            lastmod,
            changefreq: CHANGE_FREQUENCY,
            priority: get_priority(loc),
        }
    }

    /// Best effort HEAD request; any failure means "unknown".
    async fn last_modified(&self, url: &Url) -> Option<String> {
        let res = match self.client.head(url.clone()).send().await {
            Ok(res) => res,
            Err(e) => {
                debug!("HEAD {} failed, using current time: {}", url, e);
                return None;
            }
        };

        let header = res.headers().get(LAST_MODIFIED)?;
        let value = header.to_str().ok()?;
        match parse_http_date(value) {
            Some(ts) => Some(format_lastmod(ts)),
            None => {
                warn!("unparsable Last-Modified {:?} for {}", value, url);
                None
            }
        }
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(value.trim()))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
