use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use reqwest::Url;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("invalid_url: {0}")]
    Validation(String),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("build: {0}")]
    Build(#[from] BuildError),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not launch browser: {0}")]
    Launch(String),
    #[error("could not load {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{url} did not become ready within {secs} seconds")]
    Timeout { url: String, secs: u64 },
    #[error("render task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml: {0}")]
    Xml(String),
    #[error("archive: {0}")]
    Archive(String),
}

/// A page after the renderer reported it ready, with its serialized DOM.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: Url,
    pub html: String,
}

/// An anchor with an `href`, by position in DOM order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorRef {
    pub position: usize,
    pub href: String,
    pub resolved: Option<Url>,
}

impl AnchorRef {
    /// The location this anchor contributes to a sitemap, only for https targets.
    pub fn sitemap_location(&self) -> Option<&Url> {
        self.resolved.as_ref().filter(|u| u.scheme() == "https")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub loc: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    pub content_loc: Url,
    pub thumbnail_loc: Option<Url>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct PageResources {
    pub links: Vec<AnchorRef>,
    pub images: Vec<ImageAsset>,
    pub videos: Vec<(AnchorRef, VideoAsset)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub loc: Url,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// The artifact handed back for delivery. Removing it is up to the caller.
#[derive(Debug)]
pub struct SitemapResult {
    pub url: Url,
    pub artifact: PathBuf,
    pub documents: usize,
    pub total_urls: usize,
}

impl SitemapResult {
    pub fn is_archive(&self) -> bool {
        self.artifact.extension().map_or(false, |e| e == "zip")
    }

    pub fn path(&self) -> &Path {
        &self.artifact
    }

    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.artifact)
    }

    pub fn cleanup(self) -> std::io::Result<()> {
        debug!("removing artifact {:?}", self.artifact);
        fs::remove_file(&self.artifact)
    }
}
