use std::{fmt, fs::File, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use reqwest::Url;

use crate::{
    browser_controller::{ChromeRenderer, Renderer},
    enricher::MetadataEnricher,
    extractor,
    fetcher::PageFetcher,
    packager::ArchivePackager,
    sitemap::SitemapBuilder,
    types::{SitemapError, SitemapResult},
    utils::{DEFAULT_HEAD_TIMEOUT_SECS, DEFAULT_RENDER_TIMEOUT_SECS, IN_DOCKER, SITEMAP_URL_LIMIT},
};

/// Runs one crawl per `submit`, start to finish, with no state shared between crawls.
pub struct Runner {
    fetcher: PageFetcher,
    enricher: MetadataEnricher,
    builder: SitemapBuilder,
    packager: ArchivePackager,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // seconds to wait for the page to reach a ready state
    #[builder(default = "DEFAULT_RENDER_TIMEOUT_SECS")]
    render_timeout: u64,
    // seconds to wait for each Last-Modified HEAD request
    #[builder(default = "DEFAULT_HEAD_TIMEOUT_SECS")]
    head_timeout: u64,
    // urls per sitemap document, capped at the protocol limit
    #[builder(default = "SITEMAP_URL_LIMIT")]
    max_urls_per_sitemap: usize,
    // directory where the sitemap files and archives are written
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    #[builder(default = "(1920, 1080)")]
    window_size: (u32, u32),
    // chrome's sandbox has to be turned off inside docker
    #[builder(default = "!*IN_DOCKER")]
    sandbox: bool,
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }
}

impl RunnerOptionsBuilder {
    fn default_output_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    Extracting,
    Enriching,
    Building,
    Packaging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Enriching => "enriching",
            Stage::Building => "building",
            Stage::Packaging => "packaging",
        };
        f.write_str(s)
    }
}

impl Runner {
    /// A runner backed by headless Chrome.
    pub fn new(options: RunnerOptions) -> anyhow::Result<Self> {
        let renderer = ChromeRenderer::new(options.window_size, options.sandbox);
        Self::with_renderer(options, Arc::new(renderer))
    }

    pub fn with_renderer(
        options: RunnerOptions,
        renderer: Arc<dyn Renderer>,
    ) -> anyhow::Result<Self> {
        let enricher = MetadataEnricher::new(Duration::from_secs(options.head_timeout))
            .context("could not build http client")?;

        Ok(Runner {
            fetcher: PageFetcher::new(renderer, Duration::from_secs(options.render_timeout)),
            enricher,
            builder: SitemapBuilder::new(options.max_urls_per_sitemap),
            packager: ArchivePackager::new(options.output_dir),
        })
    }

    /// Validates `url` and generates its sitemap.
    pub async fn submit(&self, url: &str) -> Result<SitemapResult, SitemapError> {
        let target = validate_url(url)?;
        self.run(target).await
    }

    /// Opens the generated artifact for delivery.
    pub fn download(&self, result: &SitemapResult) -> std::io::Result<File> {
        debug!("delivering {:?}", result.path());
        result.open()
    }

    pub async fn run(&self, target: Url) -> Result<SitemapResult, SitemapError> {
        info!("initializing sitemap generation for {}", target);

        let res = self.pipeline(&target).await;
        match &res {
            Ok(r) => info!(
                "sitemap for {} done: {} urls in {} document(s) at {:?}",
                target,
                r.total_urls,
                r.documents,
                r.path()
            ),
            Err(e) => error!("sitemap for {} failed: {}", target, e),
        }
        res
    }

    async fn pipeline(&self, target: &Url) -> Result<SitemapResult, SitemapError> {
        enter(Stage::Fetching, target);
        let page = self.fetcher.fetch(target).await?;

        enter(Stage::Extracting, target);
        let resources = extractor::extract(&page);

        enter(Stage::Enriching, target);
        let mut links = vec![];
        for anchor in resources.links {
            let loc = match anchor.sitemap_location() {
                Some(loc) => loc.clone(),
                None => {
                    debug!("skipping non https link {:?}", anchor.href);
                    continue;
                }
            };
            let entry = self.enricher.enrich(&loc).await;
            links.push((anchor, entry));
        }
        let total_urls = links.len();

        enter(Stage::Building, target);
        let documents = self
            .builder
            .build(links, resources.images, resources.videos);

        enter(Stage::Packaging, target);
        let artifact = self.packager.package(&documents)?;

        Ok(SitemapResult {
            url: target.clone(),
            artifact,
            documents: documents.len(),
            total_urls,
        })
    }
}

fn enter(stage: Stage, target: &Url) {
    debug!("{} {}", stage, target);
}

/// Accepts absolute http(s) urls with a host.
pub fn validate_url(url: &str) -> Result<Url, SitemapError> {
    let u = Url::from_str(url.trim())
        .map_err(|e| SitemapError::Validation(format!("{} is not a valid url: {}", url, e)))?;
    if u.scheme() != "http" && u.scheme() != "https" {
        return Err(SitemapError::Validation(format!(
            "{} must use http or https",
            url
        )));
    }
    if u.host_str().map_or(true, str::is_empty) {
        return Err(SitemapError::Validation(format!(
            "{} must have a valid host",
            url
        )));
    }
    Ok(u)
}
