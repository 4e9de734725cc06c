use std::{sync::Arc, time::Duration};

use reqwest::Url;
use tokio::task;

use crate::{
    browser_controller::Renderer,
    types::{RenderError, RenderedPage},
};

pub struct PageFetcher {
    renderer: Arc<dyn Renderer>,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(renderer: Arc<dyn Renderer>, timeout: Duration) -> Self {
        PageFetcher { renderer, timeout }
    }

    /// Renders `url` on the blocking pool; browser automation is synchronous.
    pub async fn fetch(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let renderer = self.renderer.clone();
        let timeout = self.timeout;
        let u = url.clone();

        debug!("rendering {} with a {}s timeout", url, timeout.as_secs());
        let page = task::spawn_blocking(move || renderer.render(&u, timeout))
            .await
            .map_err(|e| {
                error!("problem spawning a blocking thread {}", e);
                RenderError::Task(e.to_string())
            })??;

        debug!("rendered {} ({} bytes)", page.url, page.html.len());
        Ok(page)
    }
}
