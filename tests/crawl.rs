use std::{
    fs,
    io::Read,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use reqwest::Url;
use sitemapper::{
    browser_controller::{BrowserController, ChromeRenderer, Renderer},
    runner::{Runner, RunnerOptions},
    types::{RenderError, RenderedPage, SitemapError},
};
use sysinfo::{Pid, PidExt, System, SystemExt};

macro_rules! aw {
    ($e:expr) => {
        tokio_test::block_on($e)
    };
}

/// Serves a fixed document and counts how often it was asked to render.
struct FakeRenderer {
    html: Option<String>,
    launched: AtomicUsize,
}

impl FakeRenderer {
    fn serving(html: &str) -> Arc<Self> {
        Arc::new(FakeRenderer {
            html: Some(html.into()),
            launched: AtomicUsize::new(0),
        })
    }

    fn never_ready() -> Arc<Self> {
        Arc::new(FakeRenderer {
            html: None,
            launched: AtomicUsize::new(0),
        })
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        self.launched.fetch_add(1, Ordering::SeqCst);

        match &self.html {
            Some(html) => Ok(RenderedPage {
                url: url.clone(),
                html: html.clone(),
            }),
            None => Err(RenderError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

fn runner(dir: &Path, max_urls: usize, renderer: Arc<FakeRenderer>) -> Runner {
    let options = RunnerOptions::default_builder()
        .output_dir(dir)
        .head_timeout(1u64)
        .max_urls_per_sitemap(max_urls)
        .build()
        .unwrap();
    Runner::with_renderer(options, renderer).unwrap()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn three_links_two_images_single_sitemap() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FakeRenderer::serving(
        r#"<html><body>
            <img src="/img/logo.png">
            <div style='background-image: url("/img/hero.jpg")'></div>
            <a href="https://127.0.0.1:9/">home</a>
            <a href="/about">about</a>
            <a href="https://127.0.0.1:9/blog/post-1">post</a>
            <a href="http://127.0.0.1:9/insecure">insecure</a>
            <a href="mailto:hello@example.com">mail</a>
        </body></html>"#,
    );
    let runner = runner(dir.path(), 50_000, renderer.clone());

    let result = aw!(runner.submit("https://127.0.0.1:9")).unwrap();

    assert!(!result.is_archive());
    assert_eq!(result.documents, 1);
    assert_eq!(result.total_urls, 3);
    assert_eq!(result.path().extension().unwrap(), "xml");

    let mut xml = String::new();
    runner.download(&result).unwrap().read_to_string(&mut xml).unwrap();

    assert_eq!(xml.matches("<url>").count(), 3);
    assert_eq!(xml.matches("<image:image ").count(), 6);
    assert!(!xml.contains("video:video"));
    assert!(!xml.contains("insecure"));
    assert!(!xml.contains("mailto"));
    assert!(xml.contains("<loc>https://127.0.0.1:9/about</loc>"));
    assert!(xml.contains("<image:loc>https://127.0.0.1:9/img/hero.jpg</image:loc>"));

    for loc in xml.split("<loc>").skip(1) {
        assert!(loc.starts_with("https://"), "{}", loc);
    }
    assert_eq!(xml.matches("<priority>1</priority>").count(), 2);
    assert_eq!(xml.matches("<priority>0.8</priority>").count(), 1);

    assert_eq!(renderer.launched.load(Ordering::SeqCst), 1);

    result.cleanup().unwrap();
    assert!(listing(dir.path()).is_empty());
}

#[test]
fn videos_follow_their_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FakeRenderer::serving(
        r#"<html><body>
            <a href="https://127.0.0.1:9/watch">
                <video src="/media/intro.mp4" data-title="Intro"
                    data-description="A short intro"></video>
            </a>
            <a href="https://127.0.0.1:9/about">about</a>
        </body></html>"#,
    );
    let runner = runner(dir.path(), 50_000, renderer);

    let result = aw!(runner.submit("https://127.0.0.1:9/")).unwrap();
    let xml = fs::read_to_string(result.path()).unwrap();

    assert_eq!(xml.matches("<video:video ").count(), 1);
    let watch = xml.find("<loc>https://127.0.0.1:9/watch</loc>").unwrap();
    let about = xml.find("<loc>https://127.0.0.1:9/about</loc>").unwrap();
    let video = xml.find("<video:video ").unwrap();
    assert!(watch < video && video < about);
    assert!(xml.contains(
        "<video:content_loc>https://127.0.0.1:9/media/intro.mp4</video:content_loc>"
    ));
    assert!(xml.contains("<video:description>A short intro</video:description>"));
}

#[test]
fn overflowing_sitemaps_are_zipped() {
    let dir = tempfile::tempdir().unwrap();
    let anchors = (0..5)
        .map(|i| format!(r#"<a href="https://127.0.0.1:9/p/{}">{}</a>"#, i, i))
        .collect::<String>();
    let renderer = FakeRenderer::serving(&format!("<html><body>{}</body></html>", anchors));
    let runner = runner(dir.path(), 2, renderer);

    let result = aw!(runner.submit("https://127.0.0.1:9/")).unwrap();

    assert!(result.is_archive());
    assert_eq!(result.documents, 3);
    assert_eq!(result.total_urls, 5);

    let names = listing(dir.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".zip"));

    let mut zip = zip::ZipArchive::new(runner.download(&result).unwrap()).unwrap();
    let mut urls = 0;
    for i in 0..zip.len() {
        let mut member = zip.by_index(i).unwrap();
        assert!(member.name().ends_with(".xml"));
        let mut xml = String::new();
        member.read_to_string(&mut xml).unwrap();
        urls += xml.matches("<url>").count();
    }
    assert_eq!(zip.len(), 3);
    assert_eq!(urls, 5);
}

#[test]
fn page_without_links_yields_an_empty_sitemap() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FakeRenderer::serving("<html><body></body></html>");
    let runner = runner(dir.path(), 50_000, renderer);

    let result = aw!(runner.submit("https://example.com")).unwrap();

    assert_eq!(result.documents, 1);
    assert_eq!(result.total_urls, 0);
    let xml = fs::read_to_string(result.path()).unwrap();
    assert!(xml.contains("urlset"));
    assert!(!xml.contains("<url>"));
}

#[test]
fn render_timeout_fails_without_retrying_or_writing() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FakeRenderer::never_ready();
    let runner = runner(dir.path(), 50_000, renderer.clone());

    let err = aw!(runner.submit("https://example.com")).unwrap_err();

    assert!(matches!(
        err,
        SitemapError::Render(RenderError::Timeout { secs: 10, .. })
    ));
    assert_eq!(renderer.launched.load(Ordering::SeqCst), 1);
    assert!(listing(dir.path()).is_empty());
}

#[test]
fn invalid_urls_never_reach_the_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FakeRenderer::serving("<html><body></body></html>");
    let runner = runner(dir.path(), 50_000, renderer.clone());

    let err = aw!(runner.submit("invalid_url")).unwrap_err();

    assert!(matches!(err, SitemapError::Validation(_)));
    assert!(err.to_string().contains("invalid_url"));
    assert_eq!(renderer.launched.load(Ordering::SeqCst), 0);
}

/*
RUST_LOG=debug cargo test --test crawl -- headless_chrome --exact --ignored
 */
#[test]
#[ignore = "needs a local chrome"]
fn headless_chrome() -> anyhow::Result<()> {
    let _ = env_logger::try_init();
    let renderer = ChromeRenderer::new((1920, 1080), true);
    let url = Url::parse("https://example.com")?;
    let page = renderer.render(&url, Duration::from_secs(10))?;
    println!("{}", page.html);
    assert!(page.html.contains("<body"));
    Ok(())
}

#[test]
#[ignore = "needs a local chrome"]
fn chrome_is_gone_after_a_failed_load() -> anyhow::Result<()> {
    let _ = env_logger::try_init();
    let controller = BrowserController::new((1920, 1080), true, Duration::from_secs(5))?;
    let pid = Pid::from_u32(controller.process_id().expect("chrome has a pid"));

    // nothing listens there, so the load fails
    let res = controller.browse("http://127.0.0.1:9/", Duration::from_secs(5));
    assert!(res.is_err());
    drop(res);
    drop(controller);

    let mut s = System::new();
    assert!(!s.refresh_process(pid), "chrome {} still running", pid);
    Ok(())
}
