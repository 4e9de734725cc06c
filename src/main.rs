use std::{fs, io, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use log::debug;
use sitemapper::{
    runner::{Runner, RunnerOptions},
    utils::{DEFAULT_HEAD_TIMEOUT_SECS, DEFAULT_RENDER_TIMEOUT_SECS, SITEMAP_URL_LIMIT},
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sitemap Generator CLI", long_about = None)]
struct Args {
    /// Page to crawl for links, images and videos
    url: String,
    /// Where to copy the generated sitemap (.xml) or archive (.zip)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Maximum time in seconds to wait for the page to be ready
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT_SECS)]
    render_timeout: u64,
    /// Maximum time in seconds to wait for each Last-Modified lookup
    #[arg(long, default_value_t = DEFAULT_HEAD_TIMEOUT_SECS)]
    head_timeout: u64,
    /// Number of urls after which a new sitemap is started
    #[arg(long, default_value_t = SITEMAP_URL_LIMIT)]
    max_urls: usize,
    /// Directory for the intermediate files, defaults to the system temp directory
    #[arg(short = 'd', long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Ok(env) = std::env::var("RUST_LOG") {
        if env == "debug" {
            println!("{number:/>width$}", number = "", width = 20);
            println!("Debug mode enabled");
            println!("{number:/>width$}", number = "", width = 20);
            println!();
        }
    }

    debug!("Starting sitemapper with {:#?}", args.clone());

    let mut builder = RunnerOptions::default_builder();
    builder
        .render_timeout(args.render_timeout)
        .head_timeout(args.head_timeout)
        .max_urls_per_sitemap(args.max_urls);
    if let Some(dir) = args.work_dir {
        builder.output_dir(dir);
    }
    let options = builder.build()?;

    let runner = Runner::new(options)?;
    let result = runner.submit(&args.url).await?;

    let output = match args.output {
        Some(output) => output,
        None => {
            println!("{}", result.path().display());
            return Ok(());
        }
    };

    {
        let mut src = runner
            .download(&result)
            .context(format!("could not open {:?}", result.path()))?;
        let mut dst =
            fs::File::create(&output).context(format!("could not create {:?}", output))?;
        io::copy(&mut src, &mut dst).context(format!("could not write {:?}", output))?;
    }
    result
        .cleanup()
        .context("could not remove temporary sitemap")?;

    println!("{}", output.display());
    Ok(())
}
