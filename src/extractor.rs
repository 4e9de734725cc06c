use std::collections::HashMap;

use reqwest::Url;
use scraper::{ElementRef, Html};

use crate::{
    types::{AnchorRef, ImageAsset, PageResources, RenderedPage, VideoAsset},
    utils::{
        resolve_url, ANCHOR_OR_VIDEO, BACKGROUND_IMAGE_RE, BACKGROUND_STYLE, BASE_HREF, IMG_SRC,
        SOURCE_SRC,
    },
};

/// Walks a rendered page and collects anchors, images and videos in DOM order.
///
/// Each video is tied to the anchor that encloses it, or failing that to the closest
/// anchor before it in the document. Entries that cannot be resolved are skipped.
/// Relative URLs resolve against the document's `<base href>` when it declares one.
pub fn extract(page: &RenderedPage) -> PageResources {
    let document = Html::parse_document(&page.html);
    let base = &document_base(&document, &page.url);

    let (links, videos) = links_and_videos(&document, base);
    let images = images(&document, base);

    debug!(
        "extracted {} links, {} images and {} videos from {}",
        links.len(),
        images.len(),
        videos.len(),
        base
    );

    PageResources {
        links,
        images,
        videos,
    }
}

// only the first <base href> counts, like in a browser
fn document_base(document: &Html, page_url: &Url) -> Url {
    document
        .select(&BASE_HREF)
        .next()
        .and_then(|b| b.value().attr("href"))
        .and_then(|href| resolve_url(page_url, href))
        .unwrap_or_else(|| page_url.clone())
}

fn links_and_videos(
    document: &Html,
    base: &Url,
) -> (Vec<AnchorRef>, Vec<(AnchorRef, VideoAsset)>) {
    let mut links: Vec<AnchorRef> = vec![];
    let mut videos = vec![];
    let mut anchor_by_node = HashMap::new();

    for el in document.select(&ANCHOR_OR_VIDEO) {
        if el.value().name() == "a" {
            let href = el.value().attr("href").unwrap_or_default();
            let anchor = AnchorRef {
                position: links.len(),
                href: href.to_string(),
                resolved: resolve_url(base, href),
            };
            anchor_by_node.insert(el.id(), links.len());
            links.push(anchor);
            continue;
        }

        let video = match video_asset(&el, base) {
            Some(v) => v,
            None => {
                debug!("skipping <video> without a usable source on {}", base);
                continue;
            }
        };

        let enclosing = el
            .ancestors()
            .find_map(|n| anchor_by_node.get(&n.id()).copied());
        // anchors are pushed in document order, so the last one precedes this video
        let owner = enclosing.or_else(|| links.len().checked_sub(1));

        match owner {
            Some(i) => videos.push((links[i].clone(), video)),
            None => warn!(
                "dropping video {} on {}: no anchor encloses or precedes it",
                video.content_loc, base
            ),
        }
    }

    (links, videos)
}

fn video_asset(el: &ElementRef, base: &Url) -> Option<VideoAsset> {
    let attrs = el.value();
    let src = attrs
        .attr("src")
        .or_else(|| el.select(&SOURCE_SRC).next().and_then(|s| s.value().attr("src")))?;

    Some(VideoAsset {
        content_loc: resolve_url(base, src)?,
        thumbnail_loc: attrs
            .attr("data-thumbnail")
            .and_then(|t| resolve_url(base, t)),
        title: non_empty(attrs.attr("data-title")),
        description: non_empty(attrs.attr("data-description")),
    })
}

fn images(document: &Html, base: &Url) -> Vec<ImageAsset> {
    let mut images = document
        .select(&IMG_SRC)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve_url(base, src))
        .map(|loc| ImageAsset { loc })
        .collect::<Vec<ImageAsset>>();

    for el in document.select(&BACKGROUND_STYLE) {
        let style = el.value().attr("style").unwrap_or_default();
        for caps in BACKGROUND_IMAGE_RE.captures_iter(style) {
            match resolve_url(base, &caps[1]) {
                Some(loc) => images.push(ImageAsset { loc }),
                None => debug!("skipping unusable background image in {:?}", style),
            }
        }
    }

    images
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
