use std::{collections::HashMap, sync::Arc};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use crate::{
    types::{AnchorRef, BuildError, ImageAsset, UrlEntry, VideoAsset},
    utils::{IMAGE_NS, SITEMAP_NS, SITEMAP_URL_LIMIT, VIDEO_NS},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapUrl {
    pub entry: UrlEntry,
    pub video: Option<VideoAsset>,
}

/// A sealed `<urlset>`. Every entry lists the same page-wide images.
#[derive(Debug, Clone)]
pub struct SitemapDocument {
    urls: Vec<SitemapUrl>,
    images: Arc<Vec<ImageAsset>>,
}

impl SitemapDocument {
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn urls(&self) -> &[SitemapUrl] {
        &self.urls
    }

    pub fn images(&self) -> &[ImageAsset] {
        &self.images
    }

    pub fn to_xml(&self) -> Result<String, BuildError> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

        write(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write(
            &mut w,
            Event::Start(BytesStart::new("urlset").with_attributes([("xmlns", SITEMAP_NS)])),
        )?;

        for url in &self.urls {
            write(&mut w, Event::Start(BytesStart::new("url")))?;
            text_element(&mut w, "loc", url.entry.loc.as_str())?;
            text_element(&mut w, "lastmod", &url.entry.lastmod)?;
            text_element(&mut w, "changefreq", url.entry.changefreq)?;
            text_element(&mut w, "priority", url.entry.priority)?;

            for image in self.images.iter() {
                write(
                    &mut w,
                    Event::Start(
                        BytesStart::new("image:image").with_attributes([("xmlns:image", IMAGE_NS)]),
                    ),
                )?;
                text_element(&mut w, "image:loc", image.loc.as_str())?;
                write(&mut w, Event::End(BytesEnd::new("image:image")))?;
            }

            if let Some(video) = &url.video {
                write_video(&mut w, video)?;
            }

            write(&mut w, Event::End(BytesEnd::new("url")))?;
        }

        write(&mut w, Event::End(BytesEnd::new("urlset")))?;

        String::from_utf8(w.into_inner()).map_err(|e| BuildError::Xml(e.to_string()))
    }
}

fn write_video(w: &mut Writer<Vec<u8>>, video: &VideoAsset) -> Result<(), BuildError> {
    write(
        w,
        Event::Start(BytesStart::new("video:video").with_attributes([("xmlns:video", VIDEO_NS)])),
    )?;
    text_element(w, "video:content_loc", video.content_loc.as_str())?;
    if let Some(thumbnail) = &video.thumbnail_loc {
        text_element(w, "video:thumbnail_loc", thumbnail.as_str())?;
    }
    if let Some(title) = &video.title {
        text_element(w, "video:title", title)?;
    }
    if let Some(description) = &video.description {
        text_element(w, "video:description", description)?;
    }
    write(w, Event::End(BytesEnd::new("video:video")))
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), BuildError> {
    write(w, Event::Start(BytesStart::new(name)))?;
    write(w, Event::Text(BytesText::new(text)))?;
    write(w, Event::End(BytesEnd::new(name)))
}

fn write(w: &mut Writer<Vec<u8>>, event: Event) -> Result<(), BuildError> {
    w.write_event(event)
        .map_err(|e| BuildError::Xml(e.to_string()))
}

/// Folds annotated links into documents of at most `max_urls` entries.
pub struct SitemapBuilder {
    max_urls: usize,
}

impl Default for SitemapBuilder {
    fn default() -> Self {
        SitemapBuilder::new(SITEMAP_URL_LIMIT)
    }
}

impl SitemapBuilder {
    pub fn new(max_urls: usize) -> Self {
        SitemapBuilder {
            max_urls: max_urls.clamp(1, SITEMAP_URL_LIMIT),
        }
    }

    /// Always returns at least one document; the last one may be empty.
    pub fn build(
        &self,
        links: Vec<(AnchorRef, UrlEntry)>,
        images: Vec<ImageAsset>,
        videos: Vec<(AnchorRef, VideoAsset)>,
    ) -> Vec<SitemapDocument> {
        let images = Arc::new(images);

        let mut video_by_link: HashMap<usize, VideoAsset> = HashMap::new();
        for (anchor, video) in videos {
            if video_by_link.contains_key(&anchor.position) {
                debug!(
                    "anchor {} already has a video, skipping {}",
                    anchor.href, video.content_loc
                );
                continue;
            }
            video_by_link.insert(anchor.position, video);
        }

        let mut sitemaps = vec![];
        let mut urls = Vec::with_capacity(links.len().min(self.max_urls));
        let mut counter = 0;

        for (anchor, entry) in links {
            let video = video_by_link.remove(&anchor.position);
            urls.push(SitemapUrl { entry, video });

            counter += 1;
            if counter >= self.max_urls {
                debug!("sealing sitemap {} with {} urls", sitemaps.len(), counter);
                sitemaps.push(SitemapDocument {
                    urls: std::mem::take(&mut urls),
                    images: images.clone(),
                });
                counter = 0;
            }
        }

        sitemaps.push(SitemapDocument { urls, images });
        sitemaps
    }
}
