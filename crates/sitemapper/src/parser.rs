use lazy_static::lazy_static;
use sxd_document::{dom, parser};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};

use crate::error::FetchError;
use crate::sitemap::{Image, SiteEntry, Sitemap, Video};

lazy_static! {
    static ref XP_FACTORY: Factory = Factory::new();
}

// Sitemaps are matched by local name so that documents missing the
// sitemaps.org namespace are still understood.
const URL_ENTRIES: &str = "*[local-name()='url']";
const CHILD_SITEMAPS: &str = "*[local-name()='sitemap']/*[local-name()='loc']";

/// Parses the raw body of the sitemap found at `url`.
pub fn parse_sitemap(url: &str, body: &[u8]) -> Result<Sitemap, FetchError> {
    let parse_err = |message: String| FetchError::Parse {
        url: url.to_string(),
        message,
    };

    let xml = std::str::from_utf8(body).map_err(|e| parse_err(e.to_string()))?;
    let xml = xml.trim_start_matches('\u{feff}');

    let package = parser::parse(xml).map_err(|e| parse_err(e.to_string()))?;
    let document = package.as_document();

    let root = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| child.element());
    let root = match root {
        Some(root) => root,
        None => return Err(unknown_state(url)),
    };

    match root.name().local_part() {
        "urlset" => {
            let entries = select(URL_ENTRIES, root)
                .map_err(parse_err)?
                .into_iter()
                .filter_map(|node| match node {
                    Node::Element(element) => read_entry(element),
                    _ => None,
                })
                .collect();
            Ok(Sitemap::Urlset(entries))
        }
        "sitemapindex" => {
            let children = select(CHILD_SITEMAPS, root)
                .map_err(parse_err)?
                .into_iter()
                .map(|node| node.string_value().trim().to_string())
                .filter(|loc| !loc.is_empty())
                .collect();
            Ok(Sitemap::Index(children))
        }
        _ => Err(unknown_state(url)),
    }
}

fn unknown_state(url: &str) -> FetchError {
    FetchError::UnknownState {
        url: url.to_string(),
    }
}

/// Nodes matched by `expr` relative to `element`, in document order.
fn select<'d>(expr: &str, element: dom::Element<'d>) -> Result<Vec<Node<'d>>, String> {
    let xpath = XP_FACTORY
        .build(expr)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Missing XPath {expr}"))?;
    let context = Context::new();
    match xpath.evaluate(&context, element).map_err(|e| e.to_string())? {
        Value::Nodeset(nodes) => Ok(nodes.document_order()),
        _ => Ok(vec![]),
    }
}

fn read_entry(url: dom::Element) -> Option<SiteEntry> {
    let mut loc = None;
    let mut entry = SiteEntry::default();

    for child in child_elements(url) {
        match child.name().local_part() {
            "loc" => loc = text_of(child),
            "lastmod" => entry.lastmod = text_of(child),
            "changefreq" => entry.changefreq = text_of(child),
            "priority" => entry.priority = text_of(child).and_then(|p| p.parse().ok()),
            "image" if entry.image.is_none() => entry.image = Some(read_image(child)),
            "video" if entry.video.is_none() => entry.video = Some(read_video(child)),
            _ => (),
        }
    }

    entry.loc = loc?;
    Some(entry)
}

fn read_image(image: dom::Element) -> Image {
    let mut res = Image::default();
    for child in child_elements(image) {
        match child.name().local_part() {
            "loc" => res.loc = text_of(child),
            "title" => res.title = text_of(child),
            "caption" => res.caption = text_of(child),
            _ => (),
        }
    }
    res
}

fn read_video(video: dom::Element) -> Video {
    let mut res = Video::default();
    for child in child_elements(video) {
        match child.name().local_part() {
            "title" => res.title = text_of(child),
            "description" => res.description = text_of(child),
            "thumbnail_loc" => res.thumbnail_loc = text_of(child),
            _ => (),
        }
    }
    res
}

fn child_elements<'d>(element: dom::Element<'d>) -> impl Iterator<Item = dom::Element<'d>> {
    element
        .children()
        .into_iter()
        .filter_map(|child| child.element())
}

/// Trimmed text content, `None` when blank.
fn text_of(element: dom::Element) -> Option<String> {
    let text: String = element
        .children()
        .into_iter()
        .filter_map(|child| child.text())
        .map(|text| text.text().to_string())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
