use serde::Serialize;

use crate::config::Field;

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum Sitemap {
    /// `<sitemapindex>`, holding the `loc` of every child sitemap
    Index(Vec<String>),
    /// `<urlset>`, holding page entries
    Urlset(Vec<SiteEntry>),
}

/// One `<url>` of a urlset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f64>,
    pub image: Option<Image>,
    pub video: Option<Video>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Image {
    pub loc: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Video {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_loc: Option<String>,
}

/// A discovered page, either its bare URL or the projected fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Site {
    Url(String),
    Entry(ProjectedEntry),
}

impl Site {
    pub fn loc(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Entry(entry) => entry.loc.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectedEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<String>,
    #[serde(rename = "image:loc", skip_serializing_if = "Option::is_none")]
    pub image_loc: Option<String>,
    #[serde(rename = "image:title", skip_serializing_if = "Option::is_none")]
    pub image_title: Option<String>,
    #[serde(rename = "image:caption", skip_serializing_if = "Option::is_none")]
    pub image_caption: Option<String>,
    #[serde(rename = "video:title", skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(rename = "video:description", skip_serializing_if = "Option::is_none")]
    pub video_description: Option<String>,
    #[serde(rename = "video:thumbnail_loc", skip_serializing_if = "Option::is_none")]
    pub video_thumbnail_loc: Option<String>,
}

impl ProjectedEntry {
    /// Keeps the requested `fields` of `entry`, `sitemap` being the document
    /// the entry was read from.
    pub fn new(entry: SiteEntry, sitemap: &str, fields: &[Field]) -> Self {
        let SiteEntry {
            loc,
            lastmod,
            changefreq,
            priority,
            image,
            video,
        } = entry;
        let image = image.unwrap_or_default();
        let video = video.unwrap_or_default();

        let mut projected = Self::default();
        for field in fields {
            match field {
                Field::Loc => projected.loc = Some(loc.clone()),
                Field::Lastmod => projected.lastmod = lastmod.clone(),
                Field::Changefreq => projected.changefreq = changefreq.clone(),
                Field::Priority => projected.priority = priority,
                Field::Sitemap => projected.sitemap = Some(sitemap.to_string()),
                Field::ImageLoc => projected.image_loc = image.loc.clone(),
                Field::ImageTitle => projected.image_title = image.title.clone(),
                Field::ImageCaption => projected.image_caption = image.caption.clone(),
                Field::VideoTitle => projected.video_title = video.title.clone(),
                Field::VideoDescription => projected.video_description = video.description.clone(),
                Field::VideoThumbnailLoc => {
                    projected.video_thumbnail_loc = video.thumbnail_loc.clone()
                }
            }
        }
        projected
    }

    /// Textual value of `field`, as written in tabular outputs.
    pub fn get(&self, field: Field) -> Option<String> {
        match field {
            Field::Loc => self.loc.clone(),
            Field::Lastmod => self.lastmod.clone(),
            Field::Changefreq => self.changefreq.clone(),
            Field::Priority => self.priority.map(|p| p.to_string()),
            Field::Sitemap => self.sitemap.clone(),
            Field::ImageLoc => self.image_loc.clone(),
            Field::ImageTitle => self.image_title.clone(),
            Field::ImageCaption => self.image_caption.clone(),
            Field::VideoTitle => self.video_title.clone(),
            Field::VideoDescription => self.video_description.clone(),
            Field::VideoThumbnailLoc => self.video_thumbnail_loc.clone(),
        }
    }
}

/// Terminal failure of one sitemap node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub retries: usize,
}

/// What crawling one sitemap node, and everything below it, produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlResult {
    pub sites: Vec<Site>,
    pub errors: Vec<ErrorRecord>,
}

impl CrawlResult {
    pub fn from_sites(sites: Vec<Site>) -> Self {
        Self {
            sites,
            errors: vec![],
        }
    }

    pub fn failed(error: ErrorRecord) -> Self {
        Self {
            sites: vec![],
            errors: vec![error],
        }
    }

    /// Appends `other` after the sites and errors already collected.
    pub fn merge(&mut self, other: CrawlResult) {
        self.sites.extend(other.sites);
        self.errors.extend(other.errors);
    }
}

impl FromIterator<CrawlResult> for CrawlResult {
    fn from_iter<I: IntoIterator<Item = CrawlResult>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, res| {
            acc.merge(res);
            acc
        })
    }
}

/// Outcome of [`Sitemapper::fetch`](crate::Sitemapper::fetch).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitesData {
    pub url: String,
    pub sites: Vec<Site>,
    pub errors: Vec<ErrorRecord>,
}
