use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapperConfig {
    /// Default target used when `fetch` is called without one
    #[serde(default)]
    pub url: Option<String>,

    /// Per request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of child sitemaps crawled at once, per sitemap index
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_retries")]
    pub retries: usize,

    #[serde(default)]
    pub debug: bool,

    /// Cutoff in seconds since the epoch, older entries are dropped
    #[serde(default)]
    pub lastmod: Option<i64>,

    /// Regular expressions, matching page or sitemap URLs are skipped
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// When set, sites are returned as objects holding the enabled fields
    #[serde(default)]
    pub fields: Option<BTreeMap<Field, bool>>,

    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,

    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SitemapperConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
            concurrency: default_concurrency(),
            retries: default_retries(),
            debug: false,
            lastmod: None,
            exclusions: vec![],
            fields: None,
            request_headers: BTreeMap::new(),
            reject_unauthorized: default_reject_unauthorized(),
            proxy: None,
            user_agent: default_user_agent(),
        }
    }
}

impl SitemapperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Enabled fields in declaration order, `None` when sites are plain URLs.
    pub fn projection(&self) -> Option<Vec<Field>> {
        self.fields.as_ref().map(|fields| {
            fields
                .iter()
                .filter_map(|(field, enabled)| enabled.then_some(*field))
                .collect()
        })
    }
}

fn default_timeout() -> u64 {
    15_000
}

fn default_concurrency() -> usize {
    10
}

fn default_retries() -> usize {
    0
}

fn default_reject_unauthorized() -> bool {
    true
}

fn default_user_agent() -> String {
    String::from("sitemapper")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Field {
    #[serde(rename = "loc")]
    #[cfg_attr(feature = "clap", value(name = "loc"))]
    Loc,
    #[serde(rename = "lastmod")]
    #[cfg_attr(feature = "clap", value(name = "lastmod"))]
    Lastmod,
    #[serde(rename = "changefreq")]
    #[cfg_attr(feature = "clap", value(name = "changefreq"))]
    Changefreq,
    #[serde(rename = "priority")]
    #[cfg_attr(feature = "clap", value(name = "priority"))]
    Priority,
    #[serde(rename = "sitemap")]
    #[cfg_attr(feature = "clap", value(name = "sitemap"))]
    Sitemap,
    #[serde(rename = "image:loc")]
    #[cfg_attr(feature = "clap", value(name = "image:loc"))]
    ImageLoc,
    #[serde(rename = "image:title")]
    #[cfg_attr(feature = "clap", value(name = "image:title"))]
    ImageTitle,
    #[serde(rename = "image:caption")]
    #[cfg_attr(feature = "clap", value(name = "image:caption"))]
    ImageCaption,
    #[serde(rename = "video:title")]
    #[cfg_attr(feature = "clap", value(name = "video:title"))]
    VideoTitle,
    #[serde(rename = "video:description")]
    #[cfg_attr(feature = "clap", value(name = "video:description"))]
    VideoDescription,
    #[serde(rename = "video:thumbnail_loc")]
    #[cfg_attr(feature = "clap", value(name = "video:thumbnail_loc"))]
    VideoThumbnailLoc,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loc => "loc",
            Self::Lastmod => "lastmod",
            Self::Changefreq => "changefreq",
            Self::Priority => "priority",
            Self::Sitemap => "sitemap",
            Self::ImageLoc => "image:loc",
            Self::ImageTitle => "image:title",
            Self::ImageCaption => "image:caption",
            Self::VideoTitle => "video:title",
            Self::VideoDescription => "video:description",
            Self::VideoThumbnailLoc => "video:thumbnail_loc",
        }
    }
}
