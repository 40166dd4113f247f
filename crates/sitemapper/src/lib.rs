mod config;
mod crawler;
mod error;
mod fetcher;
mod filter;
mod gzip;
mod limiter;
mod parser;
mod sitemap;
mod timeout;

pub use config::{Field, SitemapperConfig};
pub use crawler::Sitemapper;
pub use error::{Error, FetchError};
pub use fetcher::{fetch_with_timeout, read_local, Fetcher, HttpFetcher, Target};
pub use filter::{is_recent, parse_lastmod, Exclusions};
pub use gzip::{decompress, is_compressed};
pub use limiter::ConcurrencyLimiter;
pub use parser::parse_sitemap;
pub use sitemap::{
    CrawlResult, ErrorRecord, Image, ProjectedEntry, Site, SiteEntry, Sitemap, SitesData, Video,
};
pub use timeout::{TimeoutGuard, TimeoutRegistry};

pub use futures::future::LocalBoxFuture;
