use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a single sitemap node could not be turned into sites or children.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} timed out after {} milliseconds", .elapsed.as_millis())]
    Timeout { url: String, elapsed: Duration },

    #[error("HTTP error for {url}: {status}")]
    Http { url: String, status: String },

    #[error("request error for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("couldn't decompress {url}: {source}")]
    Decompression {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't parse XML from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("{url} is neither a urlset nor a sitemapindex")]
    UnknownState { url: String },

    #[error("no such file: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("couldn't read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Name written into [`ErrorRecord::kind`](crate::ErrorRecord).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TimeoutError",
            Self::Http { .. } => "HTTPError",
            Self::Request { .. } => "RequestError",
            Self::Decompression { .. } => "DecompressionError",
            Self::Parse { .. } => "ParseError",
            Self::UnknownState { .. } => "UnknownStateError",
            Self::FileNotFound { .. } => "FileNotFoundError",
            Self::Io { .. } => "IOError",
        }
    }

    /// Whether fetching the same node again may give a different outcome.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::FileNotFound { .. })
    }
}

/// Errors raised while building a [`Sitemapper`](crate::Sitemapper) or
/// resolving what to crawl. Crawl failures never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid exclusion pattern {pattern:?}: {source}")]
    InvalidExclusion {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid request header {name:?}")]
    InvalidHeader { name: String },

    #[error("couldn't build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("no sitemap URL or path to fetch")]
    MissingTarget,
}
