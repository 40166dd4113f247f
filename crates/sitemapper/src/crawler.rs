use futures::future::{self, LocalBoxFuture};

use crate::config::{Field, SitemapperConfig};
use crate::error::{Error, FetchError};
use crate::fetcher::{self, Fetcher, HttpFetcher, Target};
use crate::filter::{self, Exclusions};
use crate::gzip;
use crate::limiter::ConcurrencyLimiter;
use crate::parser;
use crate::sitemap::{CrawlResult, ErrorRecord, ProjectedEntry, Site, SiteEntry, Sitemap, SitesData};
use crate::timeout::TimeoutRegistry;

macro_rules! debug_log {
    ($sitemapper:expr, $($arg:tt)+) => {
        if $sitemapper.config.debug {
            log::debug!($($arg)+);
        }
    };
}

/// Crawls sitemap trees, from a sitemap index down to its pages.
///
/// The configuration is fixed for the lifetime of the instance and shared
/// read-only by every node of a crawl.
pub struct Sitemapper<F = HttpFetcher> {
    config: SitemapperConfig,
    exclusions: Exclusions,
    projection: Option<Vec<Field>>,
    fetcher: F,
    timeouts: TimeoutRegistry,
}

impl Sitemapper<HttpFetcher> {
    pub fn new(config: SitemapperConfig) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F> Sitemapper<F>
where
    F: Fetcher,
{
    /// Uses `fetcher` to download remote sitemaps instead of the HTTP client.
    pub fn with_fetcher(config: SitemapperConfig, fetcher: F) -> Result<Self, Error> {
        let exclusions = Exclusions::new(&config.exclusions)?;
        let projection = config.projection();
        Ok(Self {
            config,
            exclusions,
            projection,
            fetcher,
            timeouts: TimeoutRegistry::new(),
        })
    }

    pub fn config(&self) -> &SitemapperConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn timeouts(&self) -> &TimeoutRegistry {
        &self.timeouts
    }

    /// Crawls `target`, or the configured `url` when `None` or empty.
    ///
    /// Failures below the root are reported in [`SitesData::errors`], the
    /// only error returned here is [`Error::MissingTarget`].
    pub async fn fetch(&self, target: Option<&str>) -> Result<SitesData, Error> {
        let url = target
            .filter(|url| !url.is_empty())
            .or(self.config.url.as_deref())
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingTarget)?
            .to_string();

        let CrawlResult { sites, errors } = self.crawl(&url).await;
        debug_log!(
            self,
            "Crawled {url}: {} sites, {} errors",
            sites.len(),
            errors.len()
        );

        Ok(SitesData { url, sites, errors })
    }

    /// Recursively crawls the sitemap at `url`.
    ///
    /// A node failing more than `retries` times contributes a single
    /// [`ErrorRecord`]; it never fails its parent or siblings.
    pub fn crawl<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, CrawlResult> {
        Box::pin(async move {
            let mut attempt = 0;
            let sitemap = loop {
                match self.parse(url).await {
                    Ok(sitemap) => break sitemap,
                    Err(e) if e.is_transient() && attempt < self.config.retries => {
                        attempt += 1;
                        debug_log!(self, "Retry attempt {attempt} for {url} after: {e}");
                    }
                    Err(e) => {
                        if let FetchError::UnknownState { .. } = e {
                            debug_log!(self, "Unknown state for {url}, not a urlset nor a sitemapindex");
                        }
                        log::warn!("Skipping sitemap {url} after {attempt} retries got: {e}");
                        return CrawlResult::failed(ErrorRecord {
                            kind: e.kind().to_string(),
                            url: url.to_string(),
                            retries: attempt,
                        });
                    }
                }
            };

            match sitemap {
                Sitemap::Urlset(entries) => {
                    debug_log!(self, "Urlset found at {url} with {} entries", entries.len());
                    CrawlResult::from_sites(self.select(url, entries))
                }
                Sitemap::Index(children) => {
                    debug_log!(self, "Sitemapindex found at {url} with {} children", children.len());
                    self.crawl_children(children).await
                }
            }
        })
    }

    async fn crawl_children(&self, children: Vec<String>) -> CrawlResult {
        let children: Vec<String> = children
            .into_iter()
            .filter(|child| {
                let excluded = self.exclusions.is_excluded(child);
                if excluded {
                    debug_log!(self, "Excluded sitemap {child}");
                }
                !excluded
            })
            .collect();

        let limiter = ConcurrencyLimiter::new(self.config.concurrency);
        let results =
            future::join_all(children.iter().map(|child| limiter.run(self.crawl(child)))).await;

        results.into_iter().collect()
    }

    /// Fetches, decompresses and parses a single sitemap document.
    async fn parse(&self, url: &str) -> Result<Sitemap, FetchError> {
        let body = match Target::classify(url) {
            Target::Local(path) => {
                debug_log!(self, "Reading local sitemap {}", path.display());
                fetcher::read_local(&path).await?
            }
            Target::Remote(remote) => {
                debug_log!(self, "Fetching {remote} within {}ms", self.config.timeout);
                fetcher::fetch_with_timeout(
                    &self.fetcher,
                    &self.timeouts,
                    &remote,
                    self.config.timeout(),
                )
                .await?
            }
        };

        let body = if gzip::is_compressed(url) {
            gzip::decompress(&body).map_err(|source| FetchError::Decompression {
                url: url.to_string(),
                source,
            })?
        } else {
            body
        };

        parser::parse_sitemap(url, &body)
    }

    /// Filters the entries of the urlset at `sitemap` and shapes them as sites.
    fn select(&self, sitemap: &str, entries: Vec<SiteEntry>) -> Vec<Site> {
        entries
            .into_iter()
            .filter(|entry| !self.exclusions.is_excluded(&entry.loc))
            .filter(|entry| filter::is_recent(entry, self.config.lastmod))
            .map(|entry| match &self.projection {
                Some(fields) => Site::Entry(ProjectedEntry::new(entry, sitemap, fields)),
                None => Site::Url(entry.loc),
            })
            .collect()
    }
}
