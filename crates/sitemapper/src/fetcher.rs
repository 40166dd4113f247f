use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, LocalBoxFuture};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode, Url};

use crate::config::SitemapperConfig;
use crate::error::{Error, FetchError};
use crate::timeout::TimeoutRegistry;

/// Where a sitemap is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Remote(String),
    Local(PathBuf),
}

impl Target {
    /// Existing files win over URLs; what is neither an existing file nor an
    /// http(s) URL is a local file that doesn't exist.
    pub fn classify(location: &str) -> Self {
        let path = Path::new(location);
        if !location.is_empty() && path.exists() {
            return Self::Local(path.to_path_buf());
        }
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(location.to_string()),
            _ => Self::Local(path.to_path_buf()),
        }
    }
}

/// Downloads the raw body of a remote sitemap.
pub trait Fetcher {
    fn get<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &SitemapperConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.request_headers {
            let invalid = || Error::InvalidHeader { name: name.clone() };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        let mut builder = ClientBuilder::new()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .danger_accept_invalid_certs(!config.reject_unauthorized);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn get<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            let request_err = |source| FetchError::Request {
                url: url.to_string(),
                source,
            };

            let resp = self.client.get(url).send().await.map_err(request_err)?;
            let status = resp.status();
            if status != StatusCode::OK {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: status.to_string(),
                });
            }

            let body = resp.bytes().await.map_err(request_err)?;
            Ok(body.to_vec())
        })
    }
}

/// Reads a local sitemap, bypassing the network and any timeout.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path).await.map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => FetchError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => FetchError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Fetches a remote sitemap, cancelling the request once `timeout` elapses.
pub async fn fetch_with_timeout<F>(
    fetcher: &F,
    timeouts: &TimeoutRegistry,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError>
where
    F: Fetcher + ?Sized,
{
    let (handle, registration) = AbortHandle::new_pair();
    let _guard = timeouts.arm(url, timeout, handle);

    match Abortable::new(fetcher.get(url), registration).await {
        Ok(res) => res,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            elapsed: timeout,
        }),
    }
}
