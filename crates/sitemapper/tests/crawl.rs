use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::time::Duration;

use futures::future::{self, LocalBoxFuture};
use sitemapper::{
    Error, ErrorRecord, FetchError, Fetcher, Field, ProjectedEntry, Site, Sitemapper,
    SitemapperConfig,
};

/// Serves canned sitemaps from memory and records every request.
#[derive(Default)]
struct ScriptedFetcher {
    bodies: HashMap<String, String>,
    fail_first: HashMap<String, usize>,
    pending: Vec<String>,
    delay: Option<Duration>,
    calls: RefCell<Vec<String>>,
    running: Cell<usize>,
    peak: Cell<usize>,
}

impl ScriptedFetcher {
    fn serve(mut self, url: &str, body: String) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == url).count()
    }
}

impl Fetcher for ScriptedFetcher {
    fn get<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            self.calls.borrow_mut().push(url.to_string());
            if self.pending.iter().any(|p| p == url) {
                future::pending::<()>().await;
            }

            self.running.set(self.running.get() + 1);
            self.peak.set(self.peak.get().max(self.running.get()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.running.set(self.running.get() - 1);

            let failures = self.fail_first.get(url).copied().unwrap_or(0);
            if self.calls_to(url) <= failures {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: "503 Service Unavailable".into(),
                });
            }
            match self.bodies.get(url) {
                Some(body) => Ok(body.clone().into_bytes()),
                None => Err(FetchError::Http {
                    url: url.to_string(),
                    status: "404 Not Found".into(),
                }),
            }
        })
    }
}

fn urlset(locs: &[&str]) -> String {
    let urls: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{loc}</loc></url>"))
        .collect();
    format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#)
}

fn sitemapindex(locs: &[&str]) -> String {
    let sitemaps: String = locs
        .iter()
        .map(|loc| format!("<sitemap><loc>{loc}</loc></sitemap>"))
        .collect();
    format!(
        r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{sitemaps}</sitemapindex>"#
    )
}

fn locs(sites: &[Site]) -> Vec<&str> {
    sites.iter().filter_map(Site::loc).collect()
}

const ROOT: &str = "https://example.com/sitemap.xml";

#[tokio::test]
async fn nested_indexes_keep_declaration_order() {
    let fetcher = ScriptedFetcher::default()
        .serve(
            ROOT,
            sitemapindex(&[
                "https://example.com/posts.xml",
                "https://example.com/nested.xml",
                "https://example.com/tags.xml",
            ]),
        )
        .serve(
            "https://example.com/nested.xml",
            sitemapindex(&["https://example.com/n1.xml", "https://example.com/n2.xml"]),
        )
        .serve(
            "https://example.com/posts.xml",
            urlset(&["https://example.com/p1", "https://example.com/p2"]),
        )
        .serve("https://example.com/n1.xml", urlset(&["https://example.com/n1"]))
        .serve("https://example.com/n2.xml", urlset(&["https://example.com/n2"]))
        .serve(
            "https://example.com/tags.xml",
            urlset(&["https://example.com/t1", "https://example.com/p1"]),
        );

    let sitemapper = Sitemapper::with_fetcher(SitemapperConfig::default(), fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(
        vec![
            "https://example.com/p1",
            "https://example.com/p2",
            "https://example.com/n1",
            "https://example.com/n2",
            "https://example.com/t1",
            "https://example.com/p1",
        ],
        locs(&data.sites)
    );
    assert!(data.errors.is_empty());
}

#[tokio::test]
async fn recovers_within_retry_budget() {
    let mut fetcher = ScriptedFetcher::default().serve(ROOT, urlset(&["https://example.com/"]));
    fetcher.fail_first.insert(ROOT.into(), 2);

    let config = SitemapperConfig {
        retries: 3,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(vec!["https://example.com/"], locs(&data.sites));
    assert!(data.errors.is_empty());
    assert_eq!(3, sitemapper.fetcher().calls_to(ROOT));
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    let mut fetcher = ScriptedFetcher::default().serve(ROOT, urlset(&["https://example.com/"]));
    fetcher.fail_first.insert(ROOT.into(), 10);

    let config = SitemapperConfig {
        retries: 2,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert!(data.sites.is_empty());
    assert_eq!(
        vec![ErrorRecord {
            kind: "HTTPError".into(),
            url: ROOT.into(),
            retries: 2,
        }],
        data.errors
    );
    assert_eq!(3, sitemapper.fetcher().calls_to(ROOT));
}

#[tokio::test]
async fn every_failing_child_is_reported_once() {
    let fetcher = ScriptedFetcher::default()
        .serve(
            ROOT,
            sitemapindex(&[
                "https://example.com/gone1.xml",
                "https://example.com/ok.xml",
                "https://example.com/gone2.xml",
            ]),
        )
        .serve("https://example.com/ok.xml", urlset(&["https://example.com/ok"]));

    let config = SitemapperConfig {
        retries: 1,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(vec!["https://example.com/ok"], locs(&data.sites));
    let failed: Vec<_> = data.errors.iter().map(|e| (e.url.as_str(), e.retries)).collect();
    assert_eq!(
        vec![
            ("https://example.com/gone1.xml", 1),
            ("https://example.com/gone2.xml", 1)
        ],
        failed
    );
}

#[tokio::test]
async fn hung_request_is_cancelled() {
    let mut fetcher = ScriptedFetcher::default();
    fetcher.pending.push(ROOT.into());

    let config = SitemapperConfig {
        timeout: 1,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = tokio::time::timeout(Duration::from_secs(5), sitemapper.fetch(Some(ROOT)))
        .await
        .expect("crawl should settle once the request times out")
        .unwrap();

    assert!(data.sites.is_empty());
    assert_eq!(1, data.errors.len());
    assert_eq!("TimeoutError", data.errors[0].kind);
    assert_eq!(0, sitemapper.timeouts().in_flight());
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let children: Vec<String> = (0..6)
        .map(|i| format!("https://example.com/part{i}.xml"))
        .collect();
    let refs: Vec<&str> = children.iter().map(String::as_str).collect();

    let mut fetcher = ScriptedFetcher::default().serve(ROOT, sitemapindex(&refs));
    for (i, child) in children.iter().enumerate() {
        fetcher = fetcher.serve(child, urlset(&[format!("https://example.com/{i}").as_str()]));
    }
    fetcher.delay = Some(Duration::from_millis(10));

    let config = SitemapperConfig {
        concurrency: 2,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(
        (0..6).map(|i| format!("https://example.com/{i}")).collect::<Vec<_>>(),
        locs(&data.sites)
    );
    assert_eq!(2, sitemapper.fetcher().peak.get());
    assert_eq!(7, sitemapper.fetcher().calls.borrow().len());
}

#[tokio::test]
async fn unbounded_concurrency_setting() {
    let fetcher = ScriptedFetcher::default()
        .serve(ROOT, sitemapindex(&["https://example.com/a.xml", "https://example.com/b.xml"]))
        .serve("https://example.com/a.xml", urlset(&["https://example.com/a"]))
        .serve("https://example.com/b.xml", urlset(&["https://example.com/b"]));

    let config = SitemapperConfig {
        concurrency: usize::MAX,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(
        vec!["https://example.com/a", "https://example.com/b"],
        locs(&data.sites)
    );
    assert!(data.errors.is_empty());
}

#[tokio::test]
async fn excluded_sitemaps_are_never_fetched() {
    let fetcher = ScriptedFetcher::default()
        .serve(
            ROOT,
            sitemapindex(&[
                "https://example.com/private-sitemap.xml",
                "https://example.com/public.xml",
            ]),
        )
        .serve(
            "https://example.com/private-sitemap.xml",
            urlset(&["https://example.com/hidden"]),
        )
        .serve(
            "https://example.com/public.xml",
            urlset(&[
                "https://example.com/page1",
                "https://example.com/private/page2",
                "https://example.com/doc.pdf",
            ]),
        );

    let config = SitemapperConfig {
        exclusions: vec!["private".into(), r"\.pdf$".into()],
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(vec!["https://example.com/page1"], locs(&data.sites));
    assert!(data.errors.is_empty());
    assert_eq!(
        0,
        sitemapper
            .fetcher()
            .calls_to("https://example.com/private-sitemap.xml")
    );
}

#[tokio::test]
async fn invalid_exclusion_is_rejected() {
    let config = SitemapperConfig {
        exclusions: vec!["(unclosed".into()],
        ..Default::default()
    };
    let res = Sitemapper::with_fetcher(config, ScriptedFetcher::default());
    assert!(matches!(res, Err(Error::InvalidExclusion { .. })));
}

#[tokio::test]
async fn lastmod_cutoff() {
    let body = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        <url><loc>https://example.com/old</loc><lastmod>2022-06-01</lastmod></url>
        <url><loc>https://example.com/new</loc><lastmod>2023-06-01T10:00:00+00:00</lastmod></url>
        <url><loc>https://example.com/undated</loc></url>
    </urlset>"#;
    let fetcher = ScriptedFetcher::default().serve(ROOT, body.into());

    let config = SitemapperConfig {
        lastmod: Some(1_672_531_200),
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(
        vec!["https://example.com/new", "https://example.com/undated"],
        locs(&data.sites)
    );
}

#[tokio::test]
async fn projected_fields() {
    let body = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
            xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"
            xmlns:video="http://www.google.com/schemas/sitemap-video/1.1">
        <url>
            <loc>https://example.com/page</loc>
            <lastmod>2023-05-01</lastmod>
            <priority>0.5</priority>
            <image:image>
                <image:loc>https://example.com/image.jpg</image:loc>
            </image:image>
            <video:video>
                <video:title>Launch</video:title>
            </video:video>
        </url>
    </urlset>"#;
    let fetcher = ScriptedFetcher::default().serve(ROOT, body.into());

    let fields = BTreeMap::from([
        (Field::Loc, true),
        (Field::Lastmod, false),
        (Field::Sitemap, true),
        (Field::ImageLoc, true),
        (Field::VideoTitle, true),
    ]);
    let config = SitemapperConfig {
        fields: Some(fields),
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(
        vec![Site::Entry(ProjectedEntry {
            loc: Some("https://example.com/page".into()),
            sitemap: Some(ROOT.into()),
            image_loc: Some("https://example.com/image.jpg".into()),
            video_title: Some("Launch".into()),
            ..Default::default()
        })],
        data.sites
    );
}

#[tokio::test]
async fn malformed_documents() {
    let fetcher = ScriptedFetcher::default()
        .serve(
            ROOT,
            sitemapindex(&["https://example.com/feed.xml", "https://example.com/broken.xml"]),
        )
        .serve(
            "https://example.com/feed.xml",
            "<rss><channel></channel></rss>".into(),
        )
        .serve("https://example.com/broken.xml", "<urlset><url>".into());

    let sitemapper = Sitemapper::with_fetcher(SitemapperConfig::default(), fetcher).unwrap();
    let data = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert!(data.sites.is_empty());
    let kinds: Vec<_> = data.errors.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(vec!["UnknownStateError", "ParseError"], kinds);
}

#[tokio::test]
async fn fetching_twice_gives_same_result() {
    let fetcher = ScriptedFetcher::default()
        .serve(ROOT, sitemapindex(&["https://example.com/a.xml", "https://example.com/b.xml"]))
        .serve("https://example.com/a.xml", urlset(&["https://example.com/a"]));

    let sitemapper = Sitemapper::with_fetcher(SitemapperConfig::default(), fetcher).unwrap();
    let first = sitemapper.fetch(Some(ROOT)).await.unwrap();
    let second = sitemapper.fetch(Some(ROOT)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(1, first.sites.len());
    assert_eq!(1, first.errors.len());
}

#[tokio::test]
async fn target_defaults_to_configured_url() {
    let fetcher = ScriptedFetcher::default().serve(ROOT, urlset(&["https://example.com/"]));
    let config = SitemapperConfig {
        url: Some(ROOT.into()),
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, fetcher).unwrap();

    let data = sitemapper.fetch(None).await.unwrap();
    assert_eq!(ROOT, data.url);
    assert_eq!(vec!["https://example.com/"], locs(&data.sites));

    let data = sitemapper.fetch(Some("")).await.unwrap();
    assert_eq!(ROOT, data.url);
    assert_eq!(vec!["https://example.com/"], locs(&data.sites));

    let unconfigured =
        Sitemapper::with_fetcher(SitemapperConfig::default(), ScriptedFetcher::default()).unwrap();
    assert!(matches!(
        unconfigured.fetch(None).await,
        Err(Error::MissingTarget)
    ));
    assert!(matches!(
        unconfigured.fetch(Some("")).await,
        Err(Error::MissingTarget)
    ));
}

#[tokio::test]
async fn local_files() {
    let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
    write!(
        file,
        "{}",
        urlset(&[
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3"
        ])
    )
    .unwrap();
    let target = file.path().to_str().unwrap();

    let config = SitemapperConfig {
        retries: 3,
        ..Default::default()
    };
    let sitemapper = Sitemapper::with_fetcher(config, ScriptedFetcher::default()).unwrap();
    let data = sitemapper.fetch(Some(target)).await.unwrap();
    assert_eq!(
        vec![
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3"
        ],
        locs(&data.sites)
    );
    assert!(sitemapper.fetcher().calls.borrow().is_empty());

    let data = sitemapper
        .fetch(Some("/non/existent/sitemap.xml"))
        .await
        .unwrap();
    assert!(data.sites.is_empty());
    assert_eq!(
        vec![ErrorRecord {
            kind: "FileNotFoundError".into(),
            url: "/non/existent/sitemap.xml".into(),
            retries: 0,
        }],
        data.errors
    );
}

#[tokio::test]
async fn local_gzipped_file() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(urlset(&["https://example.com/zipped"]).as_bytes())
        .unwrap();

    let mut file = tempfile::Builder::new().suffix(".xml.gz").tempfile().unwrap();
    file.write_all(&enc.finish().unwrap()).unwrap();

    let sitemapper =
        Sitemapper::with_fetcher(SitemapperConfig::default(), ScriptedFetcher::default()).unwrap();
    let data = sitemapper
        .fetch(Some(file.path().to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(vec!["https://example.com/zipped"], locs(&data.sites));
}
