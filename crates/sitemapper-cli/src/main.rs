mod output;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::{env, io};

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use sitemapper::{parse_lastmod, Field, Sitemapper, SitemapperConfig};
use tokio::runtime;

use crate::output::{Format, Output};

/// Recursive sitemap crawler
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Sitemap URL or local file, defaults to the configured `url`
    pub target: Option<String>,
    /// Optional yaml configuration file, overridden by command line options
    #[arg(env = "SITEMAPPER_CONFIG", long, short)]
    pub config: Option<PathBuf>,
    /// Override per request timeout, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Override maximum number of child sitemaps crawled at once
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Override number of retries of a failing sitemap
    #[arg(long)]
    pub retries: Option<usize>,
    /// Only keep pages modified since, as epoch seconds or a W3C date
    #[arg(long, value_parser = parse_cutoff)]
    pub lastmod: Option<i64>,
    /// Skip page and sitemap URLs matching this regex, can be repeated
    #[arg(long = "exclude", short = 'x')]
    pub exclusions: Vec<String>,
    /// Output sites as records of these fields, can be repeated
    #[arg(value_enum, long = "field", short = 'f')]
    pub fields: Vec<Field>,
    /// Extra request header as NAME:VALUE, can be repeated
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,
    /// Send requests through this proxy
    #[arg(long)]
    pub proxy: Option<String>,
    /// Override user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    #[arg(value_enum, long, default_value_t = Format::Plain)]
    pub format: Format,
    /// Path to the output file, defaults to stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Log crawling decisions
    #[arg(long)]
    pub debug: bool,
    /// When quiet only errors are logged
    #[arg(long, short, conflicts_with = "debug")]
    pub quiet: bool,
    #[arg(long, hide = true)]
    pub completion: bool,
}

impl TryFrom<&Args> for SitemapperConfig {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            SitemapperConfig::default()
        };
        if let Some(target) = &args.target {
            conf.url = Some(target.to_string());
        }
        if let Some(timeout) = args.timeout {
            conf.timeout = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            conf.concurrency = concurrency;
        }
        if let Some(retries) = args.retries {
            conf.retries = retries;
        }
        if let Some(lastmod) = args.lastmod {
            conf.lastmod = Some(lastmod);
        }
        conf.exclusions.extend(args.exclusions.iter().cloned());
        if !args.fields.is_empty() {
            let fields: BTreeMap<Field, bool> = args.fields.iter().map(|f| (*f, true)).collect();
            conf.fields = Some(fields);
        }
        conf.request_headers.extend(args.headers.iter().cloned());
        if args.insecure {
            conf.reject_unauthorized = false;
        }
        if let Some(proxy) = &args.proxy {
            conf.proxy = Some(proxy.to_string());
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if args.debug {
            conf.debug = true;
        }
        Ok(conf)
    }
}

fn parse_cutoff(s: &str) -> Result<i64, String> {
    s.parse()
        .ok()
        .or_else(|| parse_lastmod(s))
        .ok_or_else(|| format!("`{s}` is neither epoch seconds nor a W3C date"))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("`{s}` is not a NAME:VALUE header")),
    }
}

pub fn crawl(args: Args) -> anyhow::Result<()> {
    let conf = SitemapperConfig::try_from(&args)?;
    let fields = conf.projection();
    let sitemapper = Sitemapper::new(conf)?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let data = rt.block_on(sitemapper.fetch(None))?;

    if !data.errors.is_empty() {
        log::warn!(
            "{} sitemaps of {} couldn't be crawled",
            data.errors.len(),
            data.url
        );
    }

    let mut out = Output::create(args.output.as_deref())?;
    output::render(&data, args.format, fields.as_deref(), &mut out)?;
    if let Some(path) = &args.output {
        log::info!("Wrote {} sites to {}", data.sites.len(), path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.completion {
        generate(Shell::Bash, &mut Args::command(), "sitemapper", &mut io::stdout());
        return Ok(());
    }

    let level = if args.quiet {
        "error"
    } else if args.debug {
        "warn,sitemapper=debug"
    } else {
        "warn"
    };
    env::set_var("RUST_LOG", level);
    env_logger::init();

    crawl(args)
}
