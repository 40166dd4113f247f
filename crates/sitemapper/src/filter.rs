use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;

use crate::error::Error;
use crate::sitemap::SiteEntry;

/// Compiled exclusion patterns, shared by page and sitemap URLs.
#[derive(Debug, Clone, Default)]
pub struct Exclusions(Vec<Regex>);

impl Exclusions {
    pub fn new<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| Error::InvalidExclusion {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.0.iter().any(|re| re.is_match(url))
    }
}

/// Whether `entry` passes the lastmod `cutoff` (seconds since the epoch).
/// Entries without a usable `lastmod` always pass.
pub fn is_recent(entry: &SiteEntry, cutoff: Option<i64>) -> bool {
    match (cutoff, entry.lastmod.as_deref().and_then(parse_lastmod)) {
        (Some(cutoff), Some(lastmod)) => lastmod >= cutoff,
        _ => true,
    }
}

/// Parses a W3C datetime into seconds since the epoch.
pub fn parse_lastmod(lastmod: &str) -> Option<i64> {
    let lastmod = lastmod.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(lastmod) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(lastmod, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.timestamp());
    }
    NaiveDate::parse_from_str(lastmod, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
}
