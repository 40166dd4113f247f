use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use sitemapper::{Field, Site, SitesData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// Numbered list of URLs followed by the errors
    #[default]
    Plain,
    /// One row per site, one column per field
    Csv,
    /// Pretty printed JSON document
    Json,
}

pub enum Output {
    File(BufWriter<File>),
    Stdout(io::Stdout),
}

impl Output {
    pub fn create(path: Option<&Path>) -> io::Result<Self> {
        match path {
            Some(path) => Ok(Self::File(BufWriter::new(File::create(path)?))),
            None => Ok(Self::Stdout(io::stdout())),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(wtr) => wtr.write(buf),
            Self::Stdout(wtr) => wtr.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
        }
    }
}

/// Writes `data` to `out`, `fields` being the projection sites were built with.
pub fn render<W: Write>(
    data: &SitesData,
    format: Format,
    fields: Option<&[Field]>,
    out: &mut W,
) -> anyhow::Result<()> {
    match format {
        Format::Plain => render_plain(data, fields, out)?,
        Format::Csv => render_csv(data, fields, out)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, data)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn render_plain<W: Write>(
    data: &SitesData,
    fields: Option<&[Field]>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "Sitemap source: {}", data.url)?;
    writeln!(out, "Found URLs:")?;
    for (i, site) in data.sites.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, plain_site(site, fields.unwrap_or_default()))?;
    }
    if !data.errors.is_empty() {
        writeln!(out, "Errors:")?;
        for error in &data.errors {
            writeln!(out, "{} {} (retries: {})", error.kind, error.url, error.retries)?;
        }
    }
    Ok(())
}

/// The `loc` of a site, or its projected fields when `loc` wasn't selected.
fn plain_site(site: &Site, fields: &[Field]) -> String {
    match site {
        Site::Url(url) => url.clone(),
        Site::Entry(entry) => match &entry.loc {
            Some(loc) => loc.clone(),
            None => fields
                .iter()
                .filter_map(|field| {
                    let value = entry.get(*field)?;
                    Some(format!("{}={value}", field.name()))
                })
                .collect::<Vec<_>>()
                .join(" "),
        },
    }
}

fn render_csv<W: Write>(data: &SitesData, fields: Option<&[Field]>, out: &mut W) -> csv::Result<()> {
    let fields = fields.unwrap_or(&[Field::Loc]);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(fields.iter().map(Field::name))?;
    for site in &data.sites {
        let record: Vec<String> = match site {
            Site::Url(url) => fields
                .iter()
                .map(|field| match field {
                    Field::Loc => url.clone(),
                    _ => String::new(),
                })
                .collect(),
            Site::Entry(entry) => fields
                .iter()
                .map(|field| entry.get(*field).unwrap_or_default())
                .collect(),
        };
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
