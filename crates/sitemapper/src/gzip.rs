use std::io::{self, prelude::*};
use std::path::Path;

use flate2::read::GzDecoder;

/// Whether `location` names a gzipped resource, judged by its `.gz`
/// extension only. Query string and fragment are ignored.
pub fn is_compressed(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(path)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
}

pub fn decompress(compressed: &[u8]) -> io::Result<Vec<u8>> {
    let mut gz = GzDecoder::new(compressed);
    let mut raw = Vec::new();
    gz.read_to_end(&mut raw)?;
    Ok(raw)
}
