//! Delivery address lists.
//!
//! Addresses are free text and are passed to the geocoder untouched, apart
//! from trimming surrounding whitespace.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sample stops around Edmonton, AB used when no address file is given
pub const SAMPLE_ADDRESSES: &[&str] = &[
    "15277 Castle Downs Rd NW, Edmonton, AB",
    "11920 129 Ave NW, Edmonton, AB",
    "15178 127 St NW, Edmonton, AB",
    "11320 132 Ave NW, Edmonton, AB",
    "4501 30 Ave NW, Edmonton, AB",
    "10408 124 St NW, Edmonton, AB",
    "10363 Jasper Ave NW, Edmonton, AB",
    "4225 118 Ave NW, Edmonton, AB",
    "2007 138 Ave NW, Edmonton, AB",
    "10025 102A Ave NW, Edmonton, AB T5J 2Z2",
];

#[derive(thiserror::Error, Debug)]
pub enum AddressError {
    #[error("cannot read address file: {0}")]
    Io(#[from] std::io::Error),
    #[error("address file contains no addresses")]
    Empty,
}

pub fn sample_addresses() -> Vec<String> {
    SAMPLE_ADDRESSES.iter().map(|s| s.to_string()).collect()
}

/// Read one address per line. Blank lines and lines starting with `#` are skipped.
pub fn load_addresses<P: AsRef<Path>>(path: P) -> Result<Vec<String>, AddressError> {
    let file = File::open(&path)?;
    let reader = BufReader::new(file);

    let mut addresses = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        addresses.push(line.to_string());
    }

    if addresses.is_empty() {
        return Err(AddressError::Empty);
    }

    log::debug!("Loaded {} addresses from {:?}", addresses.len(), path.as_ref());
    Ok(addresses)
}
