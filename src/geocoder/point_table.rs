//! Offline lookup table of previously geocoded addresses.
//!
//! The `geocode` command writes successes as CSV; loading that file back into
//! a [`PointTable`] lets the clusterer run again without touching the network.

use super::{Coordinates, GeocodeBackend, GeocodeError, GeocodedPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One CSV row: `location,latitude,longitude`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&GeocodedPoint> for PointRecord {
    fn from(point: &GeocodedPoint) -> Self {
        PointRecord {
            location: point.location.clone(),
            latitude: point.coords.latitude,
            longitude: point.coords.longitude,
        }
    }
}

/// Address -> coordinates map used as a geocoding backend
#[derive(Debug, Clone, Default)]
pub struct PointTable {
    points: HashMap<String, Coordinates>,
}

impl PointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: &str, coords: Coordinates) {
        self.points.insert(location.trim().to_string(), coords);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Load a table from a CSV file with a `location,latitude,longitude` header
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, csv::Error> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut table = PointTable::new();

        for record in reader.deserialize() {
            let record: PointRecord = record?;
            table.insert(&record.location, Coordinates::new(record.latitude, record.longitude));
        }

        Ok(table)
    }
}

impl GeocodeBackend for PointTable {
    fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(self.points.get(address.trim()).copied())
    }

    fn name(&self) -> &str {
        "point table"
    }
}

/// Write geocoded points as CSV, in the format [`PointTable::from_reader`] reads
pub fn write_points_csv<W: Write>(writer: W, points: &[GeocodedPoint]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for point in points {
        writer.serialize(PointRecord::from(point))?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_csv_loads_back() {
        let points = vec![
            GeocodedPoint::new("4501 30 Ave NW, Edmonton, AB", Coordinates::new(53.46, -113.42)),
            GeocodedPoint::new("2007 138 Ave NW, Edmonton, AB", Coordinates::new(53.60, -113.45)),
        ];

        let mut buffer = Vec::new();
        write_points_csv(&mut buffer, &points).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("location,latitude,longitude"));

        let table = PointTable::from_reader(buffer.as_slice()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.lookup("2007 138 Ave NW, Edmonton, AB").unwrap(),
            Some(Coordinates::new(53.60, -113.45))
        );
    }

    #[test]
    fn test_unknown_address_is_not_found() {
        let mut table = PointTable::new();
        table.insert("A", Coordinates::new(0.0, 0.0));

        assert_eq!(table.lookup("B").unwrap(), None);
        assert!(table.lookup("  A ").unwrap().is_some());
    }

    #[test]
    fn test_bad_row_is_an_error() {
        let csv = "location,latitude,longitude\nA,not-a-number,1.0\n";
        assert!(PointTable::from_reader(csv.as_bytes()).is_err());
    }
}
