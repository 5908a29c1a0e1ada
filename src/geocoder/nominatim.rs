//! Nominatim (OpenStreetMap) search backend.

use super::{Coordinates, GeocodeBackend, GeocodeError, GeocoderConfig};
use reqwest::blocking::Client;
use serde::Deserialize;

/// Single hit from `/search?format=json`
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Blocking HTTP client for a Nominatim-compatible search endpoint.
pub struct NominatimBackend {
    client: Client,
    search_url: String,
}

impl NominatimBackend {
    /// Build a client honouring the configured endpoint, user agent and timeout.
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(NominatimBackend {
            client,
            search_url: format!("{}/search", config.endpoint.trim_end_matches('/')),
        })
    }
}

impl GeocodeBackend for NominatimBackend {
    fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_search_response(&body)
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}

/// Interpret a `/search` response body. An empty array means no match.
fn parse_search_response(body: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let places: Vec<Place> =
        serde_json::from_str(body).map_err(|e| GeocodeError::Malformed(e.to_string()))?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let latitude: f64 = place
        .lat
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Malformed(format!("invalid latitude {:?}", place.lat)))?;
    let longitude: f64 = place
        .lon
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Malformed(format!("invalid longitude {:?}", place.lon)))?;

    log::debug!("Matched {:?} at ({}, {})", place.display_name, latitude, longitude);
    Ok(Some(Coordinates::new(latitude, longitude)))
}
