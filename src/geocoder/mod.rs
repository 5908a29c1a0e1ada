//! Address to coordinate lookup.
//!
//! A [`Geocoder`] owns a [`GeocodeBackend`] and the configuration that governs
//! how politely it talks to it: a fixed pause before every request and a
//! bounded number of attempts with exponential backoff on timeouts. Any other
//! failure drops the address.

pub mod nominatim;
pub mod point_table;

pub use nominatim::NominatimBackend;
pub use point_table::{PointRecord, PointTable};

use crate::retry::{retry, BackoffPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Public Nominatim instance
pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates { latitude, longitude }
    }
}

/// An address that was successfully resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPoint {
    /// The address exactly as it was requested
    pub location: String,
    /// Always true: every geocoded address is a stop
    pub stopover: bool,
    pub coords: Coordinates,
}

impl GeocodedPoint {
    pub fn new(location: &str, coords: Coordinates) -> Self {
        GeocodedPoint {
            location: location.to_string(),
            stopover: true,
            coords,
        }
    }
}

/// Errors a backend can report for a single lookup.
#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service returned HTTP {0}")]
    Status(u16),
    /// The service answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GeocodeError {
    /// Only timeouts are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Timeout)
    }
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodeError::Timeout
        } else if e.is_decode() {
            GeocodeError::Malformed(e.to_string())
        } else {
            GeocodeError::Network(e)
        }
    }
}

/// Something that can turn an address into coordinates.
///
/// `Ok(None)` means the service answered but knows no such address.
pub trait GeocodeBackend {
    fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;

    fn name(&self) -> &str;
}

/// Geocoder configuration
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// Base URL of the geocoding service
    pub endpoint: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total number of attempts for one address
    pub max_attempts: u32,
    /// Pause before every attempt (rate limiting)
    pub rate_limit_pause: Duration,
    /// Delay schedule between attempts after a timeout
    pub backoff: BackoffPolicy,
    /// Draw a progress bar in `geocode_all`
    pub show_progress: bool,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: "delivery_clusterer".to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            rate_limit_pause: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
            show_progress: false,
        }
    }
}

impl GeocoderConfig {
    /// Configuration for local backends: same attempt count, no waiting.
    pub fn offline() -> Self {
        GeocoderConfig {
            rate_limit_pause: Duration::ZERO,
            backoff: BackoffPolicy::none(),
            ..Default::default()
        }
    }
}

/// Rate-limited, retrying geocoder.
pub struct Geocoder<B> {
    backend: B,
    config: GeocoderConfig,
}

impl<B: GeocodeBackend> Geocoder<B> {
    pub fn new(backend: B, config: GeocoderConfig) -> Self {
        Geocoder { backend, config }
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve one address, or `None` if it could not be resolved.
    ///
    /// Timeouts are retried up to `max_attempts` in total; every other
    /// failure gives up immediately. Nothing is cached, so asking twice
    /// queries the backend twice.
    pub fn geocode(&self, address: &str) -> Option<GeocodedPoint> {
        self.geocode_with(address, sleep)
    }

    /// `geocode` with every wait routed through `wait`.
    fn geocode_with<S: FnMut(Duration)>(&self, address: &str, wait: S) -> Option<GeocodedPoint> {
        let mut rng = rand::thread_rng();
        let wait = std::cell::RefCell::new(wait);

        let result = retry(
            self.config.max_attempts,
            |attempt| {
                (&mut *wait.borrow_mut())(self.config.rate_limit_pause);
                let outcome = self.backend.lookup(address);
                if let Err(GeocodeError::Timeout) = outcome {
                    log::debug!("Attempt {} for {:?} timed out", attempt + 1, address);
                }
                outcome
            },
            GeocodeError::is_transient,
            |attempt| {
                let delay = self.config.backoff.delay(attempt, &mut rng);
                log::debug!("Backing off {:.2}s before retrying {:?}", delay.as_secs_f64(), address);
                (&mut *wait.borrow_mut())(delay);
            },
        );

        match result {
            Ok(Some(coords)) => Some(GeocodedPoint::new(address, coords)),
            Ok(None) => {
                log::warn!("No match for address {:?}", address);
                None
            }
            Err(e) => {
                log::warn!("Geocoding {:?} via {} failed: {}", address, self.backend.name(), e);
                None
            }
        }
    }

    /// Geocode every address in order, keeping only the successes.
    pub fn geocode_all(&self, addresses: &[String]) -> Vec<GeocodedPoint> {
        let progress = if self.config.show_progress {
            let bar = ProgressBar::new(addresses.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut points = Vec::with_capacity(addresses.len());
        for address in addresses {
            progress.set_message(address.clone());
            if let Some(point) = self.geocode(address) {
                points.push(point);
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        log::info!(
            "Geocoded {}/{} addresses via {}",
            points.len(),
            addresses.len(),
            self.backend.name()
        );
        points
    }
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
