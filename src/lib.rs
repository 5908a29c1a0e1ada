//! Delivery Clusterer Library
//!
//! Splits a list of delivery addresses between a fleet of drivers.
//!
//! # Features
//!
//! - Rate-limited geocoding with bounded retries and exponential backoff
//! - Nominatim backend and an offline CSV point table
//! - Seeded k-means (k-means++ seeding, several restarts)
//! - Per-driver waypoint lists exported as JSON
//! - SVG rendering of the resulting clusters
//!
//! # Example
//!
//! ```no_run
//! use delivery_clusterer::geocoder::{Geocoder, GeocoderConfig, NominatimBackend};
//! use delivery_clusterer::pipeline::{export_routes, DeliveryClusterer};
//!
//! let config = GeocoderConfig::default();
//! let backend = NominatimBackend::new(&config).unwrap();
//! let clusterer = DeliveryClusterer::with_seed(Geocoder::new(backend, config), 42);
//!
//! let addresses = delivery_clusterer::address::sample_addresses();
//! let plan = export_routes(&clusterer, &addresses, 3, "driver_routes.json").unwrap();
//!
//! println!("{} stops clustered", plan.points.len());
//! ```

pub mod address;
pub mod retry;
pub mod geocoder;
pub mod clustering;
pub mod routes;
pub mod pipeline;
pub mod visualization;

pub use geocoder::{GeocodedPoint, Geocoder};
pub use pipeline::DeliveryClusterer;
pub use routes::DriverRoutes;
