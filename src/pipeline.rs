//! Geocode-then-cluster pipeline.
//!
//! [`DeliveryClusterer`] resolves addresses, checks that there are enough of
//! them for the requested fleet and partitions them with k-means. Addresses
//! that fail to geocode are dropped without being reported individually; the
//! only visible symptom is a smaller point count, which surfaces as
//! [`ClusterError::InsufficientAddresses`] when it falls below the number of
//! drivers.

use crate::clustering::{KMeans, KMeansConfig, KMeansError, KMeansFit, Point};
use crate::geocoder::point_table::write_points_csv;
use crate::geocoder::{Coordinates, GeocodeBackend, GeocodedPoint, Geocoder};
use crate::routes::{driver_id, DriverRoutes};
use std::fs;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("Number of drivers must be at least 1")]
    NoDrivers,
    #[error("Not enough valid addresses ({available}) for {requested} drivers")]
    InsufficientAddresses { available: usize, requested: usize },
    #[error(transparent)]
    KMeans(#[from] KMeansError),
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error("cannot serialise routes: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Geocoded points together with their cluster assignment
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    /// Successfully geocoded points, in input order
    pub points: Vec<GeocodedPoint>,
    /// Clustering of `points`; `fit.labels[i]` belongs to `points[i]`
    pub fit: KMeansFit,
}

impl ClusterPlan {
    pub fn driver_routes(&self) -> DriverRoutes {
        DriverRoutes::from_labels(&self.points, &self.fit.labels)
    }

    /// One line of statistics per driver with stops
    pub fn summary(&self) -> Vec<DriverSummary> {
        self.fit
            .cluster_sizes()
            .into_iter()
            .enumerate()
            .filter(|&(_, stops)| stops > 0)
            .map(|(cluster, stops)| {
                let [latitude, longitude] = self.fit.centroids[cluster];
                DriverSummary {
                    driver_id: driver_id(cluster),
                    stops,
                    centroid: Coordinates::new(latitude, longitude),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSummary {
    pub driver_id: String,
    pub stops: usize,
    pub centroid: Coordinates,
}

impl std::fmt::Display for DriverSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<10} {:>3} stops  centroid ({:.5}, {:.5})",
            self.driver_id, self.stops, self.centroid.latitude, self.centroid.longitude
        )
    }
}

/// Splits a list of delivery addresses between drivers
pub struct DeliveryClusterer<B> {
    geocoder: Geocoder<B>,
    kmeans: KMeansConfig,
}

impl<B: GeocodeBackend> DeliveryClusterer<B> {
    /// `kmeans.n_clusters` is ignored; every call supplies its own driver count.
    pub fn new(geocoder: Geocoder<B>, kmeans: KMeansConfig) -> Self {
        DeliveryClusterer { geocoder, kmeans }
    }

    pub fn with_seed(geocoder: Geocoder<B>, seed: u64) -> Self {
        Self::new(geocoder, KMeansConfig { seed, ..Default::default() })
    }

    pub fn geocoder(&self) -> &Geocoder<B> {
        &self.geocoder
    }

    /// Geocode `addresses` and cluster the results into `num_drivers` groups.
    pub fn plan(&self, addresses: &[String], num_drivers: usize) -> Result<ClusterPlan, ClusterError> {
        if num_drivers == 0 {
            return Err(ClusterError::NoDrivers);
        }

        let points = self.geocoder.geocode_all(addresses);
        if points.len() < num_drivers {
            return Err(ClusterError::InsufficientAddresses {
                available: points.len(),
                requested: num_drivers,
            });
        }

        let coords: Vec<Point> = points
            .iter()
            .map(|p| [p.coords.latitude, p.coords.longitude])
            .collect();

        let config = KMeansConfig { n_clusters: num_drivers, ..self.kmeans.clone() };
        let fit = KMeans::new(config).fit(&coords)?;

        Ok(ClusterPlan { points, fit })
    }

    /// Geocode and cluster, returning the per-driver waypoint lists
    pub fn cluster_addresses(&self, addresses: &[String], num_drivers: usize) -> Result<DriverRoutes, ClusterError> {
        self.plan(addresses, num_drivers).map(|plan| plan.driver_routes())
    }
}

/// Write routes as 2-space indented JSON. The file is only created once
/// serialisation has succeeded.
pub fn write_routes_json<P: AsRef<Path>>(path: P, routes: &DriverRoutes) -> Result<(), ExportError> {
    let json = routes.to_json()?;
    fs::write(path, json)?;
    Ok(())
}

/// Run the full pipeline and write the result to `path`.
/// Nothing is written if clustering fails.
pub fn export_routes<B: GeocodeBackend, P: AsRef<Path>>(
    clusterer: &DeliveryClusterer<B>,
    addresses: &[String],
    num_drivers: usize,
    path: P,
) -> Result<ClusterPlan, ExportError> {
    let plan = clusterer.plan(addresses, num_drivers)?;
    let routes = plan.driver_routes();
    write_routes_json(&path, &routes)?;

    log::info!(
        "Wrote {} stops for {} drivers to {:?}",
        routes.total_stops(),
        routes.len(),
        path.as_ref()
    );
    Ok(plan)
}

/// Geocode `addresses` and save the successes as `location,latitude,longitude`
/// CSV, the format [`crate::geocoder::PointTable`] reads back.
pub fn export_points<B: GeocodeBackend, P: AsRef<Path>>(
    geocoder: &Geocoder<B>,
    addresses: &[String],
    path: P,
) -> Result<Vec<GeocodedPoint>, ExportError> {
    let points = geocoder.geocode_all(addresses);

    let mut buffer = Vec::new();
    write_points_csv(&mut buffer, &points)?;
    fs::write(&path, buffer)?;

    log::info!("Wrote {} geocoded points to {:?}", points.len(), path.as_ref());
    Ok(points)
}
