//! Per-driver waypoint lists built from cluster labels.
//!
//! Serialises to the layout delivery apps expect:
//!
//! ```text
//! {
//!   "driver_1": { "waypoints": [ { "location": "...", "stopover": true } ] },
//!   "driver_2": { ... }
//! }
//! ```

use crate::geocoder::GeocodedPoint;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A single stop on a driver's route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub location: String,
    pub stopover: bool,
}

impl Waypoint {
    pub fn stop(location: &str) -> Self {
        Waypoint { location: location.to_string(), stopover: true }
    }
}

/// Stops assigned to one driver, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverRoute {
    /// Map key in the exported JSON
    #[serde(skip)]
    pub driver_id: String,
    pub waypoints: Vec<Waypoint>,
}

impl DriverRoute {
    /// Route for cluster `cluster_id` (cluster 0 is `driver_1`)
    pub fn for_cluster(cluster_id: usize) -> Self {
        DriverRoute {
            driver_id: driver_id(cluster_id),
            waypoints: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Name of the driver serving cluster `cluster_id`
pub fn driver_id(cluster_id: usize) -> String {
    format!("driver_{}", cluster_id + 1)
}

/// All non-empty driver routes, ordered by cluster id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverRoutes {
    routes: Vec<DriverRoute>,
}

impl DriverRoutes {
    /// Group points by label. Waypoints keep the relative order of `points`;
    /// clusters without points produce no route.
    pub fn from_labels(points: &[GeocodedPoint], labels: &[usize]) -> Self {
        let num_clusters = labels.iter().max().map_or(0, |&m| m + 1);
        let mut routes: Vec<DriverRoute> = (0..num_clusters).map(DriverRoute::for_cluster).collect();

        for (point, &label) in points.iter().zip(labels) {
            routes[label].waypoints.push(Waypoint::stop(&point.location));
        }

        routes.retain(|route| !route.is_empty());
        DriverRoutes { routes }
    }

    pub fn get(&self, driver_id: &str) -> Option<&DriverRoute> {
        self.routes.iter().find(|r| r.driver_id == driver_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DriverRoute> {
        self.routes.iter()
    }

    /// Number of drivers with at least one stop
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Total number of stops across all drivers
    pub fn total_stops(&self) -> usize {
        self.routes.iter().map(DriverRoute::len).sum()
    }

    /// 2-space indented JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for DriverRoutes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.routes.len()))?;
        for route in &self.routes {
            map.serialize_entry(&route.driver_id, route)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::Coordinates;
    use serde_json::json;

    fn points(names: &[&str]) -> Vec<GeocodedPoint> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| GeocodedPoint::new(name, Coordinates::new(i as f64, 0.0)))
            .collect()
    }

    #[test]
    fn test_driver_ids_follow_cluster_ids() {
        assert_eq!(driver_id(0), "driver_1");
        assert_eq!(driver_id(9), "driver_10");
    }

    #[test]
    fn test_grouping_keeps_input_order() {
        let pts = points(&["A", "B", "C", "D", "E"]);
        let routes = DriverRoutes::from_labels(&pts, &[1, 0, 1, 0, 1]);

        let d1: Vec<&str> = routes.get("driver_1").unwrap().waypoints.iter().map(|w| w.location.as_str()).collect();
        let d2: Vec<&str> = routes.get("driver_2").unwrap().waypoints.iter().map(|w| w.location.as_str()).collect();

        assert_eq!(d1, vec!["B", "D"]);
        assert_eq!(d2, vec!["A", "C", "E"]);
        assert_eq!(routes.total_stops(), 5);
    }

    #[test]
    fn test_empty_cluster_has_no_entry() {
        let pts = points(&["A", "B"]);
        let routes = DriverRoutes::from_labels(&pts, &[0, 2]);

        assert_eq!(routes.len(), 2);
        assert!(routes.get("driver_2").is_none());
        assert!(routes.get("driver_3").is_some());
    }

    #[test]
    fn test_json_layout() {
        let pts = points(&["A", "B", "C"]);
        let routes = DriverRoutes::from_labels(&pts, &[0, 1, 0]);

        let value = serde_json::to_value(&routes).unwrap();

        assert_eq!(
            value,
            json!({
                "driver_1": { "waypoints": [
                    { "location": "A", "stopover": true },
                    { "location": "C", "stopover": true }
                ]},
                "driver_2": { "waypoints": [
                    { "location": "B", "stopover": true }
                ]}
            })
        );
    }

    #[test]
    fn test_pretty_json_uses_two_spaces() {
        let routes = DriverRoutes::from_labels(&points(&["A"]), &[0]);
        let text = routes.to_json().unwrap();

        assert!(text.starts_with("{\n  \"driver_1\": {\n    \"waypoints\""));
    }

    #[test]
    fn test_no_points_no_routes() {
        let routes = DriverRoutes::from_labels(&[], &[]);
        assert!(routes.is_empty());
        assert_eq!(routes.to_json().unwrap(), "{}");
    }
}
