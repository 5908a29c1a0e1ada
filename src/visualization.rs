//! SVG rendering of a clustering plan.
//!
//! Stops are drawn in plain longitude/latitude space, coloured by driver,
//! with a cross on each cluster centroid.

use crate::pipeline::ClusterPlan;
use crate::routes::driver_id;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const PALETTE: &[&str] = &[
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6",
    "#1abc9c", "#e67e22", "#34495e", "#d35400", "#7f8c8d",
];

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Stop marker radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 7.0,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colour used for cluster `cluster_id`
    pub fn color(cluster_id: usize) -> &'static str {
        PALETTE[cluster_id % PALETTE.len()]
    }

    /// Generate SVG visualization of a plan
    pub fn generate_svg(&self, plan: &ClusterPlan) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = self.get_bounds(plan);

        // Degrees are tiny over one city: scale on the real extent
        let span = (max_x - min_x).max(max_y - min_y).max(1e-6);
        let scale = (self.width.min(self.height) - 2.0 * self.margin) / span;

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .stop {{ stroke: #2c3e50; stroke-width: 1.5; }}
    .centroid {{ stroke-width: 3; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        let routes = plan.driver_routes();
        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">{} stops | {} drivers | inertia {:.3e}</text>
"##,
            self.margin,
            plan.points.len(),
            routes.len(),
            plan.fit.inertia
        ));

        let transform = |lon: f64, lat: f64| -> (f64, f64) {
            let tx = self.margin + (lon - min_x) * scale;
            let ty = self.height - self.margin - (lat - min_y) * scale;
            (tx, ty)
        };

        for (i, (point, &label)) in plan.points.iter().zip(&plan.fit.labels).enumerate() {
            let (x, y) = transform(point.coords.longitude, point.coords.latitude);

            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="stop" fill="{}"><title>{}</title></circle>
"##,
                x,
                y,
                self.node_radius,
                Self::color(label),
                escape(&point.location)
            ));
            svg.push_str(&format!(
                r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y - self.node_radius - 3.0,
                i + 1
            ));
        }

        let sizes = plan.fit.cluster_sizes();
        for (cluster, centroid) in plan.fit.centroids.iter().enumerate() {
            if sizes[cluster] == 0 {
                continue;
            }
            let (x, y) = transform(centroid[1], centroid[0]);
            let arm = self.node_radius;
            svg.push_str(&format!(
                r##"<path d="M {:.2} {:.2} L {:.2} {:.2} M {:.2} {:.2} L {:.2} {:.2}" class="centroid" stroke="{}"/>
"##,
                x - arm, y - arm, x + arm, y + arm,
                x - arm, y + arm, x + arm, y - arm,
                Self::color(cluster)
            ));
        }

        let legend_y = self.height - 30.0;
        for (slot, cluster) in (0..sizes.len()).filter(|&c| sizes[c] > 0).enumerate() {
            let x = self.margin + slot as f64 * 90.0;
            svg.push_str(&format!(
                r##"<rect x="{:.2}" y="{:.2}" width="15" height="15" fill="{}"/>
<text x="{:.2}" y="{:.2}" class="label">{} ({})</text>
"##,
                x,
                legend_y,
                Self::color(cluster),
                x + 20.0,
                legend_y + 12.0,
                driver_id(cluster),
                sizes[cluster]
            ));
        }

        svg.push_str("</svg>");

        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Longitude/latitude bounds as (min_x, max_x, min_y, max_y)
    fn get_bounds(&self, plan: &ClusterPlan) -> (f64, f64, f64, f64) {
        if plan.points.is_empty() {
            return (0.0, 1.0, 0.0, 1.0);
        }

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for point in &plan.points {
            min_x = min_x.min(point.coords.longitude);
            max_x = max_x.max(point.coords.longitude);
            min_y = min_y.min(point.coords.latitude);
            max_y = max_y.max(point.coords.latitude);
        }

        (min_x, max_x, min_y, max_y)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::KMeans;
    use crate::geocoder::{Coordinates, GeocodedPoint};

    fn create_test_plan() -> ClusterPlan {
        let points = vec![
            GeocodedPoint::new("A & Sons", Coordinates::new(53.60, -113.50)),
            GeocodedPoint::new("B", Coordinates::new(53.61, -113.51)),
            GeocodedPoint::new("C", Coordinates::new(53.45, -113.40)),
        ];
        let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.coords.latitude, p.coords.longitude]).collect();
        let fit = KMeans::with_clusters(2).fit(&coords).unwrap();
        ClusterPlan { points, fit }
    }

    #[test]
    fn test_visualizer() {
        let plan = create_test_plan();

        let svg = Visualizer::new().generate_svg(&plan);

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("class=\"stop\"").count(), 3);
        assert_eq!(svg.matches("class=\"centroid\"").count(), 2);
        assert!(svg.contains("driver_1"));
        assert!(svg.contains("driver_2"));
    }

    #[test]
    fn test_labels_are_escaped() {
        let svg = Visualizer::new().generate_svg(&create_test_plan());
        assert!(svg.contains("A &amp; Sons"));
        assert!(!svg.contains("A & Sons"));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(Visualizer::color(0), Visualizer::color(PALETTE.len()));
    }
}
