//! Seeded k-means clustering in plain latitude/longitude space.
//!
//! Centroids are seeded with k-means++, refined with Lloyd iterations and the
//! whole procedure is restarted `n_init` times; the run with the lowest
//! inertia (sum of squared distances to the assigned centroid) wins. All
//! randomness comes from a single `ChaCha8Rng`, so a fixed seed always yields
//! the same labels for the same points.
//!
//! No projection or great-circle correction is applied: over a single city
//! degrees behave well enough as planar coordinates.

use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// A 2D point, `[latitude, longitude]`
pub type Point = [f64; 2];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum KMeansError {
    #[error("number of clusters must be at least 1")]
    NoClusters,
    #[error("cannot form {clusters} clusters from {points} points")]
    TooFewPoints { points: usize, clusters: usize },
}

/// K-means parameters
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters (k)
    pub n_clusters: usize,
    /// Random seed
    pub seed: u64,
    /// Independent restarts; the lowest inertia is kept
    pub n_init: usize,
    /// Lloyd iterations per restart
    pub max_iterations: usize,
    /// Convergence threshold on centroid movement, relative to the data variance
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        KMeansConfig {
            n_clusters: 2,
            seed: 42,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl KMeansConfig {
    pub fn with_clusters(n_clusters: usize) -> Self {
        KMeansConfig { n_clusters, ..Default::default() }
    }
}

/// Result of a k-means fit
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster id per input point, in input order
    pub labels: Vec<usize>,
    /// Final centroid per cluster id
    pub centroids: Vec<Point>,
    /// Sum of squared distances of points to their centroid
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart
    pub iterations: usize,
}

impl KMeansFit {
    /// Number of points assigned to each cluster id
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

pub struct KMeans {
    pub config: KMeansConfig,
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        KMeans { config }
    }

    pub fn with_clusters(n_clusters: usize) -> Self {
        Self::new(KMeansConfig::with_clusters(n_clusters))
    }

    /// Cluster `points` into `n_clusters` groups.
    pub fn fit(&self, points: &[Point]) -> Result<KMeansFit, KMeansError> {
        let k = self.config.n_clusters;
        if k == 0 {
            return Err(KMeansError::NoClusters);
        }
        if points.len() < k {
            return Err(KMeansError::TooFewPoints { points: points.len(), clusters: k });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let tolerance = self.config.tolerance * mean_variance(points);

        let mut best = self.run(points, k, tolerance, &mut rng);
        for _ in 1..self.config.n_init {
            let candidate = self.run(points, k, tolerance, &mut rng);
            if candidate.inertia < best.inertia {
                best = candidate;
            }
        }

        log::info!(
            "k-means: {} points into {} clusters, inertia {:.6e} after {} iterations",
            points.len(),
            k,
            best.inertia,
            best.iterations
        );
        Ok(best)
    }

    /// Cluster `points` and return only the labels
    pub fn fit_predict(&self, points: &[Point]) -> Result<Vec<usize>, KMeansError> {
        self.fit(points).map(|fit| fit.labels)
    }

    fn run(&self, points: &[Point], k: usize, tolerance: f64, rng: &mut ChaCha8Rng) -> KMeansFit {
        let mut centroids = init_plus_plus(points, k, rng);
        let mut labels = vec![usize::MAX; points.len()];
        let mut iterations = 0;

        for _ in 0..self.config.max_iterations.max(1) {
            iterations += 1;

            let mut changed = assign(points, &centroids, &mut labels);
            changed |= relocate_empty(points, &centroids, &mut labels, k);

            let updated = recompute_centroids(points, &labels, &centroids);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;

            if !changed || shift <= tolerance {
                break;
            }
        }

        // Labels must agree with the centroids that are returned
        assign(points, &centroids, &mut labels);
        let inertia: f64 = points
            .iter()
            .zip(&labels)
            .map(|(p, &c)| squared_distance(p, &centroids[c]))
            .sum();

        log::debug!("k-means restart: inertia {:.6e} in {} iterations", inertia, iterations);

        KMeansFit { labels, centroids, inertia, iterations }
    }
}

#[inline]
fn squared_distance(a: &Point, b: &Point) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    d0 * d0 + d1 * d1
}

/// Mean of the per-axis variances
fn mean_variance(points: &[Point]) -> f64 {
    let n = points.len() as f64;
    (0..2)
        .map(|axis| {
            let mean = points.iter().map(|p| p[axis]).sum::<f64>() / n;
            points.iter().map(|p| (p[axis] - mean).powi(2)).sum::<f64>() / n
        })
        .sum::<f64>()
        / 2.0
}

/// k-means++ seeding: each further centroid is sampled with probability
/// proportional to its squared distance from the closest centroid so far.
fn init_plus_plus<R: Rng>(points: &[Point], k: usize, rng: &mut R) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut closest: Vec<f64> = points.iter().map(|p| squared_distance(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &d) in closest.iter().enumerate() {
                if d > 0.0 {
                    last_positive = i;
                }
                if target < d {
                    chosen = Some(i);
                    break;
                }
                target -= d;
            }
            chosen.unwrap_or(last_positive)
        } else {
            // Every point coincides with a centroid
            rng.gen_range(0..points.len())
        };

        let centroid = points[next];
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Assign every point to its nearest centroid (lowest id wins ties).
/// Returns whether any label changed.
fn assign(points: &[Point], centroids: &[Point], labels: &mut [usize]) -> bool {
    let mut changed = false;

    for (p, label) in points.iter().zip(labels.iter_mut()) {
        let nearest = centroids
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| OrderedFloat(squared_distance(p, c)))
            .map(|(i, _)| i)
            .unwrap_or(0);

        if nearest != *label {
            *label = nearest;
            changed = true;
        }
    }

    changed
}

/// Give every empty cluster the point lying farthest from its own centroid,
/// taken from a cluster that can spare it. Returns whether anything moved.
fn relocate_empty(points: &[Point], centroids: &[Point], labels: &mut [usize], k: usize) -> bool {
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    let mut moved = false;
    for cluster in 0..k {
        if sizes[cluster] > 0 {
            continue;
        }

        let donor = (0..points.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .max_by_key(|&i| OrderedFloat(squared_distance(&points[i], &centroids[labels[i]])));

        if let Some(i) = donor {
            sizes[labels[i]] -= 1;
            sizes[cluster] += 1;
            labels[i] = cluster;
            moved = true;
        }
    }

    moved
}

/// Mean of each cluster's members; an empty cluster keeps its previous centroid.
fn recompute_centroids(points: &[Point], labels: &[usize], previous: &[Point]) -> Vec<Point> {
    let k = previous.len();
    let mut sums = vec![[0.0f64; 2]; k];
    let mut counts = vec![0usize; k];

    for (p, &c) in points.iter().zip(labels) {
        sums[c][0] += p[0];
        sums[c][1] += p[1];
        counts[c] += 1;
    }

    (0..k)
        .map(|c| {
            if counts[c] == 0 {
                previous[c]
            } else {
                let n = counts[c] as f64;
                [sums[c][0] / n, sums[c][1] / n]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(centers: &[Point], per_blob: usize, spread: f64, seed: u64) -> Vec<Point> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut points = Vec::new();
        for center in centers {
            for _ in 0..per_blob {
                points.push([
                    center[0] + rng.gen_range(-spread..spread),
                    center[1] + rng.gen_range(-spread..spread),
                ]);
            }
        }
        points
    }

    #[test]
    fn test_two_separated_pairs() {
        let points = vec![[0.0, 0.0], [0.0, 0.01], [10.0, 10.0], [10.0, 10.01]];

        let labels = KMeans::with_clusters(2).fit_predict(&points).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_blobs_are_recovered() {
        let centers = [[0.0, 0.0], [50.0, 0.0], [0.0, 50.0]];
        let points = blobs(&centers, 20, 1.0, 3);

        let fit = KMeans::with_clusters(3).fit(&points).unwrap();

        for blob in fit.labels.chunks(20) {
            assert!(blob.iter().all(|&l| l == blob[0]));
        }
        let mut firsts: Vec<usize> = fit.labels.chunks(20).map(|b| b[0]).collect();
        firsts.sort();
        firsts.dedup();
        assert_eq!(firsts.len(), 3);
        assert_eq!(fit.cluster_sizes(), vec![20, 20, 20]);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let points = blobs(&[[53.5, -113.5], [53.6, -113.4]], 15, 0.05, 11);
        let kmeans = KMeans::new(KMeansConfig { n_clusters: 4, seed: 7, ..Default::default() });

        let first = kmeans.fit(&points).unwrap();
        let second = kmeans.fit(&points).unwrap();

        assert_eq!(first.labels, second.labels);
        assert_eq!(first.inertia, second.inertia);
    }

    #[test]
    fn test_one_cluster_per_point() {
        let points = vec![[1.0, 1.0], [2.0, 5.0], [-3.0, 0.5]];

        let fit = KMeans::with_clusters(3).fit(&points).unwrap();

        let mut labels = fit.labels.clone();
        labels.sort();
        assert_eq!(labels, vec![0, 1, 2]);
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_single_cluster_centroid_is_mean() {
        let points = vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [2.0, 2.0]];

        let fit = KMeans::with_clusters(1).fit(&points).unwrap();

        assert_eq!(fit.labels, vec![0; 4]);
        assert!((fit.centroids[0][0] - 1.0).abs() < 1e-12);
        assert!((fit.centroids[0][1] - 1.0).abs() < 1e-12);
        assert!((fit.inertia - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_labels_stay_in_range() {
        let points = blobs(&[[0.0, 0.0]], 30, 5.0, 5);

        for k in 1..=points.len() {
            let labels = KMeans::with_clusters(k).fit_predict(&points).unwrap();
            assert!(labels.iter().all(|&l| l < k));
        }
    }

    #[test]
    fn test_duplicate_points_do_not_panic() {
        let points = vec![[1.0, 1.0]; 4];

        let fit = KMeans::with_clusters(2).fit(&points).unwrap();

        assert_eq!(fit.labels.len(), 4);
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let err = KMeans::with_clusters(5).fit(&[[0.0, 0.0], [1.0, 1.0]]).unwrap_err();
        assert_eq!(err, KMeansError::TooFewPoints { points: 2, clusters: 5 });
    }

    #[test]
    fn test_zero_clusters() {
        let err = KMeans::with_clusters(0).fit(&[[0.0, 0.0]]).unwrap_err();
        assert_eq!(err, KMeansError::NoClusters);
    }

    #[test]
    fn test_relocate_fills_empty_cluster() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [9.0, 0.0]];
        let centroids = vec![[0.0, 0.0], [100.0, 100.0]];
        let mut labels = vec![0, 0, 0];

        assert!(relocate_empty(&points, &centroids, &mut labels, 2));
        assert_eq!(labels, vec![0, 0, 1]);
    }
}
