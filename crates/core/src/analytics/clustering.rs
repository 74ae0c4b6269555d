use crate::domain::market::Metrics;
use crate::domain::recommendation::{ClusterAssignment, ClusterGroup};
use nalgebra::{DMatrix, RowDVector};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_CLUSTERS: usize = 3;
pub const MAX_ITERATIONS: usize = 50;
const CONVERGENCE_TOLERANCE: f64 = 1e-8;
const SEED: u64 = 42;
const RESTARTS: usize = 10;

pub type Point = [f64; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Point>,
}

pub trait Clusterer: Send + Sync {
    fn name(&self) -> &'static str;

    /// `points` is non-empty and `1 <= k <= points.len()`.
    fn fit(&self, points: &[Point], k: usize) -> KMeansFit;
}

pub fn centroid_label(returns: f64, volatility: f64) -> ClusterGroup {
    if !returns.is_finite() || !volatility.is_finite() {
        return ClusterGroup::Mixed;
    }
    if volatility < 0.01 && returns >= 0.0 {
        ClusterGroup::SafeHaven
    } else if volatility >= 0.02 && returns >= 0.0 {
        ClusterGroup::AggressiveGrowth
    } else if volatility >= 0.02 && returns < 0.0 {
        ClusterGroup::Speculative
    } else {
        ClusterGroup::Mixed
    }
}

#[derive(Debug, Clone, Copy)]
struct Standardizer {
    mean: Point,
    scale: Point,
}

impl Standardizer {
    fn fit(points: &[Point]) -> Self {
        let n = points.len() as f64;
        let mut mean = [0.0; 3];
        let mut scale = [0.0; 3];
        for d in 0..3 {
            mean[d] = points.iter().map(|p| p[d]).sum::<f64>() / n;
            let var = points.iter().map(|p| (p[d] - mean[d]).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            scale[d] = if sd > 0.0 && sd.is_finite() { sd } else { 1.0 };
        }
        Self { mean, scale }
    }

    fn transform(&self, p: &Point) -> Point {
        std::array::from_fn(|d| (p[d] - self.mean[d]) / self.scale[d])
    }

    fn inverse(&self, p: &Point) -> Point {
        std::array::from_fn(|d| p[d] * self.scale[d] + self.mean[d])
    }
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(p: &Point, centroids: &[Point]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(p, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LloydKMeans;

impl LloydKMeans {
    fn seed_centroids(points: &[Point], k: usize) -> Vec<Point> {
        let mut centroids = vec![points[0]];
        while centroids.len() < k {
            let far = points
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(p, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            centroids.push(points[far]);
        }
        centroids
    }
}

impl Clusterer for LloydKMeans {
    fn name(&self) -> &'static str {
        "lloyd_kmeans"
    }

    fn fit(&self, points: &[Point], k: usize) -> KMeansFit {
        let mut centroids = Self::seed_centroids(points, k);
        let mut labels = vec![0; points.len()];

        for _ in 0..MAX_ITERATIONS {
            for (label, p) in labels.iter_mut().zip(points) {
                *label = nearest(p, &centroids);
            }

            let mut sums = vec![[0.0; 3]; k];
            let mut counts = vec![0usize; k];
            for (&label, p) in labels.iter().zip(points) {
                counts[label] += 1;
                for d in 0..3 {
                    sums[label][d] += p[d];
                }
            }

            // An empty cluster keeps its previous centroid.
            let next: Vec<Point> = (0..k)
                .map(|c| {
                    if counts[c] == 0 {
                        centroids[c]
                    } else {
                        std::array::from_fn(|d| sums[c][d] / counts[c] as f64)
                    }
                })
                .collect();

            let shift = next
                .iter()
                .zip(&centroids)
                .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()))
                .fold(0.0, f64::max);
            centroids = next;
            if shift < CONVERGENCE_TOLERANCE {
                break;
            }
        }

        KMeansFit { labels, centroids }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NalgebraKMeans;

impl NalgebraKMeans {
    fn seed_centroids(data: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> DMatrix<f64> {
        let n = data.nrows();
        let mut chosen: Vec<usize> = vec![rng.gen_range(0..n)];

        while chosen.len() < k {
            let weights: Vec<f64> = (0..n)
                .map(|i| {
                    chosen
                        .iter()
                        .map(|&c| (data.row(i) - data.row(c)).norm_squared())
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();

            let next = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                // All remaining points coincide with a centroid.
                Err(_) => (0..n).find(|i| !chosen.contains(i)).unwrap_or(0),
            };
            chosen.push(next);
        }

        DMatrix::from_fn(k, data.ncols(), |r, c| data[(chosen[r], c)])
    }

    fn lloyd(data: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> (Vec<usize>, DMatrix<f64>) {
        let n = data.nrows();
        let mut centroids = Self::seed_centroids(data, k, rng);
        let mut labels = vec![0usize; n];

        for _ in 0..MAX_ITERATIONS {
            for (i, label) in labels.iter_mut().enumerate() {
                *label = (0..k)
                    .map(|c| (c, (data.row(i) - centroids.row(c)).norm_squared()))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(c, _)| c)
                    .unwrap_or(0);
            }

            let mut next = centroids.clone();
            for c in 0..k {
                let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
                if members.is_empty() {
                    continue;
                }
                let mut sum = RowDVector::<f64>::zeros(data.ncols());
                for &i in &members {
                    sum += data.row(i);
                }
                next.set_row(c, &(sum / members.len() as f64));
            }

            let shift = (&next - &centroids).amax();
            centroids = next;
            if shift < CONVERGENCE_TOLERANCE {
                break;
            }
        }

        (labels, centroids)
    }
}

impl Clusterer for NalgebraKMeans {
    fn name(&self) -> &'static str {
        "nalgebra_kmeans"
    }

    fn fit(&self, points: &[Point], k: usize) -> KMeansFit {
        let n = points.len();
        let data = DMatrix::from_fn(n, 3, |r, c| points[r][c]);
        let mut rng = StdRng::seed_from_u64(SEED);

        // Lowest inertia across seeded restarts wins; ties keep the earliest.
        let mut best: Option<(Vec<usize>, DMatrix<f64>, f64)> = None;
        for _ in 0..RESTARTS {
            let (labels, centroids) = Self::lloyd(&data, k, &mut rng);
            let inertia: f64 = labels
                .iter()
                .enumerate()
                .map(|(i, &c)| (data.row(i) - centroids.row(c)).norm_squared())
                .sum();
            if best.as_ref().map_or(true, |(_, _, b)| inertia < *b) {
                best = Some((labels, centroids, inertia));
            }
        }

        let Some((labels, centroids, _)) = best else {
            return KMeansFit {
                labels: vec![0; n],
                centroids: vec![[0.0; 3]; k],
            };
        };
        let centroids = (0..k)
            .map(|c| std::array::from_fn(|d| centroids[(c, d)]))
            .collect();
        KMeansFit { labels, centroids }
    }
}

/// Clusters complete metrics records into at most `k` groups. Records with
/// a missing field are dropped; output follows input order.
pub fn cluster(metrics: &[Metrics], k: usize, clusterer: &dyn Clusterer) -> Vec<ClusterAssignment> {
    let usable: Vec<(&str, Point)> = metrics
        .iter()
        .filter_map(|m| match (m.returns, m.volatility, m.volume_avg) {
            (Some(r), Some(v), Some(vol)) if r.is_finite() && v.is_finite() && vol.is_finite() => {
                Some((m.symbol.as_str(), [r, v, vol]))
            }
            _ => None,
        })
        .collect();

    if usable.is_empty() || k == 0 {
        return Vec::new();
    }

    let raw: Vec<Point> = usable.iter().map(|(_, p)| *p).collect();
    let scaler = Standardizer::fit(&raw);
    let scaled: Vec<Point> = raw.iter().map(|p| scaler.transform(p)).collect();

    let k = k.min(scaled.len());
    let fit = clusterer.fit(&scaled, k);

    let groups: Vec<ClusterGroup> = fit
        .centroids
        .iter()
        .map(|c| {
            let raw = scaler.inverse(c);
            centroid_label(raw[0], raw[1])
        })
        .collect();

    tracing::debug!(
        clusterer = clusterer.name(),
        points = scaled.len(),
        k,
        "clustered metrics"
    );

    usable
        .iter()
        .zip(&fit.labels)
        .map(|((symbol, p), &label)| ClusterAssignment {
            symbol: symbol.to_string(),
            cluster: label,
            group: groups.get(label).copied().unwrap_or(ClusterGroup::Mixed),
            returns: p[0],
            volatility: p[1],
        })
        .collect()
}
