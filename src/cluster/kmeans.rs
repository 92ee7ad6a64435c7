use log::debug;
use rand::rngs::SmallRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index per observation row.
    pub labels: Vec<usize>,
    /// Within-cluster sum of squares.
    pub inertia: f64,
    pub n_iter: usize,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of and squared distance to the closest centroid.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(c, centroid)| (c, squared_distance(point, centroid)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn assign(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = data
        .iter()
        .map(|row| {
            let (c, d2) = nearest(row, centroids);
            inertia += d2;
            c
        })
        .collect();
    (labels, inertia)
}

/// Within-cluster sum of squares for a given assignment.
pub fn inertia(data: &[Vec<f64>], centroids: &[Vec<f64>], labels: &[usize]) -> f64 {
    data.iter()
        .zip(labels)
        .map(|(row, &c)| squared_distance(row, &centroids[c]))
        .sum()
}

fn validate(data: &[Vec<f64>], n_clusters: usize) -> Result<(), AnalysisError> {
    if n_clusters == 0 {
        return Err(AnalysisError::InvalidParameter("n_clusters must be at least 1".into()));
    }
    if data.len() < n_clusters {
        return Err(AnalysisError::NotEnoughPoints {
            n_points: data.len(),
            n_clusters,
        });
    }
    let dim = data[0].len();
    if data.iter().any(|r| r.len() != dim) {
        return Err(AnalysisError::InvalidParameter(
            "observation rows have differing lengths".into(),
        ));
    }
    Ok(())
}

/// k-means++ seeding: each new centre is drawn with probability
/// proportional to its squared distance from the closest chosen centre.
pub fn kmeans_plus_plus(data: &[Vec<f64>], k: usize, rng: &mut SmallRng) -> Vec<Vec<f64>> {
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    if data.is_empty() || k == 0 {
        return centroids;
    }
    centroids.push(data[rng.gen_range(0..data.len())].clone());

    let mut d2: Vec<f64> = data
        .iter()
        .map(|row| squared_distance(row, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = d2.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = data.len() - 1;
            for (i, &w) in d2.iter().enumerate() {
                acc += w;
                if acc >= target && w > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // every point coincides with a centre
            rng.gen_range(0..data.len())
        };

        let centre = data[pick].clone();
        for (row, best) in data.iter().zip(d2.iter_mut()) {
            *best = best.min(squared_distance(row, &centre));
        }
        centroids.push(centre);
    }
    centroids
}

/// Move every empty cluster onto the point currently worst served by its
/// centroid. A chosen point is reassigned so it cannot be picked twice.
fn reseed_empty(
    data: &[Vec<f64>],
    labels: &mut [usize],
    counts: &[usize],
    centroids: &mut [Vec<f64>],
) {
    for c in (0..centroids.len()).filter(|&c| counts[c] == 0) {
        let far = data
            .iter()
            .zip(labels.iter())
            .map(|(row, &l)| squared_distance(row, &centroids[l]))
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0;
        centroids[c] = data[far].clone();
        labels[far] = c;
    }
}

fn mean_feature_variance(data: &[Vec<f64>]) -> f64 {
    let n = data.len() as f64;
    let dim = data[0].len();
    if dim == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for j in 0..dim {
        let mean = data.iter().map(|r| r[j]).sum::<f64>() / n;
        total += data.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dim as f64
}

// ---------------------------------------------------------------------------
// Full-batch k-means (Lloyd)
// ---------------------------------------------------------------------------

/// Lloyd's algorithm with k-means++ seeding.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Relative to the mean per-feature variance of the data.
    pub tol: f64,
    pub seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        KMeans {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            seed,
        }
    }

    pub fn fit(&self, data: &[Vec<f64>]) -> Result<KMeansFit, AnalysisError> {
        validate(data, self.n_clusters)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus(data, self.n_clusters, &mut rng);
        let threshold = self.tol * mean_feature_variance(data);
        let dim = data[0].len();

        let mut n_iter = 0;
        for _ in 0..self.max_iter {
            n_iter += 1;
            let (mut labels, _) = assign(data, &centroids);

            let mut sums = vec![vec![0.0; dim]; self.n_clusters];
            let mut counts = vec![0usize; self.n_clusters];
            for (row, &c) in data.iter().zip(&labels) {
                counts[c] += 1;
                for (s, v) in sums[c].iter_mut().zip(row) {
                    *s += v;
                }
            }

            let mut updated: Vec<Vec<f64>> = sums
                .into_iter()
                .zip(&counts)
                .map(|(s, &n)| {
                    if n == 0 {
                        s
                    } else {
                        s.into_iter().map(|v| v / n as f64).collect()
                    }
                })
                .collect();

            reseed_empty(data, &mut labels, &counts, &mut updated);

            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;
            if shift <= threshold {
                break;
            }
        }

        let (labels, inertia) = assign(data, &centroids);
        debug!(
            "kmeans k={} converged after {n_iter} iteration(s), inertia {inertia:.4}",
            self.n_clusters
        );
        Ok(KMeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        })
    }
}

// ---------------------------------------------------------------------------
// Mini-batch k-means
// ---------------------------------------------------------------------------

/// Mini-batch k-means (Sculley 2010) with per-centre learning rates.
#[derive(Debug, Clone)]
pub struct MiniBatchKMeans {
    pub n_clusters: usize,
    pub batch_size: usize,
    /// Passes over the data; each pass is `ceil(n / batch_size)` steps.
    pub max_iter: usize,
    pub max_no_improvement: usize,
    pub seed: u64,
}

impl MiniBatchKMeans {
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<KMeansFit, AnalysisError> {
        validate(data, self.n_clusters)?;
        if self.batch_size == 0 {
            return Err(AnalysisError::InvalidParameter("batch_size must be at least 1".into()));
        }
        let n = data.len();
        let mut rng = SmallRng::seed_from_u64(self.seed);

        let init_size = (3 * self.batch_size).max(self.n_clusters).min(n);
        let init_rows: Vec<Vec<f64>> = index::sample(&mut rng, n, init_size)
            .into_iter()
            .map(|i| data[i].clone())
            .collect();
        let mut centroids = kmeans_plus_plus(&init_rows, self.n_clusters, &mut rng);

        let batch_size = self.batch_size.min(n);
        let steps = self.max_iter * n.div_ceil(batch_size);
        let alpha = (2.0 * batch_size as f64 / (n as f64 + 1.0)).min(1.0);
        let mut counts = vec![0.0f64; self.n_clusters];
        let mut ewa: Option<f64> = None;
        let mut best = f64::INFINITY;
        let mut no_improvement = 0;

        let mut n_iter = 0;
        for _ in 0..steps {
            n_iter += 1;
            let batch = index::sample(&mut rng, n, batch_size);

            let mut batch_inertia = 0.0;
            for i in batch.iter() {
                let row = &data[i];
                let (c, d2) = nearest(row, &centroids);
                batch_inertia += d2;
                counts[c] += 1.0;
                let eta = 1.0 / counts[c];
                for (m, v) in centroids[c].iter_mut().zip(row) {
                    *m += eta * (v - *m);
                }
            }
            batch_inertia /= batch_size as f64;

            let smoothed = match ewa {
                None => batch_inertia,
                Some(prev) => prev * (1.0 - alpha) + batch_inertia * alpha,
            };
            ewa = Some(smoothed);

            if smoothed < best {
                best = smoothed;
                no_improvement = 0;
            } else {
                no_improvement += 1;
                if no_improvement >= self.max_no_improvement {
                    debug!("mini-batch k-means: no improvement for {no_improvement} steps, stopping");
                    break;
                }
            }
        }

        let (labels, inertia) = assign(data, &centroids);
        debug!(
            "mini-batch k-means k={} ran {n_iter} step(s), inertia {inertia:.4}",
            self.n_clusters
        );
        Ok(KMeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        })
    }
}
