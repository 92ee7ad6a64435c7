use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cluster::kmeans::MiniBatchKMeans;
use crate::config::AnalysisConfig;
use crate::data::model::Domain;
use crate::error::AnalysisError;
use crate::network::SpatialNetwork;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Everything produced by [`cluster_neighbourhoods`].
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourhoodResult {
    /// clusters × global labels, z-scored.
    pub neighbourhood_enrichment_matrix: Vec<Vec<f64>>,
    pub consistent_global_labels: Vec<String>,
    pub unique_cluster_labels: Vec<u32>,
    /// One composition row per point, domains concatenated in order.
    pub observation_matrix: Vec<Vec<f64>>,
    /// Cluster id per observation row.
    pub cluster_labels: Vec<u32>,
}

/// The persisted subset of a [`NeighbourhoodResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodMatrices {
    pub neighbourhood_enrichment_matrix: Vec<Vec<f64>>,
    pub consistent_global_labels: Vec<String>,
    pub unique_cluster_labels: Vec<u32>,
    pub observation_matrix: Vec<Vec<f64>>,
}

impl From<&NeighbourhoodResult> for NeighbourhoodMatrices {
    fn from(r: &NeighbourhoodResult) -> Self {
        NeighbourhoodMatrices {
            neighbourhood_enrichment_matrix: r.neighbourhood_enrichment_matrix.clone(),
            consistent_global_labels: r.consistent_global_labels.clone(),
            unique_cluster_labels: r.unique_cluster_labels.clone(),
            observation_matrix: r.observation_matrix.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline step
// ---------------------------------------------------------------------------

/// Cluster neighbourhoods and persist the matrices as
/// `<save_path>/<neighbourhood_label_name>.json`.
pub fn generate_neighbourhoods(
    domains: &mut [Domain],
    config: &AnalysisConfig,
    save_path: &Path,
) -> Result<(NeighbourhoodResult, PathBuf)> {
    let result = cluster_neighbourhoods(domains, config)?;

    std::fs::create_dir_all(save_path)
        .with_context(|| format!("creating output directory {}", save_path.display()))?;
    let path = save_path.join(config.matrices_file_name());
    save_matrices(&NeighbourhoodMatrices::from(&result), &path)?;
    info!("Wrote neighbourhood matrices to {}", path.display());

    Ok((result, path))
}

pub fn save_matrices(matrices: &NeighbourhoodMatrices, path: &Path) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(file), matrices)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_matrices(path: &Path) -> Result<NeighbourhoodMatrices> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ---------------------------------------------------------------------------
// Core analysis
// ---------------------------------------------------------------------------

/// Build a network per domain, describe every point by the label
/// composition of its k-hop neighbourhood, cluster those descriptions and
/// z-score each cluster's mean composition against the global one.
///
/// Adds the `neighbourhood_label_name` label to every domain.
pub fn cluster_neighbourhoods(
    domains: &mut [Domain],
    config: &AnalysisConfig,
) -> Result<NeighbourhoodResult, AnalysisError> {
    let label_name = config.label_name.as_str();

    let mut global: BTreeSet<String> = config.phenotype_list.iter().cloned().collect();
    for domain in domains.iter() {
        if domain.label(label_name).is_none() {
            return Err(AnalysisError::UnknownLabel {
                domain: domain.name.clone(),
                label: label_name.to_string(),
            });
        }
        global.extend(domain.unique_labels(label_name));
    }
    let consistent_global_labels: Vec<String> = global.into_iter().collect();
    let column_of: BTreeMap<&str, usize> = consistent_global_labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut observation_matrix = Vec::new();
    for domain in domains.iter() {
        let network = SpatialNetwork::build(&domain.points, &config.network)?;
        let labels = domain.label(label_name).unwrap_or_default();
        let columns: Vec<usize> = labels.iter().map(|l| column_of[l.as_str()]).collect();

        for node in 0..network.len() {
            let hood = network.k_hop_neighbourhood(node, config.k_hops);
            let mut row = vec![0.0; consistent_global_labels.len()];
            for &j in &hood {
                row[columns[j]] += 1.0;
            }
            let size = hood.len() as f64;
            row.iter_mut().for_each(|v| *v /= size);
            observation_matrix.push(row);
        }
        debug!("{}: {} observation rows", domain.name, network.len());
    }

    let fit = MiniBatchKMeans {
        n_clusters: config.n_clusters,
        batch_size: config.minibatch.batch_size,
        max_iter: config.minibatch.max_iter,
        max_no_improvement: config.minibatch.max_no_improvement,
        seed: config.minibatch.seed,
    }
    .fit(&observation_matrix)?;
    let cluster_labels: Vec<u32> = fit.labels.iter().map(|&c| c as u32).collect();

    let mut offset = 0;
    for domain in domains.iter_mut() {
        let ids = cluster_labels[offset..offset + domain.len()]
            .iter()
            .map(|c| c.to_string())
            .collect();
        offset += domain.len();
        domain
            .add_labels(&config.neighbourhood_label_name, ids)
            .map_err(|e| AnalysisError::InvalidParameter(e.to_string()))?;
    }

    let unique_cluster_labels: Vec<u32> = cluster_labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let neighbourhood_enrichment_matrix =
        zscore_enrichment(&observation_matrix, &cluster_labels, &unique_cluster_labels);

    info!(
        "Clustered {} cells into {} neighbourhood(s) over {} labels",
        observation_matrix.len(),
        unique_cluster_labels.len(),
        consistent_global_labels.len()
    );

    Ok(NeighbourhoodResult {
        neighbourhood_enrichment_matrix,
        consistent_global_labels,
        unique_cluster_labels,
        observation_matrix,
        cluster_labels,
    })
}

/// Below this a label column counts as constant.
const STD_EPSILON: f64 = 1e-12;

/// `(mean_in_cluster - global_mean) / global_std` per label column, using
/// the population standard deviation; 0 where a label never varies.
pub fn zscore_enrichment(
    observations: &[Vec<f64>],
    cluster_labels: &[u32],
    clusters: &[u32],
) -> Vec<Vec<f64>> {
    let n_cols = observations.first().map(Vec::len).unwrap_or(0);
    let n = observations.len() as f64;

    let mut mean = vec![0.0; n_cols];
    for row in observations {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut std = vec![0.0; n_cols];
    for row in observations {
        for ((s, v), m) in std.iter_mut().zip(row).zip(&mean) {
            *s += (v - m).powi(2) / n;
        }
    }
    std.iter_mut().for_each(|s| *s = s.sqrt());

    clusters
        .iter()
        .map(|&c| {
            let members: Vec<&Vec<f64>> = observations
                .iter()
                .zip(cluster_labels)
                .filter(|&(_, &l)| l == c)
                .map(|(row, _)| row)
                .collect();
            let size = members.len().max(1) as f64;
            (0..n_cols)
                .map(|j| {
                    let cluster_mean = members.iter().map(|r| r[j]).sum::<f64>() / size;
                    if std[j] > STD_EPSILON {
                        (cluster_mean - mean[j]) / std[j]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two spatially separated groups per domain: A-cells on the left,
    /// B-cells on the right.
    fn domain(name: &str, n_per_side: usize) -> Domain {
        let mut d = Domain::new(name);
        let mut labels = Vec::new();
        for i in 0..n_per_side {
            d.add_points([[i as f64 * 0.5, (i % 3) as f64 * 0.5]]);
            labels.push("A".to_string());
        }
        for i in 0..n_per_side {
            d.add_points([[100.0 + i as f64 * 0.5, (i % 3) as f64 * 0.5]]);
            labels.push("B".to_string());
        }
        d.add_labels("Phenotype", labels).unwrap();
        d
    }

    fn config(n_clusters: usize) -> AnalysisConfig {
        AnalysisConfig {
            phenotype_list: vec!["C".to_string()],
            n_clusters,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn shapes_and_labels() {
        let mut domains = vec![domain("s1.csv", 15), domain("s2.csv", 12)];
        let cfg = config(2);
        let r = cluster_neighbourhoods(&mut domains, &cfg).unwrap();

        assert_eq!(r.consistent_global_labels, vec!["A", "B", "C"]);
        assert_eq!(r.observation_matrix.len(), 30 + 24);
        assert_eq!(r.cluster_labels.len(), r.observation_matrix.len());
        assert_eq!(r.neighbourhood_enrichment_matrix.len(), r.unique_cluster_labels.len());
        for row in &r.neighbourhood_enrichment_matrix {
            assert_eq!(row.len(), r.consistent_global_labels.len());
        }
        for row in &r.observation_matrix {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }

        // neighbourhood ids written back onto every domain
        for d in &domains {
            let ids = d.label(&cfg.neighbourhood_label_name).unwrap();
            assert_eq!(ids.len(), d.len());
        }
    }

    #[test]
    fn pure_groups_separate_and_enrich() {
        let mut domains = vec![domain("s1.csv", 15)];
        let r = cluster_neighbourhoods(&mut domains, &config(2)).unwrap();

        assert_eq!(r.unique_cluster_labels.len(), 2);
        let a_cluster = r.cluster_labels[0];
        assert!(r.cluster_labels[..15].iter().all(|&c| c == a_cluster));
        assert!(r.cluster_labels[15..].iter().all(|&c| c != a_cluster));

        let row = r
            .unique_cluster_labels
            .iter()
            .position(|&c| c == a_cluster)
            .unwrap();
        let enrich = &r.neighbourhood_enrichment_matrix[row];
        assert!(enrich[0] > 0.0, "A enriched in the A neighbourhood");
        assert!(enrich[1] < 0.0, "B depleted in the A neighbourhood");
        assert_eq!(enrich[2], 0.0, "forced label never seen");
    }

    #[test]
    fn missing_label_column_is_an_error() {
        let mut d = Domain::new("x.csv");
        d.add_points([[0.0, 0.0]]);
        assert!(matches!(
            cluster_neighbourhoods(&mut [d], &config(1)),
            Err(AnalysisError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn zscore_matches_hand_computation() {
        // column 0: values 1,1,0,0 → mean 0.5, std 0.5
        let obs = vec![vec![1.0, 0.5], vec![1.0, 0.5], vec![0.0, 0.5], vec![0.0, 0.5]];
        let z = zscore_enrichment(&obs, &[0, 0, 1, 1], &[0, 1]);
        assert_eq!(z, vec![vec![1.0, 0.0], vec![-1.0, 0.0]]);
    }

    #[test]
    fn matrices_json_has_four_keys() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let mut domains = vec![domain("s1.csv", 10)];
        let cfg = config(2);

        let (result, path) = generate_neighbourhoods(&mut domains, &cfg, &out).unwrap();
        assert_eq!(path, out.join("Neighbourhood_ID_KNN_8.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let keys: BTreeSet<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            BTreeSet::from([
                "consistent_global_labels",
                "neighbourhood_enrichment_matrix",
                "observation_matrix",
                "unique_cluster_labels",
            ])
        );

        let back = load_matrices(&path).unwrap();
        assert_eq!(back.consistent_global_labels, result.consistent_global_labels);
        assert_eq!(back.unique_cluster_labels, result.unique_cluster_labels);
        assert_eq!(back.observation_matrix.len(), result.observation_matrix.len());
        for (a, b) in back
            .neighbourhood_enrichment_matrix
            .iter()
            .flatten()
            .zip(result.neighbourhood_enrichment_matrix.iter().flatten())
        {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
