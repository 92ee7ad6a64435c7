use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Network parameters
// ---------------------------------------------------------------------------

/// How edges of the spatial proximity network are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    /// Connect every point to its `n` nearest neighbours.
    Knn,
    /// Connect every pair of points closer than `max_edge_distance`.
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_type: NetworkType,
    pub number_of_nearest_neighbours: usize,
    pub min_edge_distance: f64,
    /// `None` for no upper bound.
    pub max_edge_distance: Option<f64>,
}

impl NetworkConfig {
    /// Upper edge-length bound, infinite when unset.
    pub fn max_distance(&self) -> f64 {
        self.max_edge_distance.unwrap_or(f64::INFINITY)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Knn,
            number_of_nearest_neighbours: 10,
            min_edge_distance: 0.0,
            max_edge_distance: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mini-batch k-means parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniBatchConfig {
    pub batch_size: usize,
    pub max_iter: usize,
    /// Stop after this many steps without improvement of the smoothed batch inertia.
    pub max_no_improvement: usize,
    pub seed: u64,
}

impl Default for MiniBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            max_iter: 100,
            max_no_improvement: 10,
            seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Whole-run parameters
// ---------------------------------------------------------------------------

/// Phenotypes always present in the composition vectors, whether or not a
/// sample contains them.
pub const DEFAULT_PHENOTYPES: [&str; 27] = [
    "CD8",
    "CD8_Other",
    "FAP",
    "FAP_PDGFRa",
    "FAP_PDGFRa_aSMA",
    "FAP_PDPN",
    "FAP_PDPN_PDGFRa",
    "FAP_PDPN_PDGFRa_aSMA",
    "FAP_PDPN_aSMA",
    "FAP_PDPN_panCK",
    "FAP_aSMA",
    "FAP_panCK",
    "Other",
    "PDGFRa",
    "PDGFRa_aSMA",
    "PDPN",
    "PDPN_CD8",
    "PDPN_CD8_Other",
    "PDPN_PDGFRa",
    "PDPN_PDGFRa_aSMA",
    "PDPN_aSMA",
    "PDPN_panCK",
    "PDPN_panCK_Other",
    "aSMA",
    "panCK",
    "panCK_Other",
    "unclassified detections",
];

/// Fixed analysis parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Label whose composition is aggregated.
    pub label_name: String,
    pub network: NetworkConfig,
    pub k_hops: usize,
    pub phenotype_list: Vec<String>,
    /// Name of the label column written back to every domain; also names the
    /// matrices file.
    pub neighbourhood_label_name: String,
    pub n_clusters: usize,
    pub minibatch: MiniBatchConfig,
    /// Elbow candidates are `1..elbow_max_clusters`.
    pub elbow_max_clusters: usize,
    pub elbow_seed: u64,
    pub elbow_image: String,
    pub heatmap_image: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            label_name: "Phenotype".to_string(),
            network: NetworkConfig::default(),
            k_hops: 1,
            phenotype_list: DEFAULT_PHENOTYPES.iter().map(|s| s.to_string()).collect(),
            // no spaces: it becomes a file name
            neighbourhood_label_name: "Neighbourhood_ID_KNN_8".to_string(),
            n_clusters: 8,
            minibatch: MiniBatchConfig::default(),
            elbow_max_clusters: 15,
            elbow_seed: 42,
            elbow_image: "elbow_plot.jpg".to_string(),
            heatmap_image: "heatmap.jpg".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// File name of the persisted neighbourhood matrices.
    pub fn matrices_file_name(&self) -> String {
        format!("{}.json", self.neighbourhood_label_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.network.network_type, NetworkType::Knn);
        assert_eq!(cfg.network.number_of_nearest_neighbours, 10);
        assert_eq!(cfg.network.max_edge_distance, None);
        assert!(cfg.network.max_distance().is_infinite());
        assert_eq!(cfg.k_hops, 1);
        assert_eq!(cfg.n_clusters, 8);
        assert_eq!(cfg.phenotype_list.len(), 27);
        assert_eq!(cfg.matrices_file_name(), "Neighbourhood_ID_KNN_8.json");
    }

    #[test]
    fn json_dump_reads_back() {
        let cfg = AnalysisConfig::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cfg);

        let bounded = NetworkConfig {
            max_edge_distance: Some(25.0),
            ..NetworkConfig::default()
        };
        let back: NetworkConfig =
            serde_json::from_str(&serde_json::to_string(&bounded).unwrap()).unwrap();
        assert_eq!(back.max_distance(), 25.0);
    }
}
