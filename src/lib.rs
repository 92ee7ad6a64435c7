//! Spatial neighbourhood analysis over per-sample cell tables.
//!
//! ```text
//!  <inputs>/*.csv ──► loader ──► Domain ×N
//!                                  │
//!               network + k-hop composition + mini-batch k-means
//!                                  │
//!        ┌──────────────┬──────────┴───────┬─────────────────┐
//!        ▼              ▼                  ▼                 ▼
//!   <label>.json   elbow_plot.jpg     heatmap.jpg    domains/ + csvs/
//! ```

pub mod cluster;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod neighbourhood;
pub mod network;
pub mod plot;

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use config::AnalysisConfig;
use data::loader::create_domains;
use data::writer::save_domains;
use neighbourhood::generate_neighbourhoods;
use plot::elbow::generate_elbow_plot;
use plot::heatmap::generate_neighbourhood_heatmap;

/// Run the whole pipeline: load, cluster, plot, persist.
pub fn run(inputs: &Path, output: &Path, config: &AnalysisConfig) -> Result<()> {
    debug!(
        "analysis parameters: {}",
        serde_json::to_string(config).context("serialising analysis parameters")?
    );

    let mut domains = create_domains(inputs)?;

    let (result, _) = generate_neighbourhoods(&mut domains, config, output)?;

    // Diagnostic only: the cluster count above is fixed by `config`.
    generate_elbow_plot(
        &result.observation_matrix,
        config.elbow_max_clusters,
        config.elbow_seed,
        output,
        &config.elbow_image,
    )?;

    generate_neighbourhood_heatmap(
        &result.neighbourhood_enrichment_matrix,
        &result.unique_cluster_labels,
        &result.consistent_global_labels,
        output,
        &config.heatmap_image,
    )?;

    save_domains(&domains, output)?;

    info!("Done: {} domain(s) written to {}", domains.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::writer::{CSVS_DIR, DOMAINS_DIR, load_domain_parquet};

    const PHENOTYPES: [&str; 4] = ["CD8", "FAP", "panCK", "Other"];

    fn write_sample(dir: &Path, name: &str, n: usize, shift: usize) {
        let mut text = String::from("Cell X Position,Cell Y Position,Phenotype,Parent\n");
        for i in 0..n {
            let x = (i % 10) as f64 * 12.5;
            let y = (i / 10) as f64 * 12.5;
            // phenotype patches of 5 columns
            let p = PHENOTYPES[((i % 10) / 5 + 2 * ((i / 10) / 3) + shift) % 4];
            text.push_str(&format!("{x},{y},{p},ROI_{}\n", i / 50));
        }
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn end_to_end_outputs() {
        let inputs = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let out = output.path().join("results");
        write_sample(inputs.path(), "sample_b.csv", 60, 1);
        write_sample(inputs.path(), "sample_a.CSV", 80, 0);

        let config = AnalysisConfig {
            n_clusters: 4,
            elbow_max_clusters: 6,
            ..AnalysisConfig::default()
        };
        run(inputs.path(), &out, &config).unwrap();

        assert!(out.join("Neighbourhood_ID_KNN_8.json").is_file());
        assert!(out.join("elbow_plot.jpg").is_file());
        assert!(out.join("heatmap.jpg").is_file());
        assert_eq!(std::fs::read_dir(out.join(DOMAINS_DIR)).unwrap().count(), 2);
        assert_eq!(std::fs::read_dir(out.join(CSVS_DIR)).unwrap().count(), 2);

        let a = load_domain_parquet(&out.join(DOMAINS_DIR).join("sample_a.CSV.parquet")).unwrap();
        assert_eq!(a.name, "sample_a.CSV");
        assert_eq!(a.len(), 80);
        assert_eq!(a.points[10], [0.0, -12.5]);
        assert!(a.label(&config.neighbourhood_label_name).is_some());

        let matrices =
            neighbourhood::load_matrices(&out.join(config.matrices_file_name())).unwrap();
        assert_eq!(matrices.observation_matrix.len(), 140);
        assert_eq!(
            matrices.neighbourhood_enrichment_matrix.len(),
            matrices.unique_cluster_labels.len()
        );
        assert!(matrices
            .neighbourhood_enrichment_matrix
            .iter()
            .all(|row| row.len() == matrices.consistent_global_labels.len()));
    }

    #[test]
    fn missing_column_aborts_before_writing() {
        let inputs = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(inputs.path().join("x.csv"), "Cell X Position,Phenotype\n1,CD8\n").unwrap();

        let err = run(inputs.path(), output.path(), &AnalysisConfig::default()).unwrap_err();
        assert!(err.to_string().contains("x.csv missing columns"));
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
