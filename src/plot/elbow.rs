use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use plotters::prelude::*;

use super::render_jpeg;
use crate::cluster::kmeans::KMeans;
use crate::error::AnalysisError;

/// 6 × 4 in at 300 dpi.
const SIZE: (u32, u32) = (1800, 1200);
const LINE_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);

pub const TITLE: &str = "Optimal N for neighbourhood clusters (Elbow)";
pub const X_DESC: &str = "Number of clusters k";
pub const Y_DESC: &str = "WCSS (inertia)";

/// Within-cluster sum of squares for every candidate k in `1..max_clusters`.
///
/// Candidates larger than the number of observations are skipped.
pub fn compute_wcss(
    observations: &[Vec<f64>],
    max_clusters: usize,
    seed: u64,
) -> Result<Vec<(usize, f64)>, AnalysisError> {
    let mut wcss = Vec::new();
    for k in 1..max_clusters {
        if k > observations.len() {
            warn!(
                "elbow: skipping k >= {k}, only {} observation(s)",
                observations.len()
            );
            break;
        }
        let fit = KMeans::new(k, seed).fit(observations)?;
        wcss.push((k, fit.inertia));
    }
    Ok(wcss)
}

/// Compute the WCSS curve and save it as `<save_path>/<image_name>`.
pub fn generate_elbow_plot(
    observations: &[Vec<f64>],
    max_clusters: usize,
    seed: u64,
    save_path: &Path,
    image_name: &str,
) -> Result<Vec<(usize, f64)>> {
    let wcss = compute_wcss(observations, max_clusters, seed)?;
    let path = save_path.join(image_name);
    render_jpeg(&path, SIZE, |root| draw_elbow(root, &wcss))?;
    info!("Wrote elbow plot ({} candidates) to {}", wcss.len(), path.display());
    Ok(wcss)
}

fn draw_elbow(root: &super::Canvas<'_>, wcss: &[(usize, f64)]) -> Result<()> {
    if wcss.is_empty() {
        root.draw(&Text::new(
            "No observations",
            (SIZE.0 as i32 / 2 - 150, SIZE.1 as i32 / 2),
            ("sans-serif", 48).into_font().color(&BLACK),
        ))?;
        return Ok(());
    }

    let max_k = wcss.iter().map(|&(k, _)| k).max().unwrap_or(1);
    let max_w = wcss.iter().map(|&(_, w)| w).fold(0.0f64, f64::max);
    let y_top = if max_w > 0.0 { max_w * 1.05 } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(TITLE, ("sans-serif", 56))
        .margin(40)
        .x_label_area_size(130)
        .y_label_area_size(200)
        .build_cartesian_2d(0usize..max_k + 1, 0f64..y_top)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(max_k + 2)
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .label_style(("sans-serif", 36))
        .axis_desc_style(("sans-serif", 44))
        .draw()?;

    chart.draw_series(LineSeries::new(
        wcss.iter().copied(),
        LINE_COLOR.stroke_width(4),
    ))?;
    chart.draw_series(
        wcss.iter()
            .map(|&(k, w)| Circle::new((k, w), 12, LINE_COLOR.filled())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn observations() -> Vec<Vec<f64>> {
        let mut rng = SmallRng::seed_from_u64(3);
        (0..80)
            .map(|i| {
                let base = (i % 4) as f64 * 5.0;
                vec![base + rng.gen::<f64>(), rng.gen::<f64>(), base - rng.gen::<f64>()]
            })
            .collect()
    }

    #[test]
    fn candidates_run_from_one_to_max_minus_one() {
        let wcss = compute_wcss(&observations(), 15, 42).unwrap();
        let ks: Vec<usize> = wcss.iter().map(|&(k, _)| k).collect();
        assert_eq!(ks, (1..15).collect::<Vec<_>>());
    }

    #[test]
    fn fixed_seed_reproduces_sequence() {
        let obs = observations();
        assert_eq!(compute_wcss(&obs, 10, 42).unwrap(), compute_wcss(&obs, 10, 42).unwrap());
    }

    #[test]
    fn elbow_at_true_cluster_count() {
        let wcss = compute_wcss(&observations(), 8, 42).unwrap();
        // four separated groups: most of the variance is gone by k=4
        let w = |k: usize| wcss[k - 1].1;
        assert!(w(4) < w(1) * 0.2);
    }

    #[test]
    fn candidates_capped_by_observation_count() {
        let obs = vec![vec![0.0], vec![1.0], vec![5.0]];
        let wcss = compute_wcss(&obs, 15, 42).unwrap();
        assert_eq!(wcss.len(), 3);
        assert!(wcss[2].1.abs() < 1e-12);
    }

    #[test]
    fn writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let wcss = generate_elbow_plot(&observations(), 6, 42, dir.path(), "elbow_plot.jpg").unwrap();
        assert_eq!(wcss.len(), 5);

        let bytes = std::fs::read(dir.path().join("elbow_plot.jpg")).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }
}
