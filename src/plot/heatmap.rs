use std::path::Path;

use anyhow::Result;
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::{Canvas, render_jpeg};
use crate::cluster::hierarchy::average_linkage_order;
use crate::color::DivergingColorMap;
use crate::error::AnalysisError;

/// 10.5 × 10.5 in at 100 dpi.
const SIZE: (u32, u32) = (1050, 1050);
const VMIN: f64 = -2.0;
const VMAX: f64 = 2.0;
const TICKS: [f64; 3] = [-2.0, 0.0, 2.0];

pub const COLORBAR_LABEL: &str = "Neighbourhood enrichment KNN (z-score)";
pub const X_TITLE: &str = "Phenotype ID";
pub const Y_TITLE: &str = "Neighbourhood ID";

// Layout in pixels. The colour bar sits where a 0.12/0.81/0.72/0.05
// figure-fraction box would on a 1050 px canvas.
const BAR_LEFT: i32 = 126;
const BAR_RIGHT: i32 = 882;
const BAR_TOP: i32 = 147;
const BAR_BOTTOM: i32 = 199;
const GRID_LEFT: i32 = 150;
const GRID_TOP: i32 = 240;
const GRID_RIGHT_PAD: i32 = 40;
const GRID_BOTTOM_PAD: i32 = 250;

/// Heatmap with columns reordered by average-linkage clustering and rows
/// kept in cluster order, saved as `<save_path>/<image_name>`.
pub fn generate_neighbourhood_heatmap(
    matrix: &[Vec<f64>],
    unique_cluster_labels: &[u32],
    consistent_global_labels: &[String],
    save_path: &Path,
    image_name: &str,
) -> Result<()> {
    check_shape(matrix, unique_cluster_labels, consistent_global_labels)?;

    let columns: Vec<Vec<f64>> = (0..consistent_global_labels.len())
        .map(|j| matrix.iter().map(|row| row[j]).collect())
        .collect();
    let column_order = average_linkage_order(&columns);

    let path = save_path.join(image_name);
    render_jpeg(&path, SIZE, |root| {
        draw_heatmap(
            root,
            matrix,
            &column_order,
            unique_cluster_labels,
            consistent_global_labels,
        )
    })?;
    info!(
        "Wrote {}x{} enrichment heatmap to {}",
        matrix.len(),
        consistent_global_labels.len(),
        path.display()
    );
    Ok(())
}

fn check_shape(
    matrix: &[Vec<f64>],
    rows: &[u32],
    columns: &[String],
) -> Result<(), AnalysisError> {
    if matrix.len() != rows.len() {
        return Err(AnalysisError::InvalidParameter(format!(
            "enrichment matrix has {} rows but there are {} cluster labels",
            matrix.len(),
            rows.len()
        )));
    }
    if let Some(row) = matrix.iter().find(|r| r.len() != columns.len()) {
        return Err(AnalysisError::InvalidParameter(format!(
            "enrichment matrix row has {} columns but there are {} phenotype labels",
            row.len(),
            columns.len()
        )));
    }
    Ok(())
}

fn draw_heatmap(
    root: &Canvas<'_>,
    matrix: &[Vec<f64>],
    column_order: &[usize],
    row_labels: &[u32],
    column_labels: &[String],
) -> Result<()> {
    let cmap = DivergingColorMap::new(VMIN, VMAX);
    draw_colorbar(root, &cmap)?;

    let (n_rows, n_cols) = (row_labels.len() as i32, column_labels.len() as i32);
    if n_rows == 0 || n_cols == 0 {
        root.draw(&Text::new(
            "No neighbourhoods",
            (SIZE.0 as i32 / 2, SIZE.1 as i32 / 2),
            label_style(28).pos(Pos::new(HPos::Center, VPos::Center)),
        ))?;
        return Ok(());
    }

    // square cells
    let avail_w = SIZE.0 as i32 - GRID_LEFT - GRID_RIGHT_PAD;
    let avail_h = SIZE.1 as i32 - GRID_TOP - GRID_BOTTOM_PAD;
    let cell = (avail_w / n_cols).min(avail_h / n_rows).max(1);
    let grid_bottom = GRID_TOP + cell * n_rows;
    let grid_right = GRID_LEFT + cell * n_cols;

    for (r, row) in matrix.iter().enumerate() {
        for (c, &j) in column_order.iter().enumerate() {
            let x0 = GRID_LEFT + c as i32 * cell;
            let y0 = GRID_TOP + r as i32 * cell;
            let corners = [(x0, y0), (x0 + cell, y0 + cell)];
            root.draw(&Rectangle::new(corners, cmap.color_for(row[j]).filled()))?;
            root.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))?;
        }
    }

    let font_size = (cell / 2).clamp(10, 18);

    for (r, label) in row_labels.iter().enumerate() {
        let y = GRID_TOP + r as i32 * cell + cell / 2;
        root.draw(&Text::new(
            label.to_string(),
            (GRID_LEFT - 8, y),
            label_style(font_size).pos(Pos::new(HPos::Right, VPos::Center)),
        ))?;
    }

    let rotated = TextStyle::from(
        ("sans-serif", font_size)
            .into_font()
            .transform(FontTransform::Rotate90),
    )
    .color(&BLACK);
    for (c, &j) in column_order.iter().enumerate() {
        let x = GRID_LEFT + c as i32 * cell + cell / 2 + font_size / 2;
        root.draw(&Text::new(
            column_labels[j].clone(),
            (x, grid_bottom + 6),
            rotated.clone(),
        ))?;
    }

    root.draw(&Text::new(
        X_TITLE,
        ((GRID_LEFT + grid_right) / 2, SIZE.1 as i32 - 20),
        label_style(20).pos(Pos::new(HPos::Center, VPos::Bottom)),
    ))?;
    let y_title = TextStyle::from(
        ("sans-serif", 20)
            .into_font()
            .transform(FontTransform::Rotate270),
    )
    .color(&BLACK);
    root.draw(&Text::new(
        Y_TITLE,
        (GRID_LEFT - 100, (GRID_TOP + grid_bottom) / 2 + 80),
        y_title,
    ))?;
    Ok(())
}

/// Horizontal colour bar with ticks and caption above it.
fn draw_colorbar(root: &Canvas<'_>, cmap: &DivergingColorMap) -> Result<()> {
    let width = (BAR_RIGHT - BAR_LEFT) as f64;
    for x in BAR_LEFT..BAR_RIGHT {
        let t = (x - BAR_LEFT) as f64 / width;
        let color = cmap.color_for(VMIN + t * (VMAX - VMIN));
        root.draw(&Rectangle::new([(x, BAR_TOP), (x + 1, BAR_BOTTOM)], color.filled()))?;
    }
    root.draw(&Rectangle::new(
        [(BAR_LEFT, BAR_TOP), (BAR_RIGHT, BAR_BOTTOM)],
        BLACK.stroke_width(1),
    ))?;

    for tick in TICKS {
        let x = BAR_LEFT + ((tick - VMIN) / (VMAX - VMIN) * width).round() as i32;
        root.draw(&PathElement::new(
            vec![(x, BAR_TOP - 6), (x, BAR_TOP)],
            BLACK.stroke_width(1),
        ))?;
        root.draw(&Text::new(
            format!("{tick:.0}"),
            (x, BAR_TOP - 8),
            label_style(16).pos(Pos::new(HPos::Center, VPos::Bottom)),
        ))?;
    }

    root.draw(&Text::new(
        COLORBAR_LABEL,
        ((BAR_LEFT + BAR_RIGHT) / 2, BAR_TOP - 32),
        label_style(20).pos(Pos::new(HPos::Center, VPos::Bottom)),
    ))?;
    Ok(())
}

fn label_style(size: i32) -> TextStyle<'static> {
    TextStyle::from(("sans-serif", size).into_font()).color(&BLACK)
}
