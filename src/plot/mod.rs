/// Diagnostic figures, rendered into an in-memory RGB buffer with plotters
/// and written as JPEG.
pub mod elbow;
pub mod heatmap;

use std::path::Path;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

pub type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Allocate a white canvas of `size` pixels, let `draw` paint it, and save
/// the result to `path` as JPEG. The pixel buffer is released on return.
pub fn render_jpeg<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&Canvas<'_>) -> Result<()>,
{
    let (w, h) = size;
    let mut buf = vec![255u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }

    let img = image::RgbImage::from_raw(w, h, buf)
        .context("pixel buffer does not match image dimensions")?;
    img.save_with_format(path, image::ImageFormat::Jpeg)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
