use palette::{Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// RdBu_r anchors
// ---------------------------------------------------------------------------

/// ColorBrewer RdBu, reversed: dark blue (low) → white → dark red (high).
const RDBU_R: [u32; 11] = [
    0x053061, 0x2166ac, 0x4393c3, 0x92c5de, 0xd1e5f0, 0xf7f7f7, 0xfddbc7, 0xf4a582, 0xd6604d,
    0xb2182b, 0x67001f,
];

fn anchor(hex: u32) -> Srgb<f32> {
    Srgb::new(
        ((hex >> 16) & 0xff) as u8,
        ((hex >> 8) & 0xff) as u8,
        (hex & 0xff) as u8,
    )
    .into_format()
}

fn to_plotters(c: Srgb<f32>) -> RGBColor {
    let c: Srgb<u8> = c.into_format();
    RGBColor(c.red, c.green, c.blue)
}

// ---------------------------------------------------------------------------
// Diverging colour map: value → RGBColor
// ---------------------------------------------------------------------------

/// Maps values in `[vmin, vmax]` onto RdBu_r; values outside are clamped.
#[derive(Debug, Clone, Copy)]
pub struct DivergingColorMap {
    pub vmin: f64,
    pub vmax: f64,
}

impl DivergingColorMap {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        DivergingColorMap { vmin, vmax }
    }

    /// Look up the colour for a value. NaN maps to the centre colour.
    pub fn color_for(&self, value: f64) -> RGBColor {
        let span = self.vmax - self.vmin;
        let t = if span > 0.0 {
            ((value - self.vmin) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let t = if t.is_nan() { 0.5 } else { t };

        let segments = (RDBU_R.len() - 1) as f64;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(RDBU_R.len() - 2);
        let frac = (pos - i as f64) as f32;
        to_plotters(anchor(RDBU_R[i]).mix(anchor(RDBU_R[i + 1]), frac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_centre() {
        let cm = DivergingColorMap::new(-2.0, 2.0);
        assert_eq!(cm.color_for(-2.0), RGBColor(0x05, 0x30, 0x61));
        assert_eq!(cm.color_for(0.0), RGBColor(0xf7, 0xf7, 0xf7));
        assert_eq!(cm.color_for(2.0), RGBColor(0x67, 0x00, 0x1f));
    }

    #[test]
    fn out_of_range_values_clamp() {
        let cm = DivergingColorMap::new(-2.0, 2.0);
        assert_eq!(cm.color_for(-40.0), cm.color_for(-2.0));
        assert_eq!(cm.color_for(7.5), cm.color_for(2.0));
        assert_eq!(cm.color_for(f64::NAN), cm.color_for(0.0));
    }

    #[test]
    fn positive_values_are_red_leaning() {
        let cm = DivergingColorMap::new(-2.0, 2.0);
        let RGBColor(r, _, b) = cm.color_for(1.0);
        assert!(r > b);
        let RGBColor(r, _, b) = cm.color_for(-1.0);
        assert!(b > r);
    }
}
