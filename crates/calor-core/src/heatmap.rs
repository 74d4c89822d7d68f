//! Heatmap colouring and PPM frame output for snapshot replay.

use std::io::{self, Write};

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Colour scale used to map temperatures to pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Blue → cyan → green → yellow → red.
    #[default]
    Five,
    /// Blue → red.
    Two,
}

const FIVE_STOPS: [(f64, [u8; 3]); 5] = [
    (0.0, [0, 0, 255]),
    (0.25, [0, 255, 255]),
    (0.5, [0, 255, 0]),
    (0.75, [255, 255, 0]),
    (1.0, [255, 0, 0]),
];

impl Palette {
    /// Colour of `value` on a scale whose top is `max`.
    ///
    /// Values are clamped to `[0, max]`; a non-positive `max` is treated as 1.
    pub fn color(self, value: f64, max: f64) -> [u8; 3] {
        let scale = if max > 0.0 { max } else { 1.0 };
        let p = (value / scale).clamp(0.0, 1.0);
        match self {
            Palette::Two => [channel(255.0 * p), 0, channel(255.0 * (1.0 - p))],
            Palette::Five => {
                for pair in FIVE_STOPS.windows(2) {
                    let (lo, lo_rgb) = pair[0];
                    let (hi, hi_rgb) = pair[1];
                    if p < hi {
                        let t = (p - lo) / (hi - lo);
                        return [
                            lerp(lo_rgb[0], hi_rgb[0], t),
                            lerp(lo_rgb[1], hi_rgb[1], t),
                            lerp(lo_rgb[2], hi_rgb[2], t),
                        ];
                    }
                }
                FIVE_STOPS[4].1
            }
        }
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    channel(a as f64 + (b as f64 - a as f64) * t)
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Largest value in the grid, used as the top of the colour scale.
pub fn max_value(grid: ArrayView2<'_, f64>) -> f64 {
    grid.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Write `grid` as a binary PPM (P6) image, one pixel per cell.
pub fn write_ppm<W: Write>(grid: ArrayView2<'_, f64>, palette: Palette, out: &mut W) -> io::Result<()> {
    let (height, width) = grid.dim();
    let max = max_value(grid);
    writeln!(out, "P6 {} {} 255", width, height)?;

    let mut pixels = Vec::with_capacity(width * height * 3);
    for &value in grid.iter() {
        pixels.extend_from_slice(&palette.color(value, max));
    }
    out.write_all(&pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_five_stop_gradient() {
        let p = Palette::Five;
        assert_eq!(p.color(0.0, 10.0), [0, 0, 255]);
        assert_eq!(p.color(2.5, 10.0), [0, 255, 255]);
        assert_eq!(p.color(5.0, 10.0), [0, 255, 0]);
        assert_eq!(p.color(7.5, 10.0), [255, 255, 0]);
        assert_eq!(p.color(10.0, 10.0), [255, 0, 0]);
        // Halfway between blue and cyan.
        assert_eq!(p.color(1.25, 10.0), [0, 128, 255]);
    }

    #[test]
    fn test_two_color_gradient() {
        let p = Palette::Two;
        assert_eq!(p.color(0.0, 4.0), [0, 0, 255]);
        assert_eq!(p.color(4.0, 4.0), [255, 0, 0]);
        assert_eq!(p.color(2.0, 4.0), [128, 0, 128]);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        assert_eq!(Palette::Five.color(-3.0, 1.0), [0, 0, 255]);
        assert_eq!(Palette::Five.color(0.5, 0.0), [0, 255, 0]);
    }

    #[test]
    fn test_ppm_layout() {
        let grid = array![[0.0, 10.0], [10.0, 10.0], [0.0, 0.0]];
        let mut out = Vec::new();
        write_ppm(grid.view(), Palette::Five, &mut out).unwrap();

        let header = b"P6 2 3 255\n";
        assert!(out.starts_with(header));
        assert_eq!(out.len(), header.len() + 2 * 3 * 3);
        assert_eq!(&out[header.len()..header.len() + 6], &[0, 0, 255, 255, 0, 0]);
    }
}
