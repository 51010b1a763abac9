use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::Result;

const PLOT_WIDTH: u32 = 960;
const PLOT_HEIGHT: u32 = 720;
const MARGIN: u32 = 48;
const DOT_RADIUS: i32 = 3;

/// Renders a scatter plot of `points` to a PNG.
///
/// Points are colored along the viridis gradient by sample index, so time
/// order stays readable without axes. With `equal_aspect` both axes share
/// one scale (track plots); without it each axis is stretched to the canvas
/// (time-series plots).
pub fn scatter_png(path: &Path, points: &[(f64, f64)], equal_aspect: bool) -> Result<()> {
    let mut canvas = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, Rgb([255, 255, 255]));

    if !points.is_empty() {
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let inner_w = (PLOT_WIDTH - 2 * MARGIN) as f64;
        let inner_h = (PLOT_HEIGHT - 2 * MARGIN) as f64;
        let mut range_x = (max_x - min_x).max(1e-12);
        let mut range_y = (max_y - min_y).max(1e-12);

        if equal_aspect {
            // One scale for both axes, data centered on the canvas.
            let scale = (range_x / inner_w).max(range_y / inner_h);
            let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
            range_x = scale * inner_w;
            range_y = scale * inner_h;
            min_x = cx - range_x / 2.0;
            min_y = cy - range_y / 2.0;
        }

        for (i, &(x, y)) in points.iter().enumerate() {
            let px = MARGIN as f64 + (x - min_x) / range_x * inner_w;
            // Flip: image rows grow downward, plot y grows upward.
            let py = PLOT_HEIGHT as f64 - MARGIN as f64 - (y - min_y) / range_y * inner_h;
            let color = colorous::VIRIDIS.eval_rational(i, points.len().max(2));
            draw_dot(
                &mut canvas,
                px.round() as i32,
                py.round() as i32,
                Rgb([color.r, color.g, color.b]),
            );
        }
    }

    canvas.save(path)?;
    Ok(())
}

fn draw_dot(canvas: &mut RgbImage, cx: i32, cy: i32, color: Rgb<u8>) {
    for dy in -DOT_RADIUS..=DOT_RADIUS {
        for dx in -DOT_RADIUS..=DOT_RADIUS {
            if dx * dx + dy * dy > DOT_RADIUS * DOT_RADIUS {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
