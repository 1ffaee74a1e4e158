use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use std::path::Path;

use super::sweep::SweepPoint;
use crate::overlay::load_font;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const MARGIN: f32 = 60.0;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const F1_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const COVERAGE_COLOR: Rgb<u8> = Rgb([255, 127, 14]);
const GRID_DIVISIONS: u32 = 10;
const DASH_ON: f32 = 8.0;
const DASH_OFF: f32 = 6.0;

const TITLE: &str = "F1 vs confidence threshold";
const X_LABEL: &str = "Threshold";
const Y_LABEL: &str = "Score";
const F1_LEGEND: &str = "F1 (macro)";
const COVERAGE_LEGEND: &str = "Coverage";
const TITLE_SCALE: f32 = 24.0;
const LABEL_SCALE: f32 = 18.0;
const TICK_SCALE: f32 = 14.0;

/// Legend box inside the top-right corner of the plot area.
const LEGEND_WIDTH: u32 = 170;
const LEGEND_HEIGHT: u32 = 56;
const LEGEND_INSET: f32 = 10.0;
const SWATCH_LENGTH: f32 = 30.0;

/// Maps threshold/score space onto the plot area. Scores are fixed to [0, 1].
struct Plot {
    x_min: f64,
    x_max: f64,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl Plot {
    fn new(points: &[SweepPoint], width: u32, height: u32) -> Self {
        let x_min = points.first().map(|p| p.threshold).unwrap_or(0.0);
        let mut x_max = points.last().map(|p| p.threshold).unwrap_or(1.0);
        if x_max <= x_min {
            x_max = x_min + 1.0;
        }
        Self {
            x_min,
            x_max,
            left: MARGIN,
            right: width as f32 - MARGIN,
            top: MARGIN,
            bottom: height as f32 - MARGIN,
        }
    }

    fn project(&self, threshold: f64, score: f64) -> (f32, f32) {
        let tx = ((threshold - self.x_min) / (self.x_max - self.x_min)) as f32;
        let ty = score.clamp(0.0, 1.0) as f32;
        (
            self.left + tx * (self.right - self.left),
            self.bottom - ty * (self.bottom - self.top),
        )
    }
}

/// Draw the F1 (solid, circles) and coverage (dashed, crosses) curves over a grid,
/// with a legend.
///
/// NaN F1 values leave a gap in the F1 curve. The title, axis labels, tick values and
/// legend text need a font; without one only the legend swatches are drawn.
pub fn render_chart(points: &[SweepPoint], font: Option<&FontVec>) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot = Plot::new(points, WIDTH, HEIGHT);

    for i in 0..=GRID_DIVISIONS {
        let t = i as f32 / GRID_DIVISIONS as f32;
        let x = plot.left + t * (plot.right - plot.left);
        let y = plot.bottom - t * (plot.bottom - plot.top);
        draw_line_segment_mut(&mut canvas, (x, plot.top), (x, plot.bottom), GRID);
        draw_line_segment_mut(&mut canvas, (plot.left, y), (plot.right, y), GRID);
    }
    draw_line_segment_mut(
        &mut canvas,
        (plot.left, plot.bottom),
        (plot.right, plot.bottom),
        AXIS,
    );
    draw_line_segment_mut(&mut canvas, (plot.left, plot.top), (plot.left, plot.bottom), AXIS);

    let f1: Vec<Option<(f32, f32)>> = points
        .iter()
        .map(|p| (!p.f1.is_nan()).then(|| plot.project(p.threshold, p.f1)))
        .collect();
    let coverage: Vec<Option<(f32, f32)>> = points
        .iter()
        .map(|p| Some(plot.project(p.threshold, p.coverage)))
        .collect();

    for pair in f1.windows(2) {
        if let [Some(a), Some(b)] = pair {
            draw_line_segment_mut(&mut canvas, *a, *b, F1_COLOR);
        }
    }
    for (x, y) in f1.iter().flatten() {
        draw_filled_circle_mut(&mut canvas, (*x as i32, *y as i32), 4, F1_COLOR);
    }

    for pair in coverage.windows(2) {
        if let [Some(a), Some(b)] = pair {
            draw_dashed_segment(&mut canvas, *a, *b, COVERAGE_COLOR);
        }
    }
    for (x, y) in coverage.iter().flatten() {
        draw_marker_cross(&mut canvas, *x as i32, *y as i32, COVERAGE_COLOR);
    }

    draw_legend(&mut canvas, &plot, font);
    if let Some(font) = font {
        draw_labels(&mut canvas, &plot, font);
    }
    canvas
}

/// Render and write the chart as PNG. A font that cannot be loaded is an error.
pub fn save_chart(points: &[SweepPoint], path: &Path, font_path: Option<&Path>) -> Result<()> {
    let font = font_path.map(load_font).transpose()?;
    render_chart(points, font.as_ref())
        .save(path)
        .map_err(|e| anyhow!("failed to write chart {}: {}", path.display(), e))
}

/// Top-left corner of the legend box.
fn legend_origin(plot: &Plot) -> (f32, f32) {
    (
        plot.right - LEGEND_INSET - LEGEND_WIDTH as f32,
        plot.top + LEGEND_INSET,
    )
}

/// Vertical centre of legend row `row` and the swatch's horizontal span.
fn legend_row(plot: &Plot, row: u32) -> (f32, f32, f32) {
    let (x, y) = legend_origin(plot);
    let row_height = LEGEND_HEIGHT as f32 / 2.0;
    let cy = y + row_height * (row as f32 + 0.5);
    (x + 10.0, x + 10.0 + SWATCH_LENGTH, cy)
}

fn draw_legend(canvas: &mut RgbImage, plot: &Plot, font: Option<&FontVec>) {
    let (x, y) = legend_origin(plot);
    let frame = Rect::at(x as i32, y as i32).of_size(LEGEND_WIDTH, LEGEND_HEIGHT);
    draw_filled_rect_mut(canvas, frame, BACKGROUND);
    draw_hollow_rect_mut(canvas, frame, GRID);

    let (start, end, cy) = legend_row(plot, 0);
    draw_line_segment_mut(canvas, (start, cy), (end, cy), F1_COLOR);
    let mid = (start + end) / 2.0;
    draw_filled_circle_mut(canvas, (mid as i32, cy as i32), 4, F1_COLOR);
    let f1_row = cy;

    let (start, end, cy) = legend_row(plot, 1);
    draw_dashed_segment(canvas, (start, cy), (end, cy), COVERAGE_COLOR);
    draw_marker_cross(canvas, mid as i32, cy as i32, COVERAGE_COLOR);

    if let Some(font) = font {
        let scale = PxScale::from(TICK_SCALE);
        let text_x = (end + 10.0) as i32;
        for (label, row_y) in [(F1_LEGEND, f1_row), (COVERAGE_LEGEND, cy)] {
            let top = (row_y - TICK_SCALE / 2.0) as i32;
            draw_text_mut(canvas, AXIS, text_x, top, scale, font, label);
        }
    }
}

fn draw_labels(canvas: &mut RgbImage, plot: &Plot, font: &FontVec) {
    let title_scale = PxScale::from(TITLE_SCALE);
    let (title_width, _) = text_size(title_scale, font, TITLE);
    let centre = (plot.left + plot.right) / 2.0;
    let title_x = centre as i32 - title_width as i32 / 2;
    draw_text_mut(canvas, AXIS, title_x, 16, title_scale, font, TITLE);

    let label_scale = PxScale::from(LABEL_SCALE);
    let (label_width, _) = text_size(label_scale, font, X_LABEL);
    let label_y = canvas.height() as i32 - 26;
    draw_text_mut(
        canvas,
        AXIS,
        centre as i32 - label_width as i32 / 2,
        label_y,
        label_scale,
        font,
        X_LABEL,
    );
    draw_text_mut(
        canvas,
        AXIS,
        8,
        (plot.top - LABEL_SCALE - 6.0) as i32,
        label_scale,
        font,
        Y_LABEL,
    );

    let tick_scale = PxScale::from(TICK_SCALE);
    for i in (0..=GRID_DIVISIONS).step_by(2) {
        let t = i as f64 / GRID_DIVISIONS as f64;
        let threshold = plot.x_min + t * (plot.x_max - plot.x_min);
        let (x, _) = plot.project(threshold, 0.0);
        let text = format!("{:.2}", threshold);
        let (width, _) = text_size(tick_scale, font, &text);
        let tick_y = (plot.bottom + 6.0) as i32;
        draw_text_mut(canvas, AXIS, x as i32 - width as i32 / 2, tick_y, tick_scale, font, &text);

        let (_, y) = plot.project(plot.x_min, t);
        let text = format!("{:.1}", t);
        let (width, _) = text_size(tick_scale, font, &text);
        let tick_x = plot.left as i32 - 8 - width as i32;
        let top = (y - TICK_SCALE / 2.0) as i32;
        draw_text_mut(canvas, AXIS, tick_x, top, tick_scale, font, &text);
    }
}

fn draw_dashed_segment(canvas: &mut RgbImage, a: (f32, f32), b: (f32, f32), color: Rgb<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return;
    }
    let (ux, uy) = (dx / length, dy / length);
    let mut offset = 0.0;
    while offset < length {
        let end = (offset + DASH_ON).min(length);
        draw_line_segment_mut(
            canvas,
            (a.0 + ux * offset, a.1 + uy * offset),
            (a.0 + ux * end, a.1 + uy * end),
            color,
        );
        offset += DASH_ON + DASH_OFF;
    }
}

/// `draw_cross_mut` is a single-pixel plus; draw an x-shaped marker instead.
fn draw_marker_cross(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    let r = 5.0;
    let (xf, yf) = (x as f32, y as f32);
    draw_line_segment_mut(canvas, (xf - r, yf - r), (xf + r, yf + r), color);
    draw_line_segment_mut(canvas, (xf - r, yf + r), (xf + r, yf - r), color);
    draw_cross_mut(canvas, color, x, y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::sweep::linspace;

    fn points() -> Vec<SweepPoint> {
        linspace(0.4, 0.95, 12)
            .into_iter()
            .enumerate()
            .map(|(i, threshold)| SweepPoint {
                threshold,
                accepted: 12 - i,
                coverage: (12 - i) as f64 / 12.0,
                f1: if i == 11 { f64::NAN } else { 0.9 },
            })
            .collect()
    }

    #[test]
    fn projects_corners_of_plot_area() {
        let plot = Plot::new(&points(), WIDTH, HEIGHT);
        assert_eq!(plot.project(0.4, 0.0), (MARGIN, HEIGHT as f32 - MARGIN));
        assert_eq!(plot.project(0.95, 1.0), (WIDTH as f32 - MARGIN, MARGIN));
    }

    #[test]
    fn chart_marks_first_points() {
        let chart = render_chart(&points(), None);
        let plot = Plot::new(&points(), WIDTH, HEIGHT);
        let (x, y) = plot.project(0.4, 0.9);
        assert_eq!(chart.get_pixel(x as u32, y as u32), &F1_COLOR);
        let (x, y) = plot.project(0.4, 1.0);
        assert_eq!(chart.get_pixel(x as u32, y as u32), &COVERAGE_COLOR);
    }

    #[test]
    fn legend_swatches_drawn_without_font() {
        let chart = render_chart(&points(), None);
        let plot = Plot::new(&points(), WIDTH, HEIGHT);
        let (start, end, cy) = legend_row(&plot, 0);
        let mid = ((start + end) / 2.0) as u32;
        assert_eq!(chart.get_pixel(mid, cy as u32), &F1_COLOR);
        assert_eq!(chart.get_pixel(start as u32, cy as u32), &F1_COLOR);
        let (start, _, cy) = legend_row(&plot, 1);
        assert_eq!(chart.get_pixel(mid, cy as u32), &COVERAGE_COLOR);
        assert_eq!(chart.get_pixel(start as u32, cy as u32), &COVERAGE_COLOR);
        // Curves do not show through the legend box.
        let (x, y) = legend_origin(&plot);
        assert_eq!(chart.get_pixel(x as u32 + 5, y as u32 + 5), &BACKGROUND);
    }

    #[test]
    fn unreadable_font_fails_chart() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let font = dir.path().join("broken.ttf");
        std::fs::write(&font, b"not a font")?;
        let path = dir.path().join("curve.png");
        assert!(save_chart(&points(), &path, Some(&font)).is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn saves_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("curve.png");
        save_chart(&points(), &path, None)?;
        let decoded = image::open(&path)?;
        assert_eq!((decoded.width(), decoded.height()), (WIDTH, HEIGHT));
        Ok(())
    }
}
