//! On-frame information panel.
//!
//! Three green lines on a translucent black panel in the top-left corner (item, weight,
//! price) plus a hollow box for every detection of the current frame. The text content
//! is built separately from the drawing so it can be checked without a font.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detect::Detection;
use crate::pricing::format_price;
use crate::stability::CommittedItem;

const PANEL_WIDTH: u32 = 450;
const PANEL_HEIGHT: u32 = 140;
const PANEL_ALPHA: f32 = 0.6;
const TEXT_X: i32 = 10;
/// Baselines of the item, weight and price lines.
const TEXT_BASELINES: [i32; 3] = [40, 80, 120];
const TEXT_SCALE: f32 = 30.0;
const LABEL_SCALE: f32 = 18.0;
const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([255, 64, 0]);

/// Text lines of the panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayText {
    pub item: String,
    pub weight: String,
    pub price: String,
}

impl OverlayText {
    pub fn compose(committed: &CommittedItem, weight_kg: f64, currency: &str) -> Self {
        let item = match &committed.label {
            Some(label) if committed.confidence > 0.0 => format!(
                "Item: {} ({:.0}%)",
                label,
                committed.confidence * 100.0
            ),
            Some(label) => format!("Item: {}", label),
            None => "Item: No item".to_string(),
        };
        Self {
            item,
            weight: format!("Weight: {:.5} kg", weight_kg),
            price: format!("Price: {}", format_price(currency, committed.price)),
        }
    }

    pub fn lines(&self) -> [&str; 3] {
        [&self.item, &self.weight, &self.price]
    }

    /// Single-line form for window titles and logs.
    pub fn status_line(&self) -> String {
        self.lines().join(" | ")
    }
}

/// Draws the panel and detection boxes onto frames.
pub struct OverlayRenderer {
    font: Option<FontVec>,
}

impl OverlayRenderer {
    /// Renderer without text; the panel and boxes are still drawn.
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Load a TTF/OTF font. A missing or unreadable font only costs the on-frame text.
    pub fn new(font_path: Option<&Path>) -> Self {
        let Some(path) = font_path else {
            log::warn!("overlay: no font configured; panel text is shown in the title/log only");
            return Self::without_font();
        };
        match load_font(path) {
            Ok(font) => Self { font: Some(font) },
            Err(err) => {
                log::warn!("overlay: {:#}; panel text is shown in the title/log only", err);
                Self::without_font()
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, canvas: &mut RgbImage, text: &OverlayText, detections: &[Detection]) {
        for detection in detections {
            self.draw_detection(canvas, detection);
        }
        darken_panel(canvas);
        if let Some(font) = &self.font {
            let scale = PxScale::from(TEXT_SCALE);
            for (line, baseline) in text.lines().into_iter().zip(TEXT_BASELINES) {
                let top = baseline - TEXT_SCALE as i32;
                draw_text_mut(canvas, TEXT_COLOR, TEXT_X, top, scale, font, line);
            }
        }
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let Some(rect) = clip_box(canvas, detection) else {
            return;
        };
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        if let Some(font) = &self.font {
            let caption = format!("{} {:.2}", detection.label, detection.confidence);
            let top = (rect.top() - LABEL_SCALE as i32).max(0);
            draw_text_mut(
                canvas,
                BOX_COLOR,
                rect.left(),
                top,
                PxScale::from(LABEL_SCALE),
                font,
                &caption,
            );
        }
    }
}

pub(crate) fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow!("failed to read font {}: {}", path.display(), e))?;
    FontVec::try_from_vec(bytes).map_err(|_| anyhow!("invalid font file {}", path.display()))
}

/// Blend the panel area towards black: `dst = dst * (1 - alpha)`.
fn darken_panel(canvas: &mut RgbImage) {
    let width = PANEL_WIDTH.min(canvas.width());
    let height = PANEL_HEIGHT.min(canvas.height());
    let keep = 1.0 - PANEL_ALPHA;
    for y in 0..height {
        for x in 0..width {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * keep).round() as u8;
            }
        }
    }
}

/// Clamp a detection box to the canvas. `None` when nothing of it is visible.
fn clip_box(canvas: &RgbImage, detection: &Detection) -> Option<Rect> {
    let bbox = &detection.bbox;
    let (cw, ch) = (canvas.width() as f32, canvas.height() as f32);
    let x0 = bbox.x.max(0.0);
    let y0 = bbox.y.max(0.0);
    let x1 = (bbox.x + bbox.w).min(cw);
    let y1 = (bbox.y + bbox.h).min(ch);
    if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
        return None;
    }
    Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn committed(label: &str, confidence: f32, price: f64) -> CommittedItem {
        CommittedItem {
            label: Some(label.to_string()),
            confidence,
            price,
        }
    }

    #[test]
    fn committed_item_text() {
        let text = OverlayText::compose(&committed("apple", 0.87, 1.798), 0.2, "R$");
        assert_eq!(text.item, "Item: apple (87%)");
        assert_eq!(text.weight, "Weight: 0.20000 kg");
        assert_eq!(text.price, "Price: R$ 1.80");
    }

    #[test]
    fn baseline_text_has_no_percentage() {
        let text = OverlayText::compose(&CommittedItem::baseline(), 0.152, "R$");
        assert_eq!(text.item, "Item: No item");
        assert_eq!(text.weight, "Weight: 0.15200 kg");
        assert_eq!(text.price, "Price: R$ 0.00");
    }

    #[test]
    fn zero_confidence_label_omits_percentage() {
        let text = OverlayText::compose(&committed("apple", 0.0, 0.0), 0.0, "EUR");
        assert_eq!(text.item, "Item: apple");
        assert_eq!(
            text.status_line(),
            "Item: apple | Weight: 0.00000 kg | Price: EUR 0.00"
        );
    }

    #[test]
    fn panel_darkens_top_left_only() {
        let mut canvas = RgbImage::from_pixel(500, 200, Rgb([100, 100, 100]));
        let text = OverlayText::compose(&CommittedItem::baseline(), 0.0, "R$");
        OverlayRenderer::without_font().render(&mut canvas, &text, &[]);
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([40, 40, 40]));
        assert_eq!(canvas.get_pixel(449, 139), &Rgb([40, 40, 40]));
        assert_eq!(canvas.get_pixel(450, 0), &Rgb([100, 100, 100]));
        assert_eq!(canvas.get_pixel(0, 140), &Rgb([100, 100, 100]));
    }

    #[test]
    fn panel_is_clipped_on_small_frames() {
        let mut canvas = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
        let text = OverlayText::compose(&CommittedItem::baseline(), 0.0, "R$");
        OverlayRenderer::without_font().render(&mut canvas, &text, &[]);
        assert_eq!(canvas.get_pixel(63, 47), &Rgb([102, 102, 102]));
    }

    #[test]
    fn detection_box_outline_is_drawn() {
        let mut canvas = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
        let detection = Detection::new(
            "apple",
            0.9,
            BoundingBox {
                x: 500.0,
                y: 300.0,
                w: 50.0,
                h: 40.0,
            },
        );
        let text = OverlayText::compose(&CommittedItem::baseline(), 0.0, "R$");
        OverlayRenderer::without_font().render(&mut canvas, &text, &[detection]);
        assert_eq!(canvas.get_pixel(500, 300), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(525, 320), &Rgb([0, 0, 0]));
    }

    #[test]
    fn off_canvas_boxes_are_skipped() {
        let canvas = RgbImage::new(10, 10);
        let detection = Detection::new(
            "apple",
            0.9,
            BoundingBox {
                x: 50.0,
                y: 50.0,
                w: 5.0,
                h: 5.0,
            },
        );
        assert!(clip_box(&canvas, &detection).is_none());
    }

    #[test]
    fn missing_font_falls_back_to_no_text() {
        let renderer = OverlayRenderer::new(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!renderer.has_font());
    }
}
