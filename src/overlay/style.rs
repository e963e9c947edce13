//! Overlay styling
//!
//! Box colors are keyed by attribute category with a fixed table; label
//! chips and the score bar share one style. Text rendering needs a font —
//! without one, chips are drawn as colored bars and the geometry still
//! holds, so headless tests don't need font assets.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::Rgba;

/// Colors and metrics for the overlay
#[derive(Clone)]
pub struct OverlayStyle {
    /// Attribute category to box color
    pub category_colors: Vec<(&'static str, Rgba<u8>)>,
    /// Box color when no category applies
    pub default_color: Rgba<u8>,
    /// Box outline thickness in CSS pixels
    pub box_thickness: f32,
    /// Chip background
    pub chip_fill: Rgba<u8>,
    /// Chip text color
    pub chip_text: Rgba<u8>,
    /// Chip height in CSS pixels
    pub chip_height: f32,
    /// Horizontal padding inside a chip
    pub chip_padding: f32,
    /// Gap between a box edge and its chip
    pub chip_gap: f32,
    /// Score bar height in CSS pixels
    pub score_bar_height: f32,
    /// Score bar track (unfilled) color
    pub score_track: Rgba<u8>,
    /// Font for chip text; chips render without text when absent
    pub font: Option<FontArc>,
    /// Text size in CSS pixels
    pub font_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            category_colors: vec![
                ("happy", Rgba([76, 175, 80, 255])),
                ("neutral", Rgba([158, 158, 158, 255])),
                ("sad", Rgba([33, 150, 243, 255])),
                ("angry", Rgba([244, 67, 54, 255])),
                ("surprised", Rgba([255, 152, 0, 255])),
                ("fearful", Rgba([156, 39, 176, 255])),
                ("disgusted", Rgba([121, 134, 63, 255])),
            ],
            default_color: Rgba([0, 230, 118, 255]),
            box_thickness: 2.0,
            chip_fill: Rgba([0, 0, 0, 180]),
            chip_text: Rgba([255, 255, 255, 255]),
            chip_height: 18.0,
            chip_padding: 6.0,
            chip_gap: 4.0,
            score_bar_height: 5.0,
            score_track: Rgba([255, 255, 255, 90]),
            font: None,
            font_size: 13.0,
        }
    }
}

impl OverlayStyle {
    /// Create the default style
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a font for chip text
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Box color for an attribute category
    pub fn color_for(&self, category: Option<&str>) -> Rgba<u8> {
        match category {
            Some(category) => self
                .category_colors
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(category))
                .map(|(_, color)| *color)
                .unwrap_or(self.default_color),
            None => self.default_color,
        }
    }

    /// Width of a text run at the chip font size
    ///
    /// Measured from the font when one is loaded, estimated otherwise so
    /// chip geometry stays stable either way.
    pub fn text_width(&self, text: &str) -> f32 {
        match &self.font {
            Some(font) => {
                let scaled = font.as_scaled(PxScale::from(self.font_size));
                text.chars()
                    .map(|c| scaled.h_advance(font.glyph_id(c)))
                    .sum()
            }
            None => text.chars().count() as f32 * self.font_size * 0.6,
        }
    }
}

impl std::fmt::Debug for OverlayStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStyle")
            .field("default_color", &self.default_color)
            .field("chip_height", &self.chip_height)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}
