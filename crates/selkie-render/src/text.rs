//! Text measurement abstraction.
//!
//! Rendering is headless, so there is no font engine to ask for glyph
//! metrics. Geometry instead comes from a [`TextMeasurer`]; the bundled
//! [`DeterministicTextMeasurer`] approximates a monospace-ish layout and is
//! stable across platforms, which keeps output reproducible and testable.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
    pub font_weight: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 16.0,
            font_weight: None,
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f64) -> Self {
        Self {
            font_size,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    /// Distance from the top of the line box to the baseline.
    pub ascent: f64,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;

    /// X offsets of every character boundary in `text`, starting at 0.0 and
    /// ending at the full width; `text.chars().count() + 1` entries. Used to
    /// place annotations at character positions inside a chunk.
    fn prefix_widths(&self, text: &str, style: &TextStyle) -> Vec<f64> {
        let mut out = Vec::with_capacity(text.chars().count() + 1);
        out.push(0.0);
        let mut prefix = String::new();
        for c in text.chars() {
            prefix.push(c);
            out.push(self.measure(&prefix, style).width);
        }
        out
    }
}

/// Platform-independent measurer: character cells scaled by font size. Wide
/// (CJK) characters take two cells.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl DeterministicTextMeasurer {
    fn factors(&self) -> (f64, f64) {
        let cw = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let lh = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };
        (cw, lh)
    }

    fn cells(text: &str) -> usize {
        text.chars().map(|c| c.width().unwrap_or(1).max(1)).sum()
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let (cw, lh) = self.factors();
        let font_size = style.font_size.max(1.0);
        let height = font_size * lh;
        TextMetrics {
            width: Self::cells(text) as f64 * font_size * cw,
            height,
            ascent: height * 0.8,
        }
    }

    fn prefix_widths(&self, text: &str, style: &TextStyle) -> Vec<f64> {
        let (cw, _) = self.factors();
        let font_size = style.font_size.max(1.0);
        let mut out = Vec::with_capacity(text.chars().count() + 1);
        let mut cells = 0usize;
        out.push(0.0);
        for c in text.chars() {
            cells += c.width().unwrap_or(1).max(1);
            out.push(cells as f64 * font_size * cw);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scales_with_character_count() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        let short = m.measure("ab", &style);
        let long = m.measure("abcd", &style);
        assert!((long.width - 2.0 * short.width).abs() < 1e-9);
    }

    #[test]
    fn prefix_widths_bracket_the_full_width() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        let text = "hello";
        let prefixes = m.prefix_widths(text, &style);
        assert_eq!(prefixes.len(), 6);
        assert_eq!(prefixes[0], 0.0);
        assert!((prefixes[5] - m.measure(text, &style).width).abs() < 1e-9);
        assert!(prefixes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn wide_characters_take_two_cells() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        assert!(m.measure("日本", &style).width > m.measure("ab", &style).width);
    }
}
