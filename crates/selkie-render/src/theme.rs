//! Visual parameters.
//!
//! A [`Visual`] carries the handful of knobs that differ between density
//! presets; everything else is a fixed constant of the drawing style.

use serde::{Deserialize, Serialize};

/// Slant width of arc end segments.
pub const ARC_SLANT: f64 = 15.0;
/// Arcs squeezed for space never slant less than this.
pub const MIN_ARC_SLANT: f64 = 8.0;
/// Horizontal clearance between an arc label and the arc bends.
pub const ARC_HORIZONTAL_SPACING: f64 = 10.0;
/// Vertical gap between rows; negative because row boxes already over-reserve.
pub const ROW_SPACING: f64 = -5.0;
/// Width of the sentence-number gutter.
pub const SENT_NUM_MARGIN: f64 = 20.0;
pub const BOX_TEXT_MARGIN_X: f64 = 0.0;
pub const BOX_TEXT_MARGIN_Y: f64 = 1.5;
pub const HIGHLIGHT_ROUNDING_X: f64 = 3.0;
pub const HIGHLIGHT_ROUNDING_Y: f64 = 3.0;
/// Shadow box inflation for commented spans.
pub const RECT_SHADOW_SIZE: f64 = 3.0;
pub const RECT_SHADOW_ROUNDING: f64 = 2.5;
pub const ARC_LABEL_SHADOW_SIZE: f64 = 1.0;
pub const ARC_LABEL_SHADOW_ROUNDING: f64 = 5.0;
/// Halo inflation for marked (highlighted) spans and arc labels.
pub const MARKED_SPAN_SIZE: f64 = 6.0;
pub const MARKED_ARC_STROKE: f64 = 7.0;
pub const ROW_PADDING: f64 = 2.0;
/// Highlight box inset per nesting level.
pub const NESTING_ADJUST_Y: f64 = 2.0;
pub const NESTING_ADJUST_X: f64 = 1.0;
/// Curvature control for smooth arc corners.
pub const SMOOTH_ARC_STEEPNESS: f64 = 0.5;
pub const SMOOTH_ARC_CURVES: bool = true;

/// Rendered widths of whitespace characters, in pixels at the base font.
pub fn space_width(c: char) -> f64 {
    match c {
        ' ' => 4.0,
        '\u{00a0}' => 4.0,
        '\u{200b}' => 0.0,
        '\u{3000}' => 8.0,
        '\n' => 4.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Compact,
    #[default]
    Standard,
    Spacious,
}

/// Density-dependent spacing knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Visual {
    pub margin_x: f64,
    pub margin_y: f64,
    pub box_spacing: f64,
    pub curly_height: f64,
    pub arc_spacing: f64,
    pub arc_start_height: f64,
    /// Arc corners bend through quadratic curves; straight slants when off.
    #[serde(default = "smooth_arcs_default")]
    pub smooth_arcs: bool,
}

fn smooth_arcs_default() -> bool {
    SMOOTH_ARC_CURVES
}

impl Visual {
    pub fn standard() -> Self {
        Self {
            margin_x: 2.0,
            margin_y: 1.0,
            box_spacing: 1.0,
            curly_height: 4.0,
            arc_spacing: 9.0,
            arc_start_height: 19.0,
            smooth_arcs: SMOOTH_ARC_CURVES,
        }
    }

    pub fn compact() -> Self {
        Self {
            margin_x: 1.0,
            margin_y: 0.0,
            box_spacing: 1.0,
            curly_height: 1.0,
            arc_spacing: 7.0,
            arc_start_height: 18.0,
            smooth_arcs: SMOOTH_ARC_CURVES,
        }
    }

    pub fn spacious() -> Self {
        Self {
            margin_x: 2.0,
            margin_y: 1.0,
            box_spacing: 3.0,
            curly_height: 6.0,
            arc_spacing: 12.0,
            arc_start_height: 23.0,
            smooth_arcs: SMOOTH_ARC_CURVES,
        }
    }

    pub fn for_density(density: Density) -> Self {
        match density {
            Density::Compact => Self::compact(),
            Density::Standard => Self::standard(),
            Density::Spacious => Self::spacious(),
        }
    }
}

impl Default for Visual {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_grow_with_density() {
        let c = Visual::compact();
        let s = Visual::standard();
        let sp = Visual::spacious();
        assert!(c.arc_spacing < s.arc_spacing);
        assert!(s.arc_spacing < sp.arc_spacing);
        assert!(c.arc_start_height < sp.arc_start_height);
    }

    #[test]
    fn zero_width_space_is_invisible() {
        assert_eq!(space_width('\u{200b}'), 0.0);
        assert_eq!(space_width(' '), 4.0);
    }
}
