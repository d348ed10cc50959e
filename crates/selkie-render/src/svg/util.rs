// Shared SVG string helpers.

/// Stringify a coordinate for an SVG attribute: round-trippable decimal form,
/// with `-0` and tiny float noise from our own arithmetic snapped away.
pub(crate) fn fmt(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }

    let mut v = if v.abs() < 1e-9 { 0.0 } else { v };
    let nearest = v.round();
    if (v - nearest).abs() < 1e-6 {
        v = nearest;
    }
    let s = v.to_string();
    if s == "-0" { "0".to_string() } else { s }
}

/// Path data keeps 3 fractional digits, ties rounded half-up.
pub(crate) fn fmt_path(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    if v.abs() < 0.0005 {
        return "0".to_string();
    }

    let scaled = v * 1000.0;
    let mut r = (scaled + 0.5).floor() / 1000.0;
    if r.abs() < 0.0005 {
        r = 0.0;
    }

    let mut s = format!("{r:.3}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" { "0".to_string() } else { s }
}

/// Pixel-snap a coordinate so 1px strokes land on pixel centers.
pub(crate) fn round_coord(v: f64) -> f64 {
    v.floor() + 0.5
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_snaps_near_integers_and_negative_zero() {
        assert_eq!(fmt(3.0000001), "3");
        assert_eq!(fmt(-0.0), "0");
        assert_eq!(fmt(2.5), "2.5");
    }

    #[test]
    fn fmt_path_keeps_three_digits() {
        assert_eq!(fmt_path(1.23456), "1.235");
        assert_eq!(fmt_path(2.0), "2");
        assert_eq!(fmt_path(0.0001), "0");
    }

    #[test]
    fn escape_xml_handles_markup_characters() {
        assert_eq!(escape_xml(r#"a<b&"c'"#), "a&lt;b&amp;&quot;c&#39;");
    }

    #[test]
    fn round_coord_lands_on_half_pixels() {
        assert_eq!(round_coord(3.7), 3.5);
        assert_eq!(round_coord(3.2), 3.5);
    }
}
