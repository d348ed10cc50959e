//! SVG emission.
//!
//! Walks a [`LayoutDocument`] and writes a standalone SVG string. Every
//! interactive element carries `data-*` attributes (span ids, chunk ids, arc
//! endpoints) and the renderer returns an [`InteractionIndex`] of hit boxes,
//! so a host can wire hover and click behavior without parsing the SVG.
//! Highlight pulses are emitted as declarative `<animate>` elements with
//! `begin="indefinite"`; the host decides when to trigger them.

pub(crate) mod util;

use std::fmt::Write as _;

use selkie_core::color::{adjust_lightness, parse_color, resolve_border_color, Rgb};
use selkie_core::document::{ArcKind, DocumentData, FragmentRef, MarkKind, Span};

use crate::layout::{ArcEnd, LayoutDocument, LayoutInput, Rect};
use crate::theme::{
    ARC_LABEL_SHADOW_ROUNDING, ARC_LABEL_SHADOW_SIZE, ARC_SLANT, HIGHLIGHT_ROUNDING_X,
    HIGHLIGHT_ROUNDING_Y, MARKED_ARC_STROKE, MARKED_SPAN_SIZE, MIN_ARC_SLANT,
    RECT_SHADOW_ROUNDING, RECT_SHADOW_SIZE, SENT_NUM_MARGIN, SMOOTH_ARC_STEEPNESS,
};

use util::{escape_xml, fmt, fmt_path, round_coord};

const DEFAULT_BG: &str = "#ffff99";
const DEFAULT_FG: &str = "#000000";
const DEFAULT_ARC_COLOR: &str = "#000000";
const BORDER_DARKEN: f64 = 0.345;
const HIGHLIGHT_LIGHTEN: f64 = 0.8;
const GLYPH_COLOR: &str = "#444444";
const ROW_STRIPE: [&str; 2] = ["#ffffff", "#f4f4f8"];
const SENTENCE_HIGHLIGHT: &str = "#fff6c8";
const MARKED_TEXT_FILL: &str = "#ffff00";
const MATCH_FILL: &str = "#ffff00";
const PULSE_VALUES: &str = "#FF9632;#FFCC00;#FF9632";
const EQUIV_DASH: &str = "3,3";

/// Hit box for one span fragment.
#[derive(Debug, Clone)]
pub struct SpanHit {
    pub span_id: String,
    pub fref: FragmentRef,
    pub rect: Rect,
}

/// Hit box for one arc label.
#[derive(Debug, Clone)]
pub struct ArcHit {
    pub origin: String,
    pub ty: String,
    pub target: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default)]
pub struct InteractionIndex {
    pub spans: Vec<SpanHit>,
    pub arcs: Vec<ArcHit>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    pub svg: String,
    pub width: f64,
    pub height: f64,
    pub interaction: InteractionIndex,
}

struct SpanColors {
    bg: String,
    fg: String,
    border: String,
    highlight: String,
}

fn span_colors(input: &LayoutInput<'_>, span: &Span) -> SpanColors {
    let style = input.registry.span_style(&span.ty);
    let bg = style
        .and_then(|s| s.bg_color.clone())
        .unwrap_or_else(|| DEFAULT_BG.to_string());
    let fg = style
        .and_then(|s| s.fg_color.clone())
        .unwrap_or_else(|| DEFAULT_FG.to_string());
    let bg_rgb = parse_color(&bg).unwrap_or(Rgb::new(255, 255, 153));
    let border = match style.and_then(|s| s.border_color.as_deref()) {
        Some(spec) => resolve_border_color(spec, bg_rgb, BORDER_DARKEN)
            .map(Rgb::to_hex)
            .unwrap_or_else(|| spec.to_string()),
        None => adjust_lightness(bg_rgb, -BORDER_DARKEN).to_hex(),
    };
    let highlight = adjust_lightness(bg_rgb, HIGHLIGHT_LIGHTEN).to_hex();
    SpanColors {
        bg,
        fg,
        border,
        highlight,
    }
}

fn arc_style(input: &LayoutInput<'_>, origin_ty: &str, arc_ty: &str, kind: ArcKind) -> (String, Option<String>) {
    let mut color = None;
    let mut dash = None;
    if let Some(style) = input.registry.span_style(origin_ty) {
        if let Some(def) = style.arcs.get(arc_ty) {
            color = def.color.clone();
            dash = def.dash_array.clone();
        }
    }
    if color.is_none() || dash.is_none() {
        if let Some(def) = input.registry.relation_type(arc_ty) {
            if color.is_none() {
                color = def.color.clone();
            }
            if dash.is_none() {
                dash = def.dash_array.clone();
            }
        }
    }
    if dash.is_none() && kind == ArcKind::Equiv {
        dash = Some(EQUIV_DASH.to_string());
    }
    (
        color.unwrap_or_else(|| DEFAULT_ARC_COLOR.to_string()),
        dash,
    )
}

fn shadow_color(class: &str) -> &'static str {
    if class.contains("AnnotatorNotes") {
        "#00cc00"
    } else if class.contains("Error") || class.contains("Warning") {
        "#ff4141"
    } else if class.contains("Incomplete") {
        "#ffcc00"
    } else if class.contains("Unconfirmed") {
        "#bbbbbb"
    } else {
        "#cccccc"
    }
}

/// Pulsing highlight for edit/focus marks; matches stay a steady yellow.
fn marked_fill(kind: MarkKind) -> (&'static str, bool) {
    match kind {
        MarkKind::Match => (MATCH_FILL, false),
        _ => ("#FF9632", true),
    }
}

fn push_animate(out: &mut String) {
    let _ = write!(
        out,
        r#"<animate attributeName="fill" values="{PULSE_VALUES}" dur="2s" begin="indefinite" repeatCount="indefinite"/>"#
    );
}

fn push_rect(out: &mut String, r: &Rect, rx: f64, ry: f64, attrs: &str) {
    let _ = write!(
        out,
        r#"<rect x="{}" y="{}" width="{}" height="{}""#,
        fmt(r.x),
        fmt(r.y),
        fmt(r.w.max(0.0)),
        fmt(r.h.max(0.0)),
    );
    if rx > 0.0 || ry > 0.0 {
        let _ = write!(out, r#" rx="{}" ry="{}""#, fmt(rx), fmt(ry));
    }
    if !attrs.is_empty() {
        out.push(' ');
        out.push_str(attrs);
    }
    out.push_str("/>");
}

pub fn render(input: &LayoutInput<'_>, doc: &LayoutDocument) -> RenderedDocument {
    let data = input.data;
    let mut out = String::with_capacity(16 * 1024);
    let mut interaction = InteractionIndex::default();

    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = fmt(doc.width),
        h = fmt(doc.height),
    );
    out.push_str(concat!(
        r#"<defs><filter id="blur" x="-20%" y="-20%" width="140%" height="140%">"#,
        r#"<feGaussianBlur in="SourceGraphic" stdDeviation="2"/>"#,
        r#"</filter></defs>"#,
    ));

    render_background(&mut out, data, doc);
    render_marked_text(&mut out, doc);
    render_highlights(&mut out, input, doc);
    render_text(&mut out, input, data, doc);
    render_sentence_numbers(&mut out, input, doc);
    render_spans(&mut out, input, doc, &mut interaction);
    render_connectors(&mut out, input, doc);
    render_arcs(&mut out, input, doc, &mut interaction);

    out.push_str("</svg>");
    RenderedDocument {
        width: doc.width,
        height: doc.height,
        svg: out,
        interaction,
    }
}

fn render_background(out: &mut String, data: &DocumentData, doc: &LayoutDocument) {
    out.push_str(r#"<g class="background">"#);
    for row in &doc.rows {
        let marked = row
            .sentence
            .is_some_and(|n| data.marked_sentences.contains(&n));
        let fill = if marked {
            SENTENCE_HIGHLIGHT
        } else {
            ROW_STRIPE[row.index % 2]
        };
        let _ = write!(
            out,
            r#"<rect x="0" y="{}" width="{}" height="{}" fill="{}" data-row="{}"/>"#,
            fmt(row.top),
            fmt(doc.width),
            fmt(row.height),
            fill,
            row.index,
        );
    }
    out.push_str("</g>");
}

fn render_marked_text(out: &mut String, doc: &LayoutDocument) {
    if doc.marked_text.is_empty() {
        return;
    }
    out.push_str(r#"<g class="markedtext">"#);
    for m in &doc.marked_text {
        let _ = write!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="3" ry="3" fill="{}" class="marked_{}"/>"#,
            fmt(m.rect.x),
            fmt(m.rect.y),
            fmt(m.rect.w.max(0.0)),
            fmt(m.rect.h),
            MARKED_TEXT_FILL,
            m.kind.as_str(),
        );
    }
    out.push_str("</g>");
}

fn render_highlights(out: &mut String, input: &LayoutInput<'_>, doc: &LayoutDocument) {
    let data = input.data;
    out.push_str(r#"<g class="highlights">"#);
    for chunk in &doc.chunks {
        // deeper boxes draw later so they stay visible on top
        let mut order: Vec<usize> = chunk.fragments.clone();
        order.sort_by(|&a, &b| {
            doc.fragments[b]
                .nesting
                .height
                .cmp(&doc.fragments[a].nesting.height)
        });
        for idx in order {
            let fb = &doc.fragments[idx];
            let span = &data.spans[fb.span_id.as_str()];
            let colors = span_colors(input, span);
            push_rect(
                out,
                &fb.highlight,
                HIGHLIGHT_ROUNDING_X,
                HIGHLIGHT_ROUNDING_Y,
                &format!(r#"fill="{}""#, colors.highlight),
            );
        }
    }
    out.push_str("</g>");
}

fn render_text(out: &mut String, input: &LayoutInput<'_>, data: &DocumentData, doc: &LayoutDocument) {
    let font_size = input.fonts.text.font_size;
    let family = input
        .fonts
        .text
        .font_family
        .as_deref()
        .map(|f| format!(r#" font-family="{}""#, escape_xml(f)))
        .unwrap_or_default();
    for row in &doc.rows {
        if row.chunks.is_empty() {
            continue;
        }
        let _ = write!(
            out,
            r#"<text class="text" y="{}" font-size="{}"{}>"#,
            fmt(row.text_y),
            fmt(font_size),
            family,
        );
        for &c in &row.chunks {
            let chunk = &data.chunks[c];
            // trailing whitespace belongs to this tspan when the next chunk
            // stays on the same row
            let trailing = data
                .chunks
                .get(c + 1)
                .filter(|next| doc.chunks[next.index].row == row.index)
                .map(|next| next.space.as_str())
                .unwrap_or("");
            let _ = write!(
                out,
                r#"<tspan x="{}" data-chunk-id="{}">{}{}</tspan>"#,
                fmt(doc.chunks[c].text_x),
                chunk.index,
                escape_xml(&chunk.text),
                escape_xml(trailing),
            );
        }
        out.push_str("</text>");
    }
}

fn render_sentence_numbers(out: &mut String, input: &LayoutInput<'_>, doc: &LayoutDocument) {
    let data = input.data;
    out.push_str(r#"<g class="sentnum">"#);
    for row in &doc.rows {
        if let Some(n) = row.sentence {
            // a comment on the sentence shows as a shadow behind the number
            if let Some(comment) = data.sent_comments.get(&n) {
                let h = doc.label_height + 2.0 * ARC_LABEL_SHADOW_SIZE;
                let shadow = Rect {
                    x: 1.0,
                    y: row.text_y - doc.label_height,
                    w: SENT_NUM_MARGIN - 2.0,
                    h,
                };
                push_rect(
                    out,
                    &shadow,
                    ARC_LABEL_SHADOW_ROUNDING,
                    ARC_LABEL_SHADOW_ROUNDING,
                    &format!(
                        r#"fill="{}" filter="url(#blur)" class="shadow_{}""#,
                        shadow_color(&comment.ty),
                        escape_xml(&comment.ty)
                    ),
                );
            }
            let _ = write!(
                out,
                r##"<text text-anchor="end" x="{}" y="{}" font-size="{}" fill="#999999" data-sent="{n}">{n}</text>"##,
                fmt(SENT_NUM_MARGIN - 2.0),
                fmt(row.text_y),
                fmt(input.fonts.label.font_size),
            );
        }
    }
    out.push_str("</g>");
}

fn render_spans(
    out: &mut String,
    input: &LayoutInput<'_>,
    doc: &LayoutDocument,
    interaction: &mut InteractionIndex,
) {
    let data = input.data;
    out.push_str(r#"<g class="spans">"#);
    for fb in &doc.fragments {
        let span = &data.spans[fb.span_id.as_str()];
        let fragment = data.fragment(fb.fref);
        let colors = span_colors(input, span);

        if let Some(class) = &span.shadow_class {
            let shadow = Rect {
                x: fb.rect.x - RECT_SHADOW_SIZE,
                y: fb.rect.y - RECT_SHADOW_SIZE,
                w: fb.rect.w + 2.0 * RECT_SHADOW_SIZE,
                h: fb.rect.h + 2.0 * RECT_SHADOW_SIZE,
            };
            push_rect(
                out,
                &shadow,
                RECT_SHADOW_ROUNDING,
                RECT_SHADOW_ROUNDING,
                &format!(
                    r#"fill="{}" filter="url(#blur)" class="shadow_{}""#,
                    shadow_color(class),
                    escape_xml(class)
                ),
            );
        }

        if let Some(kind) = span.marked {
            let halo = Rect {
                x: fb.rect.x - MARKED_SPAN_SIZE,
                y: fb.rect.y - MARKED_SPAN_SIZE,
                w: fb.rect.w + 2.0 * MARKED_SPAN_SIZE,
                h: fb.rect.h + 2.0 * MARKED_SPAN_SIZE,
            };
            let (fill, pulse) = marked_fill(kind);
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="4" ry="4" fill="{}" class="marked_{}">"#,
                fmt(halo.x),
                fmt(halo.y),
                fmt(halo.w),
                fmt(halo.h),
                fill,
                kind.as_str(),
            );
            if pulse {
                push_animate(out);
            }
            out.push_str("</rect>");
        }

        let dash = span
            .attribute_merge
            .dash_array
            .as_deref()
            .map(|d| format!(r#" stroke-dasharray="{}""#, escape_xml(d)))
            .unwrap_or_default();
        let _ = write!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="2" ry="2" fill="{}" stroke="{}"{} data-span-id="{}" data-fragment="{}"/>"#,
            fmt(fb.rect.x),
            fmt(fb.rect.y),
            fmt(fb.rect.w),
            fmt(fb.rect.h),
            colors.bg,
            colors.border,
            dash,
            escape_xml(&span.id),
            fb.fref.fragment,
        );

        if span.attribute_merge.box_style.as_deref() == Some("crossed") {
            let _ = write!(
                out,
                r#"<path d="M{} {}L{} {}" stroke="{}"/><path d="M{} {}L{} {}" stroke="{}"/>"#,
                fmt_path(fb.rect.x),
                fmt_path(fb.rect.y),
                fmt_path(fb.rect.right()),
                fmt_path(fb.rect.y + fb.rect.h),
                colors.border,
                fmt_path(fb.rect.right()),
                fmt_path(fb.rect.y),
                fmt_path(fb.rect.x),
                fmt_path(fb.rect.y + fb.rect.h),
                colors.border,
            );
        }

        // label with attribute glyphs
        let _ = write!(
            out,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="{}">"#,
            fmt(fb.label_x),
            fmt(fb.label_baseline),
            fmt(input.fonts.label.font_size),
            colors.fg,
        );
        for piece in &fragment.label_pieces {
            if piece.glyph {
                let glyph_fill = if piece.warning {
                    "#ff0000"
                } else {
                    span.attribute_merge
                        .glyph_color
                        .as_deref()
                        .unwrap_or(GLYPH_COLOR)
                };
                let _ = write!(
                    out,
                    r#"<tspan class="glyph" fill="{}">{}</tspan>"#,
                    glyph_fill,
                    escape_xml(&piece.text),
                );
            } else {
                out.push_str(&escape_xml(&piece.text));
            }
        }
        out.push_str("</text>");

        if fb.draw_curly {
            let row = &doc.rows[fb.row];
            let yb = row.text_top - input.visual.margin_y;
            let yt = yb - input.visual.curly_height;
            let mid = (fb.curly_from + fb.curly_to) / 2.0;
            let _ = write!(
                out,
                r#"<path class="curly" d="M{} {}Q{} {} {} {}Q{} {} {} {}" fill="none" stroke="{}"/>"#,
                fmt_path(fb.curly_from),
                fmt_path(yb),
                fmt_path(fb.curly_from),
                fmt_path(yt),
                fmt_path(mid),
                fmt_path(yt),
                fmt_path(fb.curly_to),
                fmt_path(yt),
                fmt_path(fb.curly_to),
                fmt_path(yb),
                colors.border,
            );
        }

        interaction.spans.push(SpanHit {
            span_id: span.id.clone(),
            fref: fb.fref,
            rect: fb.rect,
        });
    }
    out.push_str("</g>");
}

/// Dashed links between the fragment boxes of discontiguous spans.
fn render_connectors(out: &mut String, input: &LayoutInput<'_>, doc: &LayoutDocument) {
    let data = input.data;
    let mut open = false;
    for (span_idx, (_, span)) in data.spans.iter().enumerate() {
        if span.fragments.len() < 2 {
            continue;
        }
        let colors = span_colors(input, span);
        for pair in 0..span.fragments.len() - 1 {
            let left = doc.fragment_box(FragmentRef {
                span: span_idx,
                fragment: pair,
            });
            let right = doc.fragment_box(FragmentRef {
                span: span_idx,
                fragment: pair + 1,
            });
            let (Some(l), Some(r)) = (left, right) else {
                continue;
            };
            if !open {
                out.push_str(r#"<g class="connectors">"#);
                open = true;
            }
            if l.row == r.row {
                let y = l.rect.y + l.rect.h / 2.0;
                let _ = write!(
                    out,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-dasharray="1,3"/>"#,
                    fmt(l.rect.right()),
                    fmt(round_coord(y)),
                    fmt(r.rect.x),
                    fmt(round_coord(y)),
                    colors.border,
                );
            } else {
                let ly = l.rect.y + l.rect.h / 2.0;
                let ry = r.rect.y + r.rect.h / 2.0;
                let _ = write!(
                    out,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-dasharray="1,3"/>"#,
                    fmt(l.rect.right()),
                    fmt(round_coord(ly)),
                    fmt(doc.rows[l.row].right),
                    fmt(round_coord(ly)),
                    colors.border,
                );
                let _ = write!(
                    out,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-dasharray="1,3"/>"#,
                    fmt(doc.rows[r.row].left),
                    fmt(round_coord(ry)),
                    fmt(r.rect.x),
                    fmt(round_coord(ry)),
                    colors.border,
                );
            }
        }
    }
    if open {
        out.push_str("</g>");
    }
}

fn render_arcs(
    out: &mut String,
    input: &LayoutInput<'_>,
    doc: &LayoutDocument,
    interaction: &mut InteractionIndex,
) {
    let data = input.data;
    out.push_str(r#"<g class="arcs">"#);
    for path in &doc.arcs {
        let arc = &data.arcs[path.arc];
        let origin_ty = data
            .spans
            .get(&arc.origin)
            .map(|s| s.ty.as_str())
            .unwrap_or("");
        let (color, dash) = arc_style(input, origin_ty, &arc.ty, arc.kind);
        let shadow_class = data
            .event_descs
            .get(&arc.event_desc)
            .and_then(|d| d.shadow_class.as_deref());

        let head_top = |span_id: &str| -> Option<f64> {
            let span_idx = data.span_index(span_id)?;
            let span = data.span_at(span_idx);
            let fref = FragmentRef {
                span: span_idx,
                fragment: span.head_fragment_index(),
            };
            doc.fragment_box(fref).map(|fb| fb.rect.y)
        };
        let (left_id, right_id) = if path.left_to_right {
            (&arc.origin, &arc.target)
        } else {
            (&arc.target, &arc.origin)
        };
        let left_top = head_top(left_id);
        let right_top = head_top(right_id);

        let mut arrow: Option<(f64, f64)> = None;
        let mut hit_recorded = false;
        for (i, seg) in path.segments.iter().enumerate() {
            let mut d = String::new();
            let width = seg.to_x - seg.from_x;
            let slant = (width / 4.0).clamp(MIN_ARC_SLANT, ARC_SLANT);
            match seg.left_end {
                ArcEnd::Anchor => {
                    let y0 = left_top.unwrap_or(seg.y) - 1.0;
                    if path.ufo_catcher {
                        let y1 = right_top.unwrap_or(seg.y) - 1.0;
                        // tight same-chunk arc: one cubic over the gap
                        let _ = write!(
                            d,
                            "M{} {}C{} {} {} {} {} {}",
                            fmt_path(seg.from_x),
                            fmt_path(y0),
                            fmt_path(seg.from_x),
                            fmt_path(seg.y),
                            fmt_path(seg.to_x),
                            fmt_path(seg.y),
                            fmt_path(seg.to_x),
                            fmt_path(y1),
                        );
                    } else if input.visual.smooth_arcs {
                        let control_x = seg.from_x + slant * (1.0 - SMOOTH_ARC_STEEPNESS);
                        let _ = write!(
                            d,
                            "M{} {}Q{} {} {} {}",
                            fmt_path(seg.from_x),
                            fmt_path(y0),
                            fmt_path(control_x),
                            fmt_path(seg.y),
                            fmt_path(seg.from_x + slant),
                            fmt_path(seg.y),
                        );
                    } else {
                        let _ = write!(
                            d,
                            "M{} {}L{} {}",
                            fmt_path(seg.from_x),
                            fmt_path(y0),
                            fmt_path(seg.from_x + slant),
                            fmt_path(seg.y),
                        );
                    }
                }
                ArcEnd::Continues => {
                    let _ = write!(d, "M{} {}", fmt_path(seg.from_x), fmt_path(seg.y));
                }
            }
            if !path.ufo_catcher {
                match seg.right_end {
                    ArcEnd::Anchor => {
                        let y1 = right_top.unwrap_or(seg.y) - 1.0;
                        if input.visual.smooth_arcs {
                            let control_x = seg.to_x - slant * (1.0 - SMOOTH_ARC_STEEPNESS);
                            let _ = write!(
                                d,
                                "L{} {}Q{} {} {} {}",
                                fmt_path(seg.to_x - slant),
                                fmt_path(seg.y),
                                fmt_path(control_x),
                                fmt_path(seg.y),
                                fmt_path(seg.to_x),
                                fmt_path(y1),
                            );
                        } else {
                            let _ = write!(
                                d,
                                "L{} {}L{} {}",
                                fmt_path(seg.to_x - slant),
                                fmt_path(seg.y),
                                fmt_path(seg.to_x),
                                fmt_path(y1),
                            );
                        }
                    }
                    ArcEnd::Continues => {
                        let _ = write!(d, "L{} {}", fmt_path(seg.to_x), fmt_path(seg.y));
                    }
                }
            }

            // arrowhead at the target anchor; equivalence arcs are undirected
            if arc.kind != ArcKind::Equiv {
                let target_at_right = path.left_to_right;
                if target_at_right && seg.right_end == ArcEnd::Anchor {
                    arrow = Some((seg.to_x, right_top.unwrap_or(seg.y) - 1.0));
                } else if !target_at_right && seg.left_end == ArcEnd::Anchor && i == 0 {
                    arrow = Some((seg.from_x, left_top.unwrap_or(seg.y) - 1.0));
                }
            }

            if let Some(kind) = arc.marked {
                let (fill, pulse) = marked_fill(kind);
                let _ = write!(
                    out,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" opacity="0.6">"#,
                    d,
                    fill,
                    fmt(MARKED_ARC_STROKE),
                );
                if pulse {
                    let _ = write!(
                        out,
                        r#"<animate attributeName="stroke" values="{PULSE_VALUES}" dur="2s" begin="indefinite" repeatCount="indefinite"/>"#
                    );
                }
                out.push_str("</path>");
            }

            let dash_attr = dash
                .as_deref()
                .map(|v| format!(r#" stroke-dasharray="{}""#, escape_xml(v)))
                .unwrap_or_default();
            let _ = write!(
                out,
                r#"<path d="{}" fill="none" stroke="{}"{} data-arc-origin="{}" data-arc-type="{}" data-arc-target="{}"/>"#,
                d,
                color,
                dash_attr,
                escape_xml(&arc.origin),
                escape_xml(&arc.ty),
                escape_xml(&arc.target),
            );

            if let Some(label) = &seg.label {
                let label_h = input
                    .measurer
                    .measure(&label.text, &input.fonts.arc_label)
                    .height;
                let backing = Rect {
                    x: label.x - label.width / 2.0 - 2.0,
                    y: seg.y - label_h * 0.55,
                    w: label.width + 4.0,
                    h: label_h * 0.9,
                };
                if let Some(class) = shadow_class {
                    let shadow = Rect {
                        x: backing.x - ARC_LABEL_SHADOW_SIZE,
                        y: backing.y - ARC_LABEL_SHADOW_SIZE,
                        w: backing.w + 2.0 * ARC_LABEL_SHADOW_SIZE,
                        h: backing.h + 2.0 * ARC_LABEL_SHADOW_SIZE,
                    };
                    push_rect(
                        out,
                        &shadow,
                        ARC_LABEL_SHADOW_ROUNDING,
                        ARC_LABEL_SHADOW_ROUNDING,
                        &format!(
                            r#"fill="{}" filter="url(#blur)" class="shadow_{}""#,
                            shadow_color(class),
                            escape_xml(class)
                        ),
                    );
                }
                push_rect(
                    out,
                    &backing,
                    2.0,
                    2.0,
                    &format!(r#"fill="{}""#, ROW_STRIPE[doc.rows[seg.row].index % 2]),
                );
                let _ = write!(
                    out,
                    r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="{}">{}</text>"#,
                    fmt(label.x),
                    fmt(seg.y + 3.0),
                    fmt(input.fonts.arc_label.font_size),
                    color,
                    escape_xml(&label.text),
                );
                if !hit_recorded {
                    hit_recorded = true;
                    interaction.arcs.push(ArcHit {
                        origin: arc.origin.clone(),
                        ty: arc.ty.clone(),
                        target: arc.target.clone(),
                        rect: backing,
                    });
                }
            }
        }

        if let Some((ax, ay)) = arrow {
            let _ = write!(
                out,
                r#"<polygon points="{},{} {},{} {},{}" fill="{}"/>"#,
                fmt(ax - 2.5),
                fmt(ay - 5.0),
                fmt(ax + 2.5),
                fmt(ay - 5.0),
                fmt(ax),
                fmt(ay),
                color,
            );
        }
    }
    out.push_str("</g>");
}
