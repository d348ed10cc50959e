//! Geometry assignment.
//!
//! Takes the built document model and produces absolute 2D geometry: chunks
//! wrapped into rows, span boxes stacked on reservation floors above their
//! text, curly extents, nesting-aware highlight boxes, and arc lines routed
//! over the content. Arc heights are assigned over the tallest obstruction
//! first, shortest distance breaking ties, so nested arcs stay under outer
//! ones and an arc clearing a span tower never ends up below one clearing
//! flat ground.

use rustc_hash::FxHashMap;

use selkie_core::document::{DocumentData, FragmentRef, MarkKind};
use selkie_core::TypeRegistry;

use crate::floors::FloorReservations;
use crate::nesting::{self, Nesting};
use crate::text::{TextMeasurer, TextStyle};
use crate::theme::{
    self, Visual, ARC_HORIZONTAL_SPACING, BOX_TEXT_MARGIN_X, BOX_TEXT_MARGIN_Y,
    NESTING_ADJUST_X, NESTING_ADJUST_Y, ROW_PADDING, ROW_SPACING, SENT_NUM_MARGIN,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }
}

/// Fonts used by the renderer; label text is smaller than document text.
#[derive(Debug, Clone)]
pub struct Fonts {
    pub text: TextStyle,
    pub label: TextStyle,
    pub arc_label: TextStyle,
}

impl Default for Fonts {
    fn default() -> Self {
        Self {
            text: TextStyle::sized(14.0),
            label: TextStyle::sized(10.5),
            arc_label: TextStyle::sized(10.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FragmentBox {
    pub fref: FragmentRef,
    pub span_id: String,
    pub chunk: usize,
    pub row: usize,
    /// Label box, absolute coordinates.
    pub rect: Rect,
    /// Middle-anchored label position.
    pub label_x: f64,
    pub label_baseline: f64,
    /// Horizontal extent of the annotated text.
    pub curly_from: f64,
    pub curly_to: f64,
    pub draw_curly: bool,
    /// Text highlight box behind the annotated characters.
    pub highlight: Rect,
    pub nesting: Nesting,
}

#[derive(Debug, Clone)]
pub struct ChunkBox {
    pub index: usize,
    pub row: usize,
    /// Absolute x of the first character.
    pub text_x: f64,
    pub right: f64,
    /// Indices into [`LayoutDocument::fragments`], in draw order.
    pub fragments: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RowBox {
    pub index: usize,
    pub top: f64,
    pub height: f64,
    /// Top of the text line box.
    pub text_top: f64,
    /// Text baseline.
    pub text_y: f64,
    /// Displayed sentence number, present on rows that open a sentence.
    pub sentence: Option<usize>,
    pub chunks: Vec<usize>,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcEnd {
    /// Slanted end segment down to the anchor.
    Anchor,
    /// The arc continues on another row.
    Continues,
}

#[derive(Debug, Clone)]
pub struct ArcLabel {
    pub x: f64,
    pub text: String,
    pub width: f64,
}

#[derive(Debug, Clone)]
pub struct ArcSegment {
    pub row: usize,
    pub from_x: f64,
    pub to_x: f64,
    /// Y of the horizontal run, absolute.
    pub y: f64,
    pub left_end: ArcEnd,
    pub right_end: ArcEnd,
    pub label: Option<ArcLabel>,
}

#[derive(Debug, Clone)]
pub struct ArcPath {
    /// Index into the model's arc list.
    pub arc: usize,
    /// Origin anchor lies left of the target anchor.
    pub left_to_right: bool,
    /// Both endpoints in the same chunk; drawn with tight curves.
    pub ufo_catcher: bool,
    pub segments: Vec<ArcSegment>,
}

#[derive(Debug, Clone)]
pub struct MarkedTextRect {
    pub rect: Rect,
    pub kind: MarkKind,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutDocument {
    pub width: f64,
    pub height: f64,
    pub rows: Vec<RowBox>,
    pub chunks: Vec<ChunkBox>,
    pub fragments: Vec<FragmentBox>,
    pub fragment_index: FxHashMap<FragmentRef, usize>,
    pub arcs: Vec<ArcPath>,
    pub marked_text: Vec<MarkedTextRect>,
    pub text_height: f64,
    pub label_height: f64,
}

impl LayoutDocument {
    pub fn fragment_box(&self, fref: FragmentRef) -> Option<&FragmentBox> {
        self.fragment_index.get(&fref).map(|&i| &self.fragments[i])
    }
}

struct FragRel {
    fref: FragmentRef,
    curly_from: f64,
    curly_to: f64,
    box_x: f64,
    box_w: f64,
    /// Offset of the box bottom above the text top.
    bottom: f64,
    nesting: Nesting,
}

struct ChunkRel {
    prefix: Vec<f64>,
    left: f64,
    right: f64,
    /// Height of the span stack above the text top.
    ceiling: f64,
    frags: Vec<FragRel>,
}

pub struct LayoutInput<'a> {
    pub data: &'a DocumentData,
    pub registry: &'a TypeRegistry,
    pub measurer: &'a dyn TextMeasurer,
    pub fonts: &'a Fonts,
    pub visual: Visual,
    pub canvas_width: f64,
}

pub fn layout(input: &LayoutInput<'_>) -> LayoutDocument {
    let data = input.data;
    let visual = input.visual;
    let measurer = input.measurer;

    let text_metrics = measurer.measure("Mg", &input.fonts.text);
    let text_height = text_metrics.height;
    let ascent = text_metrics.ascent;
    let label_height = measurer.measure("Mg", &input.fonts.label).height;
    let box_height = label_height + 2.0 * BOX_TEXT_MARGIN_Y + 2.0 * visual.margin_y;

    // per-chunk relative geometry
    let mut rels: Vec<ChunkRel> = Vec::with_capacity(data.chunks.len());
    for chunk in &data.chunks {
        let prefix = measurer.prefix_widths(&chunk.text, &input.fonts.text);
        let text_width = *prefix.last().unwrap_or(&0.0);
        let chunk_len = prefix.len() - 1;
        let extents: Vec<(usize, usize)> = chunk
            .fragments
            .iter()
            .map(|r| {
                let f = data.fragment(*r);
                (f.from, f.to)
            })
            .collect();
        let nestings = nesting::compute(&extents);
        let mut floors = FloorReservations::new();
        let mut frags = Vec::with_capacity(chunk.fragments.len());
        let mut left = 0.0f64;
        let mut right = text_width;
        for (i, fref) in chunk.fragments.iter().enumerate() {
            let f = data.fragment(*fref);
            let from_idx = f.from.saturating_sub(chunk.from).min(chunk_len);
            let to_idx = f.to.saturating_sub(chunk.from).min(chunk_len).max(from_idx);
            let curly_from = prefix[from_idx];
            let curly_to = prefix[to_idx];
            let label_width = measurer
                .measure(&f.glyphed_label_text, &input.fonts.label)
                .width;
            let mid = (curly_from + curly_to) / 2.0;
            let half = label_width / 2.0 + BOX_TEXT_MARGIN_X + visual.margin_x;
            let box_x = mid - half;
            let box_w = half * 2.0;
            let floor = floors.reserve(box_x, box_x + box_w, box_height + visual.box_spacing);
            let bottom = visual.curly_height + visual.margin_y + floor;
            left = left.min(box_x);
            right = right.max(box_x + box_w);
            frags.push(FragRel {
                fref: *fref,
                curly_from,
                curly_to,
                box_x,
                box_w,
                bottom,
                nesting: nestings[i],
            });
        }
        let ceiling = if frags.is_empty() {
            0.0
        } else {
            floors.ceiling() + visual.curly_height + visual.margin_y
        };
        rels.push(ChunkRel {
            prefix,
            left,
            right,
            ceiling,
            frags,
        });
    }

    // Arc ends entering a chunk from the left need room for their slant and
    // label; chunks carrying such arcs reserve clearance at the row edge.
    let mut left_arc_chunk = vec![false; data.chunks.len()];
    let mut internal_arc_chunk = vec![false; data.chunks.len()];
    {
        let head_chunk = |span_id: &str| -> Option<usize> {
            let span_idx = data.span_index(span_id)?;
            Some(data.span_at(span_idx).head_fragment().chunk)
        };
        for arc in &data.arcs {
            let (Some(o), Some(t)) = (head_chunk(&arc.origin), head_chunk(&arc.target)) else {
                continue;
            };
            if o == t {
                internal_arc_chunk[o] = true;
            } else {
                left_arc_chunk[o.max(t)] = true;
            }
        }
    }

    // row wrapping
    let origin_x = SENT_NUM_MARGIN + visual.margin_x;
    let available = if input.canvas_width > 0.0 {
        (input.canvas_width - origin_x - visual.margin_x).max(1.0)
    } else {
        f64::INFINITY
    };
    struct RowBuild {
        chunks: Vec<usize>,
        sentence: Option<usize>,
    }
    let mut row_builds: Vec<RowBuild> = Vec::new();
    let mut cur = RowBuild {
        chunks: Vec::new(),
        sentence: Some(1),
    };
    let mut x = 0.0f64;
    let mut text_x_rel = vec![0.0f64; data.chunks.len()];
    for (i, chunk) in data.chunks.iter().enumerate() {
        let rel = &rels[i];
        let space_w: f64 = chunk.space.chars().map(theme::space_width).sum();
        let width = rel.right - rel.left;
        let arc_clearance = if left_arc_chunk[i] {
            ARC_HORIZONTAL_SPACING
        } else if internal_arc_chunk[i] {
            theme::MIN_ARC_SLANT
        } else {
            0.0
        };
        let sentence_break = chunk.sentence.is_some() && !cur.chunks.is_empty();
        let overflow =
            !cur.chunks.is_empty() && x + space_w + width + arc_clearance > available;
        if sentence_break || overflow {
            row_builds.push(std::mem::replace(
                &mut cur,
                RowBuild {
                    chunks: Vec::new(),
                    sentence: chunk.sentence.map(|s| s + 1),
                },
            ));
            x = 0.0;
        }
        let sw = if cur.chunks.is_empty() { 0.0 } else { space_w };
        text_x_rel[i] = x + sw - rel.left;
        x = text_x_rel[i] + rel.right;
        cur.chunks.push(i);
    }
    if !cur.chunks.is_empty() || row_builds.is_empty() {
        row_builds.push(cur);
    }

    let chunk_row: Vec<usize> = {
        let mut v = vec![0usize; data.chunks.len()];
        for (r, row) in row_builds.iter().enumerate() {
            for &c in &row.chunks {
                v[c] = r;
            }
        }
        v
    };

    // arc routing: anchors per head fragment
    struct SegBuild {
        arc: usize,
        row: usize,
        x1: f64,
        x2: f64,
        left_end: ArcEnd,
        right_end: ArcEnd,
        height: f64,
    }
    let abs_text_x = |i: usize| origin_x + text_x_rel[i];
    let row_right: Vec<f64> = row_builds
        .iter()
        .map(|row| {
            row.chunks
                .iter()
                .map(|&c| abs_text_x(c) + rels[c].right)
                .fold(origin_x, f64::max)
        })
        .collect();

    let head_anchor = |span_id: &str| -> Option<(usize, usize, f64, f64)> {
        let span_idx = data.span_index(span_id)?;
        let span = data.span_at(span_idx);
        let fref = FragmentRef {
            span: span_idx,
            fragment: span.head_fragment_index(),
        };
        let chunk = span.head_fragment().chunk;
        let rel = rels[chunk].frags.iter().find(|fr| fr.fref == fref)?;
        let anchor = abs_text_x(chunk) + rel.box_x + rel.box_w / 2.0;
        let top = rel.bottom + box_height;
        Some((chunk, chunk_row[chunk], anchor, top))
    };

    let span_tops: Vec<Vec<(f64, f64, f64)>> = {
        // (x1, x2, top) of every span box, by row
        let mut v: Vec<Vec<(f64, f64, f64)>> = vec![Vec::new(); row_builds.len()];
        for (c, rel) in rels.iter().enumerate() {
            for fr in &rel.frags {
                v[chunk_row[c]].push((
                    abs_text_x(c) + fr.box_x,
                    abs_text_x(c) + fr.box_x + fr.box_w,
                    fr.bottom + box_height,
                ));
            }
        }
        v
    };

    // Routing plan per arc: the rows it crosses and the tallest span stack
    // standing in its way. Heights go to the arcs over the lowest ceilings
    // first, so an arc clearing a tower keeps everything it obstructs below
    // it; ties fall back to distance, then input order.
    struct ArcPlan {
        arc_no: usize,
        left_to_right: bool,
        ufo_catcher: bool,
        rows: Vec<(usize, f64, f64, ArcEnd, ArcEnd)>,
        obstruction: f64,
    }
    let mut plans: Vec<ArcPlan> = Vec::with_capacity(data.arcs.len());
    for (arc_no, arc) in data.arcs.iter().enumerate() {
        let Some((o_chunk, o_row, o_x, _)) = head_anchor(&arc.origin) else {
            continue;
        };
        let Some((t_chunk, t_row, t_x, _)) = head_anchor(&arc.target) else {
            continue;
        };
        let left_to_right = (o_row, o_x) <= (t_row, t_x);
        let ufo_catcher = o_chunk == t_chunk;
        let ((r1, x1), (r2, x2)) = if left_to_right {
            ((o_row, o_x), (t_row, t_x))
        } else {
            ((t_row, t_x), (o_row, o_x))
        };
        let mut spans_rows: Vec<(usize, f64, f64, ArcEnd, ArcEnd)> = Vec::new();
        if r1 == r2 {
            let (a, b) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
            spans_rows.push((r1, a, b, ArcEnd::Anchor, ArcEnd::Anchor));
        } else {
            spans_rows.push((r1, x1, row_right[r1], ArcEnd::Anchor, ArcEnd::Continues));
            for r in (r1 + 1)..r2 {
                spans_rows.push((r, origin_x, row_right[r], ArcEnd::Continues, ArcEnd::Continues));
            }
            spans_rows.push((r2, origin_x, x2, ArcEnd::Continues, ArcEnd::Anchor));
        }
        let mut obstruction = visual.arc_start_height;
        for &(row, a, b, _, _) in &spans_rows {
            for &(sx1, sx2, top) in &span_tops[row] {
                if sx1 < b && a < sx2 {
                    obstruction = obstruction.max(top);
                }
            }
        }
        plans.push(ArcPlan {
            arc_no,
            left_to_right,
            ufo_catcher,
            rows: spans_rows,
            obstruction,
        });
    }
    plans.sort_by(|p, q| {
        p.obstruction
            .total_cmp(&q.obstruction)
            .then(data.arcs[p.arc_no].dist.cmp(&data.arcs[q.arc_no].dist))
            .then(p.arc_no.cmp(&q.arc_no))
    });

    let mut placed: Vec<Vec<(f64, f64, f64)>> = vec![Vec::new(); row_builds.len()];
    let mut seg_builds: Vec<(usize, Vec<SegBuild>, bool, bool)> = Vec::new();
    for plan in plans {
        let mut segs = Vec::with_capacity(plan.rows.len());
        for (row, a, b, le, re) in plan.rows {
            let mut h = visual.arc_start_height;
            for &(sx1, sx2, top) in &span_tops[row] {
                if sx1 < b && a < sx2 {
                    h = h.max(top + visual.arc_spacing);
                }
            }
            for &(px1, px2, ph) in &placed[row] {
                if px1 < b && a < px2 {
                    h = h.max(ph + visual.arc_spacing);
                }
            }
            placed[row].push((a, b, h));
            segs.push(SegBuild {
                arc: plan.arc_no,
                row,
                x1: a,
                x2: b,
                left_end: le,
                right_end: re,
                height: h,
            });
        }
        seg_builds.push((plan.arc_no, segs, plan.left_to_right, plan.ufo_catcher));
    }

    // vertical assembly
    let mut rows: Vec<RowBox> = Vec::with_capacity(row_builds.len());
    let mut y = ROW_PADDING;
    for (r, row) in row_builds.iter().enumerate() {
        let span_ceiling = row
            .chunks
            .iter()
            .map(|&c| rels[c].ceiling)
            .fold(0.0, f64::max);
        let arc_ceiling = placed[r]
            .iter()
            .map(|&(_, _, h)| h)
            .fold(0.0, f64::max);
        let arc_hint = if arc_ceiling > 0.0 {
            arc_ceiling + 5.0
        } else {
            0.0
        };
        let upper = (arc_hint.max(span_ceiling + 1.5) + ROW_SPACING + 1.5).max(span_ceiling);
        let text_top = y + upper;
        let height = upper + text_height + ROW_PADDING;
        rows.push(RowBox {
            index: r,
            top: y,
            height,
            text_top,
            text_y: text_top + ascent,
            sentence: row.sentence,
            chunks: row.chunks.clone(),
            left: origin_x,
            right: row_right[r],
        });
        y += height;
    }
    let total_height = y + ROW_PADDING;

    // absolute fragment boxes
    let mut fragments: Vec<FragmentBox> = Vec::new();
    let mut fragment_index: FxHashMap<FragmentRef, usize> = FxHashMap::default();
    let mut chunk_boxes: Vec<ChunkBox> = Vec::with_capacity(data.chunks.len());
    for (c, rel) in rels.iter().enumerate() {
        let r = chunk_row[c];
        let text_top = rows[r].text_top;
        let tx = abs_text_x(c);
        let mut frag_ids = Vec::with_capacity(rel.frags.len());
        for fr in &rel.frags {
            let f = data.fragment(fr.fref);
            let span = data.span_at(fr.fref.span);
            let rect = Rect {
                x: tx + fr.box_x,
                y: text_top - fr.bottom - box_height,
                w: fr.box_w,
                h: box_height,
            };
            // nested highlights shrink inward, containers grow outward
            let shrink = if fr.nesting.depth > 1 && fr.nesting.height == 0 {
                1.0
            } else if fr.nesting.depth == 0 && fr.nesting.height > 0 {
                -1.0
            } else {
                0.0
            };
            let x_shrink = shrink * NESTING_ADJUST_X;
            let y_shrink = shrink * NESTING_ADJUST_Y;
            let highlight = Rect {
                x: tx + fr.curly_from + x_shrink,
                y: text_top + y_shrink + 1.0,
                w: (fr.curly_to - fr.curly_from) - 2.0 * x_shrink,
                h: text_height - 2.0 * y_shrink - 1.0,
            };
            let idx = fragments.len();
            fragment_index.insert(fr.fref, idx);
            frag_ids.push(idx);
            fragments.push(FragmentBox {
                fref: fr.fref,
                span_id: span.id.clone(),
                chunk: c,
                row: r,
                rect,
                label_x: rect.center_x(),
                label_baseline: rect.y + BOX_TEXT_MARGIN_Y + visual.margin_y
                    + label_height * 0.8,
                curly_from: tx + fr.curly_from,
                curly_to: tx + fr.curly_to,
                draw_curly: f.draw_curly,
                highlight,
                nesting: fr.nesting,
            });
        }
        chunk_boxes.push(ChunkBox {
            index: c,
            row: r,
            text_x: tx,
            right: tx + rel.right,
            fragments: frag_ids,
        });
    }

    // absolute arc segments with labels
    let mut arcs: Vec<ArcPath> = Vec::with_capacity(seg_builds.len());
    for (arc_no, segs, left_to_right, ufo_catcher) in seg_builds {
        let arc = &data.arcs[arc_no];
        let origin_ty = data
            .spans
            .get(&arc.origin)
            .map(|s| s.ty.clone())
            .unwrap_or_default();
        let mut segments = Vec::with_capacity(segs.len());
        for seg in segs {
            let label = arc_label(
                input,
                &origin_ty,
                &arc.ty,
                seg.x2 - seg.x1 - 2.0 * ARC_HORIZONTAL_SPACING,
            );
            segments.push(ArcSegment {
                row: seg.row,
                from_x: seg.x1,
                to_x: seg.x2,
                y: rows[seg.row].text_top - seg.height,
                left_end: seg.left_end,
                right_end: seg.right_end,
                label: label.map(|(text, width)| ArcLabel {
                    x: (seg.x1 + seg.x2) / 2.0,
                    text,
                    width,
                }),
            });
        }
        arcs.push(ArcPath {
            arc: arc_no,
            left_to_right,
            ufo_catcher,
            segments,
        });
    }
    // stable output order regardless of height assignment order
    arcs.sort_by_key(|a| a.arc);

    let marked_text = locate_marked_text(data, &rels, &chunk_row, &rows, &row_right, &text_x_rel, origin_x, text_height);

    let width = if input.canvas_width > 0.0 {
        input.canvas_width
    } else {
        row_right.iter().copied().fold(0.0, f64::max) + visual.margin_x
    };

    tracing::debug!(
        target: "selkie::layout",
        rows = rows.len(),
        fragments = fragments.len(),
        arcs = arcs.len(),
        height = total_height,
        "layout complete"
    );

    LayoutDocument {
        width,
        height: total_height,
        rows,
        chunks: chunk_boxes,
        fragments,
        fragment_index,
        arcs,
        marked_text,
        text_height,
        label_height,
    }
}

/// Picks the widest configured label that fits, falling back through the
/// abbreviation list and finally to the raw type name.
fn arc_label(
    input: &LayoutInput<'_>,
    origin_ty: &str,
    arc_ty: &str,
    available: f64,
) -> Option<(String, f64)> {
    let candidates = {
        let mut c = input.registry.arc_labels(origin_ty, arc_ty);
        if c.is_empty() {
            c.push(arc_ty.to_string());
        }
        c
    };
    let mut chosen = None;
    for text in &candidates {
        let width = input
            .measurer
            .measure(text, &input.fonts.arc_label)
            .width;
        chosen = Some((text.clone(), width));
        if width <= available {
            break;
        }
    }
    chosen
}

#[allow(clippy::too_many_arguments)]
fn locate_marked_text(
    data: &DocumentData,
    rels: &[ChunkRel],
    chunk_row: &[usize],
    rows: &[RowBox],
    row_right: &[f64],
    text_x_rel: &[f64],
    origin_x: f64,
    text_height: f64,
) -> Vec<MarkedTextRect> {
    let mut starts: FxHashMap<usize, (usize, isize, MarkKind)> = FxHashMap::default();
    let mut ends: FxHashMap<usize, (usize, isize)> = FxHashMap::default();
    for chunk in &data.chunks {
        for s in &chunk.marked_text_start {
            starts.insert(s.mark_no, (chunk.index, s.offset, s.kind));
        }
        for e in &chunk.marked_text_end {
            ends.insert(e.mark_no, (chunk.index, e.offset));
        }
    }
    let offset_x = |chunk: usize, offset: isize| -> f64 {
        let rel = &rels[chunk];
        let idx = offset.max(0) as usize;
        let idx = idx.min(rel.prefix.len() - 1);
        origin_x + text_x_rel[chunk] + rel.prefix[idx]
    };
    let mut out = Vec::new();
    for (mark_no, &(s_chunk, s_off, kind)) in &starts {
        let Some(&(e_chunk, e_off)) = ends.get(mark_no) else {
            continue;
        };
        let r1 = chunk_row[s_chunk];
        let r2 = chunk_row[e_chunk];
        let x1 = offset_x(s_chunk, s_off);
        let x2 = offset_x(e_chunk, e_off);
        let rect_for = |row: usize, from: f64, to: f64| MarkedTextRect {
            rect: Rect {
                x: from - 2.0,
                y: rows[row].text_top - 2.0,
                w: (to - from) + 4.0,
                h: text_height + 2.0,
            },
            kind,
        };
        if r1 == r2 {
            out.push(rect_for(r1, x1, x2));
        } else {
            out.push(rect_for(r1, x1, row_right[r1]));
            for r in (r1 + 1)..r2 {
                out.push(rect_for(r, origin_x, row_right[r]));
            }
            out.push(rect_for(r2, origin_x, x2));
        }
    }
    // deterministic order for emission
    out.sort_by(|a, b| {
        a.rect
            .y
            .partial_cmp(&b.rect.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.rect
                    .x
                    .partial_cmp(&b.rect.x)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::DeterministicTextMeasurer;
    use selkie_core::config::CollectionConfig;
    use selkie_core::document::{build, BuildOptions};
    use selkie_core::payload::SourceDocument;

    fn registry() -> TypeRegistry {
        let config: CollectionConfig = serde_json::from_str(
            r#"{
                "entity_types": [
                    {"type": "Person", "labels": ["Person", "Per"]},
                    {"type": "Organization", "labels": ["Organization", "Org"]}
                ],
                "relation_types": [
                    {
                        "type": "Anaphora",
                        "labels": ["Anaphora", "Ana"],
                        "args": [
                            {"role": "Anaphor", "targets": ["Person"]},
                            {"role": "Entity", "targets": ["Person"]}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        TypeRegistry::from_collection(&config)
    }

    fn layout_of(json: &str, canvas_width: f64) -> (DocumentData, LayoutDocument) {
        let source: SourceDocument = serde_json::from_str(json).unwrap();
        let reg = registry();
        let (data, _) = build(&source, &reg, &[], &BuildOptions::default());
        let measurer = DeterministicTextMeasurer::default();
        let fonts = Fonts::default();
        let doc = layout(&LayoutInput {
            data: &data,
            registry: &reg,
            measurer: &measurer,
            fonts: &fonts,
            visual: Visual::standard(),
            canvas_width,
        });
        (data, doc)
    }

    #[test]
    fn narrow_canvas_wraps_plain_text_into_rows() {
        let (_, doc) = layout_of(
            r#"{"text": "one two three four five six seven eight nine ten"}"#,
            180.0,
        );
        assert!(doc.rows.len() > 1);
        // every chunk stays inside the canvas
        for c in &doc.chunks {
            assert!(c.right <= doc.width + 1e-6, "chunk {} overflows", c.index);
        }
        // rows are stacked downward
        for w in doc.rows.windows(2) {
            assert!(w[1].top > w[0].top);
        }
    }

    #[test]
    fn sentence_breaks_force_new_rows() {
        let (_, doc) = layout_of(r#"{"text": "One two.\nThree four."}"#, 10_000.0);
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows[0].sentence, Some(1));
        assert_eq!(doc.rows[1].sentence, Some(2));
    }

    #[test]
    fn span_boxes_sit_above_their_text() {
        let (data, doc) = layout_of(
            r#"{
                "text": "Ed shot Bob.",
                "entities": [["T1", "Person", [[0, 2]]], ["T2", "Person", [[8, 11]]]]
            }"#,
            10_000.0,
        );
        assert_eq!(doc.fragments.len(), 2);
        for fb in &doc.fragments {
            let row = &doc.rows[fb.row];
            assert!(fb.rect.y + fb.rect.h <= row.text_top + 1e-6);
            assert!(fb.curly_from < fb.curly_to);
        }
        let _ = data;
    }

    #[test]
    fn same_tower_spans_stack_vertically() {
        let (_, doc) = layout_of(
            r#"{
                "text": "word",
                "entities": [
                    ["T1", "Person", [[0, 4]]],
                    ["T2", "Organization", [[0, 4]]]
                ]
            }"#,
            10_000.0,
        );
        assert_eq!(doc.fragments.len(), 2);
        let y0 = doc.fragments[0].rect.y;
        let y1 = doc.fragments[1].rect.y;
        assert!((y0 - y1).abs() > 1.0, "stacked boxes must not overlap");
    }

    #[test]
    fn shorter_arcs_run_below_longer_ones() {
        let (data, doc) = layout_of(
            r#"{
                "text": "aa bb cc",
                "entities": [
                    ["T1", "Person", [[0, 2]]],
                    ["T2", "Person", [[3, 5]]],
                    ["T3", "Person", [[6, 8]]]
                ],
                "relations": [
                    ["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T3"]]],
                    ["R2", "Anaphora", [["Anaphor", "T1"], ["Entity", "T2"]]]
                ]
            }"#,
            10_000.0,
        );
        assert_eq!(doc.arcs.len(), 2);
        let by_arc: FxHashMap<usize, &ArcPath> =
            doc.arcs.iter().map(|a| (a.arc, a)).collect();
        let long = &by_arc[&data.arc_index["T1--Anaphora--T3"]];
        let short = &by_arc[&data.arc_index["T1--Anaphora--T2"]];
        // smaller y is higher on the canvas
        assert!(short.segments[0].y > long.segments[0].y);
    }

    #[test]
    fn arc_over_a_tower_stays_above_an_overlapping_flat_arc() {
        // R1 crosses a two-span tower; R2 has the same distance, overlaps
        // R1's range, and crosses single-height spans only. R2 must slot in
        // under R1 no matter which one the input lists first.
        let (data, doc) = layout_of(
            r#"{
                "text": "aa bb cc dd ee ff gg hh",
                "entities": [
                    ["T1", "Person", [[0, 2]]],
                    ["TW1", "Person", [[3, 5]]],
                    ["TW2", "Organization", [[3, 5]]],
                    ["T4", "Person", [[9, 11]]],
                    ["T5", "Person", [[12, 14]]],
                    ["T8", "Person", [[21, 23]]]
                ],
                "relations": [
                    ["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T5"]]],
                    ["R2", "Anaphora", [["Anaphor", "T4"], ["Entity", "T8"]]]
                ]
            }"#,
            10_000.0,
        );
        assert_eq!(data.arcs[0].dist, data.arcs[1].dist);
        let by_arc: FxHashMap<usize, &ArcPath> =
            doc.arcs.iter().map(|a| (a.arc, a)).collect();
        let tower = &by_arc[&data.arc_index["T1--Anaphora--T5"]];
        let flat = &by_arc[&data.arc_index["T4--Anaphora--T8"]];
        assert!(
            tower.segments[0].y < flat.segments[0].y,
            "tower arc at y {} must run above the flat arc at y {}",
            tower.segments[0].y,
            flat.segments[0].y
        );
    }

    #[test]
    fn left_pointing_arcs_reserve_clearance_at_the_row_edge() {
        // With the canvas sized so the second chunk fits only without arc
        // clearance, a relation reaching it from the left forces a wrap.
        let plain = r#"{
            "text": "aa bb",
            "entities": [["T1", "Person", [[0, 2]]], ["T2", "Person", [[3, 5]]]]
        }"#;
        let related = r#"{
            "text": "aa bb",
            "entities": [["T1", "Person", [[0, 2]]], ["T2", "Person", [[3, 5]]]],
            "relations": [["R1", "Anaphora", [["Anaphor", "T2"], ["Entity", "T1"]]]]
        }"#;
        let (_, without_arc) = layout_of(plain, 79.0);
        let (_, with_arc) = layout_of(related, 79.0);
        assert_eq!(without_arc.rows.len(), 1);
        assert_eq!(with_arc.rows.len(), 2);
    }

    #[test]
    fn cross_row_arcs_split_into_segments() {
        let (_, doc) = layout_of(
            r#"{
                "text": "Ed one two three four five six Bob",
                "entities": [["T1", "Person", [[0, 2]]], ["T2", "Person", [[31, 34]]]],
                "relations": [["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T2"]]]]
            }"#,
            160.0,
        );
        assert!(doc.rows.len() > 1);
        let arc = &doc.arcs[0];
        assert!(arc.segments.len() >= 2);
        assert_eq!(arc.segments[0].right_end, ArcEnd::Continues);
        assert_eq!(
            arc.segments.last().unwrap().left_end,
            ArcEnd::Continues
        );
    }

    #[test]
    fn layout_is_deterministic() {
        let json = r#"{
            "text": "Ed shot Bob and fled the scene.",
            "entities": [["T1", "Person", [[0, 2]]], ["T2", "Person", [[8, 11]]]],
            "relations": [["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T2"]]]]
        }"#;
        let (_, a) = layout_of(json, 400.0);
        let (_, b) = layout_of(json, 400.0);
        assert_eq!(a.height, b.height);
        assert_eq!(a.rows.len(), b.rows.len());
        for (fa, fb) in a.fragments.iter().zip(&b.fragments) {
            assert_eq!(fa.rect, fb.rect);
        }
    }
}
