//! Document data model builder.
//!
//! Turns a [`SourceDocument`] plus the collection's [`TypeRegistry`] into a
//! [`DocumentData`]: spans split into fragments, fragments grouped into
//! chunks and towers, arcs derived from events, relations and equivalence
//! chains, and the intra-chunk draw ordering settled. Everything here is
//! offset arithmetic; pixel geometry happens in the render crate.
//!
//! Recoverable data problems (references to missing annotations, offsets
//! past the text) produce [`DataWarning`]s and drop the offending annotation
//! instead of failing the build.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::config::TypeRegistry;
use crate::payload::{CharSpan, SourceDocument};

/// Comment types in increasing priority; the highest-priority comment on an
/// annotation decides its shadow class. Matching is by substring.
pub const COMMENT_PRIO_LEVELS: &[&str] = &[
    "Unconfirmed",
    "Incomplete",
    "Warning",
    "Error",
    "AnnotatorNotes",
    "AddedAnnotation",
    "MissingAnnotation",
    "ChangedAnnotation",
];

fn comment_priority(comment_class: Option<&str>) -> i32 {
    let Some(class) = comment_class else {
        return -1;
    };
    for (i, level) in COMMENT_PRIO_LEVELS.iter().enumerate() {
        if class.contains(level) {
            return i as i32;
        }
    }
    0
}

#[derive(Debug, Clone)]
pub struct DataWarning {
    pub message: String,
}

impl DataWarning {
    fn new(message: String) -> Self {
        tracing::warn!(target: "selkie::document", "{message}");
        Self { message }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    Edited,
    Focus,
    MatchFocus,
    Match,
}

impl MarkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkKind::Edited => "edited",
            MarkKind::Focus => "focus",
            MarkKind::MatchFocus => "matchfocus",
            MarkKind::Match => "match",
        }
    }
}

/// One highlight request, usually decoded from URL-hash arguments.
#[derive(Debug, Clone)]
pub enum MarkTarget {
    Sentence(usize),
    TextRange(usize, usize),
    /// A span, event or trigger id.
    Annotation(String),
    Arc {
        origin: String,
        ty: String,
        target: String,
    },
    Equiv {
        ty: String,
        member: String,
    },
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub kind: MarkKind,
    pub target: MarkTarget,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub ty: String,
    pub text: String,
}

/// One visual presentation cue merged from attribute values.
#[derive(Debug, Clone, Default)]
pub struct AttributeMerge {
    pub glyph: Option<String>,
    pub position: Option<String>,
    pub glyph_color: Option<String>,
    pub box_style: Option<String>,
    pub dash_array: Option<String>,
}

/// One piece of a fragment label: the label itself, attribute glyphs, or the
/// `#` marker for attributes without a usable definition.
#[derive(Debug, Clone)]
pub struct LabelPiece {
    pub text: String,
    pub glyph: bool,
    pub warning: bool,
}

/// A contiguous piece of a (possibly discontiguous) span.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub from: usize,
    pub to: usize,
    /// Index into [`DocumentData::chunks`].
    pub chunk: usize,
    pub text: String,
    /// Final position within the chunk's fragment ordering.
    pub draw_order: usize,
    /// Transient position used while the ordering converges.
    pub index_number: usize,
    pub tower_id: usize,
    pub draw_curly: bool,
    pub label_text: String,
    pub glyphed_label_text: String,
    pub label_pieces: Vec<LabelPiece>,
}

impl Fragment {
    fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            chunk: 0,
            text: String::new(),
            draw_order: 0,
            index_number: 0,
            tower_id: 0,
            draw_curly: false,
            label_text: String::new(),
            glyphed_label_text: String::new(),
            label_pieces: Vec::new(),
        }
    }

    fn midpoint_key(&self) -> usize {
        self.from + self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Entity,
    Event,
}

#[derive(Debug, Clone)]
pub struct Span {
    pub id: String,
    pub ty: String,
    pub kind: SpanKind,
    /// Sorted by midpoint; the head fragment is the last one.
    pub fragments: Vec<Fragment>,
    pub whole_from: usize,
    pub whole_to: usize,
    pub text: String,
    pub attributes: IndexMap<String, Value>,
    pub attribute_text: Vec<String>,
    pub attribute_merge: AttributeMerge,
    pub comment: Option<Comment>,
    pub annotator_notes: Option<String>,
    pub shadow_class: Option<String>,
    pub normalizations: Vec<(String, String, String)>,
    pub normalized: bool,
    pub marked: Option<MarkKind>,
    pub total_dist: usize,
    pub num_arcs: usize,
    pub avg_dist: f64,
    pub refed_index_sum: usize,
    pub draw_curly: bool,
    /// Indices into [`DocumentData::arcs`].
    pub incoming: Vec<usize>,
    pub outgoing: Vec<usize>,
}

impl Span {
    fn new(id: &str, ty: &str, kind: SpanKind, offsets: &[CharSpan]) -> Self {
        let mut fragments: Vec<Fragment> = offsets
            .iter()
            .map(|o| {
                let (from, to) = if o.from <= o.to {
                    (o.from, o.to)
                } else {
                    (o.to, o.from)
                };
                Fragment::new(from, to)
            })
            .collect();
        fragments.sort_by_key(Fragment::midpoint_key);
        let whole_from = fragments.first().map_or(0, |f| f.from);
        let whole_to = fragments.last().map_or(0, |f| f.to);
        Self {
            id: id.to_string(),
            ty: ty.to_string(),
            kind,
            fragments,
            whole_from,
            whole_to,
            text: String::new(),
            attributes: IndexMap::new(),
            attribute_text: Vec::new(),
            attribute_merge: AttributeMerge::default(),
            comment: None,
            annotator_notes: None,
            shadow_class: None,
            normalizations: Vec::new(),
            normalized: false,
            marked: None,
            total_dist: 0,
            num_arcs: 0,
            avg_dist: 0.0,
            refed_index_sum: 0,
            draw_curly: false,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn head_fragment(&self) -> &Fragment {
        // last fragment in reading order
        &self.fragments[self.fragments.len() - 1]
    }

    pub fn head_fragment_index(&self) -> usize {
        self.fragments.len() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    Event,
    Relation,
    Equiv,
}

/// Source of one or more arcs: an event, one link of an equivalence chain, or
/// a binary relation.
#[derive(Debug, Clone)]
pub struct EventDesc {
    /// Span id the arcs originate from (the event span, or the first
    /// relation/equiv argument).
    pub origin: String,
    pub roles: Vec<(String, String)>,
    pub kind: ArcKind,
    pub left_spans: Vec<String>,
    pub right_spans: Vec<String>,
    pub comment: Option<Comment>,
    pub annotator_notes: Option<String>,
    pub shadow_class: Option<String>,
}

impl EventDesc {
    fn new(origin: &str, roles: Vec<(String, String)>, kind: ArcKind) -> Self {
        Self {
            origin: origin.to_string(),
            roles,
            kind,
            left_spans: Vec::new(),
            right_spans: Vec::new(),
            comment: None,
            annotator_notes: None,
            shadow_class: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Arc {
    pub origin: String,
    pub target: String,
    /// Role name for event arcs, relation/equiv type otherwise.
    pub ty: String,
    /// Distance between the head fragment midpoints of the endpoints.
    pub dist: usize,
    /// Key into [`DocumentData::event_descs`].
    pub event_desc: String,
    pub kind: ArcKind,
    pub marked: Option<MarkKind>,
}

/// Points at one fragment of one span without borrowing either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentRef {
    /// Index into [`DocumentData::spans`].
    pub span: usize,
    pub fragment: usize,
}

#[derive(Debug, Clone)]
pub struct MarkedTextStart {
    pub mark_no: usize,
    /// Offset relative to the chunk start; negative when the highlight
    /// begins in the whitespace before the chunk.
    pub offset: isize,
    pub kind: MarkKind,
}

#[derive(Debug, Clone)]
pub struct MarkedTextEnd {
    pub mark_no: usize,
    pub offset: isize,
}

/// A run of tokens drawn as one unbreakable unit of text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub from: usize,
    pub to: usize,
    /// Whitespace between the previous chunk and this one.
    pub space: String,
    /// Set when this chunk starts a new sentence (second sentence onward).
    pub sentence: Option<usize>,
    /// Final draw order, settled by the fragment comparator.
    pub fragments: Vec<FragmentRef>,
    pub first_fragment_tower: Option<usize>,
    pub last_fragment_tower: Option<usize>,
    pub marked_text_start: Vec<MarkedTextStart>,
    pub marked_text_end: Vec<MarkedTextEnd>,
}

#[derive(Debug, Clone)]
pub struct MarkedRange {
    pub from: usize,
    pub to: usize,
    pub kind: MarkKind,
}

/// The fully built document model, rebuilt from scratch for every render.
#[derive(Debug, Clone, Default)]
pub struct DocumentData {
    pub text: String,
    pub spans: IndexMap<String, Span>,
    pub event_descs: IndexMap<String, EventDesc>,
    pub arcs: Vec<Arc>,
    /// `origin--type--target` to arc index.
    pub arc_index: FxHashMap<String, usize>,
    pub chunks: Vec<Chunk>,
    /// Fragments sharing exact offsets, grouped; indexed by tower id.
    pub towers: Vec<Vec<FragmentRef>>,
    /// Span ids ordered by their head fragment's draw order.
    pub span_draw_order: Vec<String>,
    pub sent_comments: FxHashMap<usize, Comment>,
    pub marked_sentences: FxHashSet<usize>,
    pub marked_text: Vec<MarkedRange>,
    /// Arc indices per source equiv row, in chain order.
    pub equiv_arcs: Vec<Vec<usize>>,
    pub sentence_offsets: Vec<CharSpan>,
    pub token_offsets: Vec<CharSpan>,
}

impl DocumentData {
    pub fn fragment(&self, fref: FragmentRef) -> &Fragment {
        &self.spans[fref.span].fragments[fref.fragment]
    }

    pub fn span_at(&self, index: usize) -> &Span {
        &self.spans[index]
    }

    pub fn span_index(&self, id: &str) -> Option<usize> {
        self.spans.get_index_of(id)
    }

    pub fn arc_id(origin: &str, ty: &str, target: &str) -> String {
        format!("{origin}--{ty}--{target}")
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Substitute shorter configured labels when a fragment is narrow.
    pub abbrevs_on: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { abbrevs_on: true }
    }
}

/// A naive whitespace tokeniser, used when the payload carries no
/// `token_offsets`.
pub fn tokenise(text: &str) -> Vec<CharSpan> {
    let mut offsets = Vec::new();
    let mut token_start: Option<usize> = None;
    let mut last_char_pos = 0usize;
    for (i, c) in text.chars().enumerate() {
        if token_start.is_none() && !c.is_whitespace() {
            token_start = Some(i);
            last_char_pos = i;
        } else if c.is_whitespace() {
            if let Some(start) = token_start.take() {
                offsets.push(CharSpan::new(start, i));
            }
        } else {
            last_char_pos = i;
        }
    }
    if let Some(start) = token_start {
        offsets.push(CharSpan::new(start, last_char_pos + 1));
    }
    offsets
}

/// A naive newline sentence splitter, used when the payload carries no
/// `sentence_offsets`.
pub fn sentence_split(text: &str) -> Vec<CharSpan> {
    let mut offsets = Vec::new();
    let mut sent_start: Option<usize> = None;
    let mut last_char_pos = 0usize;
    for (i, c) in text.chars().enumerate() {
        if sent_start.is_none() && !c.is_whitespace() {
            sent_start = Some(i);
            last_char_pos = i;
        } else if c == '\n' {
            if let Some(start) = sent_start.take() {
                offsets.push(CharSpan::new(start, i));
            }
        } else if !c.is_whitespace() {
            last_char_pos = i;
        }
    }
    if let Some(start) = sent_start {
        offsets.push(CharSpan::new(start, last_char_pos + 1));
    }
    offsets
}

fn substring(chars: &[char], from: usize, to: usize) -> String {
    let from = from.min(chars.len());
    let to = to.clamp(from, chars.len());
    chars[from..to].iter().collect()
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct Builder<'a> {
    registry: &'a TypeRegistry,
    options: &'a BuildOptions,
    warnings: Vec<DataWarning>,
    data: DocumentData,
    text_chars: Vec<char>,
    /// Trigger id to (trigger row index, event span ids built from it).
    triggers: FxHashMap<String, (usize, Vec<String>)>,
}

impl<'a> Builder<'a> {
    fn warn(&mut self, message: String) {
        self.warnings.push(DataWarning::new(message));
    }

    fn collect_spans(&mut self, source: &SourceDocument) {
        for entity in &source.entities {
            self.data.spans.insert(
                entity.id.clone(),
                Span::new(&entity.id, &entity.ty, SpanKind::Entity, &entity.offsets),
            );
        }
        for (i, trigger) in source.triggers.iter().enumerate() {
            self.triggers
                .insert(trigger.id.clone(), (i, Vec::new()));
        }
        for event in &source.events {
            let Some(&(trigger_no, _)) = self.triggers.get(&event.trigger) else {
                self.warn(format!(
                    "Trigger {} for event {} not found (please correct the source data)",
                    event.trigger, event.id
                ));
                continue;
            };
            let trigger = &source.triggers[trigger_no];
            let span = Span::new(&event.id, &trigger.ty, SpanKind::Event, &trigger.offsets);
            self.data.spans.insert(event.id.clone(), span);
            if let Some(entry) = self.triggers.get_mut(&event.trigger) {
                entry.1.push(event.id.clone());
            }
            let roles = event
                .args
                .iter()
                .map(|a| (a.role.clone(), a.target.clone()))
                .collect();
            self.data
                .event_descs
                .insert(event.id.clone(), EventDesc::new(&event.id, roles, ArcKind::Event));
        }
    }

    fn collect_equivs(&mut self, source: &SourceDocument) {
        for (equiv_no, equiv) in source.equivs.iter().enumerate() {
            let mut ok_members: Vec<&String> = equiv
                .members
                .iter()
                .filter(|m| self.data.spans.contains_key(m.as_str()))
                .collect();
            // sort members by their head fragment midpoint
            ok_members.sort_by_key(|m| {
                let head = self.data.spans[m.as_str()].head_fragment();
                head.from + head.to
            });
            for i in 1..ok_members.len() {
                let origin = ok_members[i - 1].clone();
                let target = ok_members[i].clone();
                let mut desc = EventDesc::new(
                    &origin,
                    vec![(equiv.ty.clone(), target)],
                    ArcKind::Equiv,
                );
                desc.left_spans = ok_members[..i].iter().map(|s| (*s).clone()).collect();
                desc.right_spans = ok_members[i..].iter().map(|s| (*s).clone()).collect();
                self.data
                    .event_descs
                    .insert(format!("*{equiv_no}*{i}"), desc);
            }
        }
    }

    fn collect_relations(&mut self, source: &SourceDocument) {
        for rel in &source.relations {
            // order the arguments by the relation's configured roles
            let (t1, t2) = match self.registry.relation_type_exact(&rel.ty) {
                Some(def) if def.args.len() >= 2 => {
                    let lookup = |role: &str| -> Option<&str> {
                        if rel.first.role == role {
                            Some(rel.first.target.as_str())
                        } else if rel.second.role == role {
                            Some(rel.second.target.as_str())
                        } else {
                            None
                        }
                    };
                    match (lookup(&def.args[0].role), lookup(&def.args[1].role)) {
                        (Some(a), Some(b)) => (a.to_string(), b.to_string()),
                        _ => (rel.first.target.clone(), rel.second.target.clone()),
                    }
                }
                _ => (rel.first.target.clone(), rel.second.target.clone()),
            };
            self.data.event_descs.insert(
                rel.id.clone(),
                EventDesc::new(&t1, vec![(rel.ty.clone(), t2)], ArcKind::Relation),
            );
        }
    }

    fn collect_attributes(&mut self, source: &SourceDocument) {
        for attr in &source.attributes {
            let attr_type = self.registry.attribute_type(&attr.ty);
            if !self.data.spans.contains_key(&attr.target) {
                self.warn(format!(
                    "Annotation {}, referenced from attribute {}, does not exist.",
                    attr.target, attr.id
                ));
                continue;
            }
            let (attr_text, value_style) = match attr_type {
                Some(def) => {
                    let value_key = def
                        .bool_key()
                        .map(str::to_string)
                        .unwrap_or_else(|| value_text(&attr.value));
                    let style = def.values.get(&value_key).cloned();
                    let val_text = style
                        .as_ref()
                        .and_then(|s| s.name.clone())
                        .unwrap_or_else(|| value_text(&attr.value));
                    let text = if def.bool_key().is_some() {
                        def.display_name().to_string()
                    } else {
                        format!("{}: {}", def.display_name(), val_text)
                    };
                    (text, style)
                }
                None => {
                    let text = if attr.value == Value::Bool(true) {
                        attr.ty.clone()
                    } else {
                        format!("{}: {}", attr.ty, value_text(&attr.value))
                    };
                    (text, None)
                }
            };
            let span = &mut self.data.spans[&attr.target];
            span.attribute_text.push(attr_text);
            span.attributes.insert(attr.ty.clone(), attr.value.clone());
            if let Some(style) = value_style {
                let merge = &mut span.attribute_merge;
                if style.glyph.is_some() {
                    merge.glyph = style.glyph;
                }
                if style.position.is_some() {
                    merge.position = style.position;
                }
                if style.glyph_color.is_some() {
                    merge.glyph_color = style.glyph_color;
                }
                if style.r#box.is_some() {
                    merge.box_style = style.r#box;
                }
                if style.dash_array.is_some() {
                    merge.dash_array = style.dash_array;
                }
            }
        }
    }

    fn collect_comments(&mut self, source: &SourceDocument) {
        for comment in &source.comments {
            if let Some(sent) = comment.target.sentence() {
                let entry = self.data.sent_comments.entry(sent);
                match entry {
                    std::collections::hash_map::Entry::Occupied(mut o) => {
                        let existing = o.get_mut();
                        existing.ty = comment.ty.clone();
                        existing.text = format!("{}\n{}", existing.text, comment.text);
                    }
                    std::collections::hash_map::Entry::Vacant(v) => {
                        v.insert(Comment {
                            ty: comment.ty.clone(),
                            text: comment.text.clone(),
                        });
                    }
                }
                continue;
            }
            let crate::payload::CommentTarget::Annotation(id) = &comment.target else {
                continue;
            };
            // a trigger comment lands on every event built from the trigger
            let target_spans: Vec<String> = if let Some((_, events)) = self.triggers.get(id) {
                events.clone()
            } else if self.data.spans.contains_key(id) {
                vec![id.clone()]
            } else {
                Vec::new()
            };
            if target_spans.is_empty() {
                if let Some(desc) = self.data.event_descs.get_mut(id) {
                    apply_comment(
                        &mut desc.comment,
                        &mut desc.annotator_notes,
                        &mut desc.shadow_class,
                        &comment.ty,
                        &comment.text,
                    );
                }
                continue;
            }
            for span_id in target_spans {
                let span = &mut self.data.spans[&span_id];
                apply_comment(
                    &mut span.comment,
                    &mut span.annotator_notes,
                    &mut span.shadow_class,
                    &comment.ty,
                    &comment.text,
                );
            }
        }
    }

    fn collect_normalizations(&mut self, source: &SourceDocument) {
        for norm in &source.normalizations {
            let Some(span) = self.data.spans.get_mut(&norm.target) else {
                self.warn(format!(
                    "Annotation {}, referenced from normalization {}, does not exist.",
                    norm.target, norm.id
                ));
                continue;
            };
            span.normalizations.push((
                norm.refdb.clone(),
                norm.refid.clone(),
                norm.reftext.clone(),
            ));
            span.normalized = true;
        }
    }

    /// All fragments sorted by start then end, for token containment testing.
    fn sorted_fragment_refs(&self) -> Vec<FragmentRef> {
        let mut refs = Vec::new();
        for (span_idx, (_, span)) in self.data.spans.iter().enumerate() {
            for fragment in 0..span.fragments.len() {
                refs.push(FragmentRef {
                    span: span_idx,
                    fragment,
                });
            }
        }
        refs.sort_by_key(|r| {
            let f = self.data.fragment(*r);
            (f.from, f.to)
        });
        refs
    }

    /// Merges tokens into chunks: a token joins the open chunk when its end
    /// falls strictly inside some fragment.
    fn build_chunks(&mut self, sorted: &[FragmentRef]) {
        let bounds: Vec<(usize, usize)> = sorted
            .iter()
            .map(|r| {
                let f = self.data.fragment(*r);
                (f.from, f.to)
            })
            .collect();
        let mut last_to = 0usize;
        let mut first_from: Option<usize> = None;
        let mut chunk_no = 0usize;
        let token_offsets = self.data.token_offsets.clone();
        for token in &token_offsets {
            let (from, to) = (token.from, token.to);
            if first_from.is_none() {
                first_from = Some(from);
            }
            let mut current = 0usize;
            while current < bounds.len() && to >= bounds[current].1 {
                current += 1;
            }
            if current < bounds.len() && to > bounds[current].0 {
                continue;
            }
            let start = first_from.take().unwrap_or(from);
            let space = substring(&self.text_chars, last_to, start);
            let text = substring(&self.text_chars, start, to);
            self.data.chunks.push(Chunk {
                index: chunk_no,
                text,
                from: start,
                to,
                space,
                sentence: None,
                fragments: Vec::new(),
                first_fragment_tower: None,
                last_fragment_tower: None,
                marked_text_start: Vec::new(),
                marked_text_end: Vec::new(),
            });
            chunk_no += 1;
            last_to = to;
        }
    }

    /// Marks chunks that open a new sentence (the second sentence onward).
    fn assign_sentences(&mut self) {
        let num_chunks = self.data.chunks.len();
        let mut chunk_no = 0usize;
        let mut sentence_no = 0usize;
        let mut past_first = false;
        let sentence_offsets = self.data.sentence_offsets.clone();
        for sent in &sentence_offsets {
            let from = sent.from;
            if chunk_no >= num_chunks {
                break;
            }
            if self.data.chunks[chunk_no].from > from {
                continue;
            }
            let mut chunk_idx = chunk_no;
            while chunk_no < num_chunks {
                chunk_idx = chunk_no;
                if self.data.chunks[chunk_no].from < from {
                    chunk_no += 1;
                } else {
                    break;
                }
            }
            chunk_no += 1;
            if past_first && from <= self.data.chunks[chunk_idx].from {
                let num_nl = self.data.chunks[chunk_idx]
                    .space
                    .matches('\n')
                    .count()
                    .max(1);
                sentence_no += num_nl;
                self.data.chunks[chunk_idx].sentence = Some(sentence_no);
            } else {
                past_first = true;
            }
        }
    }

    fn assign_fragments_to_chunks(&mut self, sorted: &[FragmentRef]) {
        if self.data.chunks.is_empty() {
            return;
        }
        let last_chunk = self.data.chunks.len() - 1;
        let mut current = 0usize;
        for fref in sorted {
            let to = self.data.fragment(*fref).to;
            while current < last_chunk && to > self.data.chunks[current].to {
                current += 1;
            }
            let chunk = &mut self.data.chunks[current];
            chunk.fragments.push(*fref);
            let (chunk_from, chunk_index) = (chunk.from, current);
            let chunk_text: Vec<char> = chunk.text.chars().collect();
            let span = &mut self.data.spans[fref.span];
            let fragment = &mut span.fragments[fref.fragment];
            fragment.chunk = chunk_index;
            fragment.text = substring(
                &chunk_text,
                fragment.from.saturating_sub(chunk_from),
                fragment.to.saturating_sub(chunk_from),
            );
        }
    }

    fn build_arcs(&mut self) {
        let keys: Vec<String> = self.data.event_descs.keys().cloned().collect();
        for key in keys {
            let desc = self.data.event_descs[&key].clone();
            let Some(origin_idx) = self.data.spans.get_index_of(&desc.origin) else {
                self.warn(format!(
                    "Trigger for event \"{}\" not found (please correct the source data)",
                    desc.origin
                ));
                continue;
            };
            let here = {
                let head = self.data.spans[origin_idx].head_fragment();
                head.from + head.to
            };
            for (role_ty, role_target) in &desc.roles {
                let Some(target_idx) = self.data.spans.get_index_of(role_target) else {
                    self.warn(format!(
                        "\"{}\" (referenced from \"{}\") not found (please correct the source data)",
                        role_target, desc.origin
                    ));
                    continue;
                };
                let there = {
                    let head = self.data.spans[target_idx].head_fragment();
                    head.from + head.to
                };
                let dist = here.abs_diff(there);
                let arc_no = self.data.arcs.len();
                self.data.arcs.push(Arc {
                    origin: desc.origin.clone(),
                    target: role_target.clone(),
                    ty: role_ty.clone(),
                    dist,
                    event_desc: key.clone(),
                    kind: desc.kind,
                    marked: None,
                });
                {
                    let origin = &mut self.data.spans[origin_idx];
                    origin.total_dist += dist;
                    origin.num_arcs += 1;
                    origin.outgoing.push(arc_no);
                }
                {
                    let target = &mut self.data.spans[target_idx];
                    target.total_dist += dist;
                    target.num_arcs += 1;
                    target.incoming.push(arc_no);
                }
                let arc_id = DocumentData::arc_id(&desc.origin, role_ty, role_target);
                self.data.arc_index.insert(arc_id, arc_no);
            }
        }
        // collect equiv chains for marker application
        let mut by_event_desc: FxHashMap<&str, usize> = FxHashMap::default();
        for (i, arc) in self.data.arcs.iter().enumerate() {
            by_event_desc.insert(arc.event_desc.as_str(), i);
        }
        let mut equiv_arcs: Vec<Vec<usize>> = Vec::new();
        for key in self.data.event_descs.keys() {
            if let Some(rest) = key.strip_prefix('*') {
                if let Some((equiv_no, _)) = rest.split_once('*') {
                    if let Ok(n) = equiv_no.parse::<usize>() {
                        while equiv_arcs.len() <= n {
                            equiv_arcs.push(Vec::new());
                        }
                        if let Some(&arc_no) = by_event_desc.get(key.as_str()) {
                            equiv_arcs[n].push(arc_no);
                        }
                    }
                }
            }
        }
        self.data.equiv_arcs = equiv_arcs;
    }

    fn apply_markers(&mut self, markers: &[Marker]) {
        for kind in [
            MarkKind::Edited,
            MarkKind::Focus,
            MarkKind::MatchFocus,
            MarkKind::Match,
        ] {
            for marker in markers.iter().filter(|m| m.kind == kind) {
                self.apply_marker(kind, &marker.target);
            }
        }
    }

    fn apply_marker(&mut self, kind: MarkKind, target: &MarkTarget) {
        match target {
            MarkTarget::Sentence(n) => {
                self.data.marked_sentences.insert(*n);
            }
            MarkTarget::TextRange(from, to) => {
                self.data.marked_text.push(MarkedRange {
                    from: *from,
                    to: *to,
                    kind,
                });
            }
            MarkTarget::Annotation(id) => {
                if self.data.spans.contains_key(id) {
                    self.data.spans[id.as_str()].marked = Some(kind);
                } else if let Some(desc) = self.data.event_descs.get(id) {
                    // a relation id: mark its arc
                    if let Some((role_ty, role_target)) = desc.roles.first() {
                        let arc_id = DocumentData::arc_id(&desc.origin, role_ty, role_target);
                        if let Some(&arc_no) = self.data.arc_index.get(&arc_id) {
                            self.data.arcs[arc_no].marked = Some(kind);
                        }
                    }
                } else if let Some((_, events)) = self.triggers.get(id) {
                    for event_id in events.clone() {
                        if let Some(span) = self.data.spans.get_mut(&event_id) {
                            span.marked = Some(kind);
                        }
                    }
                }
            }
            MarkTarget::Arc { origin, ty, target } => {
                let arc_id = DocumentData::arc_id(origin, ty, target);
                if let Some(&arc_no) = self.data.arc_index.get(&arc_id) {
                    self.data.arcs[arc_no].marked = Some(kind);
                }
            }
            MarkTarget::Equiv { ty, member } => {
                let chains: Vec<usize> = self
                    .data
                    .equiv_arcs
                    .iter()
                    .enumerate()
                    .filter(|(_, arcs)| {
                        arcs.iter().any(|&a| {
                            let arc = &self.data.arcs[a];
                            arc.ty == *ty
                                && (arc.origin == *member || arc.target == *member)
                        })
                    })
                    .map(|(i, _)| i)
                    .collect();
                for chain in chains {
                    for &arc_no in self.data.equiv_arcs[chain].clone().iter() {
                        self.data.arcs[arc_no].marked = Some(kind);
                    }
                }
            }
        }
    }

    /// Two preliminary passes settle first-order dependencies between chunk
    /// orderings, then the final pass fixes the draw order.
    fn settle_fragment_order(&mut self) {
        for _ in 0..2 {
            self.sort_chunk_fragments(|frag, no| frag.index_number = no);
            for span in self.data.spans.values_mut() {
                span.refed_index_sum = 0;
            }
            let sums: Vec<(String, usize)> = self
                .data
                .arcs
                .iter()
                .filter_map(|arc| {
                    let target = self.data.spans.get(&arc.target)?;
                    Some((arc.origin.clone(), target.head_fragment().index_number))
                })
                .collect();
            for (origin, idx) in sums {
                if let Some(span) = self.data.spans.get_mut(&origin) {
                    span.refed_index_sum += idx;
                }
            }
        }
        self.sort_chunk_fragments(|frag, no| frag.draw_order = no);

        let mut permutation: Vec<String> = self.data.spans.keys().cloned().collect();
        permutation.sort_by_key(|id| self.data.spans[id.as_str()].head_fragment().draw_order);
        self.data.span_draw_order = permutation;
    }

    fn sort_chunk_fragments(&mut self, assign: impl Fn(&mut Fragment, usize)) {
        let mut chunk_orders: Vec<Vec<FragmentRef>> = Vec::with_capacity(self.data.chunks.len());
        for chunk in &self.data.chunks {
            let mut frags = chunk.fragments.clone();
            frags.sort_by(|a, b| fragment_cmp(&self.data, *a, *b));
            chunk_orders.push(frags);
        }
        for (chunk_no, frags) in chunk_orders.into_iter().enumerate() {
            for (no, fref) in frags.iter().enumerate() {
                assign(
                    &mut self.data.spans[fref.span].fragments[fref.fragment],
                    no,
                );
            }
            self.data.chunks[chunk_no].fragments = frags;
        }
    }

    /// Fragments with identical offsets stack into one tower; only the first
    /// fragment drawn in a tower gets the curly brace.
    fn build_towers(&mut self, sorted: &mut Vec<FragmentRef>) {
        sorted.sort_by_key(|r| self.data.fragment(*r).midpoint_key());
        let mut last: Option<(usize, usize)> = None;
        let mut tower_id = 0usize;
        let mut any = false;
        for fref in sorted.iter() {
            let (from, to) = {
                let f = self.data.fragment(*fref);
                (f.from, f.to)
            };
            if last.is_some_and(|l| l != (from, to)) {
                tower_id += 1;
            }
            self.data.spans[fref.span].fragments[fref.fragment].tower_id = tower_id;
            last = Some((from, to));
            any = true;
        }
        let tower_count = if any { tower_id + 1 } else { 0 };
        self.data.towers = vec![Vec::new(); tower_count];

        let permutation = self.data.span_draw_order.clone();
        for span_id in &permutation {
            let span_idx = match self.data.spans.get_index_of(span_id) {
                Some(i) => i,
                None => continue,
            };
            let n_frags = self.data.spans[span_idx].fragments.len();
            for fragment in 0..n_frags {
                let tower = self.data.spans[span_idx].fragments[fragment].tower_id;
                if self.data.towers[tower].is_empty() {
                    self.data.spans[span_idx].fragments[fragment].draw_curly = true;
                    self.data.spans[span_idx].draw_curly = true;
                }
                self.data.towers[tower].push(FragmentRef {
                    span: span_idx,
                    fragment,
                });
            }
        }
    }

    /// Label text, abbreviation and attribute glyph decoration per fragment;
    /// also notes each chunk's first and last tower.
    fn decorate_fragments(&mut self) {
        for chunk_no in 0..self.data.chunks.len() {
            let frags = self.data.chunks[chunk_no].fragments.clone();
            for fref in &frags {
                let tower = self.data.fragment(*fref).tower_id;
                {
                    let chunk = &mut self.data.chunks[chunk_no];
                    if chunk.first_fragment_tower.is_none() {
                        chunk.first_fragment_tower = Some(tower);
                    }
                    chunk.last_fragment_tower = Some(tower);
                }

                let span_ty = self.data.spans[fref.span].ty.clone();
                let span_labels = self.registry.span_labels(&span_ty);
                let mut label_text = self.registry.span_display_form(&span_ty);
                let (frag_from, frag_to) = {
                    let f = self.data.fragment(*fref);
                    (f.from, f.to)
                };
                if self.options.abbrevs_on && !span_labels.is_empty() {
                    // pick the first abbreviation that roughly fits the text
                    let max_length = (frag_to - frag_from) as f64 / 0.8;
                    let mut label_idx = 1;
                    while label_text.chars().count() as f64 > max_length
                        && label_idx < span_labels.len()
                    {
                        label_text = span_labels[label_idx].clone();
                        label_idx += 1;
                    }
                }

                let mut pieces: Vec<LabelPiece> = Vec::new();
                let mut prefix = String::new();
                let mut postfix = String::new();
                let mut warning = false;
                let attributes = self.data.spans[fref.span].attributes.clone();
                for (attr_ty, val) in &attributes {
                    let Some(def) = self.registry.attribute_type(attr_ty) else {
                        warning = true;
                        continue;
                    };
                    let value_key = def
                        .bool_key()
                        .map(str::to_string)
                        .unwrap_or_else(|| value_text(val));
                    let Some(style) = def.values.get(&value_key) else {
                        warning = true;
                        continue;
                    };
                    if style.glyph.is_none()
                        && style.position.is_none()
                        && style.glyph_color.is_none()
                        && style.r#box.is_none()
                        && style.dash_array.is_none()
                    {
                        warning = true;
                        continue;
                    }
                    if let Some(glyph) = &style.glyph {
                        if style.position.as_deref() == Some("left") {
                            prefix = format!("{glyph}{prefix}");
                            pieces.insert(
                                0,
                                LabelPiece {
                                    text: glyph.clone(),
                                    glyph: true,
                                    warning: false,
                                },
                            );
                        } else {
                            postfix.push_str(glyph);
                        }
                    }
                }

                let mut text = label_text.clone();
                if !prefix.is_empty() {
                    text = format!("{prefix} {text}");
                    pieces.push(LabelPiece {
                        text: " ".to_string(),
                        glyph: false,
                        warning: false,
                    });
                }
                pieces.push(LabelPiece {
                    text: label_text.clone(),
                    glyph: false,
                    warning: false,
                });
                if !postfix.is_empty() {
                    text = format!("{text} {postfix}");
                    pieces.push(LabelPiece {
                        text: " ".to_string(),
                        glyph: false,
                        warning: false,
                    });
                    pieces.push(LabelPiece {
                        text: postfix.clone(),
                        glyph: true,
                        warning: false,
                    });
                }
                if warning {
                    text = format!("{text} #");
                    pieces.push(LabelPiece {
                        text: "#".to_string(),
                        glyph: true,
                        warning: true,
                    });
                }

                let fragment = &mut self.data.spans[fref.span].fragments[fref.fragment];
                fragment.label_text = label_text;
                fragment.glyphed_label_text = text;
                fragment.label_pieces = pieces;
            }
        }
    }

    /// Locates marked text ranges with respect to chunk boundaries.
    fn locate_marked_text(&mut self) {
        let text_len = self.text_chars.len();
        let num_chunks = self.data.chunks.len();
        for range in &mut self.data.marked_text {
            if range.to >= text_len {
                range.to = text_len.saturating_sub(1);
            }
            if range.from > range.to {
                range.from = range.to;
            }
        }
        self.data
            .marked_text
            .sort_by_key(|r| r.from);
        let marked = self.data.marked_text.clone();
        let mut start_chunk = 0usize;
        for (mark_no, range) in marked.iter().enumerate() {
            while start_chunk < num_chunks {
                let chunk = &self.data.chunks[start_chunk];
                if range.from <= chunk.to {
                    let offset = range.from as isize - chunk.from as isize;
                    self.data.chunks[start_chunk]
                        .marked_text_start
                        .push(MarkedTextStart {
                            mark_no,
                            offset,
                            kind: range.kind,
                        });
                    break;
                }
                start_chunk += 1;
            }
            if start_chunk == num_chunks {
                self.warn("Wrong text offset".to_string());
                continue;
            }
            let mut current = start_chunk;
            while current < num_chunks {
                let chunk = &self.data.chunks[current];
                if range.to <= chunk.to {
                    let offset = range.to as isize - chunk.from as isize;
                    self.data.chunks[current]
                        .marked_text_end
                        .push(MarkedTextEnd { mark_no, offset });
                    break;
                }
                current += 1;
            }
            if current == num_chunks {
                self.warn("Wrong text offset".to_string());
                if let Some(chunk) = self.data.chunks.last_mut() {
                    let offset = chunk.text.chars().count() as isize;
                    chunk.marked_text_end.push(MarkedTextEnd { mark_no, offset });
                }
            }
        }
    }
}

fn apply_comment(
    comment: &mut Option<Comment>,
    annotator_notes: &mut Option<String>,
    shadow_class: &mut Option<String>,
    ty: &str,
    text: &str,
) {
    match comment {
        Some(existing) => {
            existing.ty = ty.to_string();
            existing.text = format!("{}\n{}", existing.text, text);
        }
        None => {
            *comment = Some(Comment {
                ty: ty.to_string(),
                text: text.to_string(),
            });
        }
    }
    if ty == "AnnotatorNotes" {
        *annotator_notes = Some(text.to_string());
    }
    if comment_priority(Some(ty)) > comment_priority(shadow_class.as_deref()) {
        *shadow_class = Some(ty.to_string());
    }
}

/// Draw ordering within a chunk. Spans with more fragments sort first, short
/// arc distances before long, fewer arcs before more, then a width rule
/// (wider below when arcs are involved, shorter below otherwise), then the
/// referenced-index sum, then the type name for a stable final tiebreak.
fn fragment_cmp(data: &DocumentData, a: FragmentRef, b: FragmentRef) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let a_span = data.span_at(a.span);
    let b_span = data.span_at(b.span);
    let a_frag = &a_span.fragments[a.fragment];
    let b_frag = &b_span.fragments[b.fragment];

    match a_span.fragments.len().cmp(&b_span.fragments.len()) {
        Ordering::Less => return Ordering::Greater,
        Ordering::Greater => return Ordering::Less,
        Ordering::Equal => {}
    }
    match a_span
        .avg_dist
        .partial_cmp(&b_span.avg_dist)
        .unwrap_or(Ordering::Equal)
    {
        Ordering::Equal => {}
        other => return other,
    }
    match a_span.num_arcs.cmp(&b_span.num_arcs) {
        Ordering::Equal => {}
        other => return other,
    }
    let ad = a_frag.to - a_frag.from;
    let bd = b_frag.to - b_frag.from;
    let width_cmp = if a_span.num_arcs == 0 && b_span.num_arcs == 0 {
        bd.cmp(&ad)
    } else {
        ad.cmp(&bd)
    };
    match width_cmp {
        Ordering::Less => return Ordering::Greater,
        Ordering::Greater => return Ordering::Less,
        Ordering::Equal => {}
    }
    match a_span.refed_index_sum.cmp(&b_span.refed_index_sum) {
        Ordering::Equal => {}
        other => return other,
    }
    a_span.ty.cmp(&b_span.ty)
}

/// Builds the document model. Recoverable problems come back as warnings;
/// the caller decides how to surface them.
pub fn build(
    source: &SourceDocument,
    registry: &TypeRegistry,
    markers: &[Marker],
    options: &BuildOptions,
) -> (DocumentData, Vec<DataWarning>) {
    let mut builder = Builder {
        registry,
        options,
        warnings: Vec::new(),
        data: DocumentData {
            text: source.text.clone(),
            ..DocumentData::default()
        },
        text_chars: source.text.chars().collect(),
        triggers: FxHashMap::default(),
    };
    builder.data.sentence_offsets = source
        .sentence_offsets
        .clone()
        .unwrap_or_else(|| sentence_split(&source.text));
    builder.data.token_offsets = source
        .token_offsets
        .clone()
        .unwrap_or_else(|| tokenise(&source.text));

    builder.collect_spans(source);
    builder.collect_equivs(source);
    builder.collect_relations(source);
    builder.collect_attributes(source);
    builder.collect_comments(source);
    builder.collect_normalizations(source);

    let mut sorted = builder.sorted_fragment_refs();
    builder.build_chunks(&sorted);
    builder.assign_sentences();
    builder.assign_fragments_to_chunks(&sorted);
    builder.build_arcs();
    builder.apply_markers(markers);

    // average arc distance and joined span text
    for span in builder.data.spans.values_mut() {
        span.avg_dist = if span.num_arcs > 0 {
            span.total_dist as f64 / span.num_arcs as f64
        } else {
            0.0
        };
        span.text = span
            .fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("");
    }

    builder.settle_fragment_order();
    builder.build_towers(&mut sorted);
    builder.decorate_fragments();
    builder.locate_marked_text();

    tracing::debug!(
        target: "selkie::document",
        spans = builder.data.spans.len(),
        chunks = builder.data.chunks.len(),
        arcs = builder.data.arcs.len(),
        towers = builder.data.towers.len(),
        "document model built"
    );
    (builder.data, builder.warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;

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

    fn doc(json: &str) -> SourceDocument {
        serde_json::from_str(json).unwrap()
    }

    fn build_simple(json: &str) -> (DocumentData, Vec<DataWarning>) {
        build(&doc(json), &registry(), &[], &BuildOptions::default())
    }

    #[test]
    fn tokenise_splits_on_whitespace() {
        assert_eq!(
            tokenise("ab  cd\ne"),
            vec![CharSpan::new(0, 2), CharSpan::new(4, 6), CharSpan::new(7, 8)]
        );
    }

    #[test]
    fn sentence_split_breaks_on_newlines() {
        assert_eq!(
            sentence_split("One two.\nThree.\n"),
            vec![CharSpan::new(0, 8), CharSpan::new(9, 15)]
        );
    }

    #[test]
    fn tokens_inside_a_span_merge_into_one_chunk() {
        let (data, warnings) = build_simple(
            r#"{
                "text": "New York is large.",
                "entities": [["T1", "Organization", [[0, 8]]]]
            }"#,
        );
        assert!(warnings.is_empty());
        let texts: Vec<&str> = data.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["New York", "is", "large."]);
        assert_eq!(data.fragment(data.chunks[0].fragments[0]).chunk, 0);
    }

    #[test]
    fn identical_offsets_share_a_tower_and_one_curly() {
        let (data, _) = build_simple(
            r#"{
                "text": "word here",
                "entities": [
                    ["T1", "Person", [[0, 4]]],
                    ["T2", "Organization", [[0, 4]]],
                    ["T3", "Person", [[5, 9]]]
                ]
            }"#,
        );
        let t1 = data.spans["T1"].fragments[0].tower_id;
        let t2 = data.spans["T2"].fragments[0].tower_id;
        let t3 = data.spans["T3"].fragments[0].tower_id;
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);
        let curlies = data.towers[t1]
            .iter()
            .filter(|r| data.fragment(**r).draw_curly)
            .count();
        assert_eq!(curlies, 1);
    }

    #[test]
    fn discontiguous_span_head_is_last_fragment() {
        let (data, _) = build_simple(
            r#"{
                "text": "alpha beta gamma",
                "entities": [["T1", "Person", [[11, 16], [0, 5]]]]
            }"#,
        );
        let span = &data.spans["T1"];
        assert_eq!(span.fragments[0].from, 0);
        assert_eq!(span.head_fragment().from, 11);
        assert_eq!(span.whole_from, 0);
        assert_eq!(span.whole_to, 16);
    }

    #[test]
    fn equiv_chain_produces_n_minus_one_arcs_in_midpoint_order() {
        let (data, _) = build_simple(
            r#"{
                "text": "aa bb cc",
                "entities": [
                    ["T1", "Person", [[0, 2]]],
                    ["T2", "Person", [[3, 5]]],
                    ["T3", "Person", [[6, 8]]]
                ],
                "equivs": [["*", "Equiv", "T3", "T1", "T2"]]
            }"#,
        );
        assert_eq!(data.arcs.len(), 2);
        assert_eq!(data.arcs[0].origin, "T1");
        assert_eq!(data.arcs[0].target, "T2");
        assert_eq!(data.arcs[1].origin, "T2");
        assert_eq!(data.arcs[1].target, "T3");
        assert!(data.arcs.iter().all(|a| a.kind == ArcKind::Equiv));
        assert_eq!(data.equiv_arcs, vec![vec![0, 1]]);
    }

    #[test]
    fn relation_arguments_follow_configured_role_order() {
        let (data, _) = build_simple(
            r#"{
                "text": "aa bb",
                "entities": [
                    ["T1", "Person", [[0, 2]]],
                    ["T2", "Person", [[3, 5]]]
                ],
                "relations": [["R1", "Anaphora", [["Entity", "T1"], ["Anaphor", "T2"]]]]
            }"#,
        );
        assert_eq!(data.arcs.len(), 1);
        // Anaphor is the configured first role, so T2 is the origin
        assert_eq!(data.arcs[0].origin, "T2");
        assert_eq!(data.arcs[0].target, "T1");
        assert_eq!(data.arcs[0].kind, ArcKind::Relation);
    }

    #[test]
    fn missing_references_warn_and_drop() {
        let (data, warnings) = build_simple(
            r#"{
                "text": "aa bb",
                "entities": [["T1", "Person", [[0, 2]]]],
                "relations": [["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T9"]]]],
                "attributes": [["A1", "Negation", "T9"]],
                "normalizations": [["N1", "Reference", "T9", "db", "id", "t"]]
            }"#,
        );
        assert_eq!(data.arcs.len(), 0);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.message.contains("T9")));
    }

    #[test]
    fn event_arcs_update_distance_statistics() {
        let (data, _) = build_simple(
            r#"{
                "text": "sale of shares",
                "entities": [["T2", "Organization", [[8, 14]]]],
                "triggers": [["T1", "Person", [[0, 4]]]],
                "events": [["E1", "T1", [["Theme", "T2"]]]]
            }"#,
        );
        let e1 = &data.spans["E1"];
        assert_eq!(e1.kind, SpanKind::Event);
        assert_eq!(e1.num_arcs, 1);
        assert!(e1.avg_dist > 0.0);
        assert_eq!(data.arcs[0].ty, "Theme");
        assert_eq!(
            data.arc_index[&DocumentData::arc_id("E1", "Theme", "T2")],
            0
        );
    }

    #[test]
    fn comment_priority_decides_shadow_class() {
        let (data, _) = build_simple(
            r#"{
                "text": "aa",
                "entities": [["T1", "Person", [[0, 2]]]],
                "comments": [
                    ["T1", "AnnotatorNotes", "note one"],
                    ["T1", "Warning", "watch out"]
                ]
            }"#,
        );
        let span = &data.spans["T1"];
        // AnnotatorNotes outranks Warning even though Warning came later
        assert_eq!(span.shadow_class.as_deref(), Some("AnnotatorNotes"));
        assert_eq!(span.annotator_notes.as_deref(), Some("note one"));
        assert!(span.comment.as_ref().unwrap().text.contains("watch out"));
    }

    #[test]
    fn sentence_starts_mark_chunks() {
        let (data, _) = build_simple(
            r#"{
                "text": "One two.\nThree four.",
                "entities": []
            }"#,
        );
        let sentence_chunks: Vec<usize> = data
            .chunks
            .iter()
            .filter_map(|c| c.sentence)
            .collect();
        assert_eq!(sentence_chunks, vec![1]);
        assert_eq!(data.chunks[2].sentence, Some(1));
    }

    #[test]
    fn fragment_width_breaks_ordering_ties() {
        // with arcs the wider fragment draws first, closer to the arcs
        let (data, _) = build_simple(
            r#"{
                "text": "aabb cc",
                "entities": [
                    ["T1", "Person", [[0, 4]]],
                    ["T2", "Person", [[1, 3]]],
                    ["T3", "Person", [[5, 7]]]
                ],
                "relations": [
                    ["R1", "Anaphora", [["Anaphor", "T1"], ["Entity", "T3"]]],
                    ["R2", "Anaphora", [["Anaphor", "T2"], ["Entity", "T3"]]]
                ]
            }"#,
        );
        let chunk = &data.chunks[0];
        let first = data.fragment(chunk.fragments[0]);
        let second = data.fragment(chunk.fragments[1]);
        assert!(first.to - first.from > second.to - second.from);

        // without arcs the narrower fragment draws first instead
        let (data, _) = build_simple(
            r#"{
                "text": "aabb cc",
                "entities": [
                    ["T1", "Person", [[0, 4]]],
                    ["T2", "Person", [[1, 3]]]
                ]
            }"#,
        );
        let chunk = &data.chunks[0];
        let first = data.fragment(chunk.fragments[0]);
        let second = data.fragment(chunk.fragments[1]);
        assert!(first.to - first.from < second.to - second.from);
    }

    #[test]
    fn text_range_markers_locate_chunk_boundaries() {
        let markers = vec![Marker {
            kind: MarkKind::Focus,
            target: MarkTarget::TextRange(3, 7),
        }];
        let (data, _) = build(
            &doc(r#"{"text": "aa bb cc", "entities": []}"#),
            &registry(),
            &markers,
            &BuildOptions::default(),
        );
        let starts: Vec<usize> = data
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.marked_text_start.is_empty())
            .map(|(i, _)| i)
            .collect();
        let ends: Vec<usize> = data
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.marked_text_end.is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(starts, vec![1]);
        assert_eq!(ends, vec![2]);
    }

    #[test]
    fn marked_span_and_sentence() {
        let markers = vec![
            Marker {
                kind: MarkKind::Focus,
                target: MarkTarget::Annotation("T1".to_string()),
            },
            Marker {
                kind: MarkKind::Match,
                target: MarkTarget::Sentence(2),
            },
        ];
        let (data, _) = build(
            &doc(r#"{"text": "aa bb", "entities": [["T1", "Person", [[0, 2]]]]}"#),
            &registry(),
            &markers,
            &BuildOptions::default(),
        );
        assert_eq!(data.spans["T1"].marked, Some(MarkKind::Focus));
        assert!(data.marked_sentences.contains(&2));
    }
}
