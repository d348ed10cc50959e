#![forbid(unsafe_code)]

//! `selkie` is a headless, brat-style text annotation visualizer.
//!
//! Feed it a collection configuration (types, colors, labels) and a stand-off
//! annotation payload (entities, events, relations, attributes, comments) and
//! it builds the document model, lays spans and arcs out over wrapped text,
//! and renders a standalone SVG. All communication with the host happens over
//! an explicit [`Dispatcher`]; there is no global state, and a handle owns
//! the full render session.
//!
//! ```no_run
//! use selkie::dispatcher::Dispatcher;
//! use selkie::{embed, CollectionConfig, SourceDocument};
//!
//! # fn main() -> Result<(), selkie::EmbedError> {
//! let document = SourceDocument {
//!     text: "Hello world".to_string(),
//!     ..SourceDocument::default()
//! };
//! let handle = embed(Dispatcher::new(), 800.0, CollectionConfig::default(), document)?;
//! println!("{}", handle.svg());
//! # Ok(())
//! # }
//! ```

use std::rc::Rc;

use serde_json::{json, Value};

pub use selkie_core::*;

use selkie_core::dispatcher::{messages, Dispatcher, Owner};
use selkie_core::document::{build, DataWarning};

pub mod render {
    pub use selkie_render::parse_tree;
    pub use selkie_render::{
        layout, render, ArcHit, DeterministicTextMeasurer, Density, Fonts, InteractionIndex,
        LayoutDocument, LayoutInput, RenderedDocument, SpanHit, TextMeasurer, TextStyle, Visual,
    };
}

use render::{DeterministicTextMeasurer, Fonts, InteractionIndex, LayoutInput, RenderedDocument, Visual};

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error(transparent)]
    Data(#[from] selkie_core::Error),
    #[error(transparent)]
    Render(#[from] selkie_render::Error),
}

pub type EmbedResult<T> = std::result::Result<T, EmbedError>;

/// What a hover or search hit points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightTarget {
    Span(String),
    Arc {
        origin: String,
        ty: String,
        target: String,
    },
}

/// Everything lit up by one highlight request. Span hovers reach one arc hop
/// out to the connected spans; arc hovers light only the two endpoints.
#[derive(Debug, Clone, Default)]
pub struct HighlightSet {
    pub spans: Vec<String>,
    pub arcs: Vec<(String, String, String)>,
}

/// One render session: source payload, configuration, and the latest output.
///
/// Dropping the handle unregisters its dispatcher handlers.
pub struct EmbedHandle {
    dispatcher: Rc<Dispatcher>,
    owner: Owner,
    registry: TypeRegistry,
    source: SourceDocument,
    build_options: BuildOptions,
    markers: Vec<Marker>,
    hover_markers: Vec<Marker>,
    measurer: DeterministicTextMeasurer,
    fonts: Fonts,
    visual: Visual,
    canvas_width: f64,
    data: DocumentData,
    rendered: RenderedDocument,
    warnings: Vec<DataWarning>,
    drawing: bool,
    redraw: bool,
}

/// Builds the model, lays it out and renders it, posting lifecycle messages
/// (`collectionLoaded`, `dataReady`, `startedRendering`, `doneRendering`) on
/// the given dispatcher. Returns a handle for re-rendering and interaction.
pub fn embed(
    dispatcher: Rc<Dispatcher>,
    canvas_width: f64,
    collection: CollectionConfig,
    document: SourceDocument,
) -> EmbedResult<EmbedHandle> {
    let registry = TypeRegistry::from_collection(&collection);
    dispatcher.post(messages::COLLECTION_LOADED, &Value::Null);
    let owner = dispatcher.owner();
    let mut handle = EmbedHandle {
        dispatcher,
        owner,
        registry,
        source: document,
        build_options: BuildOptions::default(),
        markers: Vec::new(),
        hover_markers: Vec::new(),
        measurer: DeterministicTextMeasurer::default(),
        fonts: Fonts::default(),
        visual: Visual::standard(),
        canvas_width,
        data: DocumentData::default(),
        rendered: RenderedDocument::default(),
        warnings: Vec::new(),
        drawing: false,
        redraw: false,
    };
    handle.render_pass()?;
    Ok(handle)
}

impl EmbedHandle {
    /// The latest rendered SVG document.
    pub fn svg(&self) -> &str {
        &self.rendered.svg
    }

    pub fn width(&self) -> f64 {
        self.rendered.width
    }

    pub fn height(&self) -> f64 {
        self.rendered.height
    }

    /// Hit boxes for spans and arc labels in the latest render.
    pub fn interaction(&self) -> &InteractionIndex {
        &self.rendered.interaction
    }

    /// The document model behind the latest render.
    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    /// Data warnings collected while building the latest model.
    pub fn warnings(&self) -> &[DataWarning] {
        &self.warnings
    }

    /// Registers a `doneRendering` handler under this handle's owner token.
    pub fn on_done_rendering<F>(&self, handler: F)
    where
        F: Fn(&Value) + 'static,
    {
        self.dispatcher
            .on(messages::DONE_RENDERING, self.owner, handler);
    }

    /// Re-renders at a new canvas width.
    pub fn rerender(&mut self, canvas_width: f64) -> EmbedResult<()> {
        self.canvas_width = canvas_width;
        self.render_pass()
    }

    /// Replaces the document payload and re-renders. The previous model is
    /// discarded wholesale.
    pub fn set_document(&mut self, document: SourceDocument) -> EmbedResult<()> {
        self.source = document;
        self.hover_markers.clear();
        self.render_pass()
    }

    /// Replaces the persistent markers (edited/focus/match flags) and
    /// re-renders.
    pub fn set_markers(&mut self, markers: Vec<Marker>) -> EmbedResult<()> {
        self.markers = markers;
        self.render_pass()
    }

    pub fn set_visual(&mut self, visual: Visual) -> EmbedResult<()> {
        self.visual = visual;
        self.render_pass()
    }

    /// Lights up the target plus its one-hop neighborhood, re-renders with
    /// pulse animations attached, and posts `mouseover` plus the matching
    /// comment-display message. The reachability is one hop, not transitive.
    pub fn highlight(&mut self, target: &HighlightTarget) -> EmbedResult<HighlightSet> {
        let set = self.one_hop(target);
        self.hover_markers = set
            .spans
            .iter()
            .map(|id| Marker {
                kind: MarkKind::Focus,
                target: MarkTarget::Annotation(id.clone()),
            })
            .chain(set.arcs.iter().map(|(origin, ty, tgt)| Marker {
                kind: MarkKind::Focus,
                target: MarkTarget::Arc {
                    origin: origin.clone(),
                    ty: ty.clone(),
                    target: tgt.clone(),
                },
            }))
            .collect();
        self.render_pass()?;

        match target {
            HighlightTarget::Span(id) => {
                self.dispatcher
                    .post(messages::MOUSE_OVER, &json!({ "span": id }));
                if let Some(span) = self.data.spans.get(id) {
                    let comment = span
                        .comment
                        .as_ref()
                        .map(|c| json!({ "type": c.ty, "text": c.text }));
                    self.dispatcher.post(
                        messages::DISPLAY_SPAN_COMMENT,
                        &json!({
                            "id": id,
                            "type": span.ty,
                            "text": span.text,
                            "comment": comment,
                            "annotatorNotes": span.annotator_notes,
                            "normalizations": span.normalizations,
                        }),
                    );
                }
            }
            HighlightTarget::Arc { origin, ty, target } => {
                self.dispatcher.post(
                    messages::MOUSE_OVER,
                    &json!({ "arc": [origin, ty, target] }),
                );
                self.dispatcher.post(
                    messages::DISPLAY_ARC_COMMENT,
                    &json!({ "origin": origin, "type": ty, "target": target }),
                );
            }
        }
        Ok(set)
    }

    /// Clears any hover highlight and posts `mouseout`.
    pub fn clear_highlight(&mut self) -> EmbedResult<()> {
        if !self.hover_markers.is_empty() {
            self.hover_markers.clear();
            self.render_pass()?;
        }
        self.dispatcher.post(messages::MOUSE_OUT, &Value::Null);
        Ok(())
    }

    fn one_hop(&self, target: &HighlightTarget) -> HighlightSet {
        let mut set = HighlightSet::default();
        let mut add_span = |set: &mut HighlightSet, id: &str| {
            if !set.spans.iter().any(|s| s == id) {
                set.spans.push(id.to_string());
            }
        };
        match target {
            HighlightTarget::Span(id) => {
                add_span(&mut set, id);
                for arc in &self.data.arcs {
                    if arc.origin == *id {
                        add_span(&mut set, &arc.target);
                    } else if arc.target == *id {
                        add_span(&mut set, &arc.origin);
                    } else {
                        continue;
                    }
                    set.arcs
                        .push((arc.origin.clone(), arc.ty.clone(), arc.target.clone()));
                }
            }
            HighlightTarget::Arc { origin, ty, target } => {
                add_span(&mut set, origin);
                add_span(&mut set, target);
                set.arcs.push((origin.clone(), ty.clone(), target.clone()));
            }
        }
        set
    }

    /// A render requested while one is in flight sets the redraw flag and
    /// returns; the active pass loops at most once more.
    fn render_pass(&mut self) -> EmbedResult<()> {
        if self.drawing {
            self.redraw = true;
            return Ok(());
        }
        self.drawing = true;
        let result = self.render_loop();
        self.drawing = false;
        if let Err(e) = &result {
            self.redraw = false;
            tracing::error!(target: "selkie", error = %e, "render pass failed");
            self.dispatcher
                .post(messages::RENDER_ERROR_FATAL, &json!({ "error": e.to_string() }));
        }
        result
    }

    fn render_loop(&mut self) -> EmbedResult<()> {
        loop {
            self.redraw = false;
            self.dispatcher
                .post(messages::STARTED_RENDERING, &Value::Null);
            if !self.canvas_width.is_finite() || self.canvas_width <= 0.0 {
                return Err(selkie_render::Error::InvalidModel {
                    message: format!("canvas width must be positive, got {}", self.canvas_width),
                }
                .into());
            }

            let mut all_markers = self.markers.clone();
            all_markers.extend(self.hover_markers.iter().cloned());
            let (data, warnings) =
                build(&self.source, &self.registry, &all_markers, &self.build_options);
            self.dispatcher.post(messages::DATA_READY, &Value::Null);
            if !warnings.is_empty() {
                let batch: Vec<Value> = warnings
                    .iter()
                    .map(|w| json!([w.message, "warning"]))
                    .collect();
                self.dispatcher
                    .post(messages::MESSAGES, &Value::Array(batch));
            }

            let input = LayoutInput {
                data: &data,
                registry: &self.registry,
                measurer: &self.measurer,
                fonts: &self.fonts,
                visual: self.visual,
                canvas_width: self.canvas_width,
            };
            let laid_out = render::layout(&input);
            let rendered = render::render(&input, &laid_out);

            self.data = data;
            self.warnings = warnings;
            self.rendered = rendered;
            self.dispatcher
                .post(messages::DONE_RENDERING, &Value::Null);
            if !self.redraw {
                return Ok(());
            }
        }
    }
}

impl Drop for EmbedHandle {
    fn drop(&mut self) {
        self.dispatcher.off(self.owner);
    }
}
