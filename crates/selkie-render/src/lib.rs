#![forbid(unsafe_code)]

//! Layout and SVG rendering for annotated text documents.
//!
//! Takes the document model produced by `selkie-core`, measures text with a
//! pluggable [`TextMeasurer`], wraps chunks into rows, stacks span boxes and
//! routes arcs above the text, and emits a standalone SVG with interaction
//! metadata. A separate [`parse_tree`] module renders bracketed constituency
//! parses.

pub mod floors;
pub mod layout;
pub mod nesting;
pub mod parse_tree;
pub mod svg;
pub mod text;
pub mod theme;

mod error;

pub use error::{Error, Result};
pub use layout::{layout, Fonts, LayoutDocument, LayoutInput, Rect};
pub use svg::{render, ArcHit, InteractionIndex, RenderedDocument, SpanHit};
pub use text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
pub use theme::{Density, Visual};
