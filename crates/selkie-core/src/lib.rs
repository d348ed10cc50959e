//! Core document model for annotated-text visualization.
//!
//! This crate turns annotation payloads (entities, triggers, events,
//! relations, equivalence classes, attributes, comments, normalizations)
//! plus a collection configuration into a draw-ready document model:
//! fragments grouped into chunks and towers, arcs with distance statistics,
//! and a settled in-chunk draw order. Geometry and SVG live in the render
//! crate.

#![forbid(unsafe_code)]

pub mod color;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod params;
pub mod payload;

pub use config::{CollectionConfig, TypeRegistry};
pub use document::{BuildOptions, DataWarning, DocumentData, MarkKind, MarkTarget, Marker};
pub use error::{Error, Result};
pub use payload::SourceDocument;
