//! Collection configuration: the type inventory a document is drawn against.
//!
//! The collection payload carries hierarchical entity/event type definitions
//! (visual styling, display labels, allowed arcs) plus relation and attribute
//! type tables. They flatten into a [`TypeRegistry`] for O(1) lookup during
//! model building and rendering.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Key under which collections configure fallback span styling.
pub const SPAN_DEFAULT: &str = "SPAN_DEFAULT";
/// Key under which collections configure fallback arc styling.
pub const ARC_DEFAULT: &str = "ARC_DEFAULT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcTypeDef {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub dash_array: Option<String>,
    #[serde(default)]
    pub arrow_head: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanTypeDef {
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub fg_color: Option<String>,
    /// A color, or the keyword `darken` (derive from the background).
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub arcs: Vec<ArcTypeDef>,
    #[serde(default)]
    pub children: Vec<SpanTypeDef>,
    #[serde(default)]
    pub unused: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationProperties {
    #[serde(default)]
    pub symmetric: bool,
    #[serde(default)]
    pub transitive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationArgDef {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationTypeDef {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub dash_array: Option<String>,
    #[serde(default)]
    pub arrow_head: Option<String>,
    #[serde(default)]
    pub properties: RelationProperties,
    #[serde(default)]
    pub args: Vec<RelationArgDef>,
}

/// Visual treatment of one attribute value (glyph annotations on span labels,
/// box restyling, dash patterns).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValueStyle {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub glyph: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub glyph_color: Option<String>,
    #[serde(default)]
    pub r#box: Option<String>,
    #[serde(default)]
    pub dash_array: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeTypeDef {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub values: IndexMap<String, AttributeValueStyle>,
    #[serde(default)]
    pub unused: bool,
}

impl AttributeTypeDef {
    /// Binary attributes declare exactly one value, keyed by the attribute
    /// name; any payload value selects that entry.
    pub fn bool_key(&self) -> Option<&str> {
        if self.values.len() == 1 {
            self.values.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ty)
    }
}

/// The collection payload as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub entity_types: Vec<SpanTypeDef>,
    #[serde(default)]
    pub event_types: Vec<SpanTypeDef>,
    #[serde(default)]
    pub relation_types: Vec<RelationTypeDef>,
    #[serde(default)]
    pub unconfigured_types: Vec<SpanTypeDef>,
    #[serde(default)]
    pub entity_attribute_types: Vec<AttributeTypeDef>,
    #[serde(default)]
    pub event_attribute_types: Vec<AttributeTypeDef>,
}

impl CollectionConfig {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Payload {
            message: e.to_string(),
        })
    }
}

/// Flattened style for one span type.
#[derive(Debug, Clone, Default)]
pub struct SpanStyle {
    pub ty: String,
    pub labels: Vec<String>,
    pub bg_color: Option<String>,
    pub fg_color: Option<String>,
    pub border_color: Option<String>,
    pub arcs: FxHashMap<String, ArcTypeDef>,
    pub unused: bool,
}

fn type_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)(\d*)$").unwrap())
}

/// Splits a type name into its base and a trailing numeric suffix
/// (`"Arg2"` -> `("Arg", "2")`). Numbered variants of a type fall back to the
/// unnumbered definition for labels and styling.
pub fn split_type_number(ty: &str) -> (&str, &str) {
    match type_suffix_re().captures(ty) {
        Some(caps) => {
            let base = caps.get(1).map_or("", |m| m.as_str());
            let num = caps.get(2).map_or("", |m| m.as_str());
            (base, num)
        }
        None => (ty, ""),
    }
}

/// Flattened, lookup-oriented view of a [`CollectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    span_types: FxHashMap<String, SpanStyle>,
    relation_types: FxHashMap<String, RelationTypeDef>,
    attribute_types: FxHashMap<String, AttributeTypeDef>,
    event_type_names: FxHashMap<String, ()>,
}

impl TypeRegistry {
    pub fn from_collection(config: &CollectionConfig) -> Self {
        let mut reg = TypeRegistry::default();
        for def in config
            .entity_types
            .iter()
            .chain(&config.unconfigured_types)
        {
            reg.load_span_types(def, false);
        }
        for def in &config.event_types {
            reg.load_span_types(def, true);
        }
        for def in &config.relation_types {
            reg.relation_types.insert(def.ty.clone(), def.clone());
        }
        for def in config
            .entity_attribute_types
            .iter()
            .chain(&config.event_attribute_types)
        {
            reg.attribute_types.insert(def.ty.clone(), def.clone());
        }
        reg
    }

    fn load_span_types(&mut self, def: &SpanTypeDef, is_event: bool) {
        if !def.ty.is_empty() {
            let mut arcs = FxHashMap::default();
            for arc in &def.arcs {
                arcs.insert(arc.ty.clone(), arc.clone());
            }
            let style = SpanStyle {
                ty: def.ty.clone(),
                labels: if def.labels.is_empty() {
                    def.name.clone().into_iter().collect()
                } else {
                    def.labels.clone()
                },
                bg_color: def.bg_color.clone(),
                fg_color: def.fg_color.clone(),
                border_color: def.border_color.clone(),
                arcs,
                unused: def.unused,
            };
            self.span_types.insert(def.ty.clone(), style);
            if is_event {
                self.event_type_names.insert(def.ty.clone(), ());
            }
        }
        for child in &def.children {
            self.load_span_types(child, is_event);
        }
    }

    pub fn is_event_type(&self, ty: &str) -> bool {
        self.event_type_names.contains_key(ty)
    }

    /// Span style lookup with numeric-suffix fallback, then `SPAN_DEFAULT`.
    pub fn span_style(&self, ty: &str) -> Option<&SpanStyle> {
        if let Some(s) = self.span_types.get(ty) {
            return Some(s);
        }
        let (base, num) = split_type_number(ty);
        if !num.is_empty() {
            if let Some(s) = self.span_types.get(base) {
                return Some(s);
            }
        }
        self.span_types.get(SPAN_DEFAULT)
    }

    pub fn default_span_style(&self) -> Option<&SpanStyle> {
        self.span_types.get(SPAN_DEFAULT)
    }

    /// Exact relation lookup, no suffix fallback. Argument reordering keys
    /// on the declared type name alone.
    pub fn relation_type_exact(&self, ty: &str) -> Option<&RelationTypeDef> {
        self.relation_types.get(ty)
    }

    pub fn relation_type(&self, ty: &str) -> Option<&RelationTypeDef> {
        if let Some(r) = self.relation_types.get(ty) {
            return Some(r);
        }
        let (base, num) = split_type_number(ty);
        if !num.is_empty() {
            return self.relation_types.get(base);
        }
        None
    }

    pub fn attribute_type(&self, ty: &str) -> Option<&AttributeTypeDef> {
        self.attribute_types.get(ty)
    }

    /// Role order for a relation type, from the declaration order of its
    /// `args`. Roles not declared sort after declared ones.
    pub fn relation_role_rank(&self, relation_ty: &str, role: &str) -> usize {
        match self.relation_type(relation_ty) {
            Some(def) => def
                .args
                .iter()
                .position(|a| a.role == role)
                .unwrap_or(def.args.len()),
            None => usize::MAX,
        }
    }

    /// Display label candidates for a span type, longest first. Numbered
    /// variants fall back to the unnumbered type's labels.
    pub fn span_labels(&self, ty: &str) -> Vec<String> {
        if let Some(s) = self.span_types.get(ty) {
            if !s.labels.is_empty() {
                return s.labels.clone();
            }
        }
        let (base, num) = split_type_number(ty);
        if !num.is_empty() {
            if let Some(s) = self.span_types.get(base) {
                if !s.labels.is_empty() {
                    return s.labels.iter().map(|l| format!("{l}{num}")).collect();
                }
            }
        }
        Vec::new()
    }

    /// The preferred (longest) display form for a span type; the type name
    /// itself when no labels are configured.
    pub fn span_display_form(&self, ty: &str) -> String {
        self.span_labels(ty)
            .into_iter()
            .next()
            .unwrap_or_else(|| ty.to_string())
    }

    /// Display label candidates for an arc type, checking the origin span
    /// type's arc table first, then the relation table.
    pub fn arc_labels(&self, origin_span_ty: &str, arc_ty: &str) -> Vec<String> {
        let (base, num) = split_type_number(arc_ty);
        let from_arcs = |style: &SpanStyle| -> Option<Vec<String>> {
            if let Some(arc) = style.arcs.get(arc_ty) {
                if !arc.labels.is_empty() {
                    return Some(arc.labels.clone());
                }
            }
            if !num.is_empty() {
                if let Some(arc) = style.arcs.get(base) {
                    if !arc.labels.is_empty() {
                        return Some(
                            arc.labels.iter().map(|l| format!("{l}{num}")).collect(),
                        );
                    }
                }
            }
            None
        };
        if let Some(style) = self.span_types.get(origin_span_ty) {
            if let Some(labels) = from_arcs(style) {
                return labels;
            }
        }
        if let Some(def) = self.relation_types.get(arc_ty) {
            if !def.labels.is_empty() {
                return def.labels.clone();
            }
        }
        if !num.is_empty() {
            if let Some(def) = self.relation_types.get(base) {
                if !def.labels.is_empty() {
                    return def.labels.iter().map(|l| format!("{l}{num}")).collect();
                }
            }
        }
        Vec::new()
    }

    pub fn arc_display_form(&self, origin_span_ty: &str, arc_ty: &str) -> String {
        self.arc_labels(origin_span_ty, arc_ty)
            .into_iter()
            .next()
            .unwrap_or_else(|| arc_ty.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> CollectionConfig {
        serde_json::from_str(
            r##"{
                "entity_types": [
                    {
                        "type": "Person",
                        "labels": ["Person", "Per"],
                        "bgColor": "#ffccaa",
                        "borderColor": "darken",
                        "children": [
                            {"type": "Politician", "labels": ["Politician", "Pol"]}
                        ]
                    }
                ],
                "relation_types": [
                    {
                        "type": "Anaphora",
                        "labels": ["Anaphora", "Ana"],
                        "dashArray": "3,3",
                        "args": [
                            {"role": "Anaphor", "targets": ["Person"]},
                            {"role": "Entity", "targets": ["Person"]}
                        ]
                    }
                ],
                "event_attribute_types": [
                    {
                        "type": "Negation",
                        "values": {"Negation": {"box": "crossed"}}
                    }
                ]
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn nested_types_flatten() {
        let reg = TypeRegistry::from_collection(&sample_config());
        assert!(reg.span_style("Politician").is_some());
        assert_eq!(reg.span_display_form("Politician"), "Politician");
    }

    #[test]
    fn numeric_suffix_falls_back_and_reattaches() {
        let reg = TypeRegistry::from_collection(&sample_config());
        assert_eq!(reg.span_labels("Person2"), vec!["Person2", "Per2"]);
        assert_eq!(reg.span_display_form("Unknown"), "Unknown");
    }

    #[test]
    fn relation_roles_rank_by_declaration_order() {
        let reg = TypeRegistry::from_collection(&sample_config());
        assert_eq!(reg.relation_role_rank("Anaphora", "Anaphor"), 0);
        assert_eq!(reg.relation_role_rank("Anaphora", "Entity"), 1);
        assert!(reg.relation_role_rank("Anaphora", "Other") >= 2);
    }

    #[test]
    fn split_type_number_handles_plain_and_numbered() {
        assert_eq!(split_type_number("Arg2"), ("Arg", "2"));
        assert_eq!(split_type_number("Theme"), ("Theme", ""));
        assert_eq!(split_type_number(""), ("", ""));
    }
}
