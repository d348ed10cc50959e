//! Stand-off annotation payload.
//!
//! Documents arrive as JSON in the brat wire shape: the text plus parallel
//! lists of annotation rows, each row a heterogeneous array. Rows decode into
//! named-field structs here; arity or type mismatches surface as decode
//! errors rather than propagating half-formed rows into the model builder.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-open character range `[from, to)` into the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct CharSpan {
    pub from: usize,
    pub to: usize,
}

impl From<(usize, usize)> for CharSpan {
    fn from((from, to): (usize, usize)) -> Self {
        Self { from, to }
    }
}

impl From<CharSpan> for (usize, usize) {
    fn from(s: CharSpan) -> Self {
        (s.from, s.to)
    }
}

impl CharSpan {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

/// `["T1", "Person", [[0, 5], [12, 17]]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "(String, String, Vec<CharSpan>)")]
pub struct EntityRow {
    pub id: String,
    pub ty: String,
    pub offsets: Vec<CharSpan>,
}

impl From<(String, String, Vec<CharSpan>)> for EntityRow {
    fn from((id, ty, offsets): (String, String, Vec<CharSpan>)) -> Self {
        Self { id, ty, offsets }
    }
}

/// Event argument: `["Theme", "T4"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "(String, String)")]
pub struct RoleArg {
    pub role: String,
    pub target: String,
}

impl From<(String, String)> for RoleArg {
    fn from((role, target): (String, String)) -> Self {
        Self { role, target }
    }
}

/// `["E1", "T3", [["Org1", "T1"], ["Org2", "T2"]]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "(String, String, Vec<RoleArg>)")]
pub struct EventRow {
    pub id: String,
    pub trigger: String,
    pub args: Vec<RoleArg>,
}

impl From<(String, String, Vec<RoleArg>)> for EventRow {
    fn from((id, trigger, args): (String, String, Vec<RoleArg>)) -> Self {
        Self { id, trigger, args }
    }
}

/// `["R1", "Coref", [["Arg1", "T1"], ["Arg2", "T2"]]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "(String, String, Vec<RoleArg>)")]
pub struct RelationRow {
    pub id: String,
    pub ty: String,
    pub first: RoleArg,
    pub second: RoleArg,
}

impl TryFrom<(String, String, Vec<RoleArg>)> for RelationRow {
    type Error = String;

    fn try_from((id, ty, args): (String, String, Vec<RoleArg>)) -> std::result::Result<Self, String> {
        let mut it = args.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(first), Some(second), None) => Ok(Self {
                id,
                ty,
                first,
                second,
            }),
            _ => Err(format!("relation {id} must have exactly two arguments")),
        }
    }
}

/// `["*", "Equiv", "T1", "T2", "T3"]` — first element is a placeholder id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct EquivRow {
    pub ty: String,
    pub members: Vec<String>,
}

impl TryFrom<Vec<String>> for EquivRow {
    type Error = String;

    fn try_from(row: Vec<String>) -> std::result::Result<Self, String> {
        if row.len() < 4 {
            return Err(format!(
                "equiv row needs a type and at least two members, got {} elements",
                row.len()
            ));
        }
        let mut it = row.into_iter();
        let _placeholder = it.next();
        let ty = match it.next() {
            Some(t) => t,
            None => return Err("equiv row missing type".to_string()),
        };
        Ok(Self {
            ty,
            members: it.collect(),
        })
    }
}

/// `["A1", "Negation", "E1"]` or `["A2", "Confidence", "E2", "High"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<serde_json::Value>")]
pub struct AttributeRow {
    pub id: String,
    pub ty: String,
    pub target: String,
    /// `Bool(true)` for binary attributes given without a value.
    pub value: serde_json::Value,
}

impl TryFrom<Vec<serde_json::Value>> for AttributeRow {
    type Error = String;

    fn try_from(row: Vec<serde_json::Value>) -> std::result::Result<Self, String> {
        if row.len() < 3 || row.len() > 4 {
            return Err(format!(
                "attribute row needs 3 or 4 elements, got {}",
                row.len()
            ));
        }
        let as_str = |v: &serde_json::Value, what: &str| -> std::result::Result<String, String> {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("attribute row {what} must be a string"))
        };
        let id = as_str(&row[0], "id")?;
        let ty = as_str(&row[1], "type")?;
        let target = as_str(&row[2], "target")?;
        let value = row
            .get(3)
            .cloned()
            .unwrap_or(serde_json::Value::Bool(true));
        Ok(Self {
            id,
            ty,
            target,
            value,
        })
    }
}

/// Comment target: an annotation id, or a sentence index via `["sent", 3]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentTarget {
    Annotation(String),
    Marker(String, usize),
}

impl CommentTarget {
    pub fn sentence(&self) -> Option<usize> {
        match self {
            CommentTarget::Marker(kind, index) if kind == "sent" => Some(*index),
            _ => None,
        }
    }
}

/// `["T1", "AnnotatorNotes", "dubious"]` or `[["sent", 2], "Warning", "..."]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "(CommentTarget, String, Option<String>)")]
pub struct CommentRow {
    pub target: CommentTarget,
    pub ty: String,
    pub text: String,
}

impl From<(CommentTarget, String, Option<String>)> for CommentRow {
    fn from((target, ty, text): (CommentTarget, String, Option<String>)) -> Self {
        Self {
            target,
            ty,
            text: text.unwrap_or_default(),
        }
    }
}

/// `["N1", "Reference", "T1", "Wikipedia", "Q23", "England"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "(String, String, String, String, String, Option<String>)")]
pub struct NormalizationRow {
    pub id: String,
    pub ty: String,
    pub target: String,
    pub refdb: String,
    pub refid: String,
    pub reftext: String,
}

impl From<(String, String, String, String, String, Option<String>)> for NormalizationRow {
    fn from(
        (id, ty, target, refdb, refid, reftext): (
            String,
            String,
            String,
            String,
            String,
            Option<String>,
        ),
    ) -> Self {
        Self {
            id,
            ty,
            target,
            refdb,
            refid,
            reftext: reftext.unwrap_or_default(),
        }
    }
}

/// A document plus its stand-off annotations, as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<EntityRow>,
    #[serde(default)]
    pub triggers: Vec<EntityRow>,
    #[serde(default)]
    pub events: Vec<EventRow>,
    #[serde(default)]
    pub relations: Vec<RelationRow>,
    #[serde(default)]
    pub equivs: Vec<EquivRow>,
    #[serde(default)]
    pub attributes: Vec<AttributeRow>,
    #[serde(default)]
    pub comments: Vec<CommentRow>,
    #[serde(default)]
    pub normalizations: Vec<NormalizationRow>,
    #[serde(default)]
    pub sentence_offsets: Option<Vec<CharSpan>>,
    #[serde(default)]
    pub token_offsets: Option<Vec<CharSpan>>,
}

impl SourceDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Payload {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_rows_decode_from_tuples() {
        let doc: SourceDocument = serde_json::from_str(
            r#"{
                "text": "Ed O'Kelley shot Bob Ford.",
                "entities": [
                    ["T1", "Person", [[0, 11]]],
                    ["T2", "Person", [[17, 25]]]
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.entities[0].id, "T1");
        assert_eq!(doc.entities[0].ty, "Person");
        assert_eq!(doc.entities[0].offsets, vec![CharSpan::new(0, 11)]);
    }

    #[test]
    fn relation_rows_require_two_arguments() {
        let bad = serde_json::from_str::<SourceDocument>(
            r#"{"text": "x", "relations": [["R1", "Coref", [["Arg1", "T1"]]]]}"#,
        );
        let err = bad.unwrap_err().to_string();
        assert!(err.contains("R1"), "error should name the row: {err}");
    }

    #[test]
    fn equiv_rows_keep_members_in_order() {
        let doc: SourceDocument = serde_json::from_str(
            r#"{"text": "x", "equivs": [["*", "Equiv", "T3", "T1", "T2"]]}"#,
        )
        .unwrap();
        assert_eq!(doc.equivs[0].ty, "Equiv");
        assert_eq!(doc.equivs[0].members, vec!["T3", "T1", "T2"]);
    }

    #[test]
    fn attribute_rows_default_to_boolean_true() {
        let doc: SourceDocument = serde_json::from_str(
            r#"{"text": "x", "attributes": [["A1", "Negation", "E1"]]}"#,
        )
        .unwrap();
        assert_eq!(doc.attributes[0].value, serde_json::Value::Bool(true));
    }

    #[test]
    fn sentence_comments_use_marker_targets() {
        let doc: SourceDocument = serde_json::from_str(
            r#"{"text": "x", "comments": [[["sent", 2], "Warning", "check this"]]}"#,
        )
        .unwrap();
        assert_eq!(doc.comments[0].target.sentence(), Some(2));
    }
}
