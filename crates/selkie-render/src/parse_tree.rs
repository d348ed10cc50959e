//! Constituency parse tree viewer.
//!
//! Independent of the span/arc pipeline: a bracketed parse string such as
//! `(S (NP (DT the) (NN dog)) (VP (VBZ barks)))` becomes a tree, every node
//! learns which token range it covers, and a small hierarchical layout puts
//! leaves in reading order with each parent centered over its children.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::text::{TextMeasurer, TextStyle};

use crate::svg::util::{escape_xml, fmt};

const LEVEL_HEIGHT: f64 = 36.0;
const LEAF_GAP: f64 = 14.0;
const MARGIN: f64 = 10.0;
const NODE_COLOR: &str = "#2e5c87";
const WORD_COLOR: &str = "#000000";
const EDGE_COLOR: &str = "#999999";

/// One node of a parsed constituency tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
    pub label: String,
    /// The surface token, present on preterminal nodes only.
    pub word: Option<String>,
    pub children: Vec<ParseNode>,
    /// Covered token indices, inclusive on both ends.
    pub token_range: (usize, usize),
}

impl ParseNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of tokens under this node.
    pub fn token_count(&self) -> usize {
        self.token_range.1 - self.token_range.0 + 1
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::ParseTree {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// A bare atom: anything up to whitespace or a bracket.
    fn atom(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|&b| b != b'(' && b != b')' && !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn node(&mut self, next_token: &mut usize) -> Result<ParseNode> {
        self.skip_ws();
        if self.peek() != Some(b'(') {
            return Err(self.error("expected '('"));
        }
        self.pos += 1;
        self.skip_ws();
        let label = self.atom().to_string();
        self.skip_ws();

        let mut children = Vec::new();
        let mut word = None;
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'(') => {
                    children.push(self.node(next_token)?);
                    self.skip_ws();
                }
                Some(_) => {
                    if word.is_some() || !children.is_empty() {
                        return Err(self.error("token after the first child"));
                    }
                    let w = self.atom();
                    if w.is_empty() {
                        return Err(self.error("empty token"));
                    }
                    word = Some(w.to_string());
                    self.skip_ws();
                }
                None => return Err(self.error("unclosed '('")),
            }
        }

        let token_range = if children.is_empty() {
            let idx = *next_token;
            *next_token += 1;
            (idx, idx)
        } else {
            (
                children[0].token_range.0,
                children[children.len() - 1].token_range.1,
            )
        };
        Ok(ParseNode {
            label,
            word,
            children,
            token_range,
        })
    }
}

/// Parses one bracketed constituency parse. Leaf nodes are numbered in
/// reading order, so `token_range` indexes line up with the tokenised text.
pub fn parse(input: &str) -> Result<ParseNode> {
    let mut parser = Parser::new(input);
    let mut next_token = 0usize;
    let root = parser.node(&mut next_token)?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(parser.error("trailing input after the tree"));
    }
    Ok(root)
}

/// Hit box for one rendered tree node.
#[derive(Debug, Clone)]
pub struct NodeHit {
    pub label: String,
    pub token_range: (usize, usize),
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ParseTreeSvg {
    pub svg: String,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeHit>,
}

struct Placed {
    label: String,
    word: Option<String>,
    token_range: (usize, usize),
    x: f64,
    y: f64,
    label_width: f64,
    parent: Option<usize>,
}

fn depth(node: &ParseNode) -> usize {
    1 + node.children.iter().map(depth).max().unwrap_or(0)
}

fn place(
    node: &ParseNode,
    rank: usize,
    parent: Option<usize>,
    cursor: &mut f64,
    measurer: &dyn TextMeasurer,
    style: &TextStyle,
    out: &mut Vec<Placed>,
) -> usize {
    let label_width = measurer.measure(&node.label, style).width;
    let idx = out.len();
    out.push(Placed {
        label: node.label.clone(),
        word: node.word.clone(),
        token_range: node.token_range,
        x: 0.0,
        y: MARGIN + rank as f64 * LEVEL_HEIGHT,
        label_width,
        parent,
    });

    if node.is_leaf() {
        let word_width = node
            .word
            .as_deref()
            .map(|w| measurer.measure(w, style).width)
            .unwrap_or(0.0);
        let cell = label_width.max(word_width);
        out[idx].x = *cursor + cell / 2.0;
        *cursor += cell + LEAF_GAP;
    } else {
        let mut sum = 0.0;
        for child in &node.children {
            let c = place(child, rank + 1, Some(idx), cursor, measurer, style, out);
            sum += out[c].x;
        }
        out[idx].x = sum / node.children.len() as f64;
    }
    idx
}

/// Lays the tree out and renders it as a standalone SVG. Every node carries
/// a `data-token-range` attribute for interaction wiring.
pub fn render(root: &ParseNode, measurer: &dyn TextMeasurer, style: &TextStyle) -> ParseTreeSvg {
    let mut placed = Vec::new();
    let mut cursor = MARGIN;
    place(root, 0, None, &mut cursor, measurer, style, &mut placed);

    let metrics = measurer.measure("Xg", style);
    let levels = depth(root);
    // words hang one rank below the deepest preterminal
    let height = MARGIN * 2.0 + (levels + 1) as f64 * LEVEL_HEIGHT;
    let width = placed
        .iter()
        .map(|p| p.x + p.label_width / 2.0)
        .fold(cursor, f64::max)
        + MARGIN;

    let mut svg = String::with_capacity(4 * 1024);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = fmt(width),
        h = fmt(height),
    );

    svg.push_str(r#"<g class="edges">"#);
    for p in &placed {
        if let Some(parent) = p.parent {
            let pp = &placed[parent];
            let _ = write!(
                svg,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{EDGE_COLOR}"/>"#,
                fmt(pp.x),
                fmt(pp.y + 4.0),
                fmt(p.x),
                fmt(p.y - metrics.height),
            );
        }
        if p.word.is_some() {
            let word_y = MARGIN + levels as f64 * LEVEL_HEIGHT;
            let _ = write!(
                svg,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{EDGE_COLOR}" stroke-dasharray="2,2"/>"#,
                fmt(p.x),
                fmt(p.y + 4.0),
                fmt(p.x),
                fmt(word_y - metrics.height),
            );
        }
    }
    svg.push_str("</g>");

    let mut nodes = Vec::with_capacity(placed.len());
    svg.push_str(r#"<g class="nodes">"#);
    for p in &placed {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="{NODE_COLOR}" data-token-range="{}-{}">{}</text>"#,
            fmt(p.x),
            fmt(p.y),
            fmt(style.font_size),
            p.token_range.0,
            p.token_range.1,
            escape_xml(&p.label),
        );
        if let Some(word) = &p.word {
            let word_y = MARGIN + levels as f64 * LEVEL_HEIGHT;
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="{WORD_COLOR}" data-token-range="{t}-{t}">{}</text>"#,
                fmt(p.x),
                fmt(word_y),
                fmt(style.font_size),
                escape_xml(word),
                t = p.token_range.0,
            );
        }
        nodes.push(NodeHit {
            label: p.label.clone(),
            token_range: p.token_range,
            x: p.x - p.label_width / 2.0,
            y: p.y - metrics.ascent,
            width: p.label_width,
            height: metrics.height,
        });
    }
    svg.push_str("</g>");
    svg.push_str("</svg>");

    ParseTreeSvg {
        svg,
        width,
        height,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::DeterministicTextMeasurer;

    const SENTENCE: &str = "(S (NP (DT the) (NN dog)) (VP (VBZ barks)))";

    #[test]
    fn parses_nested_brackets() {
        let tree = parse(SENTENCE).unwrap();
        assert_eq!(tree.label, "S");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].label, "NP");
        assert_eq!(tree.children[0].children[0].word.as_deref(), Some("the"));
    }

    #[test]
    fn leaves_number_tokens_in_reading_order() {
        let tree = parse(SENTENCE).unwrap();
        assert_eq!(tree.token_range, (0, 2));
        assert_eq!(tree.children[0].token_range, (0, 1));
        assert_eq!(tree.children[1].token_range, (2, 2));
        let mut leaves = Vec::new();
        fn collect(n: &ParseNode, out: &mut Vec<usize>) {
            if n.is_leaf() {
                out.push(n.token_range.0);
            }
            for c in &n.children {
                collect(c, out);
            }
        }
        collect(&tree, &mut leaves);
        assert_eq!(leaves, vec![0, 1, 2]);
    }

    #[test]
    fn unbalanced_input_reports_the_position() {
        let err = parse("(S (NP").unwrap_err();
        match err {
            Error::ParseTree { pos, .. } => assert_eq!(pos, 6),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse("(S (NN dog)) extra").is_err());
    }

    #[test]
    fn parent_sits_centered_over_its_children() {
        let tree = parse(SENTENCE).unwrap();
        let measurer = DeterministicTextMeasurer::default();
        let style = TextStyle::sized(12.0);
        let out = render(&tree, &measurer, &style);
        assert!(out.svg.contains(r#"data-token-range="0-2""#));
        let root = &out.nodes[0];
        let np = &out.nodes[1];
        let vp = out
            .nodes
            .iter()
            .find(|n| n.label == "VP")
            .expect("VP node");
        let root_cx = root.x + root.width / 2.0;
        let np_cx = np.x + np.width / 2.0;
        let vp_cx = vp.x + vp.width / 2.0;
        assert!((root_cx - (np_cx + vp_cx) / 2.0).abs() < 1e-6);
        assert!(np_cx < vp_cx);
    }

    #[test]
    fn empty_root_label_is_allowed() {
        let tree = parse("( (S (NN dog)))").unwrap();
        assert_eq!(tree.label, "");
        assert_eq!(tree.children[0].label, "S");
    }
}
