//! End-to-end tests through the `embed` entry point.

use std::cell::RefCell;
use std::rc::Rc;

use selkie::dispatcher::{messages, Dispatcher};
use selkie::{embed, CollectionConfig, EmbedHandle, HighlightTarget, SourceDocument};

fn collection() -> CollectionConfig {
    serde_json::from_str(
        r##"{
            "entity_types": [
                {"type": "Person", "labels": ["Person", "Per"], "bgColor": "#7fa2ff"},
                {"type": "ANIMAL", "labels": ["Animal"], "bgColor": "#ccff88"},
                {"type": "A", "labels": ["A"]},
                {"type": "B", "labels": ["B"]}
            ],
            "relation_types": [
                {
                    "type": "subject",
                    "labels": ["subject", "subj"],
                    "args": [
                        {"role": "subj", "targets": ["Person"]},
                        {"role": "obj", "targets": ["Person"]}
                    ]
                }
            ],
            "entity_attribute_types": [
                {"type": "Negation", "values": {"Negation": {"glyph": "X"}}}
            ]
        }"##,
    )
    .unwrap()
}

fn document(json: &str) -> SourceDocument {
    serde_json::from_str(json).unwrap()
}

fn embed_default(json: &str) -> EmbedHandle {
    embed(Dispatcher::new(), 800.0, collection(), document(json)).unwrap()
}

#[test]
fn plain_text_produces_chunks_but_no_annotation_geometry() {
    let handle = embed_default(r#"{"text": "One sentence here.\nAnd another one."}"#);
    let data = handle.data();
    assert!(!data.chunks.is_empty());
    for chunk in &data.chunks {
        assert!(chunk.fragments.is_empty());
        assert_eq!(&data.text[chunk.from..chunk.to], chunk.text);
    }
    assert!(data.arcs.is_empty());
    assert!(data.spans.is_empty());
    assert!(handle.height() > 0.0);
}

#[test]
fn entity_keeps_its_word_in_a_single_chunk() {
    let handle = embed_default(
        r#"{
            "text": "My dog likes sausage.",
            "entities": [["T1", "ANIMAL", [[3, 6]]]]
        }"#,
    );
    let data = handle.data();
    let span = &data.spans["T1"];
    let chunk = &data.chunks[span.fragments[0].chunk];
    assert_eq!(chunk.text, "dog");
    assert_eq!((chunk.from, chunk.to), (3, 6));
}

#[test]
fn tower_ids_are_equal_exactly_when_offsets_are_equal() {
    let handle = embed_default(
        r#"{
            "text": "abc defg",
            "entities": [
                ["T1", "A", [[0, 3]]],
                ["T2", "B", [[0, 3]]],
                ["T3", "A", [[4, 8]]]
            ]
        }"#,
    );
    let data = handle.data();
    let tower = |id: &str| data.spans[id].fragments[0].tower_id;
    assert_eq!(tower("T1"), tower("T2"));
    assert_ne!(tower("T1"), tower("T3"));
    let curlies = ["T1", "T2"]
        .iter()
        .filter(|id| data.spans[**id].fragments[0].draw_curly)
        .count();
    assert_eq!(curlies, 1);
}

#[test]
fn fragments_stay_inside_their_chunks() {
    let handle = embed_default(
        r#"{
            "text": "Ed saw the dog of his dreams yesterday.",
            "entities": [
                ["T1", "Person", [[0, 2]]],
                ["T2", "ANIMAL", [[7, 14]]],
                ["T3", "A", [[11, 14], [22, 28]]]
            ]
        }"#,
    );
    let data = handle.data();
    for (_, span) in &data.spans {
        for fragment in &span.fragments {
            let chunk = &data.chunks[fragment.chunk];
            assert!(chunk.from <= fragment.from);
            assert!(fragment.to <= chunk.to);
        }
    }
}

#[test]
fn relation_distance_uses_head_fragment_midpoints() {
    let handle = embed_default(
        r#"{
            "text": "aaaaa bbbb cccccc",
            "entities": [
                ["E1", "Person", [[11, 15]]],
                ["E2", "Person", [[0, 5]]]
            ],
            "relations": [["R1", "subject", [["subj", "E1"], ["obj", "E2"]]]]
        }"#,
    );
    let data = handle.data();
    assert_eq!(data.arcs.len(), 1);
    let arc = &data.arcs[0];
    assert_eq!(arc.origin, "E1");
    assert_eq!(arc.target, "E2");
    // |(11+15) - (0+5)| = 21
    assert_eq!(arc.dist, 21);

    // the span with the lower midpoint sits on the left
    let hit = |id: &str| {
        handle
            .interaction()
            .spans
            .iter()
            .find(|h| h.span_id == id)
            .map(|h| h.rect.x)
            .unwrap()
    };
    assert!(hit("E2") < hit("E1"));
}

#[test]
fn rendering_twice_with_the_same_inputs_is_identical() {
    let json = r#"{
        "text": "Ed shot Bob. Bob died.",
        "entities": [
            ["T1", "Person", [[0, 2]]],
            ["T2", "Person", [[8, 11]]]
        ],
        "relations": [["R1", "subject", [["subj", "T1"], ["obj", "T2"]]]]
    }"#;
    let first = embed_default(json);
    let second = embed_default(json);
    assert_eq!(first.svg(), second.svg());

    let mut third = embed_default(json);
    third.rerender(800.0).unwrap();
    assert_eq!(first.svg(), third.svg());
}

#[test]
fn dangling_attribute_reference_warns_but_still_renders() {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let dispatcher = Dispatcher::new();
    {
        let log = Rc::clone(&log);
        dispatcher.on(messages::MESSAGES, dispatcher.owner(), move |args| {
            log.borrow_mut().push(args.to_string());
        });
    }
    let handle = embed(
        dispatcher,
        800.0,
        collection(),
        document(
            r#"{
                "text": "Ed shot Bob.",
                "entities": [["T1", "Person", [[0, 2]]]],
                "attributes": [["A1", "Negation", "T99"]]
            }"#,
        ),
    )
    .unwrap();
    assert!(!handle.warnings().is_empty());
    assert!(log.borrow().iter().any(|m| m.contains("T99")));
    assert!(handle.svg().contains(r#"data-span-id="T1""#));
}

#[test]
fn canvas_narrower_than_the_widest_chunk_still_renders() {
    let handle = embed(
        Dispatcher::new(),
        10.0,
        collection(),
        document(r#"{"text": "supercalifragilisticexpialidocious indeed"}"#),
    )
    .unwrap();
    assert!(handle.svg().contains("supercalifragilisticexpialidocious"));
    assert!(handle.data().chunks.len() >= 2);
    assert!(handle.height() > 0.0);
}

#[test]
fn lifecycle_messages_post_in_order() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let dispatcher = Dispatcher::new();
    let owner = dispatcher.owner();
    for name in [
        messages::COLLECTION_LOADED,
        messages::STARTED_RENDERING,
        messages::DATA_READY,
        messages::DONE_RENDERING,
    ] {
        let log = Rc::clone(&log);
        dispatcher.on(name, owner, move |_| log.borrow_mut().push(name));
    }
    let _handle = embed(
        dispatcher,
        800.0,
        collection(),
        document(r#"{"text": "hi"}"#),
    )
    .unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            messages::COLLECTION_LOADED,
            messages::STARTED_RENDERING,
            messages::DATA_READY,
            messages::DONE_RENDERING,
        ]
    );
}

#[test]
fn span_highlight_reaches_one_hop_only() {
    let mut handle = embed_default(
        r#"{
            "text": "aa bb cc",
            "entities": [
                ["T1", "Person", [[0, 2]]],
                ["T2", "Person", [[3, 5]]],
                ["T3", "Person", [[6, 8]]]
            ],
            "relations": [
                ["R1", "subject", [["subj", "T1"], ["obj", "T2"]]],
                ["R2", "subject", [["subj", "T2"], ["obj", "T3"]]]
            ]
        }"#,
    );
    let set = handle
        .highlight(&HighlightTarget::Span("T1".to_string()))
        .unwrap();
    assert_eq!(set.spans, vec!["T1".to_string(), "T2".to_string()]);
    assert_eq!(set.arcs.len(), 1);
    assert!(handle.svg().contains(r#"begin="indefinite""#));

    handle.clear_highlight().unwrap();
    assert!(!handle.svg().contains(r#"begin="indefinite""#));
}

#[test]
fn arc_highlight_lights_only_the_endpoints() {
    let mut handle = embed_default(
        r#"{
            "text": "aa bb cc",
            "entities": [
                ["T1", "Person", [[0, 2]]],
                ["T2", "Person", [[3, 5]]],
                ["T3", "Person", [[6, 8]]]
            ],
            "relations": [["R1", "subject", [["subj", "T1"], ["obj", "T2"]]]]
        }"#,
    );
    let set = handle
        .highlight(&HighlightTarget::Arc {
            origin: "T1".to_string(),
            ty: "subject".to_string(),
            target: "T2".to_string(),
        })
        .unwrap();
    assert_eq!(set.spans, vec!["T1".to_string(), "T2".to_string()]);
}

#[test]
fn fatal_render_error_resets_the_drawing_flag() {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let dispatcher = Dispatcher::new();
    {
        let log = Rc::clone(&log);
        dispatcher.on(messages::RENDER_ERROR_FATAL, dispatcher.owner(), move |args| {
            log.borrow_mut().push(args.to_string());
        });
    }
    let mut handle = embed(
        dispatcher,
        800.0,
        collection(),
        document(r#"{"text": "hi"}"#),
    )
    .unwrap();
    assert!(handle.rerender(0.0).is_err());
    assert_eq!(log.borrow().len(), 1);
    // a later attempt at a sane width goes through
    handle.rerender(640.0).unwrap();
    assert!(handle.svg().contains("hi"));
}

#[test]
fn new_document_discards_the_previous_model() {
    let mut handle = embed_default(
        r#"{
            "text": "Ed shot Bob.",
            "entities": [["T1", "Person", [[0, 2]]]]
        }"#,
    );
    assert!(handle.svg().contains(r#"data-span-id="T1""#));
    handle
        .set_document(document(r#"{"text": "nothing annotated"}"#))
        .unwrap();
    assert!(handle.data().spans.is_empty());
    assert!(!handle.svg().contains("data-span-id"));
    assert!(handle.svg().contains("annotated"));
}
