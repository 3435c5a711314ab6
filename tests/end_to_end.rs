use std::sync::Arc;

use zonepad::pdf::{GeometryBackend, Granularity, NativeRange};
use zonepad::placement::{PlacementError, PlacementTarget};
use zonepad::session::Session;
use zonepad::settings::Settings;
use zonepad::store::{JsonFileStore, MemoryStore, TextBoxStore};
use zonepad::test_utils::test_helpers::{GeometryBuilder, run};

fn open(builder: &GeometryBuilder, settings: &Settings) -> Session<MemoryStore> {
    let mut session = Session::with_backend(
        Arc::new(GeometryBackend),
        builder.bytes(),
        settings,
        MemoryStore::new(),
        1,
    )
    .unwrap();
    session.show_current_page().unwrap();
    session
}

#[test]
fn hello_world_drag_selects_both_words() {
    let doc = GeometryBuilder::new().page(vec![run("Hello World", 100.0, 700.0, 12.0, 9.0)]);
    let mut session = open(&doc, &Settings::default());

    let layer = Arc::clone(session.text_layer().unwrap());
    let words: Vec<_> = layer
        .fragments()
        .iter()
        .filter(|f| !f.is_whitespace())
        .collect();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0].text, "Hello");
    assert_eq!(words[1].text, "World");
    assert!(words[0].left < words[1].left);
    assert_eq!(words[0].top, 691.0);

    session.pointer_down(90.0, 680.0);
    let selection = session.pointer_up(200.0, 710.0).unwrap();
    assert_eq!(selection.text, "Hello World");
    assert_eq!(selection.fragments.len(), 2);
}

#[test]
fn zoom_change_rebuilds_every_fragment_at_new_scale() {
    let doc = GeometryBuilder::new().page(vec![
        run("alpha beta", 100.0, 700.0, 12.0, 9.0),
        run("gamma", 100.0, 650.0, 12.0, 9.0),
    ]);
    let mut session = open(&doc, &Settings::default());
    let old = Arc::clone(session.text_layer().unwrap());

    session.on_zoom_change(1.5).unwrap();
    let new = session.text_layer().unwrap();

    assert_eq!(new.viewport().scale, 1.5);
    assert_eq!(new.len(), old.len());
    for (before, after) in old.fragments().iter().zip(new.fragments()) {
        assert!((after.left - before.left * 1.5).abs() < 1e-3);
        assert!((after.height - before.height * 1.5).abs() < 1e-3);
    }
    assert!(session.page().unwrap().viewport.matches(0, 1.5));
}

#[test]
fn selection_text_is_in_reading_order() {
    let doc = GeometryBuilder::new().page(vec![
        run("third", 100.0, 300.0, 12.0, 9.0),
        run("second", 200.0, 200.0, 12.0, 9.0),
        run("first", 100.0, 200.0, 12.0, 9.0),
    ]);
    let mut session = open(&doc, &Settings::default());

    // Drag from bottom-right to top-left.
    session.pointer_down(400.0, 320.0);
    session.pointer_move(250.0, 250.0);
    let selection = session.pointer_up(50.0, 150.0).unwrap();
    assert_eq!(selection.text, "first second third");
}

#[test]
fn overlapping_runs_keep_one_fragment_per_cell() {
    let doc = GeometryBuilder::new().page(vec![
        run(" ", 100.0, 700.0, 12.0, 9.0),
        run("Bold", 100.0, 700.0, 12.0, 9.0),
        run("Bold", 100.2, 700.1, 12.0, 9.0),
    ]);
    let session = open(&doc, &Settings::default());
    let layer = session.text_layer().unwrap();
    assert_eq!(layer.len(), 1);
    assert_eq!(layer.fragments()[0].text, "Bold");
}

#[test]
fn glyph_granularity_joins_adjacent_letters() {
    let settings = Settings {
        granularity: Granularity::Glyph,
        ..Settings::default()
    };
    let doc = GeometryBuilder::new().page(vec![run("ab cd", 100.0, 700.0, 12.0, 9.0)]);
    let mut session = open(&doc, &settings);

    session.pointer_down(90.0, 680.0);
    let selection = session.pointer_up(200.0, 710.0).unwrap();
    assert_eq!(selection.text, "ab cd");
}

#[test]
fn native_range_is_cleaned_of_repeated_glyphs() {
    let doc = GeometryBuilder::new().page(vec![run("Wooooow great", 100.0, 700.0, 12.0, 9.0)]);
    let mut session = open(&doc, &Settings::default());
    let selection = session
        .select_native(NativeRange {
            anchor: 0,
            focus: 2,
        })
        .unwrap();
    assert_eq!(selection.text, "Woow great");
}

#[test]
fn swot_placement_stacks_and_rejects_unknown_zone() {
    let doc = GeometryBuilder::new().page(vec![run("Fast growth", 100.0, 700.0, 12.0, 9.0)]);
    let mut session = open(&doc, &Settings::default());
    session.set_template(Some("swot"));

    let strengths = PlacementTarget::Zone("strengths".to_string());
    let first = session
        .on_request_placement("Fast growth", &strengths)
        .unwrap();
    assert_eq!((first.x, first.y), (50.0, 50.0));
    assert_eq!(first.zone.as_deref(), Some("strengths"));

    let second = session
        .on_request_placement("Loyal customers", &strengths)
        .unwrap();
    assert_eq!((second.x, second.y), (50.0, 150.0));

    let err = session
        .on_request_placement("x", &PlacementTarget::Zone("nonexistent".to_string()))
        .unwrap_err();
    assert!(matches!(err, PlacementError::InvalidZone { .. }));
    assert_eq!(session.store().boxes().len(), 2);
}

#[test]
fn selection_flows_into_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxes.json");
    let doc = GeometryBuilder::new().page(vec![run("Rising costs", 100.0, 700.0, 12.0, 9.0)]);

    {
        let store = JsonFileStore::open(&path).unwrap();
        let mut session = Session::with_backend(
            Arc::new(GeometryBackend),
            doc.bytes(),
            &Settings::default(),
            store,
            4,
        )
        .unwrap();
        session.show_current_page().unwrap();
        session.set_template(Some("Five-Forces"));

        session.pointer_down(90.0, 680.0);
        session.pointer_up(300.0, 710.0).unwrap();
        let placed = session
            .place_selection(&PlacementTarget::Zone("supplier_power".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(placed.content, "Rising costs");
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let boxes = reopened.list_text_boxes_for_sheet(4).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].zone.as_deref(), Some("supplier_power"));
}
