//! Template persistence across store instances.

use photomark::templates::{
    default_template_spec, JsonTemplateStore, MemoryTemplateStore, TemplateStore,
    DEFAULT_TEMPLATE_NAME,
};
use photomark::watermark::{Anchor, Color, Offset, Shadow, Stroke, WatermarkSpec};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tempfile::TempDir;

fn elaborate_spec() -> WatermarkSpec {
    WatermarkSpec {
        text: "© 2025 Ünïcödé Studio\nsecond line".to_string(),
        font_family: Some("DejaVu Sans".to_string()),
        font_file: Some(PathBuf::from("/fonts/custom.ttf")),
        font_size_pt: 31.5,
        bold: true,
        italic: true,
        color: Color::rgba(1, 2, 3, 4),
        opacity: 0.37,
        rotation_degrees: 359.9,
        shadow: Some(Shadow {
            offset_x: -1.25,
            offset_y: 2.5,
            color: Color::rgba(10, 20, 30, 40),
            blur_radius: 0.75,
        }),
        stroke: Some(Stroke {
            width: 1.5,
            color: Color::rgba(200, 100, 50, 255),
        }),
        anchor: Anchor::FreeOffset,
        offset: Offset::new(-12.5, 400.25),
    }
}

fn stores(dir: &TempDir) -> Vec<Box<dyn TemplateStore>> {
    vec![
        Box::new(JsonTemplateStore::open(dir.path().join("templates.json")).unwrap()),
        Box::new(MemoryTemplateStore::new()),
    ]
}

#[test]
fn test_round_trip_preserves_every_field() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let spec = elaborate_spec();
        store.save("Elaborate", &spec).unwrap();
        assert_eq!(store.load("Elaborate").unwrap(), spec);
    }
}

#[test]
fn test_round_trip_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store/templates.json");

    {
        let store = JsonTemplateStore::open(&path).unwrap();
        store.save("Elaborate", &elaborate_spec()).unwrap();
        store.save("Plain", &WatermarkSpec::with_text("plain")).unwrap();
    }

    let store = JsonTemplateStore::open(&path).unwrap();
    assert_eq!(
        store.list().unwrap(),
        BTreeSet::from([
            DEFAULT_TEMPLATE_NAME.to_string(),
            "Elaborate".to_string(),
            "Plain".to_string(),
        ])
    );
    assert_eq!(store.load("Elaborate").unwrap(), elaborate_spec());
    assert_eq!(store.last_used().as_deref(), Some("Elaborate"));
}

#[test]
fn test_save_with_existing_name_replaces() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        store.save("Same", &WatermarkSpec::with_text("first")).unwrap();
        store.save("Same", &elaborate_spec()).unwrap();
        assert_eq!(store.load("Same").unwrap(), elaborate_spec());
        assert_eq!(store.list().unwrap().iter().filter(|n| *n == "Same").count(), 1);
    }
}

#[test]
fn test_delete_then_load_is_not_found() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        store.save("Gone", &WatermarkSpec::with_text("bye")).unwrap();
        store.delete("Gone").unwrap();
        assert!(store.load("Gone").unwrap_err().is_not_found());
        assert_eq!(store.last_used().as_deref(), Some(DEFAULT_TEMPLATE_NAME));
    }
}

#[test]
fn test_default_template_can_be_deleted_and_store_reopens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("templates.json");

    let store = JsonTemplateStore::open(&path).unwrap();
    assert_eq!(store.load(DEFAULT_TEMPLATE_NAME).unwrap(), default_template_spec());
    store.delete(DEFAULT_TEMPLATE_NAME).unwrap();
    drop(store);

    // The file exists, so nothing is re-seeded.
    let store = JsonTemplateStore::open(&path).unwrap();
    assert!(store.list().unwrap().is_empty());
}
