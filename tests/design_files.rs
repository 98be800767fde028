use std::io::Cursor;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use stickerstudio::engine::CanvasEngine;
use stickerstudio::error::EngineError;
use stickerstudio::scene::{ElementDraft, ElementKind, ShapeType};
use stickerstudio::settings::EditorSettings;
use stickerstudio::text::FontBook;

fn engine() -> CanvasEngine {
    let settings = EditorSettings { canvas_width: 300, canvas_height: 200, ..Default::default() };
    CanvasEngine::with_font_book(settings, FontBook::offline())
}

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(12, 8, Rgba([10, 200, 90, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .unwrap();
    out
}

#[test]
fn saved_design_reloads_with_uploaded_art() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sheet.ssd");

    let mut original = engine();
    original.attach_surface(300, 200, 1.0);
    original.upload_bytes("leaf.png", png_bytes()).unwrap();
    assert!(original.wait_idle(Duration::from_secs(10)));
    original.add_shape(ShapeType::Circle);
    original.save_design(&path).unwrap();
    let expected = original.export_image().unwrap();

    let mut restored = engine();
    restored.attach_surface(300, 200, 1.0);
    restored.load_design(&path).unwrap();
    assert_eq!(restored.scene(), original.scene());

    // First frame requests the bitmap from the embedded blob.
    restored.render_now();
    assert!(restored.wait_idle(Duration::from_secs(10)));
    let src = restored
        .scene()
        .elements
        .iter()
        .find_map(|e| match &e.kind {
            ElementKind::Image(img) => Some(img.src.clone()),
            _ => None,
        })
        .unwrap();
    assert!(restored.image_cache().is_loaded(&src));
    assert_eq!(restored.export_image().unwrap(), expected);
}

#[test]
fn unrelated_blobs_are_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.ssd");

    let mut e = engine();
    e.upload_bytes("leaf.png", png_bytes()).unwrap();
    assert!(e.wait_idle(Duration::from_secs(10)));
    let id = e.scene().elements[0].id;
    e.delete_element(id);
    e.add_element(ElementDraft::text("hello").at(5.0, 5.0));
    e.save_design(&path).unwrap();

    let design = stickerstudio::io::load_design(&path).unwrap();
    assert!(design.blobs.is_empty());
    assert_eq!(design.state.elements.len(), 1);
}

#[test]
fn garbage_file_is_rejected_without_touching_scene() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.ssd");
    std::fs::write(&path, b"definitely not a design file").unwrap();

    let mut e = engine();
    let id = e.add_shape(ShapeType::Rectangle);
    assert!(matches!(e.load_design(&path), Err(EngineError::InvalidFormat(_))));
    assert!(e.scene().get(id).is_some());

    let missing = dir.path().join("missing.ssd");
    assert!(matches!(e.load_design(&missing), Err(EngineError::Io(_))));
}
