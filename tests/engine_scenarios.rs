use std::io::Cursor;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use stickerstudio::engine::{CanvasEngine, CartItem, CartSink};
use stickerstudio::error::UploadError;
use stickerstudio::interaction::EditorKey;
use stickerstudio::pricing::{Material, OrderLine, StickerShape, StickerSize};
use stickerstudio::scene::{ElementDraft, ElementKind, ElementPatch, ShapeType};
use stickerstudio::settings::EditorSettings;
use stickerstudio::text::FontBook;

fn engine(width: u32, height: u32) -> CanvasEngine {
    let settings = EditorSettings {
        canvas_width: width,
        canvas_height: height,
        background_color: [0, 0, 0, 255],
        show_grid: false,
        ..Default::default()
    };
    CanvasEngine::with_font_book(settings, FontBook::offline())
}

fn png(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .unwrap();
    out
}

/// 40x40 transparent image with an opaque 20x10 red block at (10, 15).
fn padded_artwork() -> RgbaImage {
    let mut img = RgbaImage::new(40, 40);
    for y in 15..25 {
        for x in 10..30 {
            img.put_pixel(x, y, Rgba([220, 30, 30, 255]));
        }
    }
    img
}

fn close(p: &Rgba<u8>, expected: [u8; 4]) -> bool {
    p.0.iter().zip(expected).all(|(a, b)| (*a as i16 - b as i16).abs() <= 2)
}

#[derive(Default)]
struct RecordingCart {
    items: Vec<CartItem>,
    reject: bool,
}

impl CartSink for RecordingCart {
    fn add_item(&mut self, item: CartItem) -> Result<(), String> {
        if self.reject {
            return Err("checkout closed".into());
        }
        self.items.push(item);
        Ok(())
    }
}

#[test]
fn uploaded_artwork_is_cropped_scaled_and_bordered() {
    let mut e = engine(800, 600);
    e.attach_surface(800, 600, 1.0);
    e.upload_bytes("badge.png", png(&padded_artwork())).unwrap();
    assert!(e.wait_idle(Duration::from_secs(10)));

    let el = e.scene().selected().cloned().expect("upload is selected");
    assert_eq!((el.width, el.height), (288.0, 144.0));
    assert_eq!((el.x, el.y), (256.0, 228.0));
    let ElementKind::Image(img) = &el.kind else { panic!("not an image") };
    assert_eq!((img.original_width, img.original_height), (20, 10));
    assert!(img.sticker_mode);

    let out = e.export_image().unwrap();
    // Body is red, the border band just outside it is white, far away is background.
    let body = out.get_pixel(400, 300);
    assert!(close(body, [220, 30, 30, 255]), "{:?}", body);
    let border = out.get_pixel(400, 228 - 5);
    assert!(border[0] > 240 && border[1] > 240 && border[2] > 240, "{:?}", border);
    assert_eq!(*out.get_pixel(400, 150), Rgba([0, 0, 0, 255]));
}

#[test]
fn unsupported_and_oversized_uploads_leave_scene_untouched() {
    let mut e = engine(200, 200);
    assert!(matches!(
        e.upload_bytes("logo.svg", b"<svg/>".to_vec()),
        Err(UploadError::UnsupportedFormat(_))
    ));
    e.settings.max_upload_mb = 1;
    assert!(matches!(
        e.upload_bytes("huge.png", vec![1; 3 * 1024 * 1024]),
        Err(UploadError::TooLarge { .. })
    ));
    assert!(e.wait_idle(Duration::from_secs(1)));
    assert!(e.scene().elements.is_empty());
}

#[test]
fn export_excludes_selection_chrome() {
    let mut e = engine(100, 100);
    e.attach_surface(100, 100, 1.0);
    let id = e.add_element(ElementDraft::shape(ShapeType::Rectangle).at(20.0, 20.0).sized(60.0, 60.0));
    e.set_selected(Some(id));
    e.render();
    let interactive = e.pixels().unwrap().clone();
    let exported = e.export_image().unwrap();
    // Top-left corner handle is drawn only on the interactive frame.
    assert_ne!(interactive.get_pixel(20, 20), exported.get_pixel(20, 20));
    assert_eq!(*exported.get_pixel(50, 50), Rgba([0xff, 0x6b, 0x6b, 255]));
    // Export does not disturb the interactive frame.
    assert_eq!(e.pixels().unwrap(), &interactive);
}

#[test]
fn cart_receives_snapshot_and_rejection_is_reported() {
    let mut e = engine(64, 64);
    e.attach_surface(64, 64, 1.0);
    e.add_shape(ShapeType::Circle);
    let line = OrderLine::quote(StickerShape::Circle, Material::Holographic, StickerSize::Large, 300, false);

    let mut cart = RecordingCart::default();
    e.add_to_cart(line.clone(), &mut cart).unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].line.material, Material::Holographic);
    assert!(cart.items[0].snapshot_data_url.starts_with("data:image/png;base64,"));

    let mut closed = RecordingCart { reject: true, ..Default::default() };
    let err = e.add_to_cart(line, &mut closed).unwrap_err();
    assert!(err.to_string().contains("checkout closed"));
}

#[test]
fn locked_elements_ignore_keyboard_moves_and_deletes() {
    let mut e = engine(100, 100);
    let id = e.add_element(ElementDraft::shape(ShapeType::Rectangle).at(10.0, 10.0).sized(20.0, 20.0));
    e.update_element(id, &ElementPatch { locked: Some(true), ..Default::default() });
    e.pointer_down(15.0, 15.0);
    e.pointer_move(60.0, 60.0);
    e.pointer_up();
    e.key(EditorKey::ArrowRight, true);
    e.key(EditorKey::Delete, false);
    let el = e.scene().get(id).expect("still there");
    assert_eq!((el.x, el.y), (10.0, 10.0));
    assert_eq!(e.scene().selected_element_id, Some(id));
}

#[test]
fn keyboard_nudges_and_deletes_selection() {
    let mut e = engine(100, 100);
    let id = e.add_element(ElementDraft::shape(ShapeType::Triangle).at(10.0, 10.0).sized(20.0, 20.0));
    e.set_selected(Some(id));
    e.key(EditorKey::ArrowRight, false);
    e.key(EditorKey::ArrowDown, true);
    let el = e.scene().get(id).unwrap();
    assert_eq!((el.x, el.y), (11.0, 20.0));
    e.key(EditorKey::Backspace, false);
    assert!(e.scene().elements.is_empty());
    assert_eq!(e.scene().selected_element_id, None);
}

#[test]
fn duplicate_lands_on_top_and_is_selected() {
    let mut e = engine(100, 100);
    let a = e.add_element(ElementDraft::shape(ShapeType::Circle).at(10.0, 10.0).sized(20.0, 20.0));
    e.add_element(ElementDraft::shape(ShapeType::Rectangle));
    let copy = e.duplicate_element(a).unwrap();
    assert_ne!(copy, a);
    assert_eq!(e.scene().selected_element_id, Some(copy));
    let top = *e.scene().paint_order().last().unwrap();
    assert_eq!(e.scene().elements[top].id, copy);
}

#[test]
fn dispose_drops_surface_and_bitmaps() {
    let mut e = engine(50, 50);
    e.attach_surface(50, 50, 1.0);
    e.upload_bytes("a.png", png(&padded_artwork())).unwrap();
    assert!(e.wait_idle(Duration::from_secs(10)));
    assert!(!e.image_cache().is_empty());
    e.dispose();
    assert!(!e.has_surface());
    assert!(e.image_cache().is_empty());
    assert!(e.export_png().is_none());
    assert_eq!(e.scene().elements.len(), 1);
}
