// ============================================================================
// CANVAS ENGINE — owns the scene, caches and surface; driven by the host loop
// ============================================================================
//
// Every mutation goes through the engine and marks it dirty; `render()` only
// paints when dirty.  Background work (image decodes, upload preparation)
// posts messages that `pump()` drains on the host thread, so the scene has a
// single writer.

use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use uuid::Uuid;

use crate::error::{EngineError, UploadError};
use crate::image_cache::ImageCache;
use crate::interaction::{CursorHint, EditorKey, InteractionController};
use crate::io::{self, DesignFileV1};
use crate::pricing::OrderLine;
use crate::render::{self, FrameReport, RenderOptions};
use crate::scene::{CanvasState, ElementDraft, ElementId, ElementKind, ElementPatch, ShapeType};
use crate::settings::EditorSettings;
use crate::surface::Surface;
use crate::text::FontBook;
use crate::units::{Rect, px_to_inches};
use crate::upload::{self, UploadMessage};

/// Largest device-pixel edge an attached surface may have.
pub const MAX_SURFACE_SIDE: u32 = 8_192;

/// Sanitized device scale: non-positive or non-finite values become 1, and
/// the longer canvas edge never exceeds [`MAX_SURFACE_SIDE`] device pixels.
pub fn device_scale(width: u32, height: u32, scale: f32) -> f32 {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let longest = width.max(height).max(1) as f32;
    if longest * scale <= MAX_SURFACE_SIDE as f32 {
        return scale;
    }
    let clamped = MAX_SURFACE_SIDE as f32 / longest;
    log_warn!("Surface scale {} too large for {}x{}, using {}", scale, width, height, clamped);
    clamped
}

/// What the engine hands to the cart collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    /// PNG snapshot of the artwork as a data URL.
    pub snapshot_data_url: String,
    pub line: OrderLine,
}

/// External cart.  The engine never stores cart items itself.
pub trait CartSink {
    fn add_item(&mut self, item: CartItem) -> Result<(), String>;
}

struct AttachedSurface {
    surface: Surface,
    scale: f32,
}

pub struct CanvasEngine {
    pub settings: EditorSettings,
    scene: CanvasState,
    cache: ImageCache,
    fonts: FontBook,
    interaction: InteractionController,
    surface: Option<AttachedSurface>,
    /// Visible region used to place new elements (logical units).
    viewport: Option<Rect>,
    dirty: bool,
    upload_sender: mpsc::Sender<UploadMessage>,
    upload_receiver: mpsc::Receiver<UploadMessage>,
    pending_uploads: usize,
    last_upload_error: Option<UploadError>,
    warned_no_surface: bool,
}

impl CanvasEngine {
    pub fn new(settings: EditorSettings) -> Self {
        Self::with_font_book(settings, FontBook::new())
    }

    pub fn with_font_book(settings: EditorSettings, fonts: FontBook) -> Self {
        let (upload_sender, upload_receiver) = mpsc::channel();
        let scene = CanvasState::new(
            settings.canvas_width,
            settings.canvas_height,
            settings.background_color,
        );
        Self {
            interaction: InteractionController::new(settings.aspect_lock),
            settings,
            scene,
            cache: ImageCache::new(),
            fonts,
            surface: None,
            viewport: None,
            dirty: true,
            upload_sender,
            upload_receiver,
            pending_uploads: 0,
            last_upload_error: None,
            warned_no_surface: false,
        }
    }

    // ---- accessors --------------------------------------------------------

    pub fn scene(&self) -> &CanvasState {
        &self.scene
    }

    pub fn image_cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn cursor(&self) -> CursorHint {
        self.interaction.cursor()
    }

    pub fn hovered(&self) -> Option<ElementId> {
        self.interaction.hovered()
    }

    pub fn pending_uploads(&self) -> usize {
        self.pending_uploads
    }

    /// Takes the most recent upload failure, if any.
    pub fn take_upload_error(&mut self) -> Option<UploadError> {
        self.last_upload_error.take()
    }

    pub fn set_aspect_lock(&mut self, on: bool) {
        self.settings.aspect_lock = on;
        self.interaction.aspect_lock = on;
    }

    pub fn set_viewport(&mut self, viewport: Option<Rect>) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Rect {
        self.viewport.unwrap_or_else(|| {
            Rect::new(0.0, 0.0, self.scene.width as f32, self.scene.height as f32)
        })
    }

    /// Size of the artwork's bounding box in inches, if anything is visible.
    pub fn design_size_inches(&self) -> Option<(f32, f32)> {
        self.scene
            .design_bounds()
            .map(|b| (px_to_inches(b.width), px_to_inches(b.height)))
    }

    // ---- scene mutations --------------------------------------------------

    pub fn add_element(&mut self, draft: ElementDraft) -> ElementId {
        self.dirty = true;
        self.scene.add_element(draft)
    }

    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        let changed = self.scene.update_element(id, patch);
        self.dirty |= changed;
        changed
    }

    pub fn delete_element(&mut self, id: ElementId) -> bool {
        let changed = self.scene.delete_element(id);
        self.dirty |= changed;
        changed
    }

    pub fn set_selected(&mut self, id: Option<ElementId>) {
        if self.scene.selected_element_id != id {
            self.scene.set_selected(id);
            self.dirty = true;
        }
    }

    pub fn duplicate_element(&mut self, id: ElementId) -> Option<ElementId> {
        let new_id = self.scene.duplicate_element(id)?;
        self.scene.set_selected(Some(new_id));
        self.dirty = true;
        Some(new_id)
    }

    pub fn set_element_size(&mut self, id: ElementId, width: Option<f32>, height: Option<f32>) -> bool {
        let changed = self.scene.set_element_size(id, width, height, self.settings.aspect_lock);
        self.dirty |= changed;
        changed
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        let changed = self.scene.bring_to_front(id);
        self.dirty |= changed;
        changed
    }

    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        let changed = self.scene.send_to_back(id);
        self.dirty |= changed;
        changed
    }

    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        let changed = self.scene.bring_forward(id);
        self.dirty |= changed;
        changed
    }

    pub fn send_backward(&mut self, id: ElementId) -> bool {
        let changed = self.scene.send_backward(id);
        self.dirty |= changed;
        changed
    }

    pub fn set_background(&mut self, color: [u8; 4]) {
        self.scene.background_color = color;
        self.dirty = true;
    }

    /// Add a text element centered in the viewport and select it.
    pub fn add_text(&mut self, text: &str) -> ElementId {
        let draft = ElementDraft::text(text);
        let (cx, cy) = self.viewport().center();
        let (w, h) = (draft.width, draft.height);
        let id = self.add_element(draft.at(cx - w * 0.5, cy - h * 0.5));
        self.scene.set_selected(Some(id));
        id
    }

    /// Add a shape centered in the viewport and select it.
    pub fn add_shape(&mut self, shape_type: ShapeType) -> ElementId {
        let draft = ElementDraft::shape(shape_type);
        let (cx, cy) = self.viewport().center();
        let (w, h) = (draft.width, draft.height);
        let id = self.add_element(draft.at(cx - w * 0.5, cy - h * 0.5));
        self.scene.set_selected(Some(id));
        id
    }

    // ---- input ------------------------------------------------------------

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.interaction.pointer_down(&mut self.scene, &self.cache, &mut self.fonts, x, y) {
            self.dirty = true;
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.interaction.pointer_move(&mut self.scene, &self.cache, &mut self.fonts, x, y) {
            self.dirty = true;
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    pub fn key(&mut self, key: EditorKey, shift: bool) {
        if self.interaction.key(&mut self.scene, key, shift) {
            self.dirty = true;
        }
    }

    // ---- uploads ----------------------------------------------------------

    /// Validate synchronously, then decode and crop in the background.  The
    /// element appears on a later `pump()`.
    pub fn upload_bytes(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), UploadError> {
        if let Err(e) = upload::validate(name, bytes.len() as u64, self.settings.max_upload_bytes()) {
            log_warn!("Upload '{}' rejected: {}", name, e);
            return Err(e);
        }
        upload::spawn_prepare(name.to_string(), bytes, self.upload_sender.clone());
        self.pending_uploads += 1;
        Ok(())
    }

    /// Size-check a file before reading it, then hand it to [`Self::upload_bytes`].
    pub fn upload_file(&mut self, path: &Path) -> Result<(), UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = std::fs::metadata(path)
            .map_err(|e| UploadError::Decode(e.to_string()))?
            .len();
        if let Err(e) = upload::validate(&name, size, self.settings.max_upload_bytes()) {
            log_warn!("Upload '{}' rejected: {}", name, e);
            return Err(e);
        }
        let bytes = std::fs::read(path).map_err(|e| UploadError::Decode(e.to_string()))?;
        self.upload_bytes(&name, bytes)
    }

    fn apply_upload(&mut self, msg: UploadMessage) {
        self.pending_uploads = self.pending_uploads.saturating_sub(1);
        let prepared = match msg.result {
            Ok(p) => p,
            Err(e) => {
                log_warn!("Upload '{}' failed: {}", msg.name, e);
                self.last_upload_error = Some(e);
                return;
            }
        };

        let (w, h) = prepared.image.dimensions();
        let src = format!("upload://{}.png", Uuid::new_v4());
        self.cache.register_bytes(src.clone(), prepared.png);
        self.cache.insert_decoded(src.clone(), prepared.image);

        let rect = upload::auto_layout(w, h, self.viewport(), self.settings.default_border_width);
        let mut draft = ElementDraft::image(src, w, h).at(rect.x, rect.y).sized(rect.width, rect.height);
        draft.name = prepared.name;
        if let ElementKind::Image(img) = &mut draft.kind {
            img.sticker_mode = true;
            img.sticker_border_width = self.settings.default_border_width;
            img.sticker_border_color = self.settings.default_border_color;
        }
        let id = self.add_element(draft);
        self.scene.set_selected(Some(id));
        log_info!("Placed upload '{}' ({}x{} after crop)", msg.name, w, h);
    }

    // ---- scheduling -------------------------------------------------------

    /// Drain finished background work.  Returns `true` when a repaint is due.
    pub fn pump(&mut self) -> bool {
        if self.cache.poll() {
            self.dirty = true;
        }
        while let Ok(msg) = self.upload_receiver.try_recv() {
            self.apply_upload(msg);
        }
        self.dirty
    }

    /// Block until uploads and decodes settle or `timeout` elapses.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            while self.pending_uploads > 0 {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                match self.upload_receiver.recv_timeout(deadline - now) {
                    Ok(msg) => self.apply_upload(msg),
                    Err(_) => return false,
                }
            }
            let now = Instant::now();
            if self.cache.wait_idle(deadline.saturating_duration_since(now)) {
                self.dirty = true;
            }
            if self.cache.pending_count() == 0 && self.pending_uploads == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    // ---- surface & rendering ----------------------------------------------

    /// Attach a backing store for a `width × height` logical surface at
    /// `scale` device pixels per unit.
    pub fn attach_surface(&mut self, width: u32, height: u32, scale: f32) {
        let scale = device_scale(width, height, scale);
        self.scene.width = width;
        self.scene.height = height;
        let dev_w = ((width as f32 * scale).round() as u32).max(1);
        let dev_h = ((height as f32 * scale).round() as u32).max(1);
        self.surface = Some(AttachedSurface { surface: Surface::new(dev_w, dev_h), scale });
        self.warned_no_surface = false;
        self.dirty = true;
    }

    pub fn detach_surface(&mut self) {
        self.surface = None;
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Paint if anything changed since the last frame.  Returns `true` when
    /// a frame was painted.
    pub fn render(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.render_now().is_some()
    }

    /// Paint unconditionally.  No-op without a surface.
    pub fn render_now(&mut self) -> Option<FrameReport> {
        let Some(attached) = self.surface.as_mut() else {
            if !self.warned_no_surface {
                log_warn!("Render skipped: no drawing surface attached");
                self.warned_no_surface = true;
            }
            return None;
        };
        let opts = RenderOptions::interactive(self.settings.show_grid);
        let report = render::render_frame(
            &mut attached.surface,
            attached.scale,
            &self.scene,
            &mut self.cache,
            &mut self.fonts,
            opts,
        );
        self.dirty = false;
        Some(report)
    }

    /// Device pixels of the last frame.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.surface.as_ref().map(|a| a.surface.pixels())
    }

    pub fn surface_scale(&self) -> Option<f32> {
        self.surface.as_ref().map(|a| a.scale)
    }

    /// Artwork only (no grid, no selection) at the attached resolution.
    pub fn export_image(&mut self) -> Option<RgbaImage> {
        let (w, h, scale) = {
            let a = self.surface.as_ref()?;
            (a.surface.width(), a.surface.height(), a.scale)
        };
        let mut target = Surface::new(w, h);
        render::render_frame(
            &mut target,
            scale,
            &self.scene,
            &mut self.cache,
            &mut self.fonts,
            RenderOptions::export(),
        );
        Some(target.into_image())
    }

    pub fn export_png(&mut self) -> Option<Vec<u8>> {
        let img = self.export_image()?;
        match io::encode_png(&img) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log_err!("PNG export failed: {}", e);
                None
            }
        }
    }

    pub fn snapshot_data_url(&mut self) -> Option<String> {
        let img = self.export_image()?;
        match io::png_data_url(&img) {
            Ok(url) => Some(url),
            Err(e) => {
                log_err!("Snapshot failed: {}", e);
                None
            }
        }
    }

    /// Snapshot the artwork and pass it with `line` to the cart.
    pub fn add_to_cart(&mut self, line: OrderLine, sink: &mut dyn CartSink) -> Result<(), EngineError> {
        let snapshot_data_url = self.snapshot_data_url().ok_or(EngineError::NoSurface)?;
        let quantity = line.quantity;
        let total = line.total_price;
        sink.add_item(CartItem { snapshot_data_url, line })
            .map_err(EngineError::Cart)?;
        log_info!("Added {} stickers to cart (total {:.2})", quantity, total);
        Ok(())
    }

    // ---- persistence ------------------------------------------------------

    pub fn save_design(&self, path: &Path) -> Result<(), EngineError> {
        let referenced: HashSet<&str> = self
            .scene
            .elements
            .iter()
            .filter_map(|e| match &e.kind {
                ElementKind::Image(img) => Some(img.src.as_str()),
                _ => None,
            })
            .collect();
        let blobs = self
            .cache
            .blobs()
            .filter(|(src, _)| referenced.contains(src.as_str()))
            .map(|(src, bytes)| (src.clone(), bytes.as_ref().clone()))
            .collect();
        io::save_design(&DesignFileV1::new(self.scene.clone(), blobs), path)?;
        log_info!("Saved design to {}", path.display());
        Ok(())
    }

    /// Replace the scene with a saved design.  Surface stays attached and is
    /// resized to the design's logical size.
    pub fn load_design(&mut self, path: &Path) -> Result<(), EngineError> {
        let design = io::load_design(path)?;
        self.cache.dispose();
        for (src, bytes) in design.blobs {
            self.cache.register_bytes(src, bytes);
        }
        let mut scene = design.state;
        let selected = scene.selected_element_id;
        scene.set_selected(selected);
        self.scene = scene;
        self.interaction.reset();
        if let Some(scale) = self.surface_scale() {
            self.attach_surface(self.scene.width, self.scene.height, scale);
        }
        self.dirty = true;
        log_info!("Loaded design from {} ({} elements)", path.display(), self.scene.elements.len());
        Ok(())
    }

    /// Release bitmaps, fonts and the surface.  The scene itself is kept.
    pub fn dispose(&mut self) {
        self.cache.dispose();
        self.fonts.clear();
        self.surface = None;
        self.interaction.reset();
        self.dirty = true;
    }
}
