use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;

use crate::engine::{CanvasEngine, CartItem, CartSink};
use crate::interaction::{CursorHint, EditorKey};
use crate::io::DESIGN_EXTENSION;
use crate::pricing::{self, Material, OrderLine, QUANTITY_TIERS, StickerShape, StickerSize};
use crate::scene::{ElementId, ElementKind, ElementPatch, ShapeType, TextAlign};
use crate::settings::EditorSettings;
use crate::upload;

const SIDE_PANEL_WIDTH: f32 = 250.0;
/// Seconds a status-bar message stays visible.
const STATUS_SECONDS: f64 = 4.0;
/// Repaint cadence while background work is in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(30);

const SIZE_KEYS: [(&str, &str); 5] = [
    ("small", "Small (2\" x 2\")"),
    ("medium", "Medium (3\" x 3\")"),
    ("large", "Large (4\" x 4\")"),
    ("xlarge", "X-Large (5\" x 5\")"),
    ("custom", "Custom"),
];

// ============================================================================
// LOCAL CART — stands in for a storefront until one is wired up
// ============================================================================

#[derive(Default)]
pub struct LocalCart {
    pub items: Vec<CartItem>,
}

impl LocalCart {
    pub fn total(&self) -> f64 {
        self.items.iter().map(|i| i.line.total_price).sum()
    }
}

impl CartSink for LocalCart {
    fn add_item(&mut self, item: CartItem) -> Result<(), String> {
        log_info!(
            "Cart: {} x {} {} ({} bytes of snapshot)",
            item.line.quantity,
            item.line.material.label(),
            item.line.size.label(),
            item.snapshot_data_url.len()
        );
        self.items.push(item);
        Ok(())
    }
}

// ============================================================================
// ORDER FORM
// ============================================================================

struct OrderForm {
    shape: StickerShape,
    material: Material,
    size_key: &'static str,
    custom_width: String,
    custom_height: String,
    quantity: u32,
    rush: bool,
}

impl OrderForm {
    fn new(quantity: u32) -> Self {
        Self {
            shape: StickerShape::default(),
            material: Material::default(),
            size_key: "medium",
            custom_width: "3".to_string(),
            custom_height: "3".to_string(),
            quantity: quantity.max(1),
            rush: false,
        }
    }

    fn size(&self) -> StickerSize {
        StickerSize::parse(self.size_key, &self.custom_width, &self.custom_height)
    }

    fn line(&self) -> OrderLine {
        OrderLine::quote(self.shape, self.material, self.size(), self.quantity, self.rush)
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

pub struct StickerStudioApp {
    engine: CanvasEngine,
    texture: Option<egui::TextureHandle>,
    cart: LocalCart,
    order: OrderForm,
    new_text: String,
    status: Option<(String, f64)>,
    /// Primary button went down over the canvas and has not been released.
    pointer_captured: bool,
    last_pointer: Option<(f32, f32)>,
}

impl StickerStudioApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = EditorSettings::load();
        let quantity = settings.default_quantity;
        log_info!(
            "Editor started: {}x{} canvas, upload limit {} MB",
            settings.canvas_width,
            settings.canvas_height,
            settings.max_upload_mb
        );
        Self {
            engine: CanvasEngine::new(settings),
            texture: None,
            cart: LocalCart::default(),
            order: OrderForm::new(quantity),
            new_text: "Your text".to_string(),
            status: None,
            pointer_captured: false,
            last_pointer: None,
        }
    }

    fn set_status(&mut self, ctx: &egui::Context, msg: impl Into<String>) {
        self.status = Some((msg.into(), ctx.input(|i| i.time)));
    }

    // ---- file actions ------------------------------------------------------

    fn upload_path(&mut self, ctx: &egui::Context, path: PathBuf) {
        if let Err(e) = self.engine.upload_file(&path) {
            self.set_status(ctx, e.to_string());
        }
    }

    fn pick_upload(&mut self, ctx: &egui::Context) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Artwork", &upload::accepted_extensions())
            .pick_file()
        {
            self.upload_path(ctx, path);
        }
    }

    fn open_design(&mut self, ctx: &egui::Context) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("StickerStudio design", &[DESIGN_EXTENSION])
            .pick_file()
        else {
            return;
        };
        match self.engine.load_design(&path) {
            Ok(()) => self.set_status(ctx, format!("Opened {}", path.display())),
            Err(e) => {
                log_err!("Open failed: {}", e);
                self.set_status(ctx, format!("Could not open design: {}", e));
            }
        }
    }

    fn save_design(&mut self, ctx: &egui::Context) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("StickerStudio design", &[DESIGN_EXTENSION])
            .set_file_name(format!("design.{}", DESIGN_EXTENSION))
            .save_file()
        else {
            return;
        };
        match self.engine.save_design(&path) {
            Ok(()) => self.set_status(ctx, format!("Saved {}", path.display())),
            Err(e) => {
                log_err!("Save failed: {}", e);
                self.set_status(ctx, format!("Could not save design: {}", e));
            }
        }
    }

    fn export_png(&mut self, ctx: &egui::Context) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name("sticker.png")
            .save_file()
        else {
            return;
        };
        let Some(png) = self.engine.export_png() else {
            self.set_status(ctx, "Nothing to export yet");
            return;
        };
        match std::fs::write(&path, png) {
            Ok(()) => self.set_status(ctx, format!("Exported {}", path.display())),
            Err(e) => {
                log_err!("Export to {} failed: {}", path.display(), e);
                self.set_status(ctx, format!("Export failed: {}", e));
            }
        }
    }

    fn add_to_cart(&mut self, ctx: &egui::Context) {
        let line = self.order.line();
        match self.engine.add_to_cart(line, &mut self.cart) {
            Ok(()) => self.set_status(ctx, "Added to cart"),
            Err(e) => {
                log_warn!("Add to cart failed: {}", e);
                self.set_status(ctx, format!("Could not add to cart: {}", e));
            }
        }
    }

    // ---- panels ------------------------------------------------------------

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Upload artwork…").clicked() {
                        ui.close_menu();
                        self.pick_upload(ctx);
                    }
                    ui.separator();
                    if ui.button("Open design…").clicked() {
                        ui.close_menu();
                        self.open_design(ctx);
                    }
                    if ui.button("Save design…").clicked() {
                        ui.close_menu();
                        self.save_design(ctx);
                    }
                    if ui.button("Export PNG…").clicked() {
                        ui.close_menu();
                        self.export_png(ctx);
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    let mut grid = self.engine.settings.show_grid;
                    if ui.checkbox(&mut grid, "Show grid").changed() {
                        self.engine.settings.show_grid = grid;
                        self.engine.settings.save();
                        self.engine.mark_dirty();
                    }
                    let mut lock = self.engine.settings.aspect_lock;
                    if ui.checkbox(&mut lock, "Lock aspect ratio").changed() {
                        self.engine.set_aspect_lock(lock);
                        self.engine.settings.save();
                    }
                    let mut bg = self.engine.scene().background_color;
                    ui.horizontal(|ui| {
                        ui.label("Background");
                        if ui.color_edit_button_srgba_unmultiplied(&mut bg).changed() {
                            self.engine.set_background(bg);
                        }
                    });
                });
            });
        });
    }

    fn tools_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("tools_panel")
            .default_width(SIDE_PANEL_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Add");
                if ui.button("Upload artwork…").clicked() {
                    self.pick_upload(ctx);
                }
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.new_text);
                    if ui.button("Text").clicked() && !self.new_text.is_empty() {
                        self.engine.add_text(&self.new_text);
                    }
                });
                ui.horizontal(|ui| {
                    for shape in ShapeType::all() {
                        if ui.button(shape.label()).clicked() {
                            self.engine.add_shape(*shape);
                        }
                    }
                });

                ui.horizontal(|ui| {
                    // No history stack yet.
                    ui.add_enabled(false, egui::Button::new("Undo"));
                    ui.add_enabled(false, egui::Button::new("Redo"));
                });

                ui.separator();
                ui.heading("Layers");
                self.layers_list(ui);
            });
    }

    fn layers_list(&mut self, ui: &mut egui::Ui) {
        let scene = self.engine.scene();
        let rows: Vec<(ElementId, String, bool, bool)> = scene
            .paint_order()
            .into_iter()
            .rev()
            .map(|i| {
                let el = &scene.elements[i];
                (el.id, el.name.clone(), el.visible, el.locked)
            })
            .collect();
        let selected = scene.selected_element_id;

        egui::ScrollArea::vertical().show(ui, |ui| {
            for (id, name, visible, locked) in rows {
                ui.horizontal(|ui| {
                    let mut v = visible;
                    if ui.checkbox(&mut v, "").on_hover_text("Visible").changed() {
                        self.engine.update_element(id, &ElementPatch { visible: Some(v), ..Default::default() });
                    }
                    let mut l = locked;
                    if ui.checkbox(&mut l, "").on_hover_text("Locked").changed() {
                        self.engine.update_element(id, &ElementPatch { locked: Some(l), ..Default::default() });
                    }
                    if ui.selectable_label(selected == Some(id), name).clicked() {
                        self.engine.set_selected(Some(id));
                    }
                });
            }
        });
    }

    fn right_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("order_panel")
            .default_width(SIDE_PANEL_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Properties");
                    self.properties_ui(ui);
                    ui.separator();
                    ui.heading("Order");
                    self.order_ui(ctx, ui);
                });
            });
    }

    fn properties_ui(&mut self, ui: &mut egui::Ui) {
        let Some(el) = self.engine.scene().selected().cloned() else {
            ui.label("Select an element to edit it.");
            return;
        };
        let mut patch = ElementPatch::default();

        let mut name = el.name.clone();
        if ui.text_edit_singleline(&mut name).changed() {
            patch.name = Some(name);
        }

        let (mut x, mut y, mut w, mut h) = (el.x, el.y, el.width, el.height);
        let mut resized = (None, None);
        egui::Grid::new("geometry").num_columns(4).show(ui, |ui| {
            ui.label("X");
            if ui.add(egui::DragValue::new(&mut x).speed(1.0)).changed() {
                patch.x = Some(x);
            }
            ui.label("Y");
            if ui.add(egui::DragValue::new(&mut y).speed(1.0)).changed() {
                patch.y = Some(y);
            }
            ui.end_row();
            ui.label("W");
            if ui.add(egui::DragValue::new(&mut w).speed(1.0).clamp_range(1.0..=4000.0)).changed() {
                resized.0 = Some(w);
            }
            ui.label("H");
            if ui.add(egui::DragValue::new(&mut h).speed(1.0).clamp_range(1.0..=4000.0)).changed() {
                resized.1 = Some(h);
            }
            ui.end_row();
        });

        let mut rotation = el.rotation;
        if ui.add(egui::Slider::new(&mut rotation, -180.0..=180.0).text("Rotation")).changed() {
            patch.rotation = Some(rotation);
        }
        let mut opacity = el.opacity;
        if ui.add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity")).changed() {
            patch.opacity = Some(opacity);
        }

        match &el.kind {
            ElementKind::Image(img) => {
                let mut sticker = img.sticker_mode;
                if ui.checkbox(&mut sticker, "Sticker border").changed() {
                    patch.sticker_mode = Some(sticker);
                }
                ui.add_enabled_ui(img.sticker_mode, |ui| {
                    let mut border = img.sticker_border_width;
                    if ui.add(egui::Slider::new(&mut border, 0.0..=50.0).text("Border")).changed() {
                        patch.sticker_border_width = Some(border);
                    }
                    let mut color = img.sticker_border_color;
                    ui.horizontal(|ui| {
                        ui.label("Border color");
                        if ui.color_edit_button_srgba_unmultiplied(&mut color).changed() {
                            patch.sticker_border_color = Some(color);
                        }
                    });
                    let mut holes = img.fill_holes;
                    if ui.checkbox(&mut holes, "Fill holes").changed() {
                        patch.fill_holes = Some(holes);
                    }
                });
            }
            ElementKind::Text(t) => {
                let mut text = t.text.clone();
                if ui.text_edit_multiline(&mut text).changed() {
                    patch.text = Some(text);
                }
                let mut size = t.font_size;
                if ui.add(egui::Slider::new(&mut size, 6.0..=200.0).text("Size")).changed() {
                    patch.font_size = Some(size);
                }
                let mut family = t.font_family.clone();
                ui.horizontal(|ui| {
                    ui.label("Font");
                    if ui.text_edit_singleline(&mut family).lost_focus() && family != t.font_family {
                        patch.font_family = Some(family);
                    }
                });
                let mut bold = t.font_weight >= 600;
                if ui.checkbox(&mut bold, "Bold").changed() {
                    patch.font_weight = Some(if bold { 700 } else { 400 });
                }
                let mut align = t.text_align;
                ui.horizontal(|ui| {
                    for a in [TextAlign::Left, TextAlign::Center, TextAlign::Right] {
                        ui.selectable_value(&mut align, a, a.label());
                    }
                });
                if align != t.text_align {
                    patch.text_align = Some(align);
                }
                let mut color = t.text_color;
                ui.horizontal(|ui| {
                    ui.label("Color");
                    if ui.color_edit_button_srgba_unmultiplied(&mut color).changed() {
                        patch.text_color = Some(color);
                    }
                });
            }
            ElementKind::Shape(s) => {
                let mut fill = s.fill_color;
                ui.horizontal(|ui| {
                    ui.label("Fill");
                    if ui.color_edit_button_srgba_unmultiplied(&mut fill).changed() {
                        patch.fill_color = Some(fill);
                    }
                });
                let mut stroked = s.stroke_color.is_some();
                let mut stroke = s.stroke_color.unwrap_or([255, 255, 255, 255]);
                ui.horizontal(|ui| {
                    let toggled = ui.checkbox(&mut stroked, "Outline").changed();
                    let recolored = ui.color_edit_button_srgba_unmultiplied(&mut stroke).changed();
                    if toggled || (stroked && recolored) {
                        patch.stroke_color = Some(stroked.then_some(stroke));
                    }
                });
                let mut width = s.stroke_width;
                if ui.add(egui::Slider::new(&mut width, 0.0..=20.0).text("Outline width")).changed() {
                    patch.stroke_width = Some(width);
                }
            }
        }

        if patch != ElementPatch::default() {
            self.engine.update_element(el.id, &patch);
        }
        if resized != (None, None) {
            self.engine.set_element_size(el.id, resized.0, resized.1);
        }

        ui.horizontal_wrapped(|ui| {
            if ui.button("Front").clicked() {
                self.engine.bring_to_front(el.id);
            }
            if ui.button("Forward").clicked() {
                self.engine.bring_forward(el.id);
            }
            if ui.button("Backward").clicked() {
                self.engine.send_backward(el.id);
            }
            if ui.button("Back").clicked() {
                self.engine.send_to_back(el.id);
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Duplicate").clicked() {
                self.engine.duplicate_element(el.id);
            }
            if ui.add_enabled(!el.locked, egui::Button::new("Delete")).clicked() {
                self.engine.delete_element(el.id);
            }
        });
    }

    fn order_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("Shape")
            .selected_text(self.order.shape.label())
            .show_ui(ui, |ui| {
                for s in StickerShape::all() {
                    ui.selectable_value(&mut self.order.shape, *s, s.label());
                }
            });
        egui::ComboBox::from_label("Material")
            .selected_text(self.order.material.label())
            .show_ui(ui, |ui| {
                for m in Material::all() {
                    ui.selectable_value(&mut self.order.material, *m, m.label());
                }
            });
        let size_label = SIZE_KEYS
            .iter()
            .find(|(k, _)| *k == self.order.size_key)
            .map_or("Custom", |(_, l)| *l);
        egui::ComboBox::from_label("Size")
            .selected_text(size_label)
            .show_ui(ui, |ui| {
                for (key, label) in SIZE_KEYS {
                    ui.selectable_value(&mut self.order.size_key, key, label);
                }
            });
        if self.order.size_key == "custom" {
            ui.horizontal(|ui| {
                ui.add(egui::TextEdit::singleline(&mut self.order.custom_width).desired_width(50.0));
                ui.label("x");
                ui.add(egui::TextEdit::singleline(&mut self.order.custom_height).desired_width(50.0));
                ui.label("in");
            });
            if ui.button("Use design size").clicked()
                && let Some((w, h)) = self.engine.design_size_inches()
            {
                self.order.custom_width = format!("{:.2}", w);
                self.order.custom_height = format!("{:.2}", h);
            }
        }

        ui.horizontal(|ui| {
            ui.label("Quantity");
            ui.add(egui::DragValue::new(&mut self.order.quantity).clamp_range(1..=100_000));
        });
        ui.horizontal_wrapped(|ui| {
            for (q, _) in QUANTITY_TIERS {
                ui.selectable_value(&mut self.order.quantity, q, q.to_string());
            }
        });
        ui.checkbox(&mut self.order.rush, "Rush order (+40%)");

        let line = self.order.line();
        ui.label(format!("${:.2} each", pricing::round_cents(line.unit_price)));
        ui.strong(format!("Total ${:.2}", pricing::round_cents(line.total_price)));

        let can_order = line.total_price > 0.0 && self.engine.has_surface();
        if ui.add_enabled(can_order, egui::Button::new("Add to cart")).clicked() {
            self.add_to_cart(ctx);
        }
        if !self.cart.items.is_empty() {
            ui.label(format!(
                "Cart: {} item(s), ${:.2}",
                self.cart.items.len(),
                pricing::round_cents(self.cart.total())
            ));
        }
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        if let Some((_, at)) = &self.status
            && now - at > STATUS_SECONDS
        {
            self.status = None;
        }
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.engine.pending_uploads() > 0 {
                    ui.spinner();
                    ui.label("Preparing artwork…");
                }
                if let Some((msg, _)) = &self.status {
                    ui.label(msg);
                }
            });
        });
    }

    // ---- canvas ------------------------------------------------------------

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let ppp = ctx.pixels_per_point();
            let (w, h) = (self.engine.scene().width, self.engine.scene().height);
            if self.engine.surface_scale() != Some(ppp) {
                self.engine.attach_surface(w, h, ppp);
            }

            let sense = egui::Sense::click_and_drag().union(egui::Sense::hover());
            let (response, painter) = ui.allocate_painter(ui.available_size(), sense);
            let canvas_rect =
                egui::Rect::from_center_size(response.rect.center(), egui::vec2(w as f32, h as f32));

            self.canvas_input(ctx, &response, canvas_rect);

            if self.engine.render()
                && let Some(pixels) = self.engine.pixels()
            {
                let size = [pixels.width() as usize, pixels.height() as usize];
                let image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
                match &mut self.texture {
                    Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("sticker_canvas", image, egui::TextureOptions::LINEAR));
                    }
                }
            }

            if let Some(tex) = &self.texture {
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                painter.image(tex.id(), canvas_rect, uv, egui::Color32::WHITE);
            }
            painter.rect_stroke(canvas_rect, 0.0, egui::Stroke::new(1.0, egui::Color32::from_gray(70)));
        });
    }

    fn canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response, canvas_rect: egui::Rect) {
        let (pressed, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.latest_pos(),
            )
        });

        if let Some(p) = pos {
            let local = (p.x - canvas_rect.min.x, p.y - canvas_rect.min.y);
            if pressed && response.hovered() {
                self.engine.pointer_down(local.0, local.1);
                self.pointer_captured = true;
                self.last_pointer = Some(local);
            } else if (response.hovered() || self.pointer_captured) && self.last_pointer != Some(local) {
                self.engine.pointer_move(local.0, local.1);
                self.last_pointer = Some(local);
            }
        }
        if released && self.pointer_captured {
            self.engine.pointer_up();
            self.pointer_captured = false;
        }

        if response.hovered() || self.pointer_captured {
            ctx.set_cursor_icon(match self.engine.cursor() {
                CursorHint::Default => egui::CursorIcon::Default,
                CursorHint::Move => egui::CursorIcon::Move,
                CursorHint::ResizeNwSe => egui::CursorIcon::ResizeNwSe,
                CursorHint::ResizeNeSw => egui::CursorIcon::ResizeNeSw,
            });
        }

        if !ctx.wants_keyboard_input() {
            let shift = ctx.input(|i| i.modifiers.shift);
            let keys = [
                (egui::Key::Delete, EditorKey::Delete),
                (egui::Key::Backspace, EditorKey::Backspace),
                (egui::Key::ArrowLeft, EditorKey::ArrowLeft),
                (egui::Key::ArrowRight, EditorKey::ArrowRight),
                (egui::Key::ArrowUp, EditorKey::ArrowUp),
                (egui::Key::ArrowDown, EditorKey::ArrowDown),
                (egui::Key::Escape, EditorKey::Escape),
            ];
            for (key, editor_key) in keys {
                if ctx.input(|i| i.key_pressed(key)) {
                    self.engine.key(editor_key, shift);
                }
            }
        }
    }
}

impl eframe::App for StickerStudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Drain background decodes and uploads ---
        self.engine.pump();
        if let Some(e) = self.engine.take_upload_error() {
            self.set_status(ctx, e.to_string());
        }

        // --- Drag & drop artwork onto the window ---
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if let Some(path) = file.path {
                self.upload_path(ctx, path);
            } else if let Some(bytes) = file.bytes
                && let Err(e) = self.engine.upload_bytes(&file.name, bytes.to_vec())
            {
                self.set_status(ctx, e.to_string());
            }
        }

        self.menu_bar(ctx);
        self.status_bar(ctx);
        self.tools_panel(ctx);
        self.right_panel(ctx);
        self.canvas(ctx);

        if self.engine.pending_uploads() > 0 || self.engine.image_cache().pending_count() > 0 {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
        if self.engine.is_dirty() {
            ctx.request_repaint();
        }
    }
}
