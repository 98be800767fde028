// ============================================================================
// SCENE STORE — ordered elements + selection/view state
// ============================================================================
//
// `CanvasState` is the single source of truth for the design.  Every mutation
// goes through one of the store operations below; none of them can leave a
// dangling selection or a duplicate id behind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::Rect;

pub type ElementId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    Rectangle,
    Circle,
    Triangle,
}

impl ShapeType {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeType::Rectangle => "Rectangle",
            ShapeType::Circle => "Circle",
            ShapeType::Triangle => "Triangle",
        }
    }

    pub fn all() -> &'static [ShapeType] {
        &[ShapeType::Rectangle, ShapeType::Circle, ShapeType::Triangle]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn label(&self) -> &'static str {
        match self {
            TextAlign::Left => "Left",
            TextAlign::Center => "Center",
            TextAlign::Right => "Right",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageProps {
    /// Key into the image cache.
    pub src: String,
    pub sticker_mode: bool,
    pub sticker_border_width: f32,
    pub sticker_border_color: [u8; 4],
    pub fill_holes: bool,
    /// Provenance only: bitmap size at import time.
    pub original_width: u32,
    pub original_height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextProps {
    pub text: String,
    pub font_size: f32,
    pub font_family: String,
    pub text_color: [u8; 4],
    /// CSS-style weight (400 = regular, 700 = bold).
    pub font_weight: u16,
    pub text_align: TextAlign,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeProps {
    pub shape_type: ShapeType,
    pub fill_color: [u8; 4],
    /// `None` or zero width disables the stroke.
    pub stroke_color: Option<[u8; 4]>,
    pub stroke_width: f32,
}

/// Variant-specific payload of an element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Image(ImageProps),
    Text(TextProps),
    Shape(ShapeProps),
}

/// One placed object on the design surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasElement {
    pub id: ElementId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees, clockwise, about the element's own center.
    pub rotation: f32,
    /// 0.0 – 1.0
    pub opacity: f32,
    /// Paint order: ascending = bottom to top.
    pub z_index: i64,
    pub kind: ElementKind,
}

impl CanvasElement {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ElementKind::Image(_))
    }

    /// Width / height ratio used by the aspect lock.  Images use their import
    /// provenance; everything else uses the current box.
    pub fn aspect_ratio(&self) -> f32 {
        if let ElementKind::Image(img) = &self.kind
            && img.original_width > 0
            && img.original_height > 0
        {
            return img.original_width as f32 / img.original_height as f32;
        }
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Everything an "add" operation needs except the id and z-index, which the
/// store assigns.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementDraft {
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub opacity: f32,
    pub kind: ElementKind,
}

impl ElementDraft {
    fn with_kind(name: &str, width: f32, height: f32, kind: ElementKind) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            locked: false,
            x: 0.0,
            y: 0.0,
            width,
            height,
            rotation: 0.0,
            opacity: 1.0,
            kind,
        }
    }

    pub fn image(src: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(
            "Image",
            width as f32,
            height as f32,
            ElementKind::Image(ImageProps {
                src: src.into(),
                sticker_mode: false,
                sticker_border_width: 10.0,
                sticker_border_color: [255, 255, 255, 255],
                fill_holes: false,
                original_width: width,
                original_height: height,
            }),
        )
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_kind(
            "Text",
            200.0,
            30.0,
            ElementKind::Text(TextProps {
                text: text.into(),
                font_size: 24.0,
                font_family: "Arial".to_string(),
                text_color: [255, 255, 255, 255],
                font_weight: 400,
                text_align: TextAlign::Left,
            }),
        )
    }

    pub fn shape(shape_type: ShapeType) -> Self {
        Self::with_kind(
            shape_type.label(),
            100.0,
            100.0,
            ElementKind::Shape(ShapeProps {
                shape_type,
                fill_color: [0xff, 0x6b, 0x6b, 255],
                stroke_color: None,
                stroke_width: 0.0,
            }),
        )
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Partial update.  `None` leaves a field untouched; variant fields that do
/// not match the element's kind are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub rotation: Option<f32>,
    pub opacity: Option<f32>,
    pub z_index: Option<i64>,
    // Image
    pub src: Option<String>,
    pub sticker_mode: Option<bool>,
    pub sticker_border_width: Option<f32>,
    pub sticker_border_color: Option<[u8; 4]>,
    pub fill_holes: Option<bool>,
    // Text
    pub text: Option<String>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub text_color: Option<[u8; 4]>,
    pub font_weight: Option<u16>,
    pub text_align: Option<TextAlign>,
    // Shape
    pub shape_type: Option<ShapeType>,
    pub fill_color: Option<[u8; 4]>,
    pub stroke_color: Option<Option<[u8; 4]>>,
    pub stroke_width: Option<f32>,
}

impl ElementPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    pub fn rect(r: Rect) -> Self {
        Self {
            x: Some(r.x),
            y: Some(r.y),
            width: Some(r.width),
            height: Some(r.height),
            ..Default::default()
        }
    }

    fn apply_to(&self, el: &mut CanvasElement) {
        if let Some(v) = &self.name { el.name = v.clone(); }
        if let Some(v) = self.visible { el.visible = v; }
        if let Some(v) = self.locked { el.locked = v; }
        if let Some(v) = self.x { el.x = v; }
        if let Some(v) = self.y { el.y = v; }
        if let Some(v) = self.width { el.width = v.max(0.0); }
        if let Some(v) = self.height { el.height = v.max(0.0); }
        if let Some(v) = self.rotation { el.rotation = v; }
        if let Some(v) = self.opacity { el.opacity = v.clamp(0.0, 1.0); }
        if let Some(v) = self.z_index { el.z_index = v; }

        match &mut el.kind {
            ElementKind::Image(img) => {
                if let Some(v) = &self.src { img.src = v.clone(); }
                if let Some(v) = self.sticker_mode { img.sticker_mode = v; }
                if let Some(v) = self.sticker_border_width { img.sticker_border_width = v.max(0.0); }
                if let Some(v) = self.sticker_border_color { img.sticker_border_color = v; }
                if let Some(v) = self.fill_holes { img.fill_holes = v; }
            }
            ElementKind::Text(t) => {
                if let Some(v) = &self.text { t.text = v.clone(); }
                if let Some(v) = self.font_size { t.font_size = v.max(1.0); }
                if let Some(v) = &self.font_family { t.font_family = v.clone(); }
                if let Some(v) = self.text_color { t.text_color = v; }
                if let Some(v) = self.font_weight { t.font_weight = v; }
                if let Some(v) = self.text_align { t.text_align = v; }
            }
            ElementKind::Shape(s) => {
                if let Some(v) = self.shape_type { s.shape_type = v; }
                if let Some(v) = self.fill_color { s.fill_color = v; }
                if let Some(v) = self.stroke_color { s.stroke_color = v; }
                if let Some(v) = self.stroke_width { s.stroke_width = v.max(0.0); }
            }
        }
    }
}

/// The full scene: surface settings, ordered elements, selection and view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// Logical surface size.
    pub width: u32,
    pub height: u32,
    pub background_color: [u8; 4],
    pub elements: Vec<CanvasElement>,
    pub selected_element_id: Option<ElementId>,
    /// View state carried for the host; no transform consumes it yet.
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl CanvasState {
    pub fn new(width: u32, height: u32, background_color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            background_color,
            elements: Vec::new(),
            selected_element_id: None,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }

    // ---- store operations ---------------------------------------------------

    /// Insert a new element on top of the current stack and return its id.
    pub fn add_element(&mut self, draft: ElementDraft) -> ElementId {
        let mut id = Uuid::new_v4();
        while self.get(id).is_some() {
            id = Uuid::new_v4();
        }
        let z_index = self.elements.len() as i64;
        self.elements.push(CanvasElement {
            id,
            name: draft.name,
            visible: draft.visible,
            locked: draft.locked,
            x: draft.x,
            y: draft.y,
            width: draft.width.max(0.0),
            height: draft.height.max(0.0),
            rotation: draft.rotation,
            opacity: draft.opacity.clamp(0.0, 1.0),
            z_index,
            kind: draft.kind,
        });
        id
    }

    /// Apply a partial update.  Returns `false` when the id is unknown.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        match self.get_mut(id) {
            Some(el) => {
                patch.apply_to(el);
                true
            }
            None => false,
        }
    }

    /// Remove an element, clearing the selection if it pointed at it.
    pub fn delete_element(&mut self, id: ElementId) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| e.id != id);
        if self.selected_element_id == Some(id) {
            self.selected_element_id = None;
        }
        self.elements.len() != before
    }

    /// Select an element (or nothing).  Unknown ids clear the selection.
    pub fn set_selected(&mut self, id: Option<ElementId>) {
        self.selected_element_id = id.filter(|id| self.get(*id).is_some());
    }

    // ---- queries ------------------------------------------------------------

    pub fn get(&self, id: ElementId) -> Option<&CanvasElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut CanvasElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn selected(&self) -> Option<&CanvasElement> {
        self.selected_element_id.and_then(|id| self.get(id))
    }

    /// Indices into `elements`, stably sorted by ascending z-index.  Equal
    /// z-indices keep insertion order, so a later add paints on top.
    pub fn paint_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.elements.len()).collect();
        order.sort_by_key(|&i| self.elements[i].z_index);
        order
    }

    /// Union of all visible element boxes, or `None` for an empty design.
    pub fn design_bounds(&self) -> Option<Rect> {
        self.elements
            .iter()
            .filter(|e| e.visible && e.width > 0.0 && e.height > 0.0)
            .map(|e| e.bounds())
            .reduce(|a, b| a.union(&b))
    }

    // ---- supplementary edits ------------------------------------------------

    /// Copy an element, offset by 10 px, on top of the stack.
    pub fn duplicate_element(&mut self, id: ElementId) -> Option<ElementId> {
        let src = self.get(id)?.clone();
        let draft = ElementDraft {
            name: format!("{} copy", src.name),
            visible: src.visible,
            locked: false,
            x: src.x + 10.0,
            y: src.y + 10.0,
            width: src.width,
            height: src.height,
            rotation: src.rotation,
            opacity: src.opacity,
            kind: src.kind,
        };
        Some(self.add_element(draft))
    }

    /// Resize from the property panel.  With `lock`, a missing height is
    /// derived from the width through the element's aspect ratio (and vice
    /// versa).
    pub fn set_element_size(
        &mut self,
        id: ElementId,
        width: Option<f32>,
        height: Option<f32>,
        lock: bool,
    ) -> bool {
        let Some(el) = self.get_mut(id) else { return false };
        let ratio = el.aspect_ratio();
        match (width, height) {
            (Some(w), None) => {
                el.width = w.max(0.0);
                if lock && ratio > 0.0 {
                    el.height = el.width / ratio;
                }
            }
            (None, Some(h)) => {
                el.height = h.max(0.0);
                if lock {
                    el.width = el.height * ratio;
                }
            }
            (Some(w), Some(h)) => {
                el.width = w.max(0.0);
                el.height = h.max(0.0);
            }
            (None, None) => {}
        }
        true
    }

    /// Move to the top of the paint order.  Z values are renumbered to
    /// `0..count` so a later `add_element` still lands above everything.
    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        self.move_to_end(id, true)
    }

    /// Move to the bottom of the paint order, renumbering like
    /// [`bring_to_front`](Self::bring_to_front).
    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        self.move_to_end(id, false)
    }

    fn move_to_end(&mut self, id: ElementId, front: bool) -> bool {
        let mut order = self.paint_order();
        let Some(pos) = order.iter().position(|&i| self.elements[i].id == id) else {
            return false;
        };
        let idx = order.remove(pos);
        if front {
            order.push(idx);
        } else {
            order.insert(0, idx);
        }
        self.renumber(&order);
        true
    }

    fn renumber(&mut self, order: &[usize]) {
        for (rank, &idx) in order.iter().enumerate() {
            self.elements[idx].z_index = rank as i64;
        }
    }

    /// Swap paint position with the element directly above.
    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        self.swap_with_neighbour(id, 1)
    }

    /// Swap paint position with the element directly below.
    pub fn send_backward(&mut self, id: ElementId) -> bool {
        self.swap_with_neighbour(id, -1)
    }

    /// Renumber every element to its paint position, then exchange two
    /// neighbours.  Renumbering removes ties so the swap is always visible.
    fn swap_with_neighbour(&mut self, id: ElementId, direction: isize) -> bool {
        let order = self.paint_order();
        let Some(pos) = order.iter().position(|&i| self.elements[i].id == id) else {
            return false;
        };
        let target = pos as isize + direction;
        if target < 0 || target as usize >= order.len() {
            return false;
        }
        self.renumber(&order);
        let a = order[pos];
        let b = order[target as usize];
        let za = self.elements[a].z_index;
        self.elements[a].z_index = self.elements[b].z_index;
        self.elements[b].z_index = za;
        true
    }
}
