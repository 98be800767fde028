// ============================================================================
// INTERACTION — hit-testing and the pointer/keyboard state machine
// ============================================================================

use crate::image_cache::ImageCache;
use crate::render::{self, ResizeHandle};
use crate::scene::{CanvasElement, CanvasState, ElementId, ElementPatch};
use crate::text::FontBook;
use crate::units::{Affine, Rect};

/// Smallest width/height a resize can produce.
pub const MIN_ELEMENT_SIZE: f32 = 1.0;
pub const NUDGE_STEP: f32 = 1.0;
pub const NUDGE_STEP_LARGE: f32 = 10.0;

/// Modal pointer state.  Only one interaction can be active at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionState {
    Idle,
    Dragging {
        id: ElementId,
        start_pointer: (f32, f32),
        start_pos: (f32, f32),
    },
    Resizing {
        id: ElementId,
        handle: ResizeHandle,
        start_pointer: (f32, f32),
        start_rect: Rect,
        rotation: f32,
        /// Width / height locked at resize start, if the aspect lock is on.
        ratio: Option<f32>,
    },
}

/// Cursor the host should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorHint {
    Default,
    Move,
    /// Top-left ↔ bottom-right diagonal.
    ResizeNwSe,
    /// Top-right ↔ bottom-left diagonal.
    ResizeNeSw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorKey {
    Delete,
    Backspace,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Escape,
}

/// Rotate a canvas point into the element's unrotated frame.
fn to_local(el: &CanvasElement, x: f32, y: f32) -> (f32, f32) {
    render::element_transform(el)
        .invert()
        .map_or((x, y), |inv| inv.apply(x, y))
}

/// Topmost visible element under `(x, y)`, or `None`.
pub fn hit_test(
    scene: &CanvasState,
    cache: &ImageCache,
    fonts: &mut FontBook,
    x: f32,
    y: f32,
) -> Option<ElementId> {
    for idx in scene.paint_order().into_iter().rev() {
        let el = &scene.elements[idx];
        if !el.visible {
            continue;
        }
        let Some(bounds) = render::effective_bounds(el, cache, fonts) else {
            continue;
        };
        let (lx, ly) = to_local(el, x, y);
        if bounds.contains(lx, ly) {
            return Some(el.id);
        }
    }
    None
}

/// Corner handle of the selected, unlocked element under `(x, y)`.
pub fn handle_at(scene: &CanvasState, x: f32, y: f32) -> Option<(ElementId, ResizeHandle)> {
    let el = scene.selected()?;
    if el.locked || !el.visible {
        return None;
    }
    let (lx, ly) = to_local(el, x, y);
    let bounds = el.bounds();
    ResizeHandle::all()
        .into_iter()
        .find(|h| h.rect(&bounds).contains(lx, ly))
        .map(|h| (el.id, h))
}

/// New box for a corner drag.  `delta` is the pointer movement in the
/// element's unrotated frame.  The corner opposite `handle` stays fixed in
/// canvas space.
pub fn resize_rect(
    start: &Rect,
    rotation: f32,
    handle: ResizeHandle,
    delta: (f32, f32),
    ratio: Option<f32>,
) -> Rect {
    let (sx, sy) = match handle {
        ResizeHandle::TopLeft => (-1.0, -1.0),
        ResizeHandle::TopRight => (1.0, -1.0),
        ResizeHandle::BottomRight => (1.0, 1.0),
        ResizeHandle::BottomLeft => (-1.0, 1.0),
    };
    let mut w = start.width + sx * delta.0;
    let mut h = start.height + sy * delta.1;

    if let Some(ratio) = ratio.filter(|r| *r > 0.0 && r.is_finite()) {
        let rel_w = if start.width > 0.0 { (w - start.width).abs() / start.width } else { 0.0 };
        let rel_h = if start.height > 0.0 { (h - start.height).abs() / start.height } else { 0.0 };
        if rel_w >= rel_h {
            w = w.max(MIN_ELEMENT_SIZE);
            h = w / ratio;
        } else {
            h = h.max(MIN_ELEMENT_SIZE);
            w = h * ratio;
        }
    }
    let w = w.max(MIN_ELEMENT_SIZE);
    let h = h.max(MIN_ELEMENT_SIZE);

    // Anchor corner relative to the start center, then the new center.
    let anchor = (-sx * start.width * 0.5, -sy * start.height * 0.5);
    let local_center = (anchor.0 + sx * w * 0.5, anchor.1 + sy * h * 0.5);
    let (ox, oy) = Affine::identity().rotate_deg(rotation).apply(local_center.0, local_center.1);
    let (cx, cy) = start.center();
    Rect::new(cx + ox - w * 0.5, cy + oy - h * 0.5, w, h)
}

pub struct InteractionController {
    state: InteractionState,
    hovered: Option<ElementId>,
    hovered_handle: Option<ResizeHandle>,
    pub aspect_lock: bool,
}

impl InteractionController {
    pub fn new(aspect_lock: bool) -> Self {
        Self {
            state: InteractionState::Idle,
            hovered: None,
            hovered_handle: None,
            aspect_lock,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, InteractionState::Idle)
    }

    pub fn hovered(&self) -> Option<ElementId> {
        self.hovered
    }

    pub fn cursor(&self) -> CursorHint {
        let handle = match &self.state {
            InteractionState::Dragging { .. } => return CursorHint::Move,
            InteractionState::Resizing { handle, .. } => Some(*handle),
            InteractionState::Idle => self.hovered_handle,
        };
        match handle {
            Some(ResizeHandle::TopLeft | ResizeHandle::BottomRight) => CursorHint::ResizeNwSe,
            Some(ResizeHandle::TopRight | ResizeHandle::BottomLeft) => CursorHint::ResizeNeSw,
            None if self.hovered.is_some() => CursorHint::Move,
            None => CursorHint::Default,
        }
    }

    /// Forget transient state (after a scene reload).
    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
        self.hovered = None;
        self.hovered_handle = None;
    }

    /// Returns `true` when the scene changed (selection included).
    pub fn pointer_down(
        &mut self,
        scene: &mut CanvasState,
        cache: &ImageCache,
        fonts: &mut FontBook,
        x: f32,
        y: f32,
    ) -> bool {
        // A stray down during an active gesture ends that gesture first.
        self.pointer_up();

        if let Some((id, handle)) = handle_at(scene, x, y)
            && let Some(el) = scene.get(id)
        {
            self.state = InteractionState::Resizing {
                id,
                handle,
                start_pointer: (x, y),
                start_rect: el.bounds(),
                rotation: el.rotation,
                ratio: self.aspect_lock.then(|| el.aspect_ratio()),
            };
            return false;
        }

        let before = scene.selected_element_id;
        match hit_test(scene, cache, fonts, x, y) {
            Some(id) => {
                scene.set_selected(Some(id));
                if let Some(el) = scene.get(id)
                    && !el.locked
                {
                    self.state = InteractionState::Dragging {
                        id,
                        start_pointer: (x, y),
                        start_pos: (el.x, el.y),
                    };
                }
            }
            None => scene.set_selected(None),
        }
        scene.selected_element_id != before
    }

    /// Returns `true` when the scene changed.
    pub fn pointer_move(
        &mut self,
        scene: &mut CanvasState,
        cache: &ImageCache,
        fonts: &mut FontBook,
        x: f32,
        y: f32,
    ) -> bool {
        match self.state.clone() {
            InteractionState::Idle => {
                self.hovered_handle = handle_at(scene, x, y).map(|(_, h)| h);
                self.hovered = hit_test(scene, cache, fonts, x, y);
                false
            }
            InteractionState::Dragging { id, start_pointer, start_pos } => {
                let nx = start_pos.0 + (x - start_pointer.0);
                let ny = start_pos.1 + (y - start_pointer.1);
                scene.update_element(id, &ElementPatch::position(nx, ny))
            }
            InteractionState::Resizing { id, handle, start_pointer, start_rect, rotation, ratio } => {
                let (dx, dy) = Affine::identity()
                    .rotate_deg(-rotation)
                    .apply(x - start_pointer.0, y - start_pointer.1);
                let rect = resize_rect(&start_rect, rotation, handle, (dx, dy), ratio);
                scene.update_element(id, &ElementPatch::rect(rect))
            }
        }
    }

    /// Ends any drag or resize.  Returns `true` if one was active.
    pub fn pointer_up(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = InteractionState::Idle;
        was_active
    }

    /// Returns `true` when the scene changed.
    pub fn key(&mut self, scene: &mut CanvasState, key: EditorKey, shift: bool) -> bool {
        if key == EditorKey::Escape {
            self.pointer_up();
            let had = scene.selected_element_id.is_some();
            scene.set_selected(None);
            return had;
        }
        if self.is_active() {
            return false;
        }
        let Some(el) = scene.selected() else { return false };
        if el.locked {
            return false;
        }
        let (id, x, y) = (el.id, el.x, el.y);
        let step = if shift { NUDGE_STEP_LARGE } else { NUDGE_STEP };
        match key {
            EditorKey::Delete | EditorKey::Backspace => {
                if self.hovered == Some(id) {
                    self.hovered = None;
                }
                scene.delete_element(id)
            }
            EditorKey::ArrowLeft => scene.update_element(id, &ElementPatch::position(x - step, y)),
            EditorKey::ArrowRight => scene.update_element(id, &ElementPatch::position(x + step, y)),
            EditorKey::ArrowUp => scene.update_element(id, &ElementPatch::position(x, y - step)),
            EditorKey::ArrowDown => scene.update_element(id, &ElementPatch::position(x, y + step)),
            EditorKey::Escape => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ElementDraft, ShapeType};
    use image::RgbaImage;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn setup() -> (CanvasState, ImageCache, FontBook) {
        (
            CanvasState::new(800, 600, [0, 0, 0, 255]),
            ImageCache::new(),
            FontBook::offline(),
        )
    }

    fn rect_shape(scene: &mut CanvasState, x: f32, y: f32, w: f32, h: f32) -> ElementId {
        scene.add_element(ElementDraft::shape(ShapeType::Rectangle).at(x, y).sized(w, h))
    }

    #[test]
    fn topmost_element_wins() {
        let (mut scene, cache, mut fonts) = setup();
        let below = rect_shape(&mut scene, 0.0, 0.0, 100.0, 100.0);
        let above = rect_shape(&mut scene, 50.0, 50.0, 100.0, 100.0);
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 75.0, 75.0), Some(above));
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 25.0, 25.0), Some(below));
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 400.0, 400.0), None);
        scene.send_to_back(above);
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 75.0, 75.0), Some(below));
    }

    #[test]
    fn images_hit_only_once_decoded() {
        let (mut scene, mut cache, mut fonts) = setup();
        let id = scene.add_element(ElementDraft::image("mem://a", 40, 40).at(10.0, 10.0));
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 20.0, 20.0), None);
        cache.insert_decoded("mem://a", RgbaImage::new(40, 40));
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 20.0, 20.0), Some(id));
    }

    #[test]
    fn rotated_elements_hit_in_their_own_frame() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 0.0, 45.0, 100.0, 10.0);
        let mut patch = ElementPatch::default();
        patch.rotation = Some(90.0);
        scene.update_element(id, &patch);
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 50.0, 10.0), Some(id));
        assert_eq!(hit_test(&scene, &cache, &mut fonts, 10.0, 50.0), None);
    }

    #[test]
    fn drag_moves_by_pointer_delta() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 10.0, 10.0, 50.0, 50.0);
        let mut ctl = InteractionController::new(true);
        assert!(ctl.pointer_down(&mut scene, &cache, &mut fonts, 20.0, 20.0));
        assert_eq!(scene.selected_element_id, Some(id));
        ctl.pointer_move(&mut scene, &cache, &mut fonts, -500.0, 30.0);
        let el = scene.get(id).unwrap();
        assert_eq!((el.x, el.y), (-510.0, 20.0));
        assert!(ctl.pointer_up());
        assert!(!ctl.pointer_up());
    }

    #[test]
    fn miss_clears_selection() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 10.0, 10.0, 50.0, 50.0);
        scene.set_selected(Some(id));
        let mut ctl = InteractionController::new(true);
        assert!(ctl.pointer_down(&mut scene, &cache, &mut fonts, 500.0, 500.0));
        assert_eq!(scene.selected_element_id, None);
        assert_eq!(ctl.state(), &InteractionState::Idle);
    }

    #[test]
    fn locked_elements_select_but_do_not_move() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 10.0, 10.0, 50.0, 50.0);
        let mut patch = ElementPatch::default();
        patch.locked = Some(true);
        scene.update_element(id, &patch);

        let mut ctl = InteractionController::new(true);
        ctl.pointer_down(&mut scene, &cache, &mut fonts, 20.0, 20.0);
        assert_eq!(scene.selected_element_id, Some(id));
        assert!(!ctl.pointer_move(&mut scene, &cache, &mut fonts, 90.0, 90.0));
        assert_eq!(scene.get(id).unwrap().x, 10.0);
        assert!(!ctl.key(&mut scene, EditorKey::Delete, false));
        assert!(scene.get(id).is_some());
    }

    #[test]
    fn aspect_locked_corner_resize_keeps_opposite_corner() {
        let (mut scene, mut cache, mut fonts) = setup();
        cache.insert_decoded("mem://a", RgbaImage::new(200, 100));
        let id = scene.add_element(ElementDraft::image("mem://a", 200, 100).at(100.0, 100.0));
        scene.set_selected(Some(id));

        let mut ctl = InteractionController::new(true);
        // Grab the bottom-right handle at (300, 200).
        ctl.pointer_down(&mut scene, &cache, &mut fonts, 300.0, 200.0);
        assert!(matches!(
            ctl.state(),
            InteractionState::Resizing { handle: ResizeHandle::BottomRight, .. }
        ));
        ctl.pointer_move(&mut scene, &cache, &mut fonts, 350.0, 205.0);
        let el = scene.get(id).unwrap();
        assert!(close(el.width, 250.0) && close(el.height, 125.0));
        assert!(close(el.x, 100.0) && close(el.y, 100.0));
    }

    #[test]
    fn free_resize_from_top_left_anchors_bottom_right() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 100.0, 100.0, 100.0, 50.0);
        scene.set_selected(Some(id));
        let mut ctl = InteractionController::new(false);
        ctl.pointer_down(&mut scene, &cache, &mut fonts, 100.0, 100.0);
        ctl.pointer_move(&mut scene, &cache, &mut fonts, 80.0, 110.0);
        let el = scene.get(id).unwrap();
        assert!(close(el.x + el.width, 200.0) && close(el.y + el.height, 150.0));
        assert!(close(el.width, 120.0) && close(el.height, 40.0));

        // Dragging far past the anchor bottoms out at the minimum size.
        ctl.pointer_move(&mut scene, &cache, &mut fonts, 500.0, 500.0);
        let el = scene.get(id).unwrap();
        assert_eq!((el.width, el.height), (MIN_ELEMENT_SIZE, MIN_ELEMENT_SIZE));
        assert!(close(el.x + el.width, 200.0));
    }

    #[test]
    fn rotated_resize_keeps_anchor_in_canvas_space() {
        let start = Rect::new(0.0, 0.0, 100.0, 50.0);
        let before = Affine::identity()
            .translate(50.0, 25.0)
            .rotate_deg(30.0)
            .translate(-50.0, -25.0)
            .apply(0.0, 0.0);
        let r = resize_rect(&start, 30.0, ResizeHandle::BottomRight, (20.0, 10.0), None);
        let (cx, cy) = r.center();
        let after = Affine::identity()
            .translate(cx, cy)
            .rotate_deg(30.0)
            .translate(-cx, -cy)
            .apply(r.x, r.y);
        assert!(close(before.0, after.0) && close(before.1, after.1));
        assert!(close(r.width, 120.0) && close(r.height, 60.0));
    }

    #[test]
    fn pointer_down_during_resize_ends_it_first() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 100.0, 100.0, 100.0, 50.0);
        scene.set_selected(Some(id));
        let mut ctl = InteractionController::new(false);
        ctl.pointer_down(&mut scene, &cache, &mut fonts, 200.0, 150.0);
        assert!(ctl.is_active());
        ctl.pointer_down(&mut scene, &cache, &mut fonts, 600.0, 500.0);
        assert_eq!(ctl.state(), &InteractionState::Idle);
        assert_eq!(scene.selected_element_id, None);
    }

    #[test]
    fn hover_tracks_without_mutation() {
        let (mut scene, cache, mut fonts) = setup();
        let id = rect_shape(&mut scene, 10.0, 10.0, 50.0, 50.0);
        let snapshot = scene.clone();
        let mut ctl = InteractionController::new(true);
        assert!(!ctl.pointer_move(&mut scene, &cache, &mut fonts, 30.0, 30.0));
        assert_eq!(ctl.hovered(), Some(id));
        assert_eq!(ctl.cursor(), CursorHint::Move);
        assert_eq!(scene, snapshot);
    }

    #[test]
    fn keyboard_nudges_deletes_and_escapes() {
        let (mut scene, _cache, _fonts) = setup();
        let id = rect_shape(&mut scene, 10.0, 10.0, 50.0, 50.0);
        scene.set_selected(Some(id));
        let mut ctl = InteractionController::new(true);
        ctl.key(&mut scene, EditorKey::ArrowRight, false);
        ctl.key(&mut scene, EditorKey::ArrowDown, true);
        let el = scene.get(id).unwrap();
        assert_eq!((el.x, el.y), (11.0, 20.0));

        assert!(ctl.key(&mut scene, EditorKey::Escape, false));
        assert_eq!(scene.selected_element_id, None);
        assert!(!ctl.key(&mut scene, EditorKey::Delete, false));

        scene.set_selected(Some(id));
        assert!(ctl.key(&mut scene, EditorKey::Backspace, false));
        assert!(scene.elements.is_empty());
        assert_eq!(scene.selected_element_id, None);
    }
}
