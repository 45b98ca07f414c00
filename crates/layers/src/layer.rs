use geometry::{Rect, Transform};

use crate::canvas::Canvas;
use crate::texture::TextureRegistry;

/// Per-layer bounds bookkeeping shared by every variant.
///
/// `paint_bounds` is local-space and set by the layer itself during preroll;
/// `device_paint_bounds` is device-space and set by the layer's *caller*
/// (its container, or the tree for the root) after the recursive preroll
/// returns. Both are only meaningful for the frame recorded in
/// `preroll_frame`.
#[derive(Debug)]
pub struct LayerState {
    paint_bounds: Rect,
    device_paint_bounds: Rect,
    needs_system_composite: bool,
    preroll_frame: Option<u64>,
}

impl Default for LayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerState {
    pub fn new() -> Self {
        Self {
            paint_bounds: Rect::EMPTY,
            device_paint_bounds: Rect::EMPTY,
            needs_system_composite: false,
            preroll_frame: None,
        }
    }

    /// Tightest local-space bounds of everything this layer will draw.
    pub fn paint_bounds(&self) -> Rect {
        self.paint_bounds
    }

    pub fn set_paint_bounds(&mut self, bounds: Rect) {
        self.paint_bounds = if bounds.is_empty() { Rect::EMPTY } else { bounds };
    }

    /// Paint bounds mapped through the accumulated transform and clipped by
    /// the ancestor clip; [`Rect::EMPTY`] when fully clipped out.
    pub fn device_paint_bounds(&self) -> Rect {
        self.device_paint_bounds
    }

    pub fn set_device_paint_bounds(&mut self, bounds: Rect) {
        self.device_paint_bounds = if bounds.is_empty() { Rect::EMPTY } else { bounds };
    }

    pub fn needs_system_composite(&self) -> bool {
        self.needs_system_composite
    }

    pub fn set_needs_system_composite(&mut self, value: bool) {
        self.needs_system_composite = value;
    }

    pub fn mark_prerolled(&mut self, frame_number: u64) {
        self.preroll_frame = Some(frame_number);
    }

    pub fn is_prerolled_for(&self, frame_number: u64) -> bool {
        self.preroll_frame == Some(frame_number)
    }
}

/// State threaded through the first (bounds-computing) traversal phase.
pub struct PrerollContext {
    /// Accumulated ancestor clip in device space. Clip layers narrow this
    /// for their subtree and restore it before returning.
    pub device_clip: Rect,
    pub device_pixel_ratio: f32,
    pub frame_number: u64,
    /// Set when any layer in the tree needs the platform compositor.
    pub surface_needs_system_composite: bool,
}

/// State threaded through the second (drawing) traversal phase.
pub struct PaintContext<'a> {
    pub canvas: &'a mut dyn Canvas,
    pub texture_registry: Option<&'a TextureRegistry>,
    pub frame_number: u64,
    pub checkerboard_offscreen_layers: bool,
}

/// Polymorphic tree node with the two-phase traversal contract.
///
/// `preroll` must set the layer's own `paint_bounds` before returning; the
/// caller then resolves `device_paint_bounds`. `paint` is only valid after
/// a `preroll` for the same frame number and must issue zero draw calls
/// when the device bounds are empty.
pub trait Layer: Send {
    fn preroll(&mut self, context: &mut PrerollContext, transform: &Transform);

    fn paint(&self, context: &mut PaintContext<'_>);

    fn state(&self) -> &LayerState;

    fn state_mut(&mut self) -> &mut LayerState;
}

/// Map local paint bounds to device space and clip against the ancestor
/// clip. This is the one place device bounds are computed, so the
/// canonical-empty normalization happens exactly once.
pub fn resolve_device_bounds(paint_bounds: Rect, transform: &Transform, device_clip: &Rect) -> Rect {
    let mapped = transform.map_rect(&paint_bounds);
    mapped.intersect(device_clip)
}

/// Common paint preamble. Paint without a same-frame preroll is a
/// programming error (debug assertion); empty device bounds mean the layer
/// must be skipped entirely.
pub fn should_paint(state: &LayerState, context: &PaintContext<'_>) -> bool {
    debug_assert!(
        state.is_prerolled_for(context.frame_number),
        "paint called without a preroll for frame {}",
        context.frame_number
    );
    !state.device_paint_bounds().is_empty()
}

/// Scoped offscreen group: opens a `save_layer` on construction and
/// guarantees the composite-back `restore` (plus the optional diagnostic
/// checkerboard) on every exit path, including early returns and panics
/// while painting children.
pub struct AutoSaveLayer<'a, 'ctx> {
    context: &'a mut PaintContext<'ctx>,
    bounds: Rect,
    checkerboard: bool,
}

impl<'a, 'ctx> AutoSaveLayer<'a, 'ctx> {
    pub fn new(context: &'a mut PaintContext<'ctx>, bounds: Rect, alpha: u8) -> Self {
        let checkerboard = context.checkerboard_offscreen_layers;
        context.canvas.save_layer(&bounds, alpha);
        Self {
            context,
            bounds,
            checkerboard,
        }
    }

    pub fn context(&mut self) -> &mut PaintContext<'ctx> {
        self.context
    }
}

impl Drop for AutoSaveLayer<'_, '_> {
    fn drop(&mut self) {
        if self.checkerboard {
            self.context.canvas.draw_checkerboard(&self.bounds);
        }
        self.context.canvas.restore();
    }
}
