use std::time::Instant;

use geometry::{Rect, Size, Transform};
use log::trace;

use crate::canvas::Canvas;
use crate::layer::{Layer, PaintContext, PrerollContext, resolve_device_bounds};
use crate::texture::TextureRegistry;

/// One frame's worth of drawing instructions.
///
/// Owns the root of a layer tree plus the frame metadata. A tree is built
/// on the producer thread, handed to the frame pipeline complete, and from
/// then on treated as logically immutable: the raster thread runs
/// [`preroll`](LayerTree::preroll) and [`paint`](LayerTree::paint) but
/// never restructures it.
///
/// `frame_size` is in physical pixels; layer coordinates are logical and
/// scaled by `device_pixel_ratio` during traversal.
pub struct LayerTree {
    root: Option<Box<dyn Layer>>,
    frame_size: Size,
    device_pixel_ratio: f32,
    target_time: Instant,
    frame_number: u64,
}

impl LayerTree {
    pub fn new(
        root: Option<Box<dyn Layer>>,
        frame_size: Size,
        device_pixel_ratio: f32,
        target_time: Instant,
        frame_number: u64,
    ) -> Self {
        Self {
            root,
            frame_size,
            device_pixel_ratio,
            target_time,
            frame_number,
        }
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// The instant this frame is intended to be presented at; drives the
    /// newest-wins eviction decisions downstream.
    pub fn target_time(&self) -> Instant {
        self.target_time
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn root(&self) -> Option<&dyn Layer> {
        self.root.as_deref()
    }

    fn base_transform(&self) -> Transform {
        Transform::scale(self.device_pixel_ratio, self.device_pixel_ratio)
    }

    /// First traversal phase: compute every layer's bounds and clips.
    ///
    /// Returns true when some layer in the tree needs the platform
    /// compositor. Preroll never fails; a degenerate tree simply ends up
    /// with canonical-empty bounds.
    pub fn preroll(&mut self) -> bool {
        let device_clip = Rect::from_size(self.frame_size);
        let transform = self.base_transform();
        let mut context = PrerollContext {
            device_clip,
            device_pixel_ratio: self.device_pixel_ratio,
            frame_number: self.frame_number,
            surface_needs_system_composite: false,
        };
        if let Some(root) = &mut self.root {
            root.preroll(&mut context, &transform);
            let device_bounds = resolve_device_bounds(
                root.state().paint_bounds(),
                &transform,
                &context.device_clip,
            );
            root.state_mut().set_device_paint_bounds(device_bounds);
        }
        context.surface_needs_system_composite
    }

    /// Second traversal phase: issue draw commands for the prerolled tree.
    ///
    /// Must follow a [`preroll`](LayerTree::preroll) in the same frame. A
    /// tree whose root device bounds are empty issues zero draw calls.
    pub fn paint(
        &self,
        canvas: &mut dyn Canvas,
        texture_registry: Option<&TextureRegistry>,
        checkerboard_offscreen_layers: bool,
    ) {
        let Some(root) = &self.root else {
            trace!("frame {} has no root layer, nothing to paint", self.frame_number);
            return;
        };
        if root.state().device_paint_bounds().is_empty() {
            trace!("frame {} fully clipped out, nothing to paint", self.frame_number);
            return;
        }
        let mut context = PaintContext {
            canvas,
            texture_registry,
            frame_number: self.frame_number,
            checkerboard_offscreen_layers,
        };
        let transform = self.base_transform();
        context.canvas.save();
        context.canvas.concat(&transform);
        root.paint(&mut context);
        context.canvas.restore();
    }
}
