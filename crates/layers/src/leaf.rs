use geometry::{Point, Rect, Transform};
use log::trace;

use crate::canvas::Picture;
use crate::layer::{Layer, LayerState, PaintContext, PrerollContext, should_paint};

/// Leaf layer replaying recorded content at an offset.
pub struct PictureLayer {
    state: LayerState,
    offset: Point,
    picture: Picture,
}

impl PictureLayer {
    pub fn new(offset: Point, picture: Picture) -> Self {
        Self {
            state: LayerState::new(),
            offset,
            picture,
        }
    }
}

impl Layer for PictureLayer {
    fn preroll(&mut self, context: &mut PrerollContext, _transform: &Transform) {
        self.state.mark_prerolled(context.frame_number);
        self.state
            .set_paint_bounds(self.picture.cull_rect().offset(self.offset.x, self.offset.y));
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(&self.state, context) {
            return;
        }
        context.canvas.save();
        context.canvas.translate(self.offset.x, self.offset.y);
        context.canvas.draw_picture(&self.picture);
        context.canvas.restore();
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}

/// Leaf layer sampling an externally-produced texture by registry id.
///
/// A missing registry, an unregistered id, or a texture with no current
/// image all mean "nothing to draw" for this frame.
pub struct TextureLayer {
    state: LayerState,
    bounds: Rect,
    texture_id: u64,
}

impl TextureLayer {
    pub fn new(bounds: Rect, texture_id: u64) -> Self {
        Self {
            state: LayerState::new(),
            bounds,
            texture_id,
        }
    }

    pub fn texture_id(&self) -> u64 {
        self.texture_id
    }
}

impl Layer for TextureLayer {
    fn preroll(&mut self, context: &mut PrerollContext, _transform: &Transform) {
        self.state.mark_prerolled(context.frame_number);
        self.state.set_paint_bounds(self.bounds);
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(&self.state, context) {
            return;
        }
        let Some(registry) = context.texture_registry else {
            trace!("texture layer painted without a registry");
            return;
        };
        let Some(texture) = registry.get_texture(self.texture_id) else {
            trace!("texture {} not registered, skipping", self.texture_id);
            return;
        };
        let width = self.bounds.width().round().max(0.0) as u32;
        let height = self.bounds.height().round().max(0.0) as u32;
        let Some(image) = texture.make_image(width, height) else {
            return;
        };
        context.canvas.draw_image(&image, &self.bounds);
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}

/// Placeholder for embedded platform content.
///
/// The subtree is handed to the platform compositor; this layer only
/// reserves its bounds and raises the system-composite flag, it never
/// draws.
pub struct PlatformViewLayer {
    state: LayerState,
    bounds: Rect,
    view_id: u64,
}

impl PlatformViewLayer {
    pub fn new(bounds: Rect, view_id: u64) -> Self {
        Self {
            state: LayerState::new(),
            bounds,
            view_id,
        }
    }

    pub fn view_id(&self) -> u64 {
        self.view_id
    }
}

impl Layer for PlatformViewLayer {
    fn preroll(&mut self, context: &mut PrerollContext, _transform: &Transform) {
        self.state.mark_prerolled(context.frame_number);
        self.state.set_paint_bounds(self.bounds);
        self.state.set_needs_system_composite(true);
        context.surface_needs_system_composite = true;
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(&self.state, context) {
            return;
        }
        // Composited by the platform; nothing to draw here.
        trace!("platform view {} composited externally", self.view_id);
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasOp, Image, RecordingCanvas};
    use crate::layer::resolve_device_bounds;
    use crate::texture::{Texture, TextureRegistry};
    use std::sync::Arc;

    fn prerolled<L: Layer>(mut layer: L) -> L {
        let mut context = PrerollContext {
            device_clip: Rect::from_ltrb(0.0, 0.0, 100.0, 100.0),
            device_pixel_ratio: 1.0,
            frame_number: 1,
            surface_needs_system_composite: false,
        };
        layer.preroll(&mut context, &Transform::IDENTITY);
        let device_bounds = resolve_device_bounds(
            layer.state().paint_bounds(),
            &Transform::IDENTITY,
            &context.device_clip,
        );
        layer.state_mut().set_device_paint_bounds(device_bounds);
        layer
    }

    fn paint_ops<L: Layer>(layer: &L, registry: Option<&TextureRegistry>) -> Vec<CanvasOp> {
        let mut canvas = RecordingCanvas::new();
        let mut context = PaintContext {
            canvas: &mut canvas,
            texture_registry: registry,
            frame_number: 1,
            checkerboard_offscreen_layers: false,
        };
        layer.paint(&mut context);
        canvas.take_ops()
    }

    struct StaticTexture;

    impl Texture for StaticTexture {
        fn make_image(&self, width: u32, height: u32) -> Option<Image> {
            Some(Image {
                id: 99,
                width,
                height,
            })
        }
    }

    struct EmptyTexture;

    impl Texture for EmptyTexture {
        fn make_image(&self, _width: u32, _height: u32) -> Option<Image> {
            None
        }
    }

    #[test]
    fn picture_layer_bounds_are_offset_cull_rect() {
        let layer = prerolled(PictureLayer::new(
            Point::new(5.0, 5.0),
            Picture::new(Rect::from_ltrb(0.0, 0.0, 10.0, 10.0)),
        ));
        assert_eq!(
            layer.state().paint_bounds(),
            Rect::from_ltrb(5.0, 5.0, 15.0, 15.0)
        );
    }

    #[test]
    fn texture_layer_draws_registered_texture() {
        let mut registry = TextureRegistry::new();
        let id = registry.register_texture(Arc::new(StaticTexture));
        let bounds = Rect::from_ltrb(0.0, 0.0, 16.0, 8.0);
        let layer = prerolled(TextureLayer::new(bounds, id));

        let ops = paint_ops(&layer, Some(&registry));
        assert_eq!(
            ops,
            vec![CanvasOp::DrawImage {
                image_id: 99,
                dst: bounds
            }]
        );
    }

    #[test]
    fn texture_layer_skips_unregistered_id() {
        let registry = TextureRegistry::new();
        let layer = prerolled(TextureLayer::new(Rect::from_ltrb(0.0, 0.0, 8.0, 8.0), 42));
        assert!(paint_ops(&layer, Some(&registry)).is_empty());
    }

    #[test]
    fn texture_layer_skips_texture_with_no_image() {
        let mut registry = TextureRegistry::new();
        let id = registry.register_texture(Arc::new(EmptyTexture));
        let layer = prerolled(TextureLayer::new(Rect::from_ltrb(0.0, 0.0, 8.0, 8.0), id));
        assert!(paint_ops(&layer, Some(&registry)).is_empty());
    }

    #[test]
    fn platform_view_layer_raises_system_composite_flag() {
        let mut layer = PlatformViewLayer::new(Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), 3);
        let mut context = PrerollContext {
            device_clip: Rect::from_ltrb(0.0, 0.0, 100.0, 100.0),
            device_pixel_ratio: 1.0,
            frame_number: 1,
            surface_needs_system_composite: false,
        };
        layer.preroll(&mut context, &Transform::IDENTITY);
        assert!(context.surface_needs_system_composite);
        assert!(layer.state().needs_system_composite());

        let paint_bounds = layer.state().paint_bounds();
        layer.state_mut().set_device_paint_bounds(paint_bounds);
        assert!(paint_ops(&layer, None).is_empty());
    }
}
