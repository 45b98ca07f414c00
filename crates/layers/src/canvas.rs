use geometry::{Rect, Transform};

/// Linear RGBA, 0..=1 per channel.
pub type Color = [f32; 4];

/// Recorded leaf content with precomputed bounds.
///
/// The recording format itself lives outside this workspace; all the layer
/// tree needs is the cull rectangle and an identity for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    cull_rect: Rect,
}

impl Picture {
    pub fn new(cull_rect: Rect) -> Self {
        Self { cull_rect }
    }

    /// Tightest bounds of everything the picture draws, in its own space.
    pub fn cull_rect(&self) -> Rect {
        self.cull_rect
    }
}

/// Opaque handle to a GPU image produced by a [`Texture`](crate::Texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Paint target the layer tree draws into.
///
/// Implementations must support save/restore nesting to at least the depth
/// of the layer tree. `save_layer` opens an offscreen group that is
/// composited back (with the given alpha) on the matching `restore`.
pub trait Canvas {
    fn save(&mut self);
    fn save_layer(&mut self, bounds: &Rect, alpha: u8);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    fn concat(&mut self, transform: &Transform);
    fn clip_rect(&mut self, rect: &Rect);
    fn draw_picture(&mut self, picture: &Picture);
    fn draw_image(&mut self, image: &Image, dst: &Rect);
    fn draw_rect(&mut self, rect: &Rect, color: Color);
    /// Diagnostic overlay for offscreen groups, drawn when the
    /// checkerboard debug flag is enabled.
    fn draw_checkerboard(&mut self, rect: &Rect);
}

/// One recorded canvas call.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Save,
    SaveLayer { bounds: Rect, alpha: u8 },
    Restore,
    Translate { dx: f32, dy: f32 },
    Concat(Transform),
    ClipRect(Rect),
    DrawPicture(Rect),
    DrawImage { image_id: u64, dst: Rect },
    DrawRect { rect: Rect, color: Color },
    DrawCheckerboard(Rect),
}

impl CanvasOp {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawPicture(_)
                | Self::DrawImage { .. }
                | Self::DrawRect { .. }
                | Self::DrawCheckerboard(_)
        )
    }
}

/// Canvas that records every call instead of rasterizing.
///
/// This is the reference implementation used by unit tests and by the
/// software studio; real GPU canvases live behind the same trait in
/// embedder code.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<CanvasOp>,
    save_depth: usize,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<CanvasOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of actual draw calls issued (save/clip bookkeeping excluded).
    pub fn draw_call_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_draw()).count()
    }

    /// Current unmatched save/saveLayer depth.
    pub fn save_depth(&self) -> usize {
        self.save_depth
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.save_depth += 1;
        self.ops.push(CanvasOp::Save);
    }

    fn save_layer(&mut self, bounds: &Rect, alpha: u8) {
        self.save_depth += 1;
        self.ops.push(CanvasOp::SaveLayer {
            bounds: *bounds,
            alpha,
        });
    }

    fn restore(&mut self) {
        debug_assert!(self.save_depth > 0, "restore without matching save");
        self.save_depth = self.save_depth.saturating_sub(1);
        self.ops.push(CanvasOp::Restore);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.ops.push(CanvasOp::Translate { dx, dy });
    }

    fn concat(&mut self, transform: &Transform) {
        self.ops.push(CanvasOp::Concat(*transform));
    }

    fn clip_rect(&mut self, rect: &Rect) {
        self.ops.push(CanvasOp::ClipRect(*rect));
    }

    fn draw_picture(&mut self, picture: &Picture) {
        self.ops.push(CanvasOp::DrawPicture(picture.cull_rect()));
    }

    fn draw_image(&mut self, image: &Image, dst: &Rect) {
        self.ops.push(CanvasOp::DrawImage {
            image_id: image.id,
            dst: *dst,
        });
    }

    fn draw_rect(&mut self, rect: &Rect, color: Color) {
        self.ops.push(CanvasOp::DrawRect { rect: *rect, color });
    }

    fn draw_checkerboard(&mut self, rect: &Rect) {
        self.ops.push(CanvasOp::DrawCheckerboard(*rect));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_canvas_counts_only_draw_calls() {
        let mut canvas = RecordingCanvas::new();
        canvas.save();
        canvas.clip_rect(&Rect::from_ltrb(0.0, 0.0, 10.0, 10.0));
        canvas.draw_rect(&Rect::from_ltrb(1.0, 1.0, 2.0, 2.0), [1.0, 0.0, 0.0, 1.0]);
        canvas.restore();
        assert_eq!(canvas.draw_call_count(), 1);
        assert_eq!(canvas.ops().len(), 4);
        assert_eq!(canvas.save_depth(), 0);
    }

    #[test]
    fn save_layer_nests_like_save() {
        let mut canvas = RecordingCanvas::new();
        canvas.save();
        canvas.save_layer(&Rect::from_ltrb(0.0, 0.0, 4.0, 4.0), 128);
        assert_eq!(canvas.save_depth(), 2);
        canvas.restore();
        canvas.restore();
        assert_eq!(canvas.save_depth(), 0);
    }
}
