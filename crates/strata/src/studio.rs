use geometry::Size;
use layers::Canvas;

/// Failure making the GPU render context current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The context exists but could not be bound to this thread.
    MakeCurrentFailed,
    /// The context has been lost and must be recreated.
    ContextLost,
}

/// One acquired drawable surface.
///
/// The rasterizer paints into [`canvas`](SurfaceFrame::canvas) and then
/// presents with [`submit`](SurfaceFrame::submit); a frame that is dropped
/// without submitting is simply discarded by the backend.
pub trait SurfaceFrame {
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Present the frame. Returns false when presentation failed.
    fn submit(self: Box<Self>) -> bool;
}

/// Surface provider owned by the raster thread.
///
/// The GPU backend behind it (command buffers, swapchains, shader state)
/// lives outside this workspace; the rasterizer only brackets each frame's
/// work with these calls.
pub trait Studio: Send {
    fn make_render_context_current(&mut self) -> Result<(), ContextError>;

    fn clear_render_context(&mut self) -> bool;

    fn allows_drawing_when_gpu_disabled(&self) -> bool {
        false
    }

    fn enable_raster_cache(&self) -> bool {
        true
    }

    /// Yield a drawable surface for a frame of the given physical size, or
    /// `None` when the backend cannot provide one right now.
    fn acquire_frame(&mut self, size: Size) -> Option<Box<dyn SurfaceFrame>>;
}
