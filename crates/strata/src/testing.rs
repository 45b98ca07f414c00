//! Shared fakes for exercising the frame loop without a GPU.
//!
//! [`TestStudio`] records every context and frame interaction into an
//! [`Arc`]-shared [`TestStudioStats`], and its frames paint into a
//! [`RecordingCanvas`] whose ops are kept for inspection. These are used by
//! the in-crate tests and are public so embedders can drive a
//! [`Shell`](crate::Shell) headlessly in their own tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geometry::Size;
use layers::{Canvas, CanvasOp, Image, RecordingCanvas, Texture};

use crate::studio::{ContextError, Studio, SurfaceFrame};

/// Counters shared between a [`TestStudio`] and the test observing it.
#[derive(Default)]
pub struct TestStudioStats {
    frames_acquired: AtomicUsize,
    frames_submitted: AtomicUsize,
    context_current_calls: AtomicUsize,
    context_cleared_calls: AtomicUsize,
    last_frame_ops: Mutex<Vec<CanvasOp>>,
}

impl TestStudioStats {
    pub fn frames_acquired(&self) -> usize {
        self.frames_acquired.load(Ordering::SeqCst)
    }

    pub fn frames_submitted(&self) -> usize {
        self.frames_submitted.load(Ordering::SeqCst)
    }

    pub fn context_current_calls(&self) -> usize {
        self.context_current_calls.load(Ordering::SeqCst)
    }

    pub fn context_cleared_calls(&self) -> usize {
        self.context_cleared_calls.load(Ordering::SeqCst)
    }

    /// Canvas ops recorded by the most recently submitted frame.
    pub fn last_frame_ops(&self) -> Vec<CanvasOp> {
        self.last_frame_ops
            .lock()
            .expect("frame ops lock poisoned")
            .clone()
    }
}

/// GPU-free [`Studio`] whose frames record their canvas calls.
pub struct TestStudio {
    stats: Arc<TestStudioStats>,
    fail_make_current: bool,
    refuse_frames: bool,
    fail_submits: bool,
}

impl TestStudio {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(TestStudioStats::default()),
            fail_make_current: false,
            refuse_frames: false,
            fail_submits: false,
        }
    }

    /// Studio whose context can never be made current.
    pub fn failing_context(mut self) -> Self {
        self.fail_make_current = true;
        self
    }

    /// Studio that never yields a surface.
    pub fn refusing_frames(mut self) -> Self {
        self.refuse_frames = true;
        self
    }

    /// Studio whose frames paint fine but fail to present.
    pub fn failing_submits(mut self) -> Self {
        self.fail_submits = true;
        self
    }

    pub fn stats(&self) -> Arc<TestStudioStats> {
        self.stats.clone()
    }
}

impl Default for TestStudio {
    fn default() -> Self {
        Self::new()
    }
}

impl Studio for TestStudio {
    fn make_render_context_current(&mut self) -> Result<(), ContextError> {
        self.stats.context_current_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_make_current {
            Err(ContextError::MakeCurrentFailed)
        } else {
            Ok(())
        }
    }

    fn clear_render_context(&mut self) -> bool {
        self.stats.context_cleared_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn acquire_frame(&mut self, _size: Size) -> Option<Box<dyn SurfaceFrame>> {
        if self.refuse_frames {
            return None;
        }
        self.stats.frames_acquired.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(TestSurfaceFrame {
            canvas: RecordingCanvas::new(),
            stats: self.stats.clone(),
            fail_submit: self.fail_submits,
        }))
    }
}

struct TestSurfaceFrame {
    canvas: RecordingCanvas,
    stats: Arc<TestStudioStats>,
    fail_submit: bool,
}

impl SurfaceFrame for TestSurfaceFrame {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn submit(mut self: Box<Self>) -> bool {
        *self
            .stats
            .last_frame_ops
            .lock()
            .expect("frame ops lock poisoned") = self.canvas.take_ops();
        if self.fail_submit {
            return false;
        }
        self.stats.frames_submitted.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Texture fake that counts every lifecycle notification.
#[derive(Default)]
pub struct TestTexture {
    images_made: AtomicUsize,
    context_created: AtomicUsize,
    context_destroyed: AtomicUsize,
    unregistered: AtomicUsize,
}

impl TestTexture {
    pub fn images_made(&self) -> usize {
        self.images_made.load(Ordering::SeqCst)
    }

    pub fn context_created(&self) -> usize {
        self.context_created.load(Ordering::SeqCst)
    }

    pub fn context_destroyed(&self) -> usize {
        self.context_destroyed.load(Ordering::SeqCst)
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl Texture for TestTexture {
    fn make_image(&self, width: u32, height: u32) -> Option<Image> {
        self.images_made.fetch_add(1, Ordering::SeqCst);
        Some(Image {
            id: 1,
            width,
            height,
        })
    }

    fn on_gr_context_created(&self) {
        self.context_created.fetch_add(1, Ordering::SeqCst);
    }

    fn on_gr_context_destroyed(&self) {
        self.context_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_texture_unregistered(&self) {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
    }
}
