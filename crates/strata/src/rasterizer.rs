use std::time::Instant;

use frame_pipeline::Pipeline;
use layers::{LayerTree, TextureRegistry};
use log::{debug, trace, warn};
use threading::TaskRunnerHandle;

use crate::studio::Studio;

/// Outcome of one attempt to draw from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStatus {
    /// A frame was painted and submitted.
    Done,
    /// The pipeline had nothing ready.
    NoFrameAvailable,
    /// A frame was consumed but could not be drawn (no studio, no surface,
    /// or drawing is disabled); the frame is gone.
    Discarded,
    /// The frame was painted but presentation failed.
    Failed,
}

/// Raster-thread half of the frame loop.
///
/// Owns the [`Studio`] while one is set up, the texture registry, and the
/// last successfully presented tree. Everything here is confined to the
/// raster task runner; the mutating paths debug-assert that confinement.
pub struct Rasterizer {
    raster_runner: TaskRunnerHandle,
    studio: Option<Box<dyn Studio>>,
    texture_registry: TextureRegistry,
    last_tree: Option<LayerTree>,
    last_target_time: Option<Instant>,
    checkerboard_offscreen_layers: bool,
    gpu_disabled: bool,
    frames_presented: u64,
}

impl Rasterizer {
    pub fn new(raster_runner: TaskRunnerHandle) -> Self {
        let texture_registry = TextureRegistry::with_affinity(raster_runner.clone());
        Self {
            raster_runner,
            studio: None,
            texture_registry,
            last_tree: None,
            last_target_time: None,
            checkerboard_offscreen_layers: false,
            gpu_disabled: false,
            frames_presented: 0,
        }
    }

    fn check_affinity(&self) {
        debug_assert!(
            self.raster_runner.runs_tasks_on_current_thread(),
            "rasterizer touched off the '{}' runner thread",
            self.raster_runner.name()
        );
    }

    /// Take ownership of the studio and bring its context up. Registered
    /// textures are told about the new context only when binding succeeded;
    /// a studio whose context cannot be bound is still installed so a later
    /// frame can retry.
    pub fn setup(&mut self, mut studio: Box<dyn Studio>) {
        self.check_affinity();
        match studio.make_render_context_current() {
            Ok(()) => self.texture_registry.on_gr_context_created(),
            Err(error) => warn!("studio context not current during setup: {error:?}"),
        }
        self.studio = Some(studio);
        debug!("rasterizer set up on '{}'", self.raster_runner.name());
    }

    /// Tear the studio down and drop GPU-tied state. Safe to call without a
    /// prior [`setup`](Rasterizer::setup).
    pub fn teardown(&mut self) {
        self.check_affinity();
        if let Some(studio) = &mut self.studio {
            if studio.make_render_context_current().is_ok() {
                self.texture_registry.on_gr_context_destroyed();
            }
            studio.clear_render_context();
        }
        self.studio = None;
        self.last_tree = None;
        self.last_target_time = None;
        debug!("rasterizer torn down");
    }

    pub fn set_checkerboard_offscreen_layers(&mut self, enabled: bool) {
        self.checkerboard_offscreen_layers = enabled;
    }

    /// Suspend or resume GPU use, e.g. when the app moves to the background.
    /// While disabled, consumed frames are discarded unless the studio opts
    /// in to drawing anyway.
    pub fn set_gpu_disabled(&mut self, disabled: bool) {
        self.check_affinity();
        self.gpu_disabled = disabled;
    }

    pub fn texture_registry(&self) -> &TextureRegistry {
        &self.texture_registry
    }

    pub fn texture_registry_mut(&mut self) -> &mut TextureRegistry {
        &mut self.texture_registry
    }

    pub fn last_layer_tree(&self) -> Option<&LayerTree> {
        self.last_tree.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Consume the newest ready frame and draw it. The consume happens even
    /// when drawing will fail, so a wedged GPU never backs the pipeline up
    /// behind stale frames.
    pub fn draw_from_pipeline(&mut self, pipeline: &Pipeline<LayerTree>) -> RasterStatus {
        self.check_affinity();
        let Some(consumed) = pipeline.consume() else {
            return RasterStatus::NoFrameAvailable;
        };
        if consumed.frames_dropped > 0 {
            debug!(
                "recycled {} stale frames ahead of sequence {}",
                consumed.frames_dropped, consumed.sequence
            );
        }
        self.draw_tree(consumed.payload)
    }

    fn draw_tree(&mut self, mut tree: LayerTree) -> RasterStatus {
        let Some(studio) = self.studio.as_mut() else {
            warn!(
                "discarding frame {}, no studio is set up",
                tree.frame_number()
            );
            return RasterStatus::Discarded;
        };
        if self.gpu_disabled && !studio.allows_drawing_when_gpu_disabled() {
            warn!("discarding frame {}, gpu is disabled", tree.frame_number());
            return RasterStatus::Discarded;
        }
        if let Some(last_target) = self.last_target_time {
            debug_assert!(
                tree.target_time() >= last_target,
                "frame target times went backwards"
            );
        }

        let Some(mut frame) = studio.acquire_frame(tree.frame_size()) else {
            warn!(
                "discarding frame {}, studio yielded no surface",
                tree.frame_number()
            );
            return RasterStatus::Discarded;
        };
        let needs_system_composite = tree.preroll();
        if needs_system_composite {
            trace!(
                "frame {} contains platform views, flagging for the system compositor",
                tree.frame_number()
            );
        }
        tree.paint(
            frame.canvas(),
            Some(&self.texture_registry),
            self.checkerboard_offscreen_layers,
        );
        if !frame.submit() {
            warn!("frame {} failed to present", tree.frame_number());
            return RasterStatus::Failed;
        }
        trace!("frame {} presented", tree.frame_number());
        self.frames_presented += 1;
        self.last_target_time = Some(tree.target_time());
        self.last_tree = Some(tree);
        RasterStatus::Done
    }
}
