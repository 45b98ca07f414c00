use std::sync::Arc;
use std::time::Instant;

use frame_pipeline::{Pipeline, PipelineFull};
use layers::LayerTree;
use log::{trace, warn};

/// Timing and identity of one requested frame, handed to the frame builder.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    /// Nominal start of the frame's vsync period.
    pub frame_start_time: Instant,
    /// When the frame should be on screen; becomes the tree's target time.
    pub frame_target_time: Instant,
    pub frame_number: u64,
}

/// Embedder hook that builds a frame's layer tree. Returning `None` means
/// nothing changed and no frame should be published.
pub type FrameBuilder = Box<dyn FnMut(&FrameRequest) -> Option<LayerTree> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginFrameResult {
    /// A tree was built and published with this pipeline sequence.
    Produced { sequence: u64 },
    /// The pipeline was at capacity; the builder was never invoked.
    SkippedPipelineFull,
    /// The builder declined to produce content; the reserved slot was
    /// released untouched.
    SkippedNoContent,
}

/// UI-thread frame producer.
///
/// Each vsync tick turns into at most one
/// [`begin_frame`](FrameDriver::begin_frame): reserve a pipeline slot first, and only then
/// pay for building the tree. Backpressure therefore skips whole frames
/// up front instead of building trees that would be thrown away.
pub struct FrameDriver {
    pipeline: Arc<Pipeline<LayerTree>>,
    builder: FrameBuilder,
    on_frame_ready: Box<dyn FnMut() + Send>,
    frame_number: u64,
    frames_skipped: u64,
}

impl FrameDriver {
    pub fn new(
        pipeline: Arc<Pipeline<LayerTree>>,
        builder: FrameBuilder,
        on_frame_ready: impl FnMut() + Send + 'static,
    ) -> Self {
        Self {
            pipeline,
            builder,
            on_frame_ready: Box::new(on_frame_ready),
            frame_number: 0,
            frames_skipped: 0,
        }
    }

    /// Drive one frame for the given vsync period.
    pub fn begin_frame(
        &mut self,
        frame_start_time: Instant,
        frame_target_time: Instant,
    ) -> BeginFrameResult {
        let continuation = match self.pipeline.produce() {
            Ok(continuation) => continuation,
            Err(PipelineFull) => {
                self.frames_skipped += 1;
                warn!(
                    "pipeline full, skipping frame build ({} skipped so far)",
                    self.frames_skipped
                );
                return BeginFrameResult::SkippedPipelineFull;
            }
        };

        self.frame_number += 1;
        let request = FrameRequest {
            frame_start_time,
            frame_target_time,
            frame_number: self.frame_number,
        };
        match (self.builder)(&request) {
            Some(tree) => {
                let sequence = continuation.complete(tree);
                (self.on_frame_ready)();
                BeginFrameResult::Produced { sequence }
            }
            None => {
                trace!("frame {} built no content", request.frame_number);
                BeginFrameResult::SkippedNoContent
            }
        }
    }

    /// Frames refused by pipeline backpressure so far.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::Size;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn bare_tree(request: &FrameRequest) -> LayerTree {
        LayerTree::new(
            None,
            Size::new(10.0, 10.0),
            1.0,
            request.frame_target_time,
            request.frame_number,
        )
    }

    fn frame_times() -> (Instant, Instant) {
        let start = Instant::now();
        (start, start + Duration::from_millis(16))
    }

    #[test]
    fn produced_frames_notify_the_raster_side() {
        let pipeline = Arc::new(Pipeline::new(2));
        let notified = Arc::new(AtomicUsize::new(0));
        let observer = notified.clone();
        let mut driver = FrameDriver::new(
            pipeline.clone(),
            Box::new(|request| Some(bare_tree(request))),
            move || {
                observer.fetch_add(1, Ordering::SeqCst);
            },
        );

        let (start, target) = frame_times();
        assert_eq!(
            driver.begin_frame(start, target),
            BeginFrameResult::Produced { sequence: 1 }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.ready_count(), 1);
    }

    #[test]
    fn full_pipeline_skips_without_invoking_builder() {
        let pipeline = Arc::new(Pipeline::new(1));
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let mut driver = FrameDriver::new(
            pipeline.clone(),
            Box::new(move |request| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(bare_tree(request))
            }),
            || {},
        );

        let (start, target) = frame_times();
        assert!(matches!(
            driver.begin_frame(start, target),
            BeginFrameResult::Produced { .. }
        ));
        assert_eq!(
            driver.begin_frame(start, target),
            BeginFrameResult::SkippedPipelineFull
        );
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(driver.frames_skipped(), 1);

        // Draining the pipeline lets production resume.
        pipeline.consume().expect("frame ready");
        assert!(matches!(
            driver.begin_frame(start, target),
            BeginFrameResult::Produced { .. }
        ));
    }

    #[test]
    fn builder_declining_releases_the_slot_and_skips_notification() {
        let pipeline = Arc::new(Pipeline::new(1));
        let notified = Arc::new(AtomicUsize::new(0));
        let observer = notified.clone();
        let mut driver = FrameDriver::new(pipeline.clone(), Box::new(|_| None), move || {
            observer.fetch_add(1, Ordering::SeqCst);
        });

        let (start, target) = frame_times();
        assert_eq!(
            driver.begin_frame(start, target),
            BeginFrameResult::SkippedNoContent
        );
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert!(pipeline.is_idle(), "declined frame must release its slot");
        // Frame numbers still advance; the period was consumed.
        assert_eq!(driver.frame_number(), 1);
    }
}
