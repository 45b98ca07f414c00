use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use frame_pipeline::Pipeline;
use layers::LayerTree;
use log::{debug, warn};
use threading::{Latch, TaskRunner};

use crate::driver::{FrameBuilder, FrameDriver};
use crate::rasterizer::Rasterizer;
use crate::studio::Studio;
use crate::vsync::{DEFAULT_FRAME_INTERVAL, FallbackVsyncWaiter, VsyncWaiter};

pub struct ShellConfig {
    /// Pipeline depth; 2 gives one frame of build/raster overlap.
    pub pipeline_depth: usize,
    pub vsync_interval: Duration,
    pub checkerboard_offscreen_layers: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            pipeline_depth: 2,
            vsync_interval: DEFAULT_FRAME_INTERVAL,
            checkerboard_offscreen_layers: false,
        }
    }
}

/// Owner of the whole frame loop: the UI and raster task runners, the
/// pipeline between them, the vsync beat, and the rasterizer.
///
/// Construction blocks until the rasterizer is set up on the raster thread;
/// [`shutdown`](Shell::shutdown) blocks until it is torn down there. In
/// between, every vsync tick runs the frame driver on the UI thread and each
/// published frame posts a raster task that drains the pipeline.
pub struct Shell {
    ui_runner: TaskRunner,
    raster_runner: TaskRunner,
    pipeline: Arc<Pipeline<LayerTree>>,
    rasterizer: Arc<Mutex<Rasterizer>>,
    vsync_waiter: Arc<FallbackVsyncWaiter>,
    running: Arc<AtomicBool>,
    torn_down: bool,
}

impl Shell {
    pub fn new(config: ShellConfig, studio: Box<dyn Studio>, builder: FrameBuilder) -> Self {
        let ui_runner = TaskRunner::new("strata-ui");
        let raster_runner = TaskRunner::new("strata-raster");
        let pipeline = Arc::new(Pipeline::new(config.pipeline_depth));

        let rasterizer = {
            let mut rasterizer = Rasterizer::new(raster_runner.handle());
            rasterizer.set_checkerboard_offscreen_layers(config.checkerboard_offscreen_layers);
            Arc::new(Mutex::new(rasterizer))
        };

        // The studio must be adopted on the raster thread; block until the
        // context fanout has happened so textures registered afterwards see
        // a consistent context state.
        let setup_latch = Arc::new(Latch::new(1));
        {
            let rasterizer = rasterizer.clone();
            let setup_latch = setup_latch.clone();
            raster_runner.post(move || {
                rasterizer
                    .lock()
                    .expect("rasterizer lock poisoned")
                    .setup(studio);
                setup_latch.count_down();
            });
        }
        setup_latch.wait();

        let on_frame_ready = {
            let rasterizer = rasterizer.clone();
            let pipeline = pipeline.clone();
            let raster_handle = raster_runner.handle();
            move || {
                let rasterizer = rasterizer.clone();
                let pipeline = pipeline.clone();
                raster_handle.post(move || {
                    rasterizer
                        .lock()
                        .expect("rasterizer lock poisoned")
                        .draw_from_pipeline(&pipeline);
                });
            }
        };
        let driver = Arc::new(Mutex::new(FrameDriver::new(
            pipeline.clone(),
            builder,
            on_frame_ready,
        )));

        let vsync_waiter = Arc::new(FallbackVsyncWaiter::new(
            ui_runner.handle(),
            config.vsync_interval,
        ));
        let running = Arc::new(AtomicBool::new(false));
        {
            let running = running.clone();
            let waiter = Arc::downgrade(&vsync_waiter);
            vsync_waiter.set_frame_callback(move |start, target| {
                driver
                    .lock()
                    .expect("frame driver lock poisoned")
                    .begin_frame(start, target);
                if running.load(Ordering::SeqCst) {
                    rearm(&waiter);
                }
            });
        }

        Self {
            ui_runner,
            raster_runner,
            pipeline,
            rasterizer,
            vsync_waiter,
            running,
            torn_down: false,
        }
    }

    /// Start the continuous frame beat. Idempotent.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("shell starting frame production");
        self.vsync_waiter.await_vsync();
    }

    /// Stop producing frames without tearing the rasterizer down.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the beat and tear the rasterizer down on the raster thread,
    /// blocking until that completes. Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.stop();

        let teardown_latch = Arc::new(Latch::new(1));
        {
            let rasterizer = self.rasterizer.clone();
            let teardown_latch = teardown_latch.clone();
            self.raster_runner.post(move || {
                rasterizer
                    .lock()
                    .expect("rasterizer lock poisoned")
                    .teardown();
                teardown_latch.count_down();
            });
        }
        teardown_latch.wait();
        debug!("shell shut down");
    }

    pub fn pipeline(&self) -> &Arc<Pipeline<LayerTree>> {
        &self.pipeline
    }

    pub fn ui_runner(&self) -> &TaskRunner {
        &self.ui_runner
    }

    pub fn raster_runner(&self) -> &TaskRunner {
        &self.raster_runner
    }

    /// Run `work` against the rasterizer on the raster thread, e.g. to
    /// register textures or toggle the GPU.
    pub fn post_raster_task(&self, work: impl FnOnce(&mut Rasterizer) + Send + 'static) {
        let rasterizer = self.rasterizer.clone();
        self.raster_runner.post(move || {
            work(&mut rasterizer.lock().expect("rasterizer lock poisoned"));
        });
    }

    /// Inspect the rasterizer from the calling thread. Only read state
    /// here; mutation belongs on the raster thread via
    /// [`post_raster_task`](Shell::post_raster_task).
    pub fn with_rasterizer<R>(&self, inspect: impl FnOnce(&Rasterizer) -> R) -> R {
        inspect(&self.rasterizer.lock().expect("rasterizer lock poisoned"))
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn rearm(waiter: &Weak<FallbackVsyncWaiter>) {
    match waiter.upgrade() {
        Some(waiter) => waiter.await_vsync(),
        None => warn!("vsync waiter gone before the frame loop stopped"),
    }
}
