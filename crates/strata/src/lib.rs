//! Frame loop orchestration: the shell, the rasterizer, and frame timing.
//!
//! The division of labor across the workspace:
//! - `geometry` / `layers` describe a frame and how to paint it,
//! - `frame_pipeline` moves completed frames between threads,
//! - `threading` provides the task runners and rendezvous,
//! - this crate wires them into a running loop. [`Shell`] owns the UI and
//!   raster threads; each vsync tick from a [`VsyncWaiter`] drives the
//!   [`FrameDriver`] on the UI thread, and the [`Rasterizer`] drains the
//!   pipeline into a [`Studio`]-provided surface on the raster thread.

mod driver;
mod rasterizer;
mod shell;
mod studio;
pub mod testing;
mod vsync;

#[cfg(test)]
mod threaded_tests;

pub use driver::{BeginFrameResult, FrameBuilder, FrameDriver, FrameRequest};
pub use rasterizer::{RasterStatus, Rasterizer};
pub use shell::{Shell, ShellConfig};
pub use studio::{ContextError, Studio, SurfaceFrame};
pub use vsync::{DEFAULT_FRAME_INTERVAL, FallbackVsyncWaiter, VsyncWaiter};
