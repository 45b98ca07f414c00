//! Cross-thread frame handoff between the UI-build thread and the raster
//! thread.
//!
//! [`Pipeline`] is the depth-N producer/consumer queue: the UI thread
//! reserves a slot per frame (or gets [`PipelineFull`] backpressure and
//! skips the frame), the raster thread polls for the newest completed frame
//! and stale frames are recycled unseen. [`LayerTreeHolder`] is the
//! degenerate single-slot variant keyed on presentation target time.

mod holder;
mod pipeline;

pub use holder::LayerTreeHolder;
pub use pipeline::{ConsumedFrame, Pipeline, PipelineFull, ProducerContinuation};
