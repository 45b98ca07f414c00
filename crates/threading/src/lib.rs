//! Thread plumbing for the frame loop.
//!
//! Two primitives live here:
//! - [`Latch`]: a one-shot countdown rendezvous used for startup/shutdown
//!   handshakes between threads. This is the only blocking primitive in the
//!   workspace and it is never used on the per-frame hot path.
//! - [`TaskRunner`]: a dedicated worker thread draining a serialized task
//!   queue. Objects that must only be touched from one thread (the texture
//!   registry, the rasterizer) are pinned to a runner, so the confinement is
//!   structural rather than a comment.

mod latch;
mod task_runner;

pub use latch::Latch;
pub use task_runner::{TaskRunner, TaskRunnerHandle};
