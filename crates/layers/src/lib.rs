//! Layer tree: composable paintable nodes and the two-phase traversal.
//!
//! A frame is described as a tree of [`Layer`]s. Producing pixels from it is
//! a two-phase protocol:
//! - **preroll** walks the tree top-down, accumulating transform and clip,
//!   and leaves every layer with valid `paint_bounds` (local space) and
//!   `device_paint_bounds` (device space, clipped).
//! - **paint** walks the prerolled tree issuing [`Canvas`] commands,
//!   skipping any subtree whose device bounds came out empty.
//!
//! [`LayerTree`] packages one frame's root layer with its metadata and runs
//! both phases. [`TextureRegistry`] carries externally-owned textures across
//! GPU context rebuilds and is confined to the raster thread.

mod canvas;
mod container;
mod layer;
mod leaf;
mod texture;
mod tree;

pub use canvas::{Canvas, CanvasOp, Color, Image, Picture, RecordingCanvas};
pub use container::{ClipRectLayer, ContainerLayer, OpacityLayer, TransformLayer};
pub use layer::{
    AutoSaveLayer, Layer, LayerState, PaintContext, PrerollContext, resolve_device_bounds,
    should_paint,
};
pub use leaf::{PictureLayer, PlatformViewLayer, TextureLayer};
pub use texture::{Texture, TextureRegistry};
pub use tree::LayerTree;
