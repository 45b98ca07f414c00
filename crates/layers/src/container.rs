use geometry::{Rect, Transform};
use log::warn;
use smallvec::SmallVec;

use crate::layer::{
    AutoSaveLayer, Layer, LayerState, PaintContext, PrerollContext, resolve_device_bounds,
    should_paint,
};

/// Children are painted in list order; later entries end up on top.
type ChildList = SmallVec<[Box<dyn Layer>; 4]>;

/// Plain grouping layer.
///
/// Preroll recurses into children, resolves each child's device bounds
/// against the incoming transform and ambient clip, and unions the local
/// bounds. The effect layers below embed a `ContainerLayer` for their child
/// management rather than re-implementing the traversal.
#[derive(Default)]
pub struct ContainerLayer {
    state: LayerState,
    children: ChildList,
}

impl ContainerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `child`. Moving the child in is what guarantees a
    /// layer has exactly one parent.
    pub fn add(&mut self, child: Box<dyn Layer>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Box<dyn Layer>] {
        &self.children
    }
}

impl Layer for ContainerLayer {
    fn preroll(&mut self, context: &mut PrerollContext, transform: &Transform) {
        self.state.mark_prerolled(context.frame_number);
        let mut bounds = Rect::EMPTY;
        for child in &mut self.children {
            child.preroll(context, transform);
            let device_bounds = resolve_device_bounds(
                child.state().paint_bounds(),
                transform,
                &context.device_clip,
            );
            child.state_mut().set_device_paint_bounds(device_bounds);
            if child.state().needs_system_composite() {
                self.state.set_needs_system_composite(true);
            }
            bounds = bounds.union(&child.state().paint_bounds());
        }
        self.state.set_paint_bounds(bounds);
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(&self.state, context) {
            return;
        }
        for child in &self.children {
            child.paint(context);
        }
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}

/// Applies a transform to its subtree.
pub struct TransformLayer {
    inner: ContainerLayer,
    transform: Transform,
}

impl TransformLayer {
    /// A non-finite matrix would poison every descendant's bounds, so it is
    /// replaced with identity and reported.
    pub fn new(transform: Transform) -> Self {
        let transform = if transform.is_finite() {
            transform
        } else {
            warn!("transform layer constructed with a non-finite matrix, using identity");
            Transform::IDENTITY
        };
        Self {
            inner: ContainerLayer::new(),
            transform,
        }
    }

    pub fn add(&mut self, child: Box<dyn Layer>) {
        self.inner.add(child);
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

impl Layer for TransformLayer {
    fn preroll(&mut self, context: &mut PrerollContext, transform: &Transform) {
        let child_transform = transform.concat(&self.transform);
        self.inner.preroll(context, &child_transform);
        // Child bounds are in the child coordinate space; map them through
        // our own matrix to express them in this layer's local space.
        let local_bounds = self.transform.map_rect(&self.inner.state().paint_bounds());
        self.inner.state_mut().set_paint_bounds(local_bounds);
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(self.state(), context) {
            return;
        }
        context.canvas.save();
        context.canvas.concat(&self.transform);
        for child in self.inner.children() {
            child.paint(context);
        }
        context.canvas.restore();
    }

    fn state(&self) -> &LayerState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut LayerState {
        self.inner.state_mut()
    }
}

/// Narrows the ambient clip for its subtree.
pub struct ClipRectLayer {
    inner: ContainerLayer,
    clip_rect: Rect,
}

impl ClipRectLayer {
    pub fn new(clip_rect: Rect) -> Self {
        Self {
            inner: ContainerLayer::new(),
            clip_rect,
        }
    }

    pub fn add(&mut self, child: Box<dyn Layer>) {
        self.inner.add(child);
    }

    pub fn clip_rect(&self) -> Rect {
        self.clip_rect
    }
}

impl Layer for ClipRectLayer {
    fn preroll(&mut self, context: &mut PrerollContext, transform: &Transform) {
        let previous_clip = context.device_clip;
        let device_clip_rect = transform.map_rect(&self.clip_rect);
        context.device_clip = previous_clip.intersect(&device_clip_rect);

        self.inner.preroll(context, transform);
        let clipped_bounds = self
            .inner
            .state()
            .paint_bounds()
            .intersect(&self.clip_rect);
        self.inner.state_mut().set_paint_bounds(clipped_bounds);

        context.device_clip = previous_clip;
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(self.state(), context) {
            return;
        }
        context.canvas.save();
        context.canvas.clip_rect(&self.clip_rect);
        for child in self.inner.children() {
            child.paint(context);
        }
        context.canvas.restore();
    }

    fn state(&self) -> &LayerState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut LayerState {
        self.inner.state_mut()
    }
}

/// Composites its subtree through an offscreen group with uniform alpha.
pub struct OpacityLayer {
    inner: ContainerLayer,
    alpha: u8,
}

impl OpacityLayer {
    pub fn new(alpha: u8) -> Self {
        Self {
            inner: ContainerLayer::new(),
            alpha,
        }
    }

    pub fn add(&mut self, child: Box<dyn Layer>) {
        self.inner.add(child);
    }

    pub fn alpha(&self) -> u8 {
        self.alpha
    }
}

impl Layer for OpacityLayer {
    fn preroll(&mut self, context: &mut PrerollContext, transform: &Transform) {
        self.inner.preroll(context, transform);
    }

    fn paint(&self, context: &mut PaintContext<'_>) {
        if !should_paint(self.state(), context) {
            return;
        }
        let bounds = self.state().paint_bounds();
        let mut save_layer = AutoSaveLayer::new(context, bounds, self.alpha);
        for child in self.inner.children() {
            child.paint(save_layer.context());
        }
    }

    fn state(&self) -> &LayerState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut LayerState {
        self.inner.state_mut()
    }
}
