//! Plain-value 2D geometry shared by the layer tree and the rasterizer.
//!
//! Everything here is `Copy` and allocation-free. Rectangles use the
//! left/top/right/bottom convention; the canonical empty rectangle is
//! `Rect::EMPTY` and every operation that can produce a degenerate result
//! returns it rather than leaving stale coordinates behind.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle, left/top/right/bottom.
///
/// A rectangle with non-positive width or height is considered empty.
/// Operations normalize empty results to [`Rect::EMPTY`] so callers can
/// compare against a single canonical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    /// The canonical empty rectangle.
    pub const EMPTY: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + size.width,
            bottom: origin.y + size.height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::from_origin_size(Point::ZERO, size)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Smallest rectangle containing both inputs. An empty side contributes
    /// nothing.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return if other.is_empty() { Self::EMPTY } else { *other };
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Overlap of both inputs, or [`Rect::EMPTY`] when they are disjoint.
    pub fn intersect(&self, other: &Self) -> Self {
        let result = Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if result.is_empty() { Self::EMPTY } else { result }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && point.x >= self.left
            && point.x < self.right
            && point.y >= self.top
            && point.y < self.bottom
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// 2D affine transform.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite()
            && self.b.is_finite()
            && self.c.is_finite()
            && self.d.is_finite()
            && self.tx.is_finite()
            && self.ty.is_finite()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Composition applying `inner` first, then `self`.
    ///
    /// This is the accumulation direction used during tree traversal:
    /// `ancestor.concat(&local)` maps local coordinates all the way to
    /// device space.
    pub fn concat(&self, inner: &Self) -> Self {
        Self {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            tx: self.a * inner.tx + self.c * inner.ty + self.tx,
            ty: self.b * inner.tx + self.d * inner.ty + self.ty,
        }
    }

    pub fn map_point(&self, point: Point) -> Point {
        Point {
            x: self.a * point.x + self.c * point.y + self.tx,
            y: self.b * point.x + self.d * point.y + self.ty,
        }
    }

    /// Axis-aligned bounding box of the four mapped corners.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        if rect.is_empty() {
            return Rect::EMPTY;
        }
        let corners = [
            self.map_point(Point::new(rect.left, rect.top)),
            self.map_point(Point::new(rect.right, rect.top)),
            self.map_point(Point::new(rect.left, rect.bottom)),
            self.map_point(Point::new(rect.right, rect.bottom)),
        ];
        let mut mapped = Rect {
            left: corners[0].x,
            top: corners[0].y,
            right: corners[0].x,
            bottom: corners[0].y,
        };
        for corner in &corners[1..] {
            mapped.left = mapped.left.min(corner.x);
            mapped.top = mapped.top.min(corner.y);
            mapped.right = mapped.right.max(corner.x);
            mapped.bottom = mapped.bottom.max(corner.y);
        }
        if mapped.is_empty() { Rect::EMPTY } else { mapped }
    }
}
