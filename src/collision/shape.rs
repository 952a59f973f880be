use glam::Vec2;

/// Closed set of collision shapes. Adding a variant forces every
/// `match` in the resolver dispatch to be revisited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    /// Axis-aligned box, centered on the shape position.
    Rect { width: f32, height: f32 },
    /// Circle with a vertical squeeze factor. `squeeze` scales the Y
    /// radius, so 1.0 is a true circle and smaller values flatten it.
    Circle { radius: f32, squeeze: f32 },
    /// Annular wedge: band between `inner_radius` and
    /// `inner_radius + thickness`, centered on `direction` with an
    /// angular extent of `sweep` radians.
    Arc {
        inner_radius: f32,
        thickness: f32,
        direction: f32,
        sweep: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub x: f32,
    pub y: f32,
    pub kind: ShapeKind,
}

/// World-space bounding extent used for grid membership.
#[derive(Debug, Clone, Copy)]
pub struct Extent {
    pub min: Vec2,
    pub max: Vec2,
}

impl Shape {
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            kind: ShapeKind::Rect { width, height },
        }
    }

    pub fn circle(x: f32, y: f32, radius: f32) -> Self {
        Self::circle_squeezed(x, y, radius, 1.0)
    }

    pub fn circle_squeezed(x: f32, y: f32, radius: f32, squeeze: f32) -> Self {
        Self {
            x,
            y,
            kind: ShapeKind::Circle { radius, squeeze },
        }
    }

    pub fn arc(x: f32, y: f32, inner_radius: f32, thickness: f32, direction: f32, sweep: f32) -> Self {
        Self {
            x,
            y,
            kind: ShapeKind::Arc {
                inner_radius,
                thickness,
                direction,
                sweep,
            },
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Conservative AABB around the shape. The arc uses its full outer
    /// radius rather than the swept region, which only costs a few
    /// extra broad-phase candidates.
    pub fn extent(&self) -> Extent {
        let (hx, hy) = match self.kind {
            ShapeKind::Rect { width, height } => (width / 2.0, height / 2.0),
            ShapeKind::Circle { radius, squeeze } => (radius, radius * squeeze),
            ShapeKind::Arc {
                inner_radius,
                thickness,
                ..
            } => {
                let outer = inner_radius + thickness;
                (outer, outer)
            }
        };

        Extent {
            min: Vec2::new(self.x - hx, self.y - hy),
            max: Vec2::new(self.x + hx, self.y + hy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_extent_is_centered() {
        let e = Shape::rect(10.0, 20.0, 4.0, 6.0).extent();
        assert_eq!(e.min, Vec2::new(8.0, 17.0));
        assert_eq!(e.max, Vec2::new(12.0, 23.0));
    }

    #[test]
    fn squeezed_circle_extent_flattens_y() {
        let e = Shape::circle_squeezed(0.0, 0.0, 10.0, 0.5).extent();
        assert_eq!(e.min, Vec2::new(-10.0, -5.0));
        assert_eq!(e.max, Vec2::new(10.0, 5.0));
    }

    #[test]
    fn arc_extent_uses_outer_radius() {
        let e = Shape::arc(0.0, 0.0, 10.0, 5.0, 0.0, 1.0).extent();
        assert_eq!(e.min, Vec2::new(-15.0, -15.0));
        assert_eq!(e.max, Vec2::new(15.0, 15.0));
    }
}
