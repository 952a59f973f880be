//! Narrow-phase overlap resolution for every shape pair.
//!
//! Each pair function returns `None` for no overlap, or a [`Contact`]
//! whose two push vectors separate the shapes along the
//! minimum-translation axis, split 50/50. Mirrored type orders call the
//! canonical function with swapped arguments and swap the result, so
//! there is exactly one resolver per unordered pair.

use glam::Vec2;
use std::f32::consts::{PI, TAU};

use super::shape::{Shape, ShapeKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub push_a: Vec2,
    pub push_b: Vec2,
}

impl Contact {
    fn split(mtv_a: Vec2) -> Self {
        Self {
            push_a: mtv_a / 2.0,
            push_b: -mtv_a / 2.0,
        }
    }

    fn swapped(self) -> Self {
        Self {
            push_a: self.push_b,
            push_b: self.push_a,
        }
    }
}

/// Dispatch by shape kind. The match is exhaustive on purpose: a new
/// shape variant will not silently resolve to "no collision".
pub fn resolve(a: &Shape, b: &Shape) -> Option<Contact> {
    use ShapeKind::*;
    match (a.kind, b.kind) {
        (Rect { .. }, Rect { .. }) => rect_rect(a, b),
        (Circle { .. }, Circle { .. }) => circle_circle(a, b),
        (Rect { .. }, Circle { .. }) => rect_circle(a, b),
        (Circle { .. }, Rect { .. }) => rect_circle(b, a).map(Contact::swapped),
        (Arc { .. }, Circle { .. }) => arc_circle(a, b),
        (Circle { .. }, Arc { .. }) => arc_circle(b, a).map(Contact::swapped),
        (Arc { .. }, Rect { .. }) => arc_rect(a, b),
        (Rect { .. }, Arc { .. }) => arc_rect(b, a).map(Contact::swapped),
        // Arc hitboxes never push each other around.
        (Arc { .. }, Arc { .. }) => None,
    }
}

fn rect_rect(a: &Shape, b: &Shape) -> Option<Contact> {
    let (ShapeKind::Rect {
        width: wa,
        height: ha,
    }, ShapeKind::Rect {
        width: wb,
        height: hb,
    }) = (a.kind, b.kind)
    else {
        return None;
    };

    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let px = (wa + wb) / 2.0 - dx.abs();
    if px <= 0.0 {
        return None;
    }
    let py = (ha + hb) / 2.0 - dy.abs();
    if py <= 0.0 {
        return None;
    }

    // Resolve along the shallower axis; ties (and the degenerate
    // same-center case) fall toward x.
    if px <= py {
        let sign = if dx >= 0.0 { 1.0 } else { -1.0 };
        Some(Contact::split(Vec2::new(sign * px, 0.0)))
    } else {
        let sign = if dy >= 0.0 { 1.0 } else { -1.0 };
        Some(Contact::split(Vec2::new(0.0, sign * py)))
    }
}

/// Squeezed-circle overlap. The delta is normalized into unit-circle
/// space by the combined per-axis radii, which approximates ellipse
/// geometry off the axes. The approximation and its same-center
/// fallback are intentional; their exact output is gameplay-visible.
fn circle_circle(a: &Shape, b: &Shape) -> Option<Contact> {
    let (ShapeKind::Circle {
        radius: ra,
        squeeze: qa,
    }, ShapeKind::Circle {
        radius: rb,
        squeeze: qb,
    }) = (a.kind, b.kind)
    else {
        return None;
    };

    let sx = ra + rb;
    let sy = ra * qa + rb * qb;
    let d = a.center() - b.center();
    let e = Vec2::new(d.x / sx, d.y / sy);
    let len = e.length();

    if len >= 1.0 {
        return None;
    }
    if len == 0.0 {
        // Coincident centers: push apart along the fixed +x axis by the
        // full combined radius.
        return Some(Contact::split(Vec2::new(sx, 0.0)));
    }

    let n = e / len;
    let depth = 1.0 - len;
    Some(Contact::split(Vec2::new(
        n.x * depth * sx,
        n.y * depth * sy,
    )))
}

fn rect_circle(a: &Shape, b: &Shape) -> Option<Contact> {
    let (ShapeKind::Rect { width, height }, ShapeKind::Circle { radius, .. }) = (a.kind, b.kind)
    else {
        return None;
    };
    let hw = width / 2.0;
    let hh = height / 2.0;

    let c = b.center();
    let closest = Vec2::new(
        c.x.clamp(a.x - hw, a.x + hw),
        c.y.clamp(a.y - hh, a.y + hh),
    );
    let d = c - closest;

    if d == Vec2::ZERO {
        // Circle center embedded in the box: compare per-axis depth of
        // half-extent-plus-radius and push along the smaller axis.
        let dx = c.x - a.x;
        let dy = c.y - a.y;
        let px = hw + radius - dx.abs();
        let py = hh + radius - dy.abs();
        let mtv_b = if px <= py {
            let sign = if dx >= 0.0 { 1.0 } else { -1.0 };
            Vec2::new(sign * px, 0.0)
        } else {
            let sign = if dy >= 0.0 { 1.0 } else { -1.0 };
            Vec2::new(0.0, sign * py)
        };
        return Some(Contact::split(-mtv_b));
    }

    let dist = d.length();
    if dist >= radius {
        return None;
    }
    let mtv_b = d / dist * (radius - dist);
    Some(Contact::split(-mtv_b))
}

fn arc_circle(a: &Shape, b: &Shape) -> Option<Contact> {
    let ShapeKind::Circle { radius, .. } = b.kind else {
        return None;
    };
    let mtv_b = arc_point_mtv(a, b.center(), radius)?;
    Some(Contact::split(-mtv_b))
}

fn arc_rect(a: &Shape, b: &Shape) -> Option<Contact> {
    let ShapeKind::Rect { width, height } = b.kind else {
        return None;
    };
    let hw = width / 2.0;
    let hh = height / 2.0;
    let c = b.center();

    if arc_contains(a, c) {
        // Box center inside the envelope: resolve radially, with the
        // box's support extent along the radial normal as its radius.
        let d = c - a.center();
        let dist = d.length();
        let n = radial_normal(a, d, dist);
        let margin = n.x.abs() * hw + n.y.abs() * hh;
        return Some(Contact::split(-radial_mtv(a, n, dist, margin)));
    }

    // Closest point on the arc boundary, then a point-vs-box test.
    let q = arc_closest_point(a, c);
    let ox = hw - (q.x - b.x).abs();
    if ox <= 0.0 {
        return None;
    }
    let oy = hh - (q.y - b.y).abs();
    if oy <= 0.0 {
        return None;
    }

    // Push the box away from the boundary point along the shallower axis.
    let mtv_b = if ox <= oy {
        let sign = if b.x >= q.x { 1.0 } else { -1.0 };
        Vec2::new(sign * ox, 0.0)
    } else {
        let sign = if b.y >= q.y { 1.0 } else { -1.0 };
        Vec2::new(0.0, sign * oy)
    };
    Some(Contact::split(-mtv_b))
}

/// Minimum translation for a point-with-radius against the annular
/// wedge. Two-phase: envelope containment first, closest boundary
/// point otherwise. Returns the push to apply to the point's owner.
fn arc_point_mtv(arc: &Shape, p: Vec2, radius: f32) -> Option<Vec2> {
    if arc_contains(arc, p) {
        let d = p - arc.center();
        let dist = d.length();
        let n = radial_normal(arc, d, dist);
        return Some(radial_mtv(arc, n, dist, radius));
    }

    let q = arc_closest_point(arc, p);
    let d = p - q;
    let dist = d.length();
    if dist >= radius {
        return None;
    }
    let n = if dist == 0.0 {
        radial_normal(arc, p - arc.center(), (p - arc.center()).length())
    } else {
        d / dist
    };
    Some(n * (radius - dist))
}

fn arc_params(arc: &Shape) -> (f32, f32, f32, f32) {
    match arc.kind {
        ShapeKind::Arc {
            inner_radius,
            thickness,
            direction,
            sweep,
        } => (inner_radius, inner_radius + thickness, direction, sweep),
        // Callers only reach this through the arc dispatch arms.
        _ => (0.0, 0.0, 0.0, 0.0),
    }
}

fn arc_contains(arc: &Shape, p: Vec2) -> bool {
    let (inner, outer, direction, sweep) = arc_params(arc);
    let d = p - arc.center();
    let r = d.length();
    if r < inner || r > outer {
        return false;
    }
    let theta = d.y.atan2(d.x);
    angle_diff(theta, direction).abs() <= sweep / 2.0
}

/// Closest point on the wedge to `p`: clamp the angle into the sweep
/// and the radius into the band. For points inside the envelope this
/// degenerates to `p` itself, which is why containment is tested first.
fn arc_closest_point(arc: &Shape, p: Vec2) -> Vec2 {
    let (inner, outer, direction, sweep) = arc_params(arc);
    let d = p - arc.center();
    let r = d.length();
    let theta = if r == 0.0 { direction } else { d.y.atan2(d.x) };
    let half = sweep / 2.0;
    let clamped = direction + angle_diff(theta, direction).clamp(-half, half);
    let rc = r.clamp(inner, outer);
    arc.center() + Vec2::new(clamped.cos(), clamped.sin()) * rc
}

fn radial_normal(arc: &Shape, d: Vec2, dist: f32) -> Vec2 {
    if dist == 0.0 {
        let (_, _, direction, _) = arc_params(arc);
        Vec2::new(direction.cos(), direction.sin())
    } else {
        d / dist
    }
}

/// Radial escape for a reference point already inside the band: out
/// through whichever band edge is nearer, padded by the other shape's
/// effective radius along the normal.
fn radial_mtv(arc: &Shape, n: Vec2, dist: f32, margin: f32) -> Vec2 {
    let (inner, outer, ..) = arc_params(arc);
    let to_outer = outer - dist;
    let to_inner = dist - inner;
    if to_outer <= to_inner {
        n * (to_outer + margin)
    } else {
        -n * (to_inner + margin)
    }
}

/// Signed smallest difference `a - b`, normalized into `[-PI, PI]`.
fn angle_diff(a: f32, b: f32) -> f32 {
    let mut d = (a - b) % TAU;
    if d > PI {
        d -= TAU;
    } else if d < -PI {
        d += TAU;
    }
    d
}
