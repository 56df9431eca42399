//! Geometry creation primitives.
//!
//! Just enough solid construction for placeholder equipment: bounded lines,
//! closed planar curve loops and straight extrusions of a single loop.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest curve the document accepts (document length units).
pub const SHORT_CURVE_TOLERANCE: f64 = 1.0 / 256.0;

/// Distance under which two points are the same vertex.
const VERTEX_TOLERANCE: f64 = 1e-9;

/// Errors raised while constructing geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    #[error("Coordinates must be finite")]
    NonFinite,

    #[error("Curve length {length} is below the short curve tolerance")]
    CurveTooShort { length: f64 },

    #[error("Curve loop needs at least 3 edges, got {0}")]
    TooFewEdges(usize),

    #[error("Curve loop is not contiguous after edge {index}")]
    Discontinuous { index: usize },

    #[error("Curve loop is open")]
    Open,

    #[error("Curve loop encloses no area")]
    ZeroArea,

    #[error("Curve loop is not planar")]
    NonPlanar,

    #[error("Curve loop self-intersects between edges {first} and {second}")]
    SelfIntersecting { first: usize, second: usize },

    #[error("Extrusion direction must be a unit vector")]
    InvalidDirection,

    #[error("Extrusion direction lies in the profile plane")]
    ParallelDirection,

    #[error("Extrusion distance {0} is not usable")]
    InvalidDistance(f64),
}

// =============================================================================
// Points and vectors
// =============================================================================

/// A point or vector in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    pub const ZERO: Xyz = Xyz::new(0.0, 0.0, 0.0);
    pub const BASIS_Z: Xyz = Xyz::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn dot(&self, other: Xyz) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Xyz) -> Xyz {
        Xyz::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalize(&self) -> Option<Xyz> {
        let len = self.length();
        (len > VERTEX_TOLERANCE).then(|| *self * (1.0 / len))
    }

    pub fn distance_to(&self, other: Xyz) -> f64 {
        (*self - other).length()
    }

    pub fn is_almost_equal(&self, other: Xyz) -> bool {
        self.distance_to(other) <= VERTEX_TOLERANCE
    }

    fn component_min(self, other: Xyz) -> Xyz {
        Xyz::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    fn component_max(self, other: Xyz) -> Xyz {
        Xyz::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl Add for Xyz {
    type Output = Xyz;
    fn add(self, rhs: Xyz) -> Xyz {
        Xyz::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Xyz {
    type Output = Xyz;
    fn sub(self, rhs: Xyz) -> Xyz {
        Xyz::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Xyz {
    type Output = Xyz;
    fn mul(self, rhs: f64) -> Xyz {
        Xyz::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Xyz {
    type Output = Xyz;
    fn neg(self) -> Xyz {
        Xyz::new(-self.x, -self.y, -self.z)
    }
}

impl std::fmt::Display for Xyz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// =============================================================================
// Curves
// =============================================================================

/// A bounded straight line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    start: Xyz,
    end: Xyz,
}

impl Line {
    /// Create a bounded line between two points.
    pub fn bound(start: Xyz, end: Xyz) -> Result<Self, GeometryError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        let length = start.distance_to(end);
        if length < SHORT_CURVE_TOLERANCE {
            return Err(GeometryError::CurveTooShort { length });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Xyz {
        self.start
    }

    pub fn end(&self) -> Xyz {
        self.end
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(self.end)
    }

    fn translated(&self, by: Xyz) -> Line {
        Line {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

/// A closed, planar, simple loop of line segments.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLoop {
    lines: Vec<Line>,
    /// Unit normal following the loop winding (right-hand rule)
    normal: Xyz,
    area: f64,
}

impl CurveLoop {
    /// Validate an ordered sequence of lines as one closed loop.
    pub fn new(lines: Vec<Line>) -> Result<Self, GeometryError> {
        if lines.len() < 3 {
            return Err(GeometryError::TooFewEdges(lines.len()));
        }

        let last = lines.len() - 1;
        for (index, pair) in lines.windows(2).enumerate() {
            if !pair[0].end.is_almost_equal(pair[1].start) {
                return Err(GeometryError::Discontinuous { index });
            }
        }
        if !lines[last].end.is_almost_equal(lines[0].start) {
            return Err(GeometryError::Open);
        }

        // Newell's method: the vector is twice the signed area times the normal.
        let newell = lines.iter().fold(Xyz::ZERO, |acc, line| {
            let (a, b) = (line.start, line.end);
            acc + Xyz::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            )
        });
        let normal = newell.normalize().ok_or(GeometryError::ZeroArea)?;
        let area = newell.length() / 2.0;

        let origin = lines[0].start;
        if lines
            .iter()
            .any(|line| (line.start - origin).dot(normal).abs() > 1e-6)
        {
            return Err(GeometryError::NonPlanar);
        }

        let curve_loop = Self {
            lines,
            normal,
            area,
        };
        curve_loop.check_simple()?;
        Ok(curve_loop)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn normal(&self) -> Xyz {
        self.normal
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Start point of every edge, in loop order.
    pub fn vertices(&self) -> Vec<Xyz> {
        self.lines.iter().map(Line::start).collect()
    }

    fn translated(&self, by: Xyz) -> CurveLoop {
        CurveLoop {
            lines: self.lines.iter().map(|l| l.translated(by)).collect(),
            normal: self.normal,
            area: self.area,
        }
    }

    /// Reject loops where two non-adjacent edges touch or cross.
    fn check_simple(&self) -> Result<(), GeometryError> {
        let n = self.lines.len();
        let project = self.projector();
        for first in 0..n {
            for second in (first + 2)..n {
                if first == 0 && second == n - 1 {
                    continue;
                }
                let a = &self.lines[first];
                let b = &self.lines[second];
                if segments_intersect(
                    project(a.start),
                    project(a.end),
                    project(b.start),
                    project(b.end),
                ) {
                    return Err(GeometryError::SelfIntersecting { first, second });
                }
            }
        }
        Ok(())
    }

    /// Projection onto the coordinate plane most aligned with the loop.
    fn projector(&self) -> impl Fn(Xyz) -> (f64, f64) {
        let n = self.normal;
        let (ax, ay, az) = (n.x.abs(), n.y.abs(), n.z.abs());
        move |p: Xyz| {
            if az >= ax && az >= ay {
                (p.x, p.y)
            } else if ay >= ax {
                (p.z, p.x)
            } else {
                (p.y, p.z)
            }
        }
    }
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
    r.0 >= p.0.min(q.0) - VERTEX_TOLERANCE
        && r.0 <= p.0.max(q.0) + VERTEX_TOLERANCE
        && r.1 >= p.1.min(q.1) - VERTEX_TOLERANCE
        && r.1 <= p.1.max(q.1) + VERTEX_TOLERANCE
}

fn segments_intersect(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > VERTEX_TOLERANCE && d2 < -VERTEX_TOLERANCE)
        || (d1 < -VERTEX_TOLERANCE && d2 > VERTEX_TOLERANCE))
        && ((d3 > VERTEX_TOLERANCE && d4 < -VERTEX_TOLERANCE)
            || (d3 < -VERTEX_TOLERANCE && d4 > VERTEX_TOLERANCE))
    {
        return true;
    }

    (d1.abs() <= VERTEX_TOLERANCE && on_segment(b1, b2, a1))
        || (d2.abs() <= VERTEX_TOLERANCE && on_segment(b1, b2, a2))
        || (d3.abs() <= VERTEX_TOLERANCE && on_segment(a1, a2, b1))
        || (d4.abs() <= VERTEX_TOLERANCE && on_segment(a1, a2, b2))
}

// =============================================================================
// Solids
// =============================================================================

/// Axis-aligned bounds of a solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Xyz,
    pub max: Xyz,
}

impl BoundingBox {
    pub fn size(&self) -> Xyz {
        self.max - self.min
    }

    pub fn center(&self) -> Xyz {
        (self.min + self.max) * 0.5
    }
}

/// A prism made by sweeping a closed loop along a straight direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    profile: CurveLoop,
    direction: Xyz,
    distance: f64,
}

impl Solid {
    /// Extrude `profile` along the unit vector `direction` by `distance`.
    pub fn extrude(
        profile: &CurveLoop,
        direction: Xyz,
        distance: f64,
    ) -> Result<Self, GeometryError> {
        if !direction.is_finite() || (direction.length() - 1.0).abs() > 1e-6 {
            return Err(GeometryError::InvalidDirection);
        }
        if direction.dot(profile.normal()).abs() < 1e-9 {
            return Err(GeometryError::ParallelDirection);
        }
        if !distance.is_finite() || distance < SHORT_CURVE_TOLERANCE {
            return Err(GeometryError::InvalidDistance(distance));
        }

        Ok(Self {
            profile: profile.clone(),
            direction,
            distance,
        })
    }

    pub fn profile(&self) -> &CurveLoop {
        &self.profile
    }

    pub fn direction(&self) -> Xyz {
        self.direction
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn profile_vertices(&self) -> Vec<Xyz> {
        self.profile.vertices()
    }

    pub fn volume(&self) -> f64 {
        self.profile.area() * self.distance * self.direction.dot(self.profile.normal()).abs()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let sweep = self.direction * self.distance;
        let base = self.profile.vertices();
        let mut min = base[0];
        let mut max = base[0];
        for v in base.iter().flat_map(|v| [*v, *v + sweep]) {
            min = min.component_min(v);
            max = max.component_max(v);
        }
        BoundingBox { min, max }
    }

    /// Copy of this solid moved by `by`.
    pub fn translated(&self, by: Xyz) -> Solid {
        Solid {
            profile: self.profile.translated(by),
            direction: self.direction,
            distance: self.distance,
        }
    }
}
