//! Triangle and bounding-box primitives for arena surfaces

use glam::Vec3A;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    /// An inverted box that any `grow` call will replace
    pub const EMPTY: Self = Self {
        min: Vec3A::INFINITY,
        max: Vec3A::NEG_INFINITY,
    };

    pub fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    /// Expand to include another box
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Expand to include a point
    #[inline]
    pub fn grow(&mut self, p: Vec3A) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn center(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3A {
        self.max - self.min
    }

    /// Squared distance from a point to the box (0 if inside)
    #[inline]
    pub fn distance_squared_to(&self, p: Vec3A) -> f32 {
        let clamped = p.clamp(self.min, self.max);
        (p - clamped).length_squared()
    }
}

/// A single arena surface triangle.
///
/// The stored normal faces into the playable volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3A,
    pub b: Vec3A,
    pub c: Vec3A,
    pub normal: Vec3A,
}

impl Triangle {
    pub fn new(a: Vec3A, b: Vec3A, c: Vec3A) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self { a, b, c, normal }
    }

    /// Flip winding so the normal points toward `target`
    pub fn facing(self, target: Vec3A) -> Self {
        if self.normal.dot(target - self.centroid()) < 0.0 {
            Self::new(self.a, self.c, self.b)
        } else {
            self
        }
    }

    /// Flip winding so the normal points away from `origin`
    pub fn facing_away(self, origin: Vec3A) -> Self {
        if self.normal.dot(self.centroid() - origin) < 0.0 {
            Self::new(self.a, self.c, self.b)
        } else {
            self
        }
    }

    #[inline]
    pub fn centroid(&self) -> Vec3A {
        (self.a + self.b + self.c) / 3.0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb {
            min: self.a.min(self.b).min(self.c),
            max: self.a.max(self.b).max(self.c),
        }
    }

    pub fn area(&self) -> f32 {
        0.5 * (self.b - self.a).cross(self.c - self.a).length()
    }

    /// Closest point on the triangle to `p` (Voronoi region walk)
    pub fn closest_point(&self, p: Vec3A) -> Vec3A {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;

        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }
}

/// Build the two triangles of quad `a b c d` (in perimeter order)
pub fn quad(a: Vec3A, b: Vec3A, c: Vec3A, d: Vec3A) -> [Triangle; 2] {
    [Triangle::new(a, b, c), Triangle::new(a, c, d)]
}
