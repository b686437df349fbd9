//! Procedural arena meshes
//!
//! Every arena is generated from a handful of dimensions instead of shipped
//! mesh files. Soccar-style pitches are octagonal prisms whose floor and
//! ceiling blend into the side and corner walls through quarter-pipe ramps;
//! the back walls stay vertical so the goal mouths can be cut out of them.
//! Dropshot is a hexagonal prism floored with hexagonal breakable tiles.
//!
//! All triangle normals face into the playable volume.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_6, SQRT_2};

use glam::{Vec2, Vec3A};

use super::geometry::{Triangle, quad};

/// Index of a breakable dropshot tile
pub type TileId = u16;

/// Longest wall panel edge before a band is split (keeps BVH leaves tight)
const PANEL_SIZE: f32 = 1024.0;
/// Triangles smaller than this are dropped (uu²)
const MIN_TRIANGLE_AREA: f32 = 1e-2;

/// Goal opening cut into a back wall
#[derive(Debug, Clone, Copy)]
pub struct GoalDims {
    pub half_width: f32,
    pub height: f32,
    pub depth: f32,
}

/// Dimensions of an octagonal ramped pitch
#[derive(Debug, Clone, Copy)]
pub struct PitchDims {
    /// Distance from center to the side walls
    pub half_x: f32,
    /// Distance from center to the back walls
    pub half_y: f32,
    pub height: f32,
    /// Corner walls lie on |x| + |y| = corner
    pub corner: f32,
    pub ramp_radius: f32,
    pub ramp_segments: u32,
    pub goal: Option<GoalDims>,
}

impl PitchDims {
    /// Half-width of the back wall at ramp inset `d`
    fn back_half_width(&self, inset: f32) -> f32 {
        self.corner - inset * SQRT_2 - self.half_y
    }

    /// Octagon footprint at ramp inset `d` (back walls are never inset)
    fn ring(&self, inset: f32) -> [Vec2; 8] {
        octagon(self.half_x - inset, self.half_y, self.corner - inset * SQRT_2)
    }

    /// (inset, height) pairs from the floor, up the walls, to the ceiling
    fn profile(&self) -> Vec<(f32, f32)> {
        let r = self.ramp_radius;
        let n = self.ramp_segments.max(1);
        let mut levels = Vec::with_capacity(2 * (n as usize + 1));
        for k in 0..=n {
            let theta = k as f32 / n as f32 * FRAC_PI_2;
            levels.push((r * (1.0 - theta.sin()), r * (1.0 - theta.cos())));
        }
        for k in 0..=n {
            let theta = k as f32 / n as f32 * FRAC_PI_2;
            levels.push((r * (1.0 - theta.cos()), self.height - r + r * theta.sin()));
        }
        levels
    }
}

pub const SOCCAR: PitchDims = PitchDims {
    half_x: 4096.0,
    half_y: 5120.0,
    height: 2044.0,
    corner: 8064.0,
    ramp_radius: 256.0,
    ramp_segments: 6,
    goal: Some(GoalDims {
        half_width: 892.755,
        height: 642.775,
        depth: 880.0,
    }),
};

pub const THROWBACK: PitchDims = PitchDims {
    half_x: 3900.0,
    half_y: 5600.0,
    height: 2040.0,
    corner: 8100.0,
    ramp_radius: 320.0,
    ramp_segments: 6,
    goal: Some(GoalDims {
        half_width: 900.0,
        height: 650.0,
        depth: 900.0,
    }),
};

pub const HOOPS: PitchDims = PitchDims {
    half_x: 2966.67,
    half_y: 3581.0,
    height: 1820.0,
    corner: 5450.0,
    ramp_radius: 256.0,
    ramp_segments: 6,
    goal: None,
};

/// Hoop rim: an elliptical tube in front of each backboard
pub const HOOPS_RIM_CENTER_Y: f32 = 3000.0;
pub const HOOPS_RIM_RADIUS_X: f32 = 480.0;
pub const HOOPS_RIM_RADIUS_Y: f32 = 420.0;
pub const HOOPS_RIM_Z: f32 = 395.0;
pub const HOOPS_RIM_TUBE_RADIUS: f32 = 12.0;
const HOOPS_RIM_SEGMENTS: u32 = 32;
const HOOPS_TUBE_SEGMENTS: u32 = 6;

pub const HOOPS_BACKBOARD_Y: f32 = 3460.0;
pub const HOOPS_BACKBOARD_HALF_WIDTH: f32 = 900.0;
pub const HOOPS_BACKBOARD_BOTTOM: f32 = 300.0;
pub const HOOPS_BACKBOARD_TOP: f32 = 1100.0;

/// Distance from center to each of the six dropshot walls
pub const DROPSHOT_APOTHEM: f32 = 4555.0;
pub const DROPSHOT_HEIGHT: f32 = 2024.0;
/// Center-to-vertex radius of a dropshot tile
pub const DROPSHOT_TILE_RADIUS: f32 = 443.4;

/// A breakable floor tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileInfo {
    pub center: Vec3A,
    /// Half of the pitch the tile belongs to (+1 or -1 along y, 0 on the halfway line)
    pub side: i8,
}

fn tile_side(y: f32) -> i8 {
    if y.abs() < 1.0 {
        0
    } else if y > 0.0 {
        1
    } else {
        -1
    }
}

/// Generated triangles plus the tile each floor triangle belongs to
#[derive(Debug, Clone, Default)]
pub struct ArenaMesh {
    pub triangles: Vec<Triangle>,
    /// Parallel to `triangles`
    pub surface_tiles: Vec<Option<TileId>>,
    pub tiles: Vec<TileInfo>,
}

impl ArenaMesh {
    fn push(&mut self, tri: Triangle) {
        self.push_tile(tri, None);
    }

    fn push_tile(&mut self, tri: Triangle, tile: Option<TileId>) {
        if tri.area() > MIN_TRIANGLE_AREA {
            self.triangles.push(tri);
            self.surface_tiles.push(tile);
        }
    }

    fn push_facing(&mut self, tris: [Triangle; 2], target: Vec3A) {
        for tri in tris {
            self.push(tri.facing(target));
        }
    }
}

/// Octagon with side walls at |x| = half_x, back walls at |y| = half_y and
/// corners on |x| + |y| = corner, counter-clockwise from the +x wall.
fn octagon(half_x: f32, half_y: f32, corner: f32) -> [Vec2; 8] {
    let side_end = corner - half_x;
    let back_end = corner - half_y;
    [
        Vec2::new(half_x, -side_end),
        Vec2::new(half_x, side_end),
        Vec2::new(back_end, half_y),
        Vec2::new(-back_end, half_y),
        Vec2::new(-half_x, side_end),
        Vec2::new(-half_x, -side_end),
        Vec2::new(-back_end, -half_y),
        Vec2::new(back_end, -half_y),
    ]
}

/// Octagon edges that are back walls (v2 -> v3 and v6 -> v7)
const BACK_EDGES: [usize; 2] = [2, 6];

/// Build a soccar-style pitch
pub fn pitch(dims: &PitchDims) -> ArenaMesh {
    let mut mesh = ArenaMesh::default();
    let interior = Vec3A::new(0.0, 0.0, dims.height * 0.5);
    let levels = dims.profile();

    // Floor and ceiling fans
    let ramp = dims.ramp_radius;
    for (z, ring) in [(0.0, dims.ring(ramp)), (dims.height, dims.ring(ramp))] {
        let center = Vec3A::new(0.0, 0.0, z);
        for i in 0..8 {
            let a = ring[i].extend(z).into();
            let b = ring[(i + 1) % 8].extend(z).into();
            mesh.push(Triangle::new(center, a, b).facing(interior));
        }
    }

    // Ramp and wall bands around the side and corner edges
    for pair in levels.windows(2) {
        let (d0, z0) = pair[0];
        let (d1, z1) = pair[1];
        let lower = dims.ring(d0);
        let upper = dims.ring(d1);
        for i in (0..8).filter(|i| !BACK_EDGES.contains(i)) {
            let j = (i + 1) % 8;
            band_edge(&mut mesh, (lower[i], lower[j], z0), (upper[i], upper[j], z1), interior);
        }
    }

    for sign in [1.0, -1.0] {
        back_wall(&mut mesh, dims, &levels, sign, interior);
        if let Some(goal) = dims.goal {
            goal_box(&mut mesh, dims, &goal, sign);
        }
    }

    mesh
}

/// One edge of a band between two rings, split into panels
fn band_edge(
    mesh: &mut ArenaMesh,
    lower: (Vec2, Vec2, f32),
    upper: (Vec2, Vec2, f32),
    interior: Vec3A,
) {
    let (la, lb, z0) = lower;
    let (ua, ub, z1) = upper;
    let len = la.distance(lb).max(ua.distance(ub));
    let panels = (len / PANEL_SIZE).ceil().max(1.0) as u32;

    for p in 0..panels {
        let t0 = p as f32 / panels as f32;
        let t1 = (p + 1) as f32 / panels as f32;
        let a: Vec3A = la.lerp(lb, t0).extend(z0).into();
        let b: Vec3A = la.lerp(lb, t1).extend(z0).into();
        let c: Vec3A = ua.lerp(ub, t1).extend(z1).into();
        let d: Vec3A = ua.lerp(ub, t0).extend(z1).into();
        mesh.push_facing(quad(a, b, c, d), interior);
    }
}

/// Vertical back wall at y = sign * half_y, with the goal mouth cut out
fn back_wall(
    mesh: &mut ArenaMesh,
    dims: &PitchDims,
    levels: &[(f32, f32)],
    sign: f32,
    interior: Vec3A,
) {
    let mut rows: Vec<(f32, f32)> = levels
        .iter()
        .map(|&(d, z)| (z, dims.back_half_width(d)))
        .collect();

    if let Some(goal) = dims.goal
        && let Some(i) = rows
            .windows(2)
            .position(|w| w[0].0 < goal.height && goal.height < w[1].0)
    {
        let (z0, a0) = rows[i];
        let (z1, a1) = rows[i + 1];
        let t = (goal.height - z0) / (z1 - z0);
        rows.insert(i + 1, (goal.height, a0 + (a1 - a0) * t));
    }

    let y = sign * dims.half_y;
    let p = |x: f32, z: f32| Vec3A::new(x, y, z);

    for w in rows.windows(2) {
        let (z0, a0) = w[0];
        let (z1, a1) = w[1];
        match dims.goal {
            Some(goal) if z1 <= goal.height + 1e-3 => {
                let g = goal.half_width;
                mesh.push_facing(quad(p(g, z0), p(a0, z0), p(a1, z1), p(g, z1)), interior);
                mesh.push_facing(quad(p(-a0, z0), p(-g, z0), p(-g, z1), p(-a1, z1)), interior);
            }
            _ => {
                mesh.push_facing(quad(p(-a0, z0), p(a0, z0), p(a1, z1), p(-a1, z1)), interior);
            }
        }
    }
}

/// Goal box behind the back wall: floor, roof, side walls and net
fn goal_box(mesh: &mut ArenaMesh, dims: &PitchDims, goal: &GoalDims, sign: f32) {
    let g = goal.half_width;
    let h = goal.height;
    let y0 = sign * dims.half_y;
    let y1 = sign * (dims.half_y + goal.depth);
    let inside = Vec3A::new(0.0, sign * (dims.half_y + goal.depth * 0.5), h * 0.5);

    for z in [0.0, h] {
        mesh.push_facing(
            quad(
                Vec3A::new(-g, y0, z),
                Vec3A::new(g, y0, z),
                Vec3A::new(g, y1, z),
                Vec3A::new(-g, y1, z),
            ),
            inside,
        );
    }
    for x in [-g, g] {
        mesh.push_facing(
            quad(
                Vec3A::new(x, y0, 0.0),
                Vec3A::new(x, y1, 0.0),
                Vec3A::new(x, y1, h),
                Vec3A::new(x, y0, h),
            ),
            inside,
        );
    }
    mesh.push_facing(
        quad(
            Vec3A::new(-g, y1, 0.0),
            Vec3A::new(g, y1, 0.0),
            Vec3A::new(g, y1, h),
            Vec3A::new(-g, y1, h),
        ),
        inside,
    );
}

pub fn soccar() -> ArenaMesh {
    pitch(&SOCCAR)
}

pub fn throwback() -> ArenaMesh {
    pitch(&THROWBACK)
}

/// Hoops pitch with a rim and backboard at each end
pub fn hoops() -> ArenaMesh {
    let mut mesh = pitch(&HOOPS);
    let interior = Vec3A::new(0.0, 0.0, HOOPS.height * 0.5);

    for sign in [1.0, -1.0] {
        let y = sign * HOOPS_BACKBOARD_Y;
        mesh.push_facing(
            quad(
                Vec3A::new(-HOOPS_BACKBOARD_HALF_WIDTH, y, HOOPS_BACKBOARD_BOTTOM),
                Vec3A::new(HOOPS_BACKBOARD_HALF_WIDTH, y, HOOPS_BACKBOARD_BOTTOM),
                Vec3A::new(HOOPS_BACKBOARD_HALF_WIDTH, y, HOOPS_BACKBOARD_TOP),
                Vec3A::new(-HOOPS_BACKBOARD_HALF_WIDTH, y, HOOPS_BACKBOARD_TOP),
            ),
            interior,
        );
        hoop_rim(&mut mesh, sign);
    }

    mesh
}

fn hoop_rim(mesh: &mut ArenaMesh, sign: f32) {
    let center = Vec3A::new(0.0, sign * HOOPS_RIM_CENTER_Y, HOOPS_RIM_Z);
    let centerline = |t: f32| {
        center + Vec3A::new(HOOPS_RIM_RADIUS_X * t.cos(), HOOPS_RIM_RADIUS_Y * t.sin(), 0.0)
    };
    let surface = |t: f32, phi: f32| {
        let radial = Vec3A::new(t.cos(), t.sin(), 0.0);
        centerline(t) + HOOPS_RIM_TUBE_RADIUS * (phi.cos() * radial + phi.sin() * Vec3A::Z)
    };

    let step_t = std::f32::consts::TAU / HOOPS_RIM_SEGMENTS as f32;
    let step_phi = std::f32::consts::TAU / HOOPS_TUBE_SEGMENTS as f32;
    for i in 0..HOOPS_RIM_SEGMENTS {
        let t0 = i as f32 * step_t;
        let t1 = t0 + step_t;
        let axis = (centerline(t0) + centerline(t1)) * 0.5;
        for j in 0..HOOPS_TUBE_SEGMENTS {
            let p0 = j as f32 * step_phi;
            let p1 = p0 + step_phi;
            let [a, b] = quad(surface(t0, p0), surface(t1, p0), surface(t1, p1), surface(t0, p1));
            mesh.push(a.facing_away(axis));
            mesh.push(b.facing_away(axis));
        }
    }
}

/// Corners of the dropshot hexagon (flat walls facing ±y)
fn dropshot_corners() -> [Vec2; 6] {
    let circumradius = DROPSHOT_APOTHEM / FRAC_PI_6.cos();
    std::array::from_fn(|k| Vec2::from_angle(k as f32 * FRAC_PI_3) * circumradius)
}

/// Outward wall normals of the dropshot hexagon
fn dropshot_wall_normals() -> [Vec2; 6] {
    std::array::from_fn(|k| Vec2::from_angle(FRAC_PI_6 + k as f32 * FRAC_PI_3))
}

/// Clip a convex polygon against the half-plane `normal · p <= offset`
fn clip_polygon(poly: &[Vec2], normal: Vec2, offset: f32) -> Vec<Vec2> {
    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let cur = poly[i];
        let next = poly[(i + 1) % poly.len()];
        let dc = normal.dot(cur) - offset;
        let dn = normal.dot(next) - offset;
        if dc <= 0.0 {
            out.push(cur);
        }
        if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
            out.push(cur + (next - cur) * (dc / (dc - dn)));
        }
    }
    out
}

/// Hexagonal dropshot arena with a tiled floor
pub fn dropshot() -> ArenaMesh {
    let mut mesh = ArenaMesh::default();
    let h = DROPSHOT_HEIGHT;
    let interior = Vec3A::new(0.0, 0.0, h * 0.5);
    let corners = dropshot_corners();

    for k in 0..6 {
        let a = corners[k];
        let b = corners[(k + 1) % 6];
        band_edge(&mut mesh, (a, b, 0.0), (a, b, h), interior);
        mesh.push(
            Triangle::new(Vec3A::new(0.0, 0.0, h), a.extend(h).into(), b.extend(h).into())
                .facing(interior),
        );
    }

    let normals = dropshot_wall_normals();
    let r = DROPSHOT_TILE_RADIUS;
    let span = (DROPSHOT_APOTHEM / r).ceil() as i32 + 1;
    let tile_corners: [Vec2; 6] =
        std::array::from_fn(|j| Vec2::from_angle(FRAC_PI_6 + j as f32 * FRAC_PI_3) * r);

    for row in -span..=span {
        for col in -2 * span..=2 * span {
            let center = Vec2::new(
                3f32.sqrt() * r * (col as f32 + row as f32 * 0.5),
                1.5 * r * row as f32,
            );
            if normals.iter().any(|n| n.dot(center) >= DROPSHOT_APOTHEM + r) {
                continue;
            }

            let mut clipped: Vec<Vec2> = tile_corners.iter().map(|&c| center + c).collect();
            for n in &normals {
                clipped = clip_polygon(&clipped, *n, DROPSHOT_APOTHEM);
            }
            if clipped.len() < 3 {
                continue;
            }

            let id = mesh.tiles.len() as TileId;
            let mut any = false;
            for i in 1..clipped.len() - 1 {
                let tri = Triangle::new(
                    clipped[0].extend(0.0).into(),
                    clipped[i].extend(0.0).into(),
                    clipped[i + 1].extend(0.0).into(),
                )
                .facing(interior);
                if tri.area() > MIN_TRIANGLE_AREA {
                    mesh.push_tile(tri, Some(id));
                    any = true;
                }
            }
            if any {
                mesh.tiles.push(TileInfo {
                    center: center.extend(0.0).into(),
                    side: tile_side(center.y),
                });
            }
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_face(mesh: &ArenaMesh, target: Vec3A) -> bool {
        mesh.triangles
            .iter()
            .filter(|t| t.centroid().y.abs() <= SOCCAR.half_y)
            .all(|t| t.normal.dot(target - t.centroid()) >= 0.0)
    }

    #[test]
    fn test_profile_endpoints() {
        let levels = SOCCAR.profile();
        let first = levels[0];
        let last = levels[levels.len() - 1];
        assert!((first.0 - SOCCAR.ramp_radius).abs() < 1e-3 && first.1.abs() < 1e-3);
        assert!((last.0 - SOCCAR.ramp_radius).abs() < 1e-3);
        assert!((last.1 - SOCCAR.height).abs() < 1e-3);
        assert!(levels.windows(2).all(|w| w[1].1 > w[0].1));
    }

    #[test]
    fn test_soccar_normals_face_inside() {
        let mesh = soccar();
        assert!(mesh.triangles.len() > 100);
        assert!(mesh.tiles.is_empty());
        assert!(all_face(&mesh, Vec3A::new(0.0, 0.0, SOCCAR.height * 0.5)));
    }

    #[test]
    fn test_soccar_goal_mouth_is_open() {
        let mesh = soccar();
        // No back-wall triangle covers the middle of the goal mouth
        let mouth = Vec3A::new(0.0, SOCCAR.half_y, 300.0);
        let blocked = mesh
            .triangles
            .iter()
            .any(|t| (t.closest_point(mouth) - mouth).length() < 1.0);
        assert!(!blocked);
    }

    #[test]
    fn test_octagon_is_counter_clockwise() {
        let ring = octagon(4096.0, 5120.0, 8064.0);
        let twice_area: f32 = (0..8)
            .map(|i| ring[i].perp_dot(ring[(i + 1) % 8]))
            .sum();
        assert!(twice_area > 0.0);
    }

    #[test]
    fn test_hoops_has_rims() {
        let mesh = hoops();
        let rim_tris = mesh
            .triangles
            .iter()
            .filter(|t| (t.centroid().z - HOOPS_RIM_Z).abs() <= HOOPS_RIM_TUBE_RADIUS + 1.0)
            .filter(|t| t.centroid().y.abs() > HOOPS_RIM_CENTER_Y - HOOPS_RIM_RADIUS_Y - 20.0)
            .count();
        assert!(rim_tris >= 2 * (HOOPS_RIM_SEGMENTS * HOOPS_TUBE_SEGMENTS) as usize);
    }

    #[test]
    fn test_dropshot_tiles_cover_floor() {
        let mesh = dropshot();
        assert!(mesh.tiles.len() > 100);
        assert_eq!(mesh.triangles.len(), mesh.surface_tiles.len());

        let floor_area: f32 = mesh
            .triangles
            .iter()
            .zip(&mesh.surface_tiles)
            .filter(|(_, tile)| tile.is_some())
            .map(|(t, _)| t.area())
            .sum();
        let hexagon_area = 2.0 * 3f32.sqrt() * DROPSHOT_APOTHEM * DROPSHOT_APOTHEM;
        assert!((floor_area - hexagon_area).abs() / hexagon_area < 1e-3);

        let sides: Vec<i8> = mesh.tiles.iter().map(|t| t.side).collect();
        assert!(sides.contains(&1) && sides.contains(&-1));
        for tile in &mesh.tiles {
            match tile.side {
                0 => assert!(tile.center.y.abs() < 1.0),
                side => assert_eq!(tile.center.y.signum(), f32::from(side)),
            }
        }
    }

    #[test]
    fn test_layouts_are_deterministic() {
        let a = dropshot();
        let b = dropshot();
        assert_eq!(a.triangles, b.triangles);
        assert_eq!(a.surface_tiles, b.surface_tiles);
    }

    #[test]
    fn test_clip_polygon() {
        let square = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let half = clip_polygon(&square, Vec2::X, 0.0);
        assert_eq!(half.len(), 4);
        assert!(half.iter().all(|p| p.x <= 1e-6));
    }
}
