//! Bounding-volume hierarchy over arena triangles
//!
//! Built once per mode load, then queried several times per simulation step
//! for the surface nearest to the ball. Nodes live in a flat array and the
//! traversal uses an explicit stack, so queries never allocate on the heap.

use glam::Vec3A;

use super::geometry::{Aabb, Triangle};

/// Index of a triangle in the arena mesh
pub type SurfaceId = u32;

/// Triangles per leaf before a node is split
const LEAF_SIZE: usize = 4;
/// Traversal stack depth (tree depth is ~log2(n / LEAF_SIZE))
const STACK_SIZE: usize = 64;

/// Nearest-surface query result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Distance from the query point to the surface
    pub distance: f32,
    /// Closest point on the surface
    pub point: Vec3A,
    /// Unit contact normal, pointing from the surface toward the query point
    pub normal: Vec3A,
    /// Triangle that produced the hit
    pub surface_id: SurfaceId,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { aabb: Aabb, start: u32, count: u32 },
    Branch { aabb: Aabb, left: u32, right: u32 },
}

impl Node {
    #[inline]
    fn aabb(&self) -> &Aabb {
        match self {
            Node::Leaf { aabb, .. } | Node::Branch { aabb, .. } => aabb,
        }
    }
}

/// Immutable spatial index over a triangle list
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<Node>,
    /// Triangle ids, grouped so each leaf owns a contiguous range
    order: Vec<SurfaceId>,
    depth: usize,
}

impl Bvh {
    /// Build the hierarchy with median splits along the widest centroid axis.
    ///
    /// Ties in centroid position are ordered by surface id, so identical input
    /// always yields an identical tree.
    pub fn build(triangles: &[Triangle]) -> Self {
        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * triangles.len() / LEAF_SIZE + 1),
            order: (0..triangles.len() as SurfaceId).collect(),
            depth: 0,
        };

        if triangles.is_empty() {
            return bvh;
        }

        let centroids: Vec<Vec3A> = triangles.iter().map(Triangle::centroid).collect();
        let boxes: Vec<Aabb> = triangles.iter().map(Triangle::aabb).collect();
        let len = bvh.order.len();
        bvh.build_node(&centroids, &boxes, 0, len, 1);
        bvh
    }

    fn build_node(
        &mut self,
        centroids: &[Vec3A],
        boxes: &[Aabb],
        start: usize,
        end: usize,
        depth: usize,
    ) -> u32 {
        self.depth = self.depth.max(depth);

        let ids = &mut self.order[start..end];
        let aabb = ids
            .iter()
            .fold(Aabb::EMPTY, |acc, &id| acc.union(&boxes[id as usize]));

        let index = self.nodes.len() as u32;
        if ids.len() <= LEAF_SIZE {
            self.nodes.push(Node::Leaf {
                aabb,
                start: start as u32,
                count: ids.len() as u32,
            });
            return index;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &id in ids.iter() {
            centroid_bounds.grow(centroids[id as usize]);
        }
        let extent = centroid_bounds.extent();
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        ids.sort_by(|&a, &b| {
            centroids[a as usize][axis]
                .total_cmp(&centroids[b as usize][axis])
                .then(a.cmp(&b))
        });

        // Reserve this slot; children are appended after it
        self.nodes.push(Node::Leaf {
            aabb,
            start: 0,
            count: 0,
        });

        let mid = start + (end - start) / 2;
        let left = self.build_node(centroids, boxes, start, mid, depth + 1);
        let right = self.build_node(centroids, boxes, mid, end, depth + 1);
        self.nodes[index as usize] = Node::Branch { aabb, left, right };
        index
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bounds of the whole mesh (None for an empty mesh)
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| *n.aabb())
    }

    /// Closest surface within `search_radius` of `point`.
    ///
    /// Surfaces for which `skip` returns true are ignored. Equal distances are
    /// resolved in favour of the lowest surface id.
    pub fn nearest_where<F>(
        &self,
        triangles: &[Triangle],
        point: Vec3A,
        search_radius: f32,
        skip: F,
    ) -> Option<SurfaceHit>
    where
        F: Fn(SurfaceId) -> bool,
    {
        if self.nodes.is_empty() || !(search_radius >= 0.0) {
            return None;
        }

        let mut best_dist_sq = search_radius * search_radius;
        let mut best: Option<(SurfaceId, Vec3A)> = None;

        let mut stack = [0u32; STACK_SIZE];
        let mut top = 1;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if node.aabb().distance_squared_to(point) > best_dist_sq {
                continue;
            }

            match *node {
                Node::Leaf { start, count, .. } => {
                    let range = start as usize..(start + count) as usize;
                    for &id in &self.order[range] {
                        if skip(id) {
                            continue;
                        }
                        let closest = triangles[id as usize].closest_point(point);
                        let dist_sq = (point - closest).length_squared();
                        let better = match best {
                            None => dist_sq <= best_dist_sq,
                            Some((best_id, _)) => {
                                dist_sq < best_dist_sq || (dist_sq == best_dist_sq && id < best_id)
                            }
                        };
                        if better {
                            best_dist_sq = dist_sq;
                            best = Some((id, closest));
                        }
                    }
                }
                Node::Branch { left, right, .. } => {
                    if top + 2 > STACK_SIZE {
                        log::warn!("BVH traversal stack exhausted; result may be approximate");
                        continue;
                    }
                    // Push the farther child first so the nearer one is visited first
                    let dl = self.nodes[left as usize].aabb().distance_squared_to(point);
                    let dr = self.nodes[right as usize].aabb().distance_squared_to(point);
                    let (near, far) = if dl <= dr { (left, right) } else { (right, left) };
                    stack[top] = far;
                    stack[top + 1] = near;
                    top += 2;
                }
            }
        }

        best.map(|(surface_id, closest)| {
            let offset = point - closest;
            let distance = best_dist_sq.sqrt();
            let normal = if distance > 1e-4 {
                offset / distance
            } else {
                triangles[surface_id as usize].normal
            };
            SurfaceHit {
                distance,
                point: closest,
                normal,
                surface_id,
            }
        })
    }

    /// Closest surface within `search_radius` of `point`
    pub fn nearest(
        &self,
        triangles: &[Triangle],
        point: Vec3A,
        search_radius: f32,
    ) -> Option<SurfaceHit> {
        self.nearest_where(triangles, point, search_radius, |_| false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geometry::quad;

    /// A grid of floor quads plus a wall, enough to force several tree levels
    fn test_mesh() -> Vec<Triangle> {
        let mut tris = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let x = i as f32 * 100.0;
                let y = j as f32 * 100.0;
                tris.extend(quad(
                    Vec3A::new(x, y, 0.0),
                    Vec3A::new(x + 100.0, y, 0.0),
                    Vec3A::new(x + 100.0, y + 100.0, 0.0),
                    Vec3A::new(x, y + 100.0, 0.0),
                ));
            }
        }
        tris.extend(quad(
            Vec3A::new(1000.0, 0.0, 0.0),
            Vec3A::new(1000.0, 1000.0, 0.0),
            Vec3A::new(1000.0, 1000.0, 500.0),
            Vec3A::new(1000.0, 0.0, 500.0),
        ));
        tris
    }

    fn brute_force(tris: &[Triangle], p: Vec3A, r: f32) -> Option<(SurfaceId, f32)> {
        let mut best: Option<(SurfaceId, f32)> = None;
        for (id, tri) in tris.iter().enumerate() {
            let d = (p - tri.closest_point(p)).length_squared();
            if d <= r * r && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((id as SurfaceId, d));
            }
        }
        best.map(|(id, d)| (id, d.sqrt()))
    }

    #[test]
    fn test_build_shape() {
        let tris = test_mesh();
        let bvh = Bvh::build(&tris);
        assert!(bvh.depth() > 3);
        assert!(bvh.node_count() > tris.len() / LEAF_SIZE);
        let bounds = bvh.bounds().unwrap();
        assert_eq!(bounds.max, Vec3A::new(1000.0, 1000.0, 500.0));
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let tris = test_mesh();
        let bvh = Bvh::build(&tris);
        let probes = [
            Vec3A::new(150.0, 250.0, 40.0),
            Vec3A::new(990.0, 500.0, 200.0),
            Vec3A::new(-50.0, -50.0, 10.0),
            Vec3A::new(555.0, 123.0, 90.0),
        ];
        for p in probes {
            let hit = bvh.nearest(&tris, p, 300.0).unwrap();
            let (_, expected) = brute_force(&tris, p, 300.0).unwrap();
            assert!((hit.distance - expected).abs() < 1e-3, "probe {p:?}");
        }
    }

    #[test]
    fn test_nearest_out_of_range() {
        let tris = test_mesh();
        let bvh = Bvh::build(&tris);
        assert!(bvh.nearest(&tris, Vec3A::new(500.0, 500.0, 400.0), 100.0).is_none());
        assert!(Bvh::build(&[]).nearest(&[], Vec3A::ZERO, 1e6).is_none());
    }

    #[test]
    fn test_tie_breaks_on_lowest_id() {
        let tris = test_mesh();
        let bvh = Bvh::build(&tris);
        // Directly above a shared quad corner: every touching triangle is equidistant
        let hit = bvh.nearest(&tris, Vec3A::new(300.0, 300.0, 50.0), 100.0).unwrap();
        let lowest = tris
            .iter()
            .enumerate()
            .filter(|(_, t)| ((Vec3A::new(300.0, 300.0, 50.0) - t.closest_point(Vec3A::new(300.0, 300.0, 50.0))).length() - 50.0).abs() < 1e-4)
            .map(|(i, _)| i as SurfaceId)
            .min()
            .unwrap();
        assert_eq!(hit.surface_id, lowest);
        assert!((hit.normal - Vec3A::Z).length() < 1e-4);
    }

    #[test]
    fn test_skip_filter() {
        let tris = test_mesh();
        let bvh = Bvh::build(&tris);
        let p = Vec3A::new(50.0, 30.0, 20.0);
        let first = bvh.nearest(&tris, p, 200.0).unwrap();
        let second = bvh
            .nearest_where(&tris, p, 200.0, |id| id == first.surface_id)
            .unwrap();
        assert_ne!(first.surface_id, second.surface_id);
        assert!(second.distance >= first.distance);
    }
}
