//! Indexed polygons

use crate::float_types::Real;
use nalgebra::{Point2, Vector2};

/// One face of a [`Mesh`](crate::mesh::Mesh): an ordered ring of vertex
/// indices, the material slot it is painted with, and optional per-loop
/// texture coordinates.
///
/// Vertex order defines the winding. UVs belong to loops, not vertices, so a
/// vertex shared by several faces may carry a different UV on each; when the
/// layer is present it has exactly one entry per ring position.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Ordered indices into the owning mesh's vertex list.
    pub vertices: Vec<usize>,
    /// Per-loop texture coordinates, parallel to `vertices` when present.
    pub uvs: Option<Vec<Point2<Real>>>,
    /// Index into the owning mesh's material slots.
    pub material: usize,
}

impl Polygon {
    /// A face without a UV layer.
    pub const fn new(vertices: Vec<usize>, material: usize) -> Self {
        Self { vertices, uvs: None, material }
    }

    /// A face carrying one UV per loop.
    pub fn with_uvs(vertices: Vec<usize>, uvs: Vec<Point2<Real>>, material: usize) -> Self {
        debug_assert_eq!(vertices.len(), uvs.len());
        Self { vertices, uvs: Some(uvs), material }
    }

    /// Undirected edges of the ring, each normalized to `(min, max)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.vertices.len();
        let count = if n < 2 { 0 } else { n };
        (0..count).map(move |i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            (a.min(b), a.max(b))
        })
    }

    /// Reverse the winding. Loop UVs are reversed in lockstep so each loop
    /// keeps its vertex.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        if let Some(uvs) = &mut self.uvs {
            uvs.reverse();
        }
    }

    /// Arithmetic mean of the loop UVs. `None` when the face has no UV layer
    /// or no loops.
    pub fn uv_centroid(&self) -> Option<Point2<Real>> {
        let uvs = self.uvs.as_ref()?;
        if uvs.is_empty() {
            return None;
        }
        let mut sum = Vector2::zeros();
        for uv in uvs {
            sum += uv.coords;
        }
        Some(Point2::from(sum / uvs.len() as Real))
    }

    /// Translate every loop UV by `(du, dv)`.
    pub fn offset_uvs(&mut self, du: Real, dv: Real) {
        if let Some(uvs) = &mut self.uvs {
            for uv in uvs {
                uv.x += du;
                uv.y += dv;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_normalized_and_wrap_around() {
        let poly = Polygon::new(vec![2, 0, 5], 0);
        let edges: Vec<_> = poly.edges().collect();
        assert_eq!(edges, vec![(0, 2), (0, 5), (2, 5)]);
    }

    #[test]
    fn flip_keeps_loops_paired_with_their_vertices() {
        let mut poly = Polygon::with_uvs(
            vec![0, 1, 2],
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
            ],
            0,
        );
        poly.flip();
        assert_eq!(poly.vertices, vec![2, 1, 0]);
        let uvs = poly.uvs.as_ref().unwrap();
        assert_eq!(uvs[0], Point2::new(1.0, 1.0));
        assert_eq!(uvs[2], Point2::new(0.0, 0.0));
    }

    #[test]
    fn centroid_is_mean_of_loops() {
        let poly = Polygon::with_uvs(
            vec![0, 1, 2, 3],
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            0,
        );
        assert_eq!(poly.uv_centroid(), Some(Point2::new(1.0, 1.0)));
        assert_eq!(Polygon::new(vec![0, 1, 2], 0).uv_centroid(), None);
    }
}
