//! Test support library
//! Shared fixture meshes and float comparison helpers.

use meshprep::float_types::Real;
use meshprep::mesh::{Material, Mesh, Polygon};
use nalgebra::{Point2, Point3};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// A single triangle on the given points with UVs `(0,0) (1,0) (0,1)`.
pub fn triangle_mesh(points: [[Real; 3]; 3], material: &str) -> Mesh {
    Mesh {
        vertices: points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
        polygons: vec![Polygon {
            vertices: vec![0, 1, 2],
            uvs: Some(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
            ]),
            material: 0,
        }],
        materials: vec![Material::new(material)],
    }
}

/// An axis-aligned quad of side `size` in the XY plane with a full UV tile.
pub fn quad_mesh(size: Real, material: &str) -> Mesh {
    Mesh {
        vertices: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(size, 0.0, 0.0),
            Point3::new(size, size, 0.0),
            Point3::new(0.0, size, 0.0),
        ],
        polygons: vec![Polygon {
            vertices: vec![0, 1, 2, 3],
            uvs: Some(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ]),
            material: 0,
        }],
        materials: vec![Material::new(material)],
    }
}

/// A closed cube of side `size` with its corner at the origin and every
/// face wound counter-clockwise seen from outside.
pub fn cube_mesh(size: Real, material: &str) -> Mesh {
    let s = size;
    let rings: [[usize; 4]; 6] = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [2, 3, 7, 6],
        [0, 4, 7, 3],
        [1, 2, 6, 5],
    ];
    Mesh {
        vertices: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(s, 0.0, 0.0),
            Point3::new(s, s, 0.0),
            Point3::new(0.0, s, 0.0),
            Point3::new(0.0, 0.0, s),
            Point3::new(s, 0.0, s),
            Point3::new(s, s, s),
            Point3::new(0.0, s, s),
        ],
        polygons: rings
            .iter()
            .map(|ring| Polygon { vertices: ring.to_vec(), uvs: None, material: 0 })
            .collect(),
        materials: vec![Material::new(material)],
    }
}
