//! Indexed mesh data model and the geometric passes that run on it
//!
//! A [`Mesh`] stores vertices once and describes faces as ordered index
//! rings, the layout every supported file format round-trips through.
//! Texture coordinates live on face loops rather than vertices so seams
//! survive: the same vertex can carry a different UV on each face.

pub mod material;
pub mod polygon;

pub use material::Material;
pub use polygon::Polygon;

use crate::float_types::{EPSILON, Real};
use nalgebra::{Matrix4, Point3};
use std::collections::{HashMap, HashSet, VecDeque};

/// Merge distance the preparation pipelines use for vertex welding.
pub const DEFAULT_WELD_THRESHOLD: Real = 0.001;

/// An indexed polygon mesh with named material slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Point3<Real>>,
    pub polygons: Vec<Polygon>,
    pub materials: Vec<Material>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.polygons.is_empty()
    }

    /// Undirected edges over all faces, deduplicated.
    pub fn unique_edges(&self) -> HashSet<(usize, usize)> {
        let mut edges = HashSet::new();
        for poly in &self.polygons {
            edges.extend(poly.edges());
        }
        edges
    }

    /// Length of an edge returned by [`Mesh::unique_edges`].
    pub fn edge_length(&self, edge: (usize, usize)) -> Real {
        (self.vertices[edge.1].coords - self.vertices[edge.0].coords).norm()
    }

    /// Fan-triangulate every face in place. Loop UVs and materials carry
    /// over to the fan triangles.
    pub fn triangulate_mut(&mut self) {
        let mut out = Vec::with_capacity(self.polygons.len());
        for poly in self.polygons.drain(..) {
            if poly.vertices.len() <= 3 {
                out.push(poly);
                continue;
            }
            for i in 1..poly.vertices.len() - 1 {
                let vertices = vec![poly.vertices[0], poly.vertices[i], poly.vertices[i + 1]];
                let uvs = poly.uvs.as_ref().map(|uvs| vec![uvs[0], uvs[i], uvs[i + 1]]);
                out.push(Polygon { vertices, uvs, material: poly.material });
            }
        }
        self.polygons = out;
    }

    /// Merge vertices closer than `threshold` onto their first-seen
    /// representative, re-point the faces, and drop faces collapsed below a
    /// triangle.
    ///
    /// Neighbor lookup goes through a grid sized to the threshold, so only
    /// the 27 surrounding cells are searched per vertex.
    pub fn weld_vertices(&mut self, threshold: Real) {
        let cell = threshold.max(EPSILON);
        let key_of = |p: &Point3<Real>| -> (i64, i64, i64) {
            (
                (p.x / cell).floor() as i64,
                (p.y / cell).floor() as i64,
                (p.z / cell).floor() as i64,
            )
        };

        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        let mut kept: Vec<Point3<Real>> = Vec::with_capacity(self.vertices.len());
        let mut remap = vec![0usize; self.vertices.len()];

        for (i, p) in self.vertices.iter().enumerate() {
            let key = key_of(p);
            let mut target = None;
            'search: for dx in -1..=1i64 {
                for dy in -1..=1i64 {
                    for dz in -1..=1i64 {
                        let neighbor = (key.0 + dx, key.1 + dy, key.2 + dz);
                        let Some(bucket) = grid.get(&neighbor) else {
                            continue;
                        };
                        for &j in bucket {
                            if (kept[j].coords - p.coords).norm() <= threshold {
                                target = Some(j);
                                break 'search;
                            }
                        }
                    }
                }
            }
            remap[i] = match target {
                Some(j) => j,
                None => {
                    let j = kept.len();
                    kept.push(*p);
                    grid.entry(key).or_default().push(j);
                    j
                }
            };
        }

        self.vertices = kept;

        let mut polygons = Vec::with_capacity(self.polygons.len());
        for poly in self.polygons.drain(..) {
            let mapped: Vec<usize> = poly.vertices.iter().map(|&v| remap[v]).collect();
            let n = mapped.len();
            // Collapse runs of now-identical loops, keeping the later loop.
            let keep_loop: Vec<usize> = (0..n).filter(|&i| mapped[i] != mapped[(i + 1) % n]).collect();
            if keep_loop.len() < 3 {
                continue;
            }
            let vertices: Vec<usize> = keep_loop.iter().map(|&i| mapped[i]).collect();
            let distinct: HashSet<usize> = vertices.iter().copied().collect();
            if distinct.len() < 3 {
                continue;
            }
            let uvs = poly
                .uvs
                .as_ref()
                .map(|uvs| keep_loop.iter().map(|&i| uvs[i]).collect());
            polygons.push(Polygon { vertices, uvs, material: poly.material });
        }
        self.polygons = polygons;
    }

    /// Re-orient windings so neighboring faces agree, then flip each
    /// connected shell whose enclosed volume comes out negative so the
    /// normals point outward.
    pub fn make_normals_consistent(&mut self) {
        let face_count = self.polygons.len();
        if face_count == 0 {
            return;
        }

        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (f, poly) in self.polygons.iter().enumerate() {
            for edge in poly.edges() {
                edge_faces.entry(edge).or_default().push(f);
            }
        }

        let mut visited = vec![false; face_count];
        let mut component = vec![0usize; face_count];
        let mut component_count = 0usize;

        for seed in 0..face_count {
            if visited[seed] {
                continue;
            }
            let id = component_count;
            component_count += 1;
            visited[seed] = true;
            component[seed] = id;
            let mut queue = VecDeque::from([seed]);
            while let Some(f) = queue.pop_front() {
                let ring = self.polygons[f].vertices.clone();
                let n = ring.len();
                if n < 2 {
                    continue;
                }
                for i in 0..n {
                    let a = ring[i];
                    let b = ring[(i + 1) % n];
                    let Some(neighbors) = edge_faces.get(&(a.min(b), a.max(b))) else {
                        continue;
                    };
                    for &g in neighbors {
                        if visited[g] {
                            continue;
                        }
                        // The shared edge running the same way on both faces
                        // means the neighbor's winding disagrees.
                        let same_direction = {
                            let gv = &self.polygons[g].vertices;
                            let m = gv.len();
                            (0..m).any(|j| gv[j] == a && gv[(j + 1) % m] == b)
                        };
                        if same_direction {
                            self.polygons[g].flip();
                        }
                        visited[g] = true;
                        component[g] = id;
                        queue.push_back(g);
                    }
                }
            }
        }

        let mut volumes = vec![0.0; component_count];
        for (f, poly) in self.polygons.iter().enumerate() {
            volumes[component[f]] += self.face_signed_volume(poly);
        }
        for f in 0..face_count {
            if volumes[component[f]] < 0.0 {
                self.polygons[f].flip();
            }
        }
    }

    /// Signed volume enclosed by the mesh. Positive when windings face
    /// outward (counter-clockwise seen from outside).
    pub fn signed_volume(&self) -> Real {
        self.polygons.iter().map(|poly| self.face_signed_volume(poly)).sum()
    }

    fn face_signed_volume(&self, poly: &Polygon) -> Real {
        let ring = &poly.vertices;
        if ring.len() < 3 {
            return 0.0;
        }
        let p0 = self.vertices[ring[0]].coords;
        let mut volume = 0.0;
        for i in 1..ring.len() - 1 {
            let p1 = self.vertices[ring[i]].coords;
            let p2 = self.vertices[ring[i + 1]].coords;
            volume += p0.dot(&p1.cross(&p2)) / 6.0;
        }
        volume
    }

    /// Append a winding-flipped copy of every face so the mesh draws from
    /// both sides under backface culling. Vertices are shared with the
    /// originals; loop UVs reverse with their rings.
    pub fn make_double_sided(&mut self) {
        let mut copies = self.polygons.clone();
        for poly in &mut copies {
            poly.flip();
        }
        self.polygons.extend(copies);
    }

    /// Partition into one mesh per used material slot, with vertices
    /// compacted per piece. A mesh without material slots comes back whole.
    pub fn split_by_material(&self) -> Vec<Mesh> {
        if self.materials.is_empty() {
            return vec![self.clone()];
        }
        let last = self.materials.len() - 1;
        let mut pieces = Vec::new();
        for (slot, material) in self.materials.iter().enumerate() {
            let mut piece = Mesh {
                vertices: Vec::new(),
                polygons: Vec::new(),
                materials: vec![material.clone()],
            };
            let mut remap: HashMap<usize, usize> = HashMap::new();
            for poly in self.polygons.iter().filter(|p| p.material.min(last) == slot) {
                let vertices: Vec<usize> = poly
                    .vertices
                    .iter()
                    .map(|&v| {
                        *remap.entry(v).or_insert_with(|| {
                            piece.vertices.push(self.vertices[v]);
                            piece.vertices.len() - 1
                        })
                    })
                    .collect();
                piece.polygons.push(Polygon { vertices, uvs: poly.uvs.clone(), material: 0 });
            }
            if !piece.polygons.is_empty() {
                pieces.push(piece);
            }
        }
        pieces
    }

    /// Append `other` transformed by `transform`, offsetting its indices and
    /// merging its material slots into this mesh by exact name.
    pub fn append_transformed(&mut self, other: &Mesh, transform: &Matrix4<Real>) {
        let vertex_base = self.vertices.len();
        for v in &other.vertices {
            self.vertices.push(transform.transform_point(v));
        }
        let slot_map: Vec<usize> = other
            .materials
            .iter()
            .map(|m| self.merge_material_slot(m))
            .collect();
        for poly in &other.polygons {
            let vertices = poly.vertices.iter().map(|&v| v + vertex_base).collect();
            let material = slot_map.get(poly.material).copied().unwrap_or(0);
            self.polygons.push(Polygon { vertices, uvs: poly.uvs.clone(), material });
        }
    }

    /// Slot index of `material` by name, adding a slot when the name is new.
    pub fn merge_material_slot(&mut self, material: &Material) -> usize {
        match self.materials.iter().position(|m| m.name == material.name) {
            Some(slot) => slot,
            None => {
                self.materials.push(material.clone());
                self.materials.len() - 1
            }
        }
    }
}
