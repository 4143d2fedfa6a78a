//! Collision mesh consolidation
//!
//! Builds one triangulated collision mesh out of a whole scene. The passes
//! run in a fixed order:
//!
//! 1. walk each object hierarchy and mark objects whose accumulated scale
//!    product is negative (baking such a transform mirrors the geometry,
//!    which would turn the faces inside out),
//! 2. copy every mesh object's mesh, pre-flipping the windings of marked
//!    objects,
//! 3. bake each copy's world transform and merge everything into one mesh,
//!    merging material slots by exact name,
//! 4. split faces until no edge is longer than the threshold,
//! 5. triangulate,
//! 6. normalize `col_*` material names and collapse numbered duplicates
//!    onto their canonical slot.
//!
//! The input scene is never mutated.

use crate::errors::PipelineError;
use crate::float_types::Real;
use crate::mesh::{Mesh, Polygon, material};
use crate::scene::{ObjectId, Scene};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Edge length above which collision faces are subdivided.
pub const DEFAULT_EDGE_THRESHOLD: Real = 32.0;

/// Hierarchy levels the scale-flip walk descends below a root.
const FLIP_WALK_DEPTH_LIMIT: usize = 100;

/// Subdivision passes granted before a mesh is declared non-converging.
const SUBDIVISION_PASS_LIMIT: usize = 64;

/// Merge every mesh object in `scene` into one triangulated collision mesh.
///
/// An empty scene (or one with only non-mesh objects) yields an empty mesh,
/// which is a valid result. See the module docs for the pass order.
pub fn consolidate(scene: &Scene, edge_length_threshold: Real) -> Result<Mesh, PipelineError> {
    let flipped = mark_scale_flipped(scene);

    let mut merged = Mesh::default();
    for (id, object) in scene.objects.iter().enumerate() {
        let Some(mesh_id) = object.mesh else {
            continue;
        };
        // Object-local copy; instanced meshes are duplicated per object.
        let mut copy = scene.meshes[mesh_id].clone();
        if flipped.contains(&id) {
            for poly in &mut copy.polygons {
                poly.flip();
            }
        }
        let world = scene.world_matrix(id);
        merged.append_transformed(&copy, &world);
    }

    subdivide_long_edges(&mut merged, edge_length_threshold)?;
    merged.triangulate_mut();
    canonicalize_materials(&mut merged)?;
    collapse_duplicate_materials(&mut merged)?;

    info!(
        "collision mesh: {} triangles, {} materials",
        merged.polygons.len(),
        merged.materials.len()
    );
    Ok(merged)
}

/// Objects whose componentwise scale product accumulated from their root is
/// negative. The walk starts at each root's own scale.
fn mark_scale_flipped(scene: &Scene) -> HashSet<ObjectId> {
    let mut flipped = HashSet::new();
    for root in scene.roots() {
        let mut stack = vec![(root, scene.objects[root].transform.scale, 0usize)];
        while let Some((id, scale, depth)) = stack.pop() {
            if depth > FLIP_WALK_DEPTH_LIMIT {
                continue;
            }
            if scale.x * scale.y * scale.z < 0.0 {
                flipped.insert(id);
            }
            for &child in &scene.objects[id].children {
                let child_scale = scale.component_mul(&scene.objects[child].transform.scale);
                stack.push((child, child_scale, depth + 1));
            }
        }
    }
    flipped
}

/// Split every unique edge longer than `threshold` at its midpoint, pass
/// after pass, until none remain. A NaN edge length never classifies as
/// long, so meshes with broken coordinates fall through to the pass bound
/// instead of looping.
fn subdivide_long_edges(mesh: &mut Mesh, threshold: Real) -> Result<(), PipelineError> {
    for pass in 0..SUBDIVISION_PASS_LIMIT {
        let long: HashSet<(usize, usize)> = mesh
            .unique_edges()
            .into_iter()
            .filter(|&edge| mesh.edge_length(edge) > threshold)
            .collect();
        if long.is_empty() {
            return Ok(());
        }
        debug!("subdivision pass {}: {} long edges", pass, long.len());
        split_edges(mesh, &long);
    }
    Err(PipelineError::SubdivisionDidNotConverge { limit: SUBDIVISION_PASS_LIMIT })
}

/// One splitting pass: insert a midpoint on every listed edge (shared
/// between the faces that use it) and rebuild the touched faces without
/// n-gons, the way an editor's grid fill does.
fn split_edges(mesh: &mut Mesh, edges: &HashSet<(usize, usize)>) {
    let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
    let polygons = std::mem::take(&mut mesh.polygons);
    let mut rebuilt = Vec::with_capacity(polygons.len());

    for poly in polygons {
        let n = poly.vertices.len();
        let split: Vec<bool> = (0..n)
            .map(|i| {
                let a = poly.vertices[i];
                let b = poly.vertices[(i + 1) % n];
                edges.contains(&(a.min(b), a.max(b)))
            })
            .collect();
        let split_count = split.iter().filter(|s| **s).count();
        if n < 3 || split_count == 0 {
            rebuilt.push(poly);
            continue;
        }

        // Expanded ring: the original corners with midpoints spliced in.
        // Midpoint UVs are interpolated per face, matching the loop model.
        let has_uvs = poly.uvs.is_some();
        let mut ring: Vec<usize> = Vec::with_capacity(n + split_count);
        let mut ring_uvs: Vec<Point2<Real>> = Vec::with_capacity(if has_uvs { n + split_count } else { 0 });
        let mut is_mid: Vec<bool> = Vec::with_capacity(n + split_count);
        for i in 0..n {
            ring.push(poly.vertices[i]);
            is_mid.push(false);
            if let Some(uvs) = &poly.uvs {
                ring_uvs.push(uvs[i]);
            }
            if split[i] {
                let a = poly.vertices[i];
                let b = poly.vertices[(i + 1) % n];
                ring.push(midpoint_vertex(mesh, &mut midpoints, a, b));
                is_mid.push(true);
                if let Some(uvs) = &poly.uvs {
                    ring_uvs.push(Point2::from((uvs[i].coords + uvs[(i + 1) % n].coords) * 0.5));
                }
            }
        }
        let ring_len = ring.len();

        match (n, split_count) {
            // Triangle with all edges split: four triangles. Corners sit at
            // even ring positions, midpoints at odd ones.
            (3, 3) => {
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &[1, 2, 3]));
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &[3, 4, 5]));
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &[5, 0, 1]));
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &[1, 3, 5]));
            }
            // Quad with all edges split: a center vertex and four quads.
            (4, 4) => {
                let center = {
                    let sum = [1usize, 3, 5, 7]
                        .iter()
                        .fold(Vector3::zeros(), |acc, &i| acc + mesh.vertices[ring[i]].coords);
                    mesh.vertices.push(Point3::from(sum * 0.25));
                    mesh.vertices.len() - 1
                };
                let center_uv = has_uvs.then(|| {
                    let sum = [1usize, 3, 5, 7]
                        .iter()
                        .fold(Vector2::zeros(), |acc, &i| acc + ring_uvs[i].coords);
                    Point2::from(sum * 0.25)
                });
                for i in 0..4 {
                    let corner = 2 * i;
                    let after = (2 * i + 1) % 8;
                    let before = (2 * i + 7) % 8;
                    let vertices = vec![ring[corner], ring[after], center, ring[before]];
                    let uvs = center_uv
                        .map(|c| vec![ring_uvs[corner], ring_uvs[after], c, ring_uvs[before]]);
                    rebuilt.push(Polygon { vertices, uvs, material: poly.material });
                }
            }
            // Quad with the two opposite edges split: two quads across.
            (4, 2) if split[0] && split[2] || split[1] && split[3] => {
                let mid_positions: Vec<usize> = (0..ring_len).filter(|&i| is_mid[i]).collect();
                let (p, q) = (mid_positions[0], mid_positions[1]);
                let arc_a: Vec<usize> = (p..=q).collect();
                let mut arc_b: Vec<usize> = (q..ring_len).collect();
                arc_b.extend(0..=p);
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &arc_a));
                rebuilt.push(ring_face(&ring, &ring_uvs, has_uvs, poly.material, &arc_b));
            }
            // Everything else: fan the expanded ring from the first midpoint.
            _ => {
                let start = is_mid.iter().position(|m| *m).unwrap_or(0);
                let rotated: Vec<usize> = (0..ring_len).map(|i| (start + i) % ring_len).collect();
                for i in 1..ring_len - 1 {
                    rebuilt.push(ring_face(
                        &ring,
                        &ring_uvs,
                        has_uvs,
                        poly.material,
                        &[rotated[0], rotated[i], rotated[i + 1]],
                    ));
                }
            }
        }
    }

    mesh.polygons = rebuilt;
}

fn midpoint_vertex(
    mesh: &mut Mesh,
    midpoints: &mut HashMap<(usize, usize), usize>,
    a: usize,
    b: usize,
) -> usize {
    let key = (a.min(b), a.max(b));
    if let Some(&existing) = midpoints.get(&key) {
        return existing;
    }
    let mid = Point3::from((mesh.vertices[a].coords + mesh.vertices[b].coords) * 0.5);
    mesh.vertices.push(mid);
    let index = mesh.vertices.len() - 1;
    midpoints.insert(key, index);
    index
}

fn ring_face(
    ring: &[usize],
    ring_uvs: &[Point2<Real>],
    has_uvs: bool,
    material: usize,
    positions: &[usize],
) -> Polygon {
    Polygon {
        vertices: positions.iter().map(|&i| ring[i]).collect(),
        uvs: has_uvs.then(|| positions.iter().map(|&i| ring_uvs[i]).collect()),
        material,
    }
}

/// Rename every `col_*` slot to `<canonical>.<NNN>`, numbering the slots in
/// discovery order from 001.
fn canonicalize_materials(mesh: &mut Mesh) -> Result<(), PipelineError> {
    let mut counter = 0usize;
    for slot in 0..mesh.materials.len() {
        let name = mesh.materials[slot].name.clone();
        if !material::is_collision_name(&name) {
            continue;
        }
        counter += 1;
        let canonical = match material::parse_collision_name(&name)? {
            material::CollisionName::Canonical(name) => name,
            material::CollisionName::Suffixed { canonical, .. } => canonical,
        };
        mesh.materials[slot].name = format!("{}.{:03}", canonical, counter);
    }
    Ok(())
}

/// Strip the counters back off: the first slot of each canonical name keeps
/// it, every later slot with the same canonical name is collapsed onto the
/// first (faces re-pointed, slot removed).
fn collapse_duplicate_materials(mesh: &mut Mesh) -> Result<(), PipelineError> {
    let mut names: Vec<String> = mesh.materials.iter().map(|m| m.name.clone()).collect();
    let mut remove = vec![false; names.len()];
    let mut repoint: HashMap<usize, usize> = HashMap::new();

    for slot in 0..names.len() {
        let name = names[slot].clone();
        if !material::is_collision_name(&name) {
            continue;
        }
        if let material::CollisionName::Suffixed { canonical, .. } =
            material::parse_collision_name(&name)?
        {
            match names[..slot].iter().position(|n| *n == canonical) {
                Some(target) => {
                    info!("collapsing material {} => {}", name, canonical);
                    repoint.insert(slot, target);
                    remove[slot] = true;
                }
                None => {
                    info!("renaming material {} => {}", name, canonical);
                    names[slot] = canonical;
                }
            }
        }
    }

    let mut new_index = vec![usize::MAX; names.len()];
    let mut materials = Vec::with_capacity(names.len());
    for (slot, name) in names.into_iter().enumerate() {
        if remove[slot] {
            debug!("removing slot {}", name);
            continue;
        }
        new_index[slot] = materials.len();
        materials.push(crate::mesh::Material::new(name));
    }
    for poly in &mut mesh.polygons {
        let slot = repoint.get(&poly.material).copied().unwrap_or(poly.material);
        poly.material = new_index.get(slot).copied().unwrap_or(0);
    }
    mesh.materials = materials;
    Ok(())
}
