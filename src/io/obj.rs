//! Wavefront OBJ import and export
//!
//! The parser keeps `o` groups as separate objects, remaps the file-global
//! vertex and UV lists into per-object meshes and accepts negative
//! (relative) face indices. OBJ has no transforms, so imported objects sit
//! at the origin and exported objects are baked into world space.

// The Real <-> f32 casts below are no-ops under the f32 feature.
#![allow(clippy::unnecessary_cast)]

use crate::errors::PipelineError;
use crate::float_types::Real;
use crate::mesh::{Material, Mesh, Polygon};
use crate::scene::{Object, Scene, Transform};
use nalgebra::{Point2, Point3};
use std::collections::HashMap;
use std::path::Path;

/// Read a `.obj` file into a scene.
pub fn import(path: &Path) -> Result<Scene, PipelineError> {
    let text = std::fs::read_to_string(path)?;
    let fail = |line: usize, detail: String| PipelineError::ImportFailure {
        path: path.to_path_buf(),
        detail: format!("line {}: {}", line, detail),
    };

    let mut positions: Vec<Point3<Real>> = Vec::new();
    let mut tex_coords: Vec<Point2<Real>> = Vec::new();
    let mut objects: Vec<(String, Mesh)> = Vec::new();

    let mut name: Option<String> = None;
    let mut mesh = Mesh::new();
    // File-global vertex index to index in the current mesh.
    let mut remap: HashMap<usize, usize> = HashMap::new();
    // usemtl state survives `o` boundaries.
    let mut active_material: Option<String> = None;

    for (number, line) in text.lines().enumerate() {
        let number = number + 1;
        let line = line.trim();
        let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        match keyword {
            "v" => {
                let coords = parse_floats(rest, 3).map_err(|d| fail(number, d))?;
                positions.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            "vt" => {
                let coords = parse_floats(rest, 2).map_err(|d| fail(number, d))?;
                tex_coords.push(Point2::new(coords[0], coords[1]));
            }
            "o" => {
                if name.is_some() || !mesh.is_empty() {
                    objects.push((
                        name.take().unwrap_or_else(|| "default".to_string()),
                        std::mem::take(&mut mesh),
                    ));
                    remap.clear();
                }
                name = Some(rest.trim().to_string());
            }
            "usemtl" => {
                active_material = Some(rest.trim().to_string());
            }
            "f" => {
                let mut vertices: Vec<usize> = Vec::new();
                let mut uvs: Vec<Option<usize>> = Vec::new();
                for token in rest.split_whitespace() {
                    let mut fields = token.split('/');
                    let vertex = fields.next().unwrap_or_default();
                    let global = resolve_index(vertex, positions.len())
                        .ok_or_else(|| fail(number, format!("bad face index {:?}", token)))?;
                    let local = match remap.get(&global) {
                        Some(&local) => local,
                        None => {
                            mesh.vertices.push(positions[global]);
                            let local = mesh.vertices.len() - 1;
                            remap.insert(global, local);
                            local
                        }
                    };
                    vertices.push(local);
                    match fields.next().filter(|f| !f.is_empty()) {
                        Some(field) => {
                            let vt = resolve_index(field, tex_coords.len())
                                .ok_or_else(|| fail(number, format!("bad face index {:?}", token)))?;
                            uvs.push(Some(vt));
                        }
                        None => uvs.push(None),
                    }
                }
                if vertices.len() < 3 {
                    continue;
                }
                let uvs = uvs
                    .iter()
                    .map(|vt| vt.map(|i| tex_coords[i]))
                    .collect::<Option<Vec<_>>>();
                let slot = match &active_material {
                    Some(name) => mesh.merge_material_slot(&Material::new(name.as_str())),
                    None => 0,
                };
                mesh.polygons.push(Polygon { vertices, uvs, material: slot });
            }
            _ => {}
        }
    }
    if name.is_some() || !mesh.is_empty() {
        objects.push((name.unwrap_or_else(|| "default".to_string()), mesh));
    }

    let mut scene = Scene::new();
    for (name, mesh) in objects {
        let mesh = (!mesh.is_empty()).then(|| scene.add_mesh(mesh));
        scene.add_object(Object {
            name,
            transform: Transform::identity(),
            parent: None,
            children: Vec::new(),
            mesh,
        });
    }
    Ok(scene)
}

fn parse_floats(rest: &str, want: usize) -> Result<Vec<Real>, String> {
    let values: Vec<Real> = rest
        .split_whitespace()
        .take(want)
        .map(|t| t.parse::<Real>().map_err(|_| format!("bad float {:?}", t)))
        .collect::<Result<_, _>>()?;
    if values.len() < want {
        return Err(format!("expected {} values, got {}", want, values.len()));
    }
    Ok(values)
}

/// OBJ indices are 1-based; negative values count back from the end of the
/// list as read so far.
fn resolve_index(token: &str, len: usize) -> Option<usize> {
    let value: i64 = token.parse().ok()?;
    if value > 0 {
        let index = (value - 1) as usize;
        (index < len).then_some(index)
    } else if value < 0 {
        len.checked_sub(value.unsigned_abs() as usize)
    } else {
        None
    }
}

/// Serialize `scene` as OBJ text, one `o` group per mesh object.
pub fn export(scene: &Scene) -> String {
    let mut out = String::new();
    let mut vertex_base = 0usize;
    let mut tex_coord_count = 0usize;
    let mut tex_coord_index: HashMap<[u32; 2], usize> = HashMap::new();
    let mut active_material: Option<String> = None;

    for (id, object) in scene.objects.iter().enumerate() {
        let Some(mesh_id) = object.mesh else {
            continue;
        };
        let mesh = &scene.meshes[mesh_id];
        let world = scene.world_matrix(id);

        out.push_str(&format!("o {}\n", object.name));
        for v in &mesh.vertices {
            let v = world.transform_point(v);
            out.push_str(&format!("v {} {} {}\n", v.x, v.y, v.z));
        }

        // UVs referenced by this group that the file does not carry yet,
        // followed by the faces that point at them.
        let tex_coord_start = tex_coord_count;
        let mut new_tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut face_lines = String::new();
        for poly in &mesh.polygons {
            if poly.vertices.len() < 3 {
                continue;
            }
            let material = mesh.materials.get(poly.material).map(|m| m.name.clone());
            if material != active_material {
                if let Some(name) = &material {
                    face_lines.push_str(&format!("usemtl {}\n", name));
                }
                active_material = material;
            }
            face_lines.push('f');
            for (i, &vertex) in poly.vertices.iter().enumerate() {
                let v = vertex_base + vertex + 1;
                match &poly.uvs {
                    Some(uvs) => {
                        let key = [(uvs[i].x as f32).to_bits(), (uvs[i].y as f32).to_bits()];
                        let vt = match tex_coord_index.get(&key) {
                            Some(&vt) => vt,
                            None => {
                                let vt = tex_coord_count + new_tex_coords.len();
                                new_tex_coords.push([uvs[i].x as f32, uvs[i].y as f32]);
                                tex_coord_index.insert(key, vt);
                                vt
                            }
                        };
                        face_lines.push_str(&format!(" {}/{}", v, vt + 1));
                    }
                    None => face_lines.push_str(&format!(" {}", v)),
                }
            }
            face_lines.push('\n');
        }
        tex_coord_count = tex_coord_start + new_tex_coords.len();
        for uv in &new_tex_coords {
            out.push_str(&format!("vt {} {}\n", uv[0], uv[1]));
        }
        out.push_str(&face_lines);

        vertex_base += mesh.vertices.len();
    }
    out
}
