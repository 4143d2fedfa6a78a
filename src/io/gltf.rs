//! glTF 2.0 import and export
//!
//! Import goes through the `gltf` crate and keeps the node hierarchy,
//! decomposed TRS transforms, mesh instancing and material names. Export
//! writes the JSON document by hand: one glTF mesh per scene mesh, one
//! primitive per material slot, faces fan-triangulated and per-corner UVs
//! turned into duplicated vertices. `.gltf` embeds the binary buffer as a
//! base64 data URI, `.glb` wraps the same document in the binary container.

// The Real <-> f32 casts below are no-ops under the f32 feature.
#![allow(clippy::unnecessary_cast)]

use crate::errors::PipelineError;
use crate::float_types::Real;
use crate::mesh::{Material, Mesh, Polygon};
use crate::scene::{MeshId, Object, ObjectId, Scene, Transform};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use nalgebra::{Point2, Point3, Quaternion, UnitQuaternion, Vector3};
use std::collections::HashMap;
use std::path::Path;

/// Read a `.gltf` or `.glb` file into a scene.
pub fn import(path: &Path) -> Result<Scene, PipelineError> {
    let (document, buffers, _images) =
        gltf::import(path).map_err(|e| PipelineError::ImportFailure {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let mut scene = Scene::new();
    // Nodes sharing a glTF mesh share the imported mesh as well.
    let mut meshes_by_source: HashMap<usize, MeshId> = HashMap::new();
    for document_scene in document.scenes() {
        for root in document_scene.nodes() {
            add_node(&mut scene, &mut meshes_by_source, &buffers, root, None);
        }
    }
    Ok(scene)
}

fn add_node(
    scene: &mut Scene,
    meshes_by_source: &mut HashMap<usize, MeshId>,
    buffers: &[gltf::buffer::Data],
    node: gltf::Node<'_>,
    parent: Option<ObjectId>,
) {
    let (t, r, s) = node.transform().decomposed();
    let transform = Transform {
        translation: Vector3::new(t[0] as Real, t[1] as Real, t[2] as Real),
        // glTF stores quaternions as xyzw, the constructor takes w first.
        rotation: UnitQuaternion::from_quaternion(Quaternion::new(
            r[3] as Real,
            r[0] as Real,
            r[1] as Real,
            r[2] as Real,
        )),
        scale: Vector3::new(s[0] as Real, s[1] as Real, s[2] as Real),
    };

    let mesh = node.mesh().map(|source| match meshes_by_source.get(&source.index()) {
        Some(&id) => id,
        None => {
            let id = scene.add_mesh(convert_mesh(&source, buffers));
            meshes_by_source.insert(source.index(), id);
            id
        }
    });

    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node.{:03}", node.index()));
    let id = scene.add_object(Object {
        name,
        transform,
        parent,
        children: Vec::new(),
        mesh,
    });
    for child in node.children() {
        add_node(scene, meshes_by_source, buffers, child, Some(id));
    }
}

fn convert_mesh(source: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> Mesh {
    let mut mesh = Mesh::new();
    for primitive in source.primitives() {
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let vertex_base = mesh.vertices.len();
        for p in positions {
            mesh.vertices
                .push(Point3::new(p[0] as Real, p[1] as Real, p[2] as Real));
        }
        let vertex_count = mesh.vertices.len() - vertex_base;
        let uvs: Option<Vec<[f32; 2]>> =
            reader.read_tex_coords(0).map(|iter| iter.into_f32().collect());
        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..vertex_count as u32).collect(),
        };

        let slot = mesh.merge_material_slot(&Material::new(material_name(&primitive)));
        for tri in indices.chunks_exact(3) {
            let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if corners.iter().any(|&c| c >= vertex_count) {
                continue;
            }
            let vertices = corners.iter().map(|&c| vertex_base + c).collect();
            let tri_uvs = uvs.as_ref().map(|uvs| {
                corners
                    .iter()
                    .map(|&c| Point2::new(uvs[c][0] as Real, uvs[c][1] as Real))
                    .collect()
            });
            mesh.polygons.push(Polygon { vertices, uvs: tri_uvs, material: slot });
        }
    }
    mesh
}

fn material_name(primitive: &gltf::Primitive<'_>) -> String {
    let material = primitive.material();
    match material.name() {
        Some(name) => name.to_string(),
        None => match material.index() {
            Some(index) => format!("material.{:03}", index),
            None => "default".to_string(),
        },
    }
}

/// Serialize `scene` as a glTF JSON document with an embedded buffer.
pub fn export_gltf(scene: &Scene) -> String {
    let (json, _bin) = build_document(scene, true);
    json
}

/// Serialize `scene` as a binary GLB container.
pub fn export_glb(scene: &Scene) -> Vec<u8> {
    let (json, bin) = build_document(scene, false);

    let mut json_bytes = json.into_bytes();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let mut bin_bytes = bin;
    while bin_bytes.len() % 4 != 0 {
        bin_bytes.push(0);
    }

    let mut total = 12 + 8 + json_bytes.len();
    if !bin_bytes.is_empty() {
        total += 8 + bin_bytes.len();
    }
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json_bytes);
    if !bin_bytes.is_empty() {
        out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin_bytes);
    }
    out
}

/// Build the glTF JSON and its binary buffer. With `embed` the buffer goes
/// into the JSON as a data URI, otherwise the buffers entry carries only a
/// byte length for the GLB BIN chunk.
fn build_document(scene: &Scene, embed: bool) -> (String, Vec<u8>) {
    let mut bin: Vec<u8> = Vec::new();
    let mut views: Vec<String> = Vec::new();
    let mut accessors: Vec<String> = Vec::new();
    let mut materials: Vec<String> = Vec::new();
    let mut material_index: HashMap<String, usize> = HashMap::new();
    let mut meshes: Vec<String> = Vec::new();
    let mut mesh_index: HashMap<MeshId, usize> = HashMap::new();

    for (mesh_id, mesh) in scene.meshes.iter().enumerate() {
        let mut primitives: Vec<String> = Vec::new();
        for slot in used_slots(mesh) {
            if let Some(primitive) = build_primitive(
                mesh,
                slot,
                &mut bin,
                &mut views,
                &mut accessors,
                &mut materials,
                &mut material_index,
            ) {
                primitives.push(primitive);
            }
        }
        if primitives.is_empty() {
            continue;
        }
        mesh_index.insert(mesh_id, meshes.len());
        meshes.push(format!("{{\"primitives\": [{}]}}", primitives.join(", ")));
    }

    let mut nodes: Vec<String> = Vec::new();
    for object in &scene.objects {
        nodes.push(build_node(object, &mesh_index));
    }
    let roots: Vec<String> = scene.roots().map(|id| id.to_string()).collect();

    let mut json = String::new();
    json.push_str("{\n");
    json.push_str("  \"asset\": {\n");
    json.push_str("    \"version\": \"2.0\",\n");
    json.push_str("    \"generator\": \"meshprep\"\n");
    json.push_str("  },\n");
    if !bin.is_empty() {
        if embed {
            json.push_str(&format!(
                "  \"buffers\": [\n    {{\"byteLength\": {}, \"uri\": \"data:application/octet-stream;base64,{}\"}}\n  ],\n",
                bin.len(),
                BASE64_ENGINE.encode(&bin)
            ));
        } else {
            json.push_str(&format!(
                "  \"buffers\": [\n    {{\"byteLength\": {}}}\n  ],\n",
                bin.len()
            ));
        }
    }
    append_array(&mut json, "bufferViews", &views);
    append_array(&mut json, "accessors", &accessors);
    append_array(&mut json, "materials", &materials);
    append_array(&mut json, "meshes", &meshes);
    append_array(&mut json, "nodes", &nodes);
    if roots.is_empty() {
        json.push_str("  \"scenes\": [\n    {}\n  ],\n");
    } else {
        json.push_str(&format!(
            "  \"scenes\": [\n    {{\"nodes\": [{}]}}\n  ],\n",
            roots.join(", ")
        ));
    }
    json.push_str("  \"scene\": 0\n");
    json.push_str("}\n");

    (json, bin)
}

/// Material slots referenced by at least one face, ascending.
fn used_slots(mesh: &Mesh) -> Vec<usize> {
    let mut slots: Vec<usize> = mesh.polygons.iter().map(|p| p.material).collect();
    slots.sort_unstable();
    slots.dedup();
    slots
}

/// One primitive for the faces of `slot`: positions and UVs deduplicated by
/// bit pattern, faces fanned into triangles. `None` when the slot yields no
/// triangles.
#[allow(clippy::too_many_arguments)]
fn build_primitive(
    mesh: &Mesh,
    slot: usize,
    bin: &mut Vec<u8>,
    views: &mut Vec<String>,
    accessors: &mut Vec<String>,
    materials: &mut Vec<String>,
    material_index: &mut HashMap<String, usize>,
) -> Option<String> {
    let has_uvs = mesh
        .polygons
        .iter()
        .any(|p| p.material == slot && p.uvs.is_some());

    let mut corner_index: HashMap<([u32; 3], [u32; 2]), u32> = HashMap::new();
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for poly in mesh.polygons.iter().filter(|p| p.material == slot) {
        let n = poly.vertices.len();
        if n < 3 {
            continue;
        }
        let corner = |i: usize| -> ([f32; 3], [f32; 2]) {
            let p = mesh.vertices[poly.vertices[i]];
            let uv = match &poly.uvs {
                Some(uvs) => [uvs[i].x as f32, uvs[i].y as f32],
                None => [0.0, 0.0],
            };
            ([p.x as f32, p.y as f32, p.z as f32], uv)
        };
        let mut emit = |i: usize| {
            let (position, uv) = corner(i);
            let key = (position.map(f32::to_bits), uv.map(f32::to_bits));
            let index = *corner_index.entry(key).or_insert_with(|| {
                positions.push(position);
                uvs.push(uv);
                (positions.len() - 1) as u32
            });
            indices.push(index);
        };
        for i in 1..n - 1 {
            emit(0);
            emit(i);
            emit(i + 1);
        }
    }
    if indices.is_empty() {
        return None;
    }

    let position_accessor = push_position_accessor(bin, views, accessors, &positions);
    let uv_accessor = has_uvs.then(|| push_uv_accessor(bin, views, accessors, &uvs));
    let index_accessor = push_index_accessor(bin, views, accessors, &indices);

    let mut attributes = format!("\"POSITION\": {}", position_accessor);
    if let Some(uv_accessor) = uv_accessor {
        attributes.push_str(&format!(", \"TEXCOORD_0\": {}", uv_accessor));
    }
    let mut primitive = format!(
        "{{\"attributes\": {{{}}}, \"indices\": {}",
        attributes, index_accessor
    );
    if let Some(material) = mesh.materials.get(slot) {
        let next = materials.len();
        let index = *material_index.entry(material.name.clone()).or_insert(next);
        if index == next {
            materials.push(format!("{{\"name\": {}}}", json_string(&material.name)));
        }
        primitive.push_str(&format!(", \"material\": {}", index));
    }
    primitive.push('}');
    Some(primitive)
}

fn build_node(object: &Object, mesh_index: &HashMap<MeshId, usize>) -> String {
    let mut parts: Vec<String> = vec![format!("\"name\": {}", json_string(&object.name))];
    if let Some(index) = object.mesh.and_then(|id| mesh_index.get(&id)) {
        parts.push(format!("\"mesh\": {}", index));
    }
    if !object.children.is_empty() {
        let children: Vec<String> = object.children.iter().map(|c| c.to_string()).collect();
        parts.push(format!("\"children\": [{}]", children.join(", ")));
    }
    let t = &object.transform;
    if t.translation != Vector3::zeros() {
        parts.push(format!(
            "\"translation\": [{}, {}, {}]",
            t.translation.x, t.translation.y, t.translation.z
        ));
    }
    if t.rotation != UnitQuaternion::identity() {
        parts.push(format!(
            "\"rotation\": [{}, {}, {}, {}]",
            t.rotation.i, t.rotation.j, t.rotation.k, t.rotation.w
        ));
    }
    if t.scale != Vector3::new(1.0, 1.0, 1.0) {
        parts.push(format!("\"scale\": [{}, {}, {}]", t.scale.x, t.scale.y, t.scale.z));
    }
    format!("{{{}}}", parts.join(", "))
}

fn push_view(bin: &mut Vec<u8>, views: &mut Vec<String>, bytes: &[u8], target: u32) -> usize {
    // Accessor offsets must stay 4-byte aligned.
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let offset = bin.len();
    bin.extend_from_slice(bytes);
    views.push(format!(
        "{{\"buffer\": 0, \"byteOffset\": {}, \"byteLength\": {}, \"target\": {}}}",
        offset,
        bytes.len(),
        target
    ));
    views.len() - 1
}

fn push_position_accessor(
    bin: &mut Vec<u8>,
    views: &mut Vec<String>,
    accessors: &mut Vec<String>,
    positions: &[[f32; 3]],
) -> usize {
    let mut bytes = Vec::with_capacity(positions.len() * 12);
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
            bytes.extend_from_slice(&p[axis].to_le_bytes());
        }
    }
    let view = push_view(bin, views, &bytes, 34962);
    accessors.push(format!(
        "{{\"bufferView\": {}, \"componentType\": 5126, \"count\": {}, \"type\": \"VEC3\", \"min\": [{}, {}, {}], \"max\": [{}, {}, {}]}}",
        view,
        positions.len(),
        min[0],
        min[1],
        min[2],
        max[0],
        max[1],
        max[2]
    ));
    accessors.len() - 1
}

fn push_uv_accessor(
    bin: &mut Vec<u8>,
    views: &mut Vec<String>,
    accessors: &mut Vec<String>,
    uvs: &[[f32; 2]],
) -> usize {
    let mut bytes = Vec::with_capacity(uvs.len() * 8);
    for uv in uvs {
        bytes.extend_from_slice(&uv[0].to_le_bytes());
        bytes.extend_from_slice(&uv[1].to_le_bytes());
    }
    let view = push_view(bin, views, &bytes, 34962);
    accessors.push(format!(
        "{{\"bufferView\": {}, \"componentType\": 5126, \"count\": {}, \"type\": \"VEC2\"}}",
        view,
        uvs.len()
    ));
    accessors.len() - 1
}

fn push_index_accessor(
    bin: &mut Vec<u8>,
    views: &mut Vec<String>,
    accessors: &mut Vec<String>,
    indices: &[u32],
) -> usize {
    let mut bytes = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    let view = push_view(bin, views, &bytes, 34963);
    accessors.push(format!(
        "{{\"bufferView\": {}, \"componentType\": 5125, \"count\": {}, \"type\": \"SCALAR\"}}",
        view,
        indices.len()
    ));
    accessors.len() - 1
}

fn append_array(json: &mut String, name: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    json.push_str(&format!("  \"{}\": [\n", name));
    for (i, item) in items.iter().enumerate() {
        json.push_str("    ");
        json.push_str(item);
        json.push_str(if i + 1 == items.len() { "\n" } else { ",\n" });
    }
    json.push_str("  ],\n");
}

fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
