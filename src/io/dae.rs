//! COLLADA 1.4.1 export
//!
//! Write-only. Geometry goes out as `<polylist>` elements (one per material
//! slot, n-gons kept), the object tree as nested `<node>` elements carrying
//! full matrices, and materials as minimal lambert effects. Coordinates are
//! written as-is with a `Y_UP` axis tag.

use crate::mesh::Mesh;
use crate::scene::{ObjectId, Scene};
use std::collections::HashMap;

/// Serialize `scene` as a COLLADA document.
pub fn export(scene: &Scene) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<COLLADA xmlns=\"http://www.collada.org/2005/11/COLLADASchema\" version=\"1.4.1\">\n",
    );
    out.push_str("  <asset>\n");
    out.push_str("    <contributor>\n");
    out.push_str("      <authoring_tool>meshprep</authoring_tool>\n");
    out.push_str("    </contributor>\n");
    out.push_str("    <unit name=\"meter\" meter=\"1\"/>\n");
    out.push_str("    <up_axis>Y_UP</up_axis>\n");
    out.push_str("  </asset>\n");

    // Materials are global, deduplicated by name across all meshes.
    let mut material_names: Vec<String> = Vec::new();
    let mut material_index: HashMap<String, usize> = HashMap::new();
    for mesh in &scene.meshes {
        for material in &mesh.materials {
            if !material_index.contains_key(&material.name) {
                material_index.insert(material.name.clone(), material_names.len());
                material_names.push(material.name.clone());
            }
        }
    }

    if !material_names.is_empty() {
        out.push_str("  <library_effects>\n");
        for (i, _) in material_names.iter().enumerate() {
            out.push_str(&format!("    <effect id=\"effect-{i}\">\n"));
            out.push_str("      <profile_COMMON>\n");
            out.push_str("        <technique sid=\"common\">\n");
            out.push_str("          <lambert>\n");
            out.push_str("            <diffuse>\n");
            out.push_str("              <color sid=\"diffuse\">0.8 0.8 0.8 1</color>\n");
            out.push_str("            </diffuse>\n");
            out.push_str("          </lambert>\n");
            out.push_str("        </technique>\n");
            out.push_str("      </profile_COMMON>\n");
            out.push_str("    </effect>\n");
        }
        out.push_str("  </library_effects>\n");
        out.push_str("  <library_materials>\n");
        for (i, name) in material_names.iter().enumerate() {
            out.push_str(&format!(
                "    <material id=\"material-{i}\" name=\"{}\">\n",
                xml_escape(name)
            ));
            out.push_str(&format!("      <instance_effect url=\"#effect-{i}\"/>\n"));
            out.push_str("    </material>\n");
        }
        out.push_str("  </library_materials>\n");
    }

    // Geometries, skipping meshes with no vertices.
    let mut geometry_index: HashMap<usize, usize> = HashMap::new();
    let mut geometries = String::new();
    for (mesh_id, mesh) in scene.meshes.iter().enumerate() {
        if mesh.vertices.is_empty() {
            continue;
        }
        let index = geometry_index.len();
        geometry_index.insert(mesh_id, index);
        write_geometry(&mut geometries, mesh, index, &material_index);
    }
    if !geometries.is_empty() {
        out.push_str("  <library_geometries>\n");
        out.push_str(&geometries);
        out.push_str("  </library_geometries>\n");
    }

    out.push_str("  <library_visual_scenes>\n");
    out.push_str("    <visual_scene id=\"Scene\" name=\"Scene\">\n");
    for root in scene.roots() {
        write_node(&mut out, scene, root, 3, &geometry_index, &material_index);
    }
    out.push_str("    </visual_scene>\n");
    out.push_str("  </library_visual_scenes>\n");
    out.push_str("  <scene>\n");
    out.push_str("    <instance_visual_scene url=\"#Scene\"/>\n");
    out.push_str("  </scene>\n");
    out.push_str("</COLLADA>\n");
    out
}

fn write_geometry(
    out: &mut String,
    mesh: &Mesh,
    index: usize,
    material_index: &HashMap<String, usize>,
) {
    let id = format!("geometry-{index}");
    let has_uvs = mesh.polygons.iter().any(|p| p.uvs.is_some());

    // Corner UVs are laid out in the order the polylists will reference
    // them, one entry per corner, (0, 0) where a face has no UV layer.
    let mut uv_values: Vec<String> = Vec::new();
    let mut polylists = String::new();
    let mut slots: Vec<usize> = mesh.polygons.iter().map(|p| p.material).collect();
    slots.sort_unstable();
    slots.dedup();
    for slot in slots {
        let faces: Vec<&crate::mesh::Polygon> = mesh
            .polygons
            .iter()
            .filter(|p| p.material == slot && p.vertices.len() >= 3)
            .collect();
        if faces.is_empty() {
            continue;
        }
        let mut vcount = String::new();
        let mut p = String::new();
        for poly in &faces {
            if !vcount.is_empty() {
                vcount.push(' ');
            }
            vcount.push_str(&poly.vertices.len().to_string());
            for (i, &vertex) in poly.vertices.iter().enumerate() {
                if !p.is_empty() {
                    p.push(' ');
                }
                p.push_str(&vertex.to_string());
                if has_uvs {
                    let uv = match &poly.uvs {
                        Some(uvs) => format!("{} {}", uvs[i].x, uvs[i].y),
                        None => "0 0".to_string(),
                    };
                    p.push(' ');
                    p.push_str(&uv_values.len().to_string());
                    uv_values.push(uv);
                }
            }
        }

        let symbol = mesh
            .materials
            .get(slot)
            .and_then(|m| material_index.get(&m.name))
            .map(|i| format!(" material=\"material-{i}\""));
        polylists.push_str(&format!(
            "        <polylist count=\"{}\"{}>\n",
            faces.len(),
            symbol.unwrap_or_default()
        ));
        polylists.push_str(&format!(
            "          <input semantic=\"VERTEX\" source=\"#{id}-vertices\" offset=\"0\"/>\n"
        ));
        if has_uvs {
            polylists.push_str(&format!(
                "          <input semantic=\"TEXCOORD\" source=\"#{id}-uv\" offset=\"1\" set=\"0\"/>\n"
            ));
        }
        polylists.push_str(&format!("          <vcount>{vcount}</vcount>\n"));
        polylists.push_str(&format!("          <p>{p}</p>\n"));
        polylists.push_str("        </polylist>\n");
    }

    out.push_str(&format!("    <geometry id=\"{id}\" name=\"{id}\">\n"));
    out.push_str("      <mesh>\n");
    out.push_str(&format!("        <source id=\"{id}-positions\">\n"));
    out.push_str(&format!(
        "          <float_array id=\"{id}-positions-array\" count=\"{}\">",
        mesh.vertices.len() * 3
    ));
    for (i, v) in mesh.vertices.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{} {} {}", v.x, v.y, v.z));
    }
    out.push_str("</float_array>\n");
    out.push_str("          <technique_common>\n");
    out.push_str(&format!(
        "            <accessor source=\"#{id}-positions-array\" count=\"{}\" stride=\"3\">\n",
        mesh.vertices.len()
    ));
    out.push_str("              <param name=\"X\" type=\"float\"/>\n");
    out.push_str("              <param name=\"Y\" type=\"float\"/>\n");
    out.push_str("              <param name=\"Z\" type=\"float\"/>\n");
    out.push_str("            </accessor>\n");
    out.push_str("          </technique_common>\n");
    out.push_str("        </source>\n");
    if has_uvs {
        out.push_str(&format!("        <source id=\"{id}-uv\">\n"));
        out.push_str(&format!(
            "          <float_array id=\"{id}-uv-array\" count=\"{}\">{}</float_array>\n",
            uv_values.len() * 2,
            uv_values.join(" ")
        ));
        out.push_str("          <technique_common>\n");
        out.push_str(&format!(
            "            <accessor source=\"#{id}-uv-array\" count=\"{}\" stride=\"2\">\n",
            uv_values.len()
        ));
        out.push_str("              <param name=\"S\" type=\"float\"/>\n");
        out.push_str("              <param name=\"T\" type=\"float\"/>\n");
        out.push_str("            </accessor>\n");
        out.push_str("          </technique_common>\n");
        out.push_str("        </source>\n");
    }
    out.push_str(&format!("        <vertices id=\"{id}-vertices\">\n"));
    out.push_str(&format!(
        "          <input semantic=\"POSITION\" source=\"#{id}-positions\"/>\n"
    ));
    out.push_str("        </vertices>\n");
    out.push_str(&polylists);
    out.push_str("      </mesh>\n");
    out.push_str("    </geometry>\n");
}

fn write_node(
    out: &mut String,
    scene: &Scene,
    id: ObjectId,
    depth: usize,
    geometry_index: &HashMap<usize, usize>,
    material_index: &HashMap<String, usize>,
) {
    let indent = "  ".repeat(depth);
    let object = &scene.objects[id];
    out.push_str(&format!(
        "{indent}<node id=\"node-{id}\" name=\"{}\" type=\"NODE\">\n",
        xml_escape(&object.name)
    ));

    // Row-major 4x4, translate-rotate-scale combined.
    let matrix = object.transform.to_matrix();
    out.push_str(&format!("{indent}  <matrix sid=\"transform\">"));
    for row in 0..4 {
        for col in 0..4 {
            if row > 0 || col > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{}", matrix[(row, col)]));
        }
    }
    out.push_str("</matrix>\n");

    if let Some((mesh_id, geometry)) = object
        .mesh
        .and_then(|m| geometry_index.get(&m).map(|g| (m, g)))
    {
        let mesh = &scene.meshes[mesh_id];
        out.push_str(&format!(
            "{indent}  <instance_geometry url=\"#geometry-{geometry}\">\n"
        ));
        let bound: Vec<usize> = {
            let mut seen: Vec<usize> = mesh
                .polygons
                .iter()
                .filter_map(|p| mesh.materials.get(p.material))
                .filter_map(|m| material_index.get(&m.name).copied())
                .collect();
            seen.sort_unstable();
            seen.dedup();
            seen
        };
        if !bound.is_empty() {
            out.push_str(&format!("{indent}    <bind_material>\n"));
            out.push_str(&format!("{indent}      <technique_common>\n"));
            for i in bound {
                out.push_str(&format!(
                    "{indent}        <instance_material symbol=\"material-{i}\" target=\"#material-{i}\"/>\n"
                ));
            }
            out.push_str(&format!("{indent}      </technique_common>\n"));
            out.push_str(&format!("{indent}    </bind_material>\n"));
        }
        out.push_str(&format!("{indent}  </instance_geometry>\n"));
    }

    for &child in &object.children {
        write_node(out, scene, child, depth + 1, geometry_index, material_index);
    }
    out.push_str(&format!("{indent}</node>\n"));
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
