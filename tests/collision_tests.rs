mod support;

use meshprep::PipelineError;
use meshprep::collision::{self, DEFAULT_EDGE_THRESHOLD};
use meshprep::float_types::Real;
use meshprep::mesh::{Material, Mesh, Polygon};
use meshprep::scene::{Object, Scene, Transform};
use nalgebra::{Point2, Point3, Vector3};

use crate::support::{approx_eq, quad_mesh, triangle_mesh};

fn object(name: &str, parent: Option<usize>, mesh: Option<usize>) -> Object {
    Object {
        name: name.to_string(),
        transform: Transform::identity(),
        parent,
        children: Vec::new(),
        mesh,
    }
}

fn scaled(mut object: Object, scale: Vector3<Real>) -> Object {
    object.transform.scale = scale;
    object
}

/// The corner UVs of the one face of `mesh`, used as a winding tracer since
/// flips reverse the loop order.
fn uv_order(polygon: &Polygon) -> Vec<(Real, Real)> {
    polygon
        .uvs
        .as_ref()
        .map(|uvs| uvs.iter().map(|uv| (uv.x, uv.y)).collect())
        .unwrap_or_default()
}

#[test]
fn negative_scale_products_flip_windings() {
    let mut scene = Scene::new();
    let tracer = triangle_mesh(
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        "col_stone",
    );
    let mesh_a = scene.add_mesh(tracer.clone());
    let mesh_b = scene.add_mesh(tracer.clone());

    let root = scene.add_object(object("root", None, None));
    let child = scene.add_object(scaled(
        object("mirrored", Some(root), Some(mesh_a)),
        Vector3::new(-1.0, 1.0, 1.0),
    ));
    scene.add_object(scaled(
        object("straight", Some(child), Some(mesh_b)),
        Vector3::new(1.0, -1.0, 1.0),
    ));

    let merged = collision::consolidate(&scene, DEFAULT_EDGE_THRESHOLD).unwrap();
    assert_eq!(merged.polygons.len(), 2);

    let forward = uv_order(&tracer.polygons[0]);
    let mut reversed = forward.clone();
    reversed.reverse();
    // Accumulated scale at the child is negative, so its copy is flipped.
    // The grandchild's two mirrors cancel out.
    assert_eq!(uv_order(&merged.polygons[0]), reversed);
    assert_eq!(uv_order(&merged.polygons[1]), forward);
}

#[test]
fn instances_flip_independently() {
    let mut scene = Scene::new();
    let shared = scene.add_mesh(triangle_mesh(
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        "col_stone",
    ));
    scene.add_object(object("straight", None, Some(shared)));
    scene.add_object(scaled(
        object("mirrored", None, Some(shared)),
        Vector3::new(-1.0, 1.0, 1.0),
    ));

    let merged = collision::consolidate(&scene, DEFAULT_EDGE_THRESHOLD).unwrap();
    assert_eq!(merged.polygons.len(), 2);
    assert_ne!(uv_order(&merged.polygons[0]), uv_order(&merged.polygons[1]));
}

#[test]
fn long_edges_subdivide_until_under_the_threshold() {
    let scene = Scene::from_mesh(
        "ground",
        triangle_mesh([[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 10.0, 0.0]], "col_dirt"),
    );
    let merged = collision::consolidate(&scene, 32.0).unwrap();

    assert!(!merged.polygons.is_empty());
    for poly in &merged.polygons {
        assert_eq!(poly.vertices.len(), 3);
    }
    for edge in merged.unique_edges() {
        assert!(merged.edge_length(edge) <= 32.0);
    }
}

#[test]
fn quad_subdivision_splits_through_a_center_vertex() {
    let scene = Scene::from_mesh("slab", quad_mesh(100.0, "col_stone"));
    let merged = collision::consolidate(&scene, 60.0).unwrap();

    // One pass splits all four edges and adds the center, triangulation
    // then fans the four quads.
    assert_eq!(merged.vertices.len(), 9);
    assert_eq!(merged.polygons.len(), 8);
    assert!(
        merged
            .vertices
            .iter()
            .any(|v| approx_eq(v.x, 50.0, 1e-9) && approx_eq(v.y, 50.0, 1e-9))
    );
}

#[test]
fn collision_slots_collapse_onto_their_canonical_name() {
    let mut mesh = Mesh::new();
    mesh.vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    mesh.materials = vec![
        Material::new("col_a.001"),
        Material::new("col_a"),
        Material::new("stone"),
    ];
    for slot in 0..3 {
        mesh.polygons.push(Polygon { vertices: vec![0, 1, 2], uvs: None, material: slot });
    }

    let merged = collision::consolidate(&Scene::from_mesh("walls", mesh), DEFAULT_EDGE_THRESHOLD)
        .unwrap();

    let names: Vec<&str> = merged.materials.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["col_a", "stone"]);
    assert_eq!(merged.polygons[0].material, 0);
    assert_eq!(merged.polygons[1].material, 0);
    assert_eq!(merged.polygons[2].material, 1);
}

#[test]
fn material_slots_merge_by_name_across_objects() {
    let mut scene = Scene::new();
    let mut first = triangle_mesh([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], "stone");
    first.materials.push(Material::new("wood"));
    let mut second = triangle_mesh([[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]], "stone");
    second.materials.push(Material::new("brick"));
    second.polygons[0].material = 1;

    let a = scene.add_mesh(first);
    let b = scene.add_mesh(second);
    scene.add_object(object("a", None, Some(a)));
    scene.add_object(object("b", None, Some(b)));

    let merged = collision::consolidate(&scene, DEFAULT_EDGE_THRESHOLD).unwrap();
    let names: Vec<&str> = merged.materials.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["stone", "wood", "brick"]);
    assert_eq!(merged.polygons[0].material, 0);
    assert_eq!(merged.polygons[1].material, 2);
}

#[test]
fn counter_eating_the_whole_id_is_an_error() {
    let mut mesh = triangle_mesh([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], "col_123");
    mesh.polygons[0].uvs = None;
    let result = collision::consolidate(&Scene::from_mesh("bad", mesh), DEFAULT_EDGE_THRESHOLD);
    assert!(matches!(result, Err(PipelineError::AmbiguousMaterial(name)) if name == "col_123"));
}

#[test]
fn empty_scenes_consolidate_to_an_empty_mesh() {
    let merged = collision::consolidate(&Scene::new(), DEFAULT_EDGE_THRESHOLD).unwrap();
    assert!(merged.is_empty());
    assert!(merged.materials.is_empty());
}

#[test]
fn subdivision_that_cannot_converge_is_reported() {
    // A two-corner sliver never gets rebuilt, so its endless edge survives
    // every pass.
    let mut mesh = Mesh::new();
    mesh.vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(Real::INFINITY, 0.0, 0.0),
    ];
    mesh.polygons = vec![Polygon { vertices: vec![0, 1], uvs: None, material: 0 }];
    mesh.materials = vec![Material::new("col_void")];

    let result = collision::consolidate(&Scene::from_mesh("sliver", mesh), DEFAULT_EDGE_THRESHOLD);
    assert!(matches!(result, Err(PipelineError::SubdivisionDidNotConverge { .. })));
}

#[test]
fn nan_edges_are_never_selected_for_splitting() {
    let mut mesh = triangle_mesh([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], "col_mud");
    mesh.vertices[1] = Point3::new(Real::NAN, 0.0, 0.0);

    let merged = collision::consolidate(&Scene::from_mesh("broken", mesh), DEFAULT_EDGE_THRESHOLD)
        .unwrap();
    assert_eq!(merged.polygons.len(), 1);
}

#[test]
fn subdivided_uvs_interpolate_along_the_face() {
    let scene = Scene::from_mesh("slab", quad_mesh(100.0, "col_stone"));
    let merged = collision::consolidate(&scene, 60.0).unwrap();

    // The face carried a full UV tile, so UV space splits exactly like
    // position space: the corner at (50, 50) maps to (0.5, 0.5).
    let mut found = false;
    for poly in &merged.polygons {
        let uvs = poly.uvs.as_ref().unwrap();
        for (i, &v) in poly.vertices.iter().enumerate() {
            let p = merged.vertices[v];
            assert!(approx_eq(uvs[i].x, p.x / 100.0, 1e-9));
            assert!(approx_eq(uvs[i].y, p.y / 100.0, 1e-9));
            if approx_eq(uvs[i].x, 0.5, 1e-9) && approx_eq(uvs[i].y, 0.5, 1e-9) {
                found = true;
            }
        }
    }
    assert!(found);
}

#[test]
fn renumbering_is_invisible_in_the_result() {
    // Two distinct canonical ids keep their own slots.
    let mut mesh = Mesh::new();
    mesh.vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    mesh.materials = vec![Material::new("col_a.007"), Material::new("col_b.003")];
    mesh.polygons = vec![
        Polygon { vertices: vec![0, 1, 2], uvs: None, material: 0 },
        Polygon { vertices: vec![2, 1, 0], uvs: None, material: 1 },
    ];

    let merged = collision::consolidate(&Scene::from_mesh("ids", mesh), DEFAULT_EDGE_THRESHOLD)
        .unwrap();
    let names: Vec<&str> = merged.materials.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["col_a", "col_b"]);
}

#[test]
fn world_transforms_are_baked_into_the_merge() {
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(triangle_mesh(
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        "col_stone",
    ));
    let mut shifted = object("shifted", None, Some(mesh));
    shifted.transform.translation = Vector3::new(10.0, 0.0, 0.0);
    scene.add_object(shifted);

    let merged = collision::consolidate(&scene, DEFAULT_EDGE_THRESHOLD).unwrap();
    assert!(approx_eq(merged.vertices[0].x, 10.0, 1e-9));
    assert!(approx_eq(merged.vertices[1].x, 11.0, 1e-9));
}

#[test]
fn uv_tracers_survive_triangulation_of_quads() {
    let scene = Scene::from_mesh("slab", quad_mesh(1.0, "col_tile"));
    let merged = collision::consolidate(&scene, DEFAULT_EDGE_THRESHOLD).unwrap();

    // Under the threshold nothing splits; the quad just fans into two
    // triangles that keep their corner UVs.
    assert_eq!(merged.polygons.len(), 2);
    let first = merged.polygons[0].uvs.as_ref().unwrap();
    assert_eq!(first[0], Point2::new(0.0, 0.0));
    assert_eq!(first[1], Point2::new(1.0, 0.0));
    assert_eq!(first[2], Point2::new(1.0, 1.0));
}
