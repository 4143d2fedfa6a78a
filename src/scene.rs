//! Object tree with transforms and mesh instancing
//!
//! Objects form a forest: each node carries a local
//! translation/rotation/scale and optionally references a mesh. Several
//! objects may reference the same mesh, so passes that bake geometry copy
//! the mesh per object first.

use crate::float_types::Real;
use crate::mesh::Mesh;
use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};
use std::collections::{HashMap, HashSet};

pub type ObjectId = usize;
pub type MeshId = usize;

/// Levels below a root that transform baking descends.
const APPLY_DEPTH_LIMIT: usize = 10;

const COLLIDER_SUFFIX: &str = "_collider";

/// Local translation, rotation and non-uniform scale of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vector3<Real>,
    pub rotation: UnitQuaternion<Real>,
    pub scale: Vector3<Real>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// The TRS matrix (translate, then rotate, then scale).
    pub fn to_matrix(&self) -> Matrix4<Real> {
        Translation3::from(self.translation).to_homogeneous()
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

/// A node of the object tree.
#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    /// `None` for non-mesh nodes such as empties or lights.
    pub mesh: Option<MeshId>,
}

/// Objects plus the meshes they reference.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub objects: Vec<Object>,
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scene holding one root object around `mesh`.
    pub fn from_mesh(name: &str, mesh: Mesh) -> Self {
        let mut scene = Self::default();
        let mesh_id = scene.add_mesh(mesh);
        scene.add_object(Object {
            name: name.to_string(),
            transform: Transform::identity(),
            parent: None,
            children: Vec::new(),
            mesh: Some(mesh_id),
        });
        scene
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Add `object`, registering it with its parent's child list.
    pub fn add_object(&mut self, object: Object) -> ObjectId {
        let id = self.objects.len();
        if let Some(parent) = object.parent {
            self.objects[parent].children.push(id);
        }
        self.objects.push(object);
        id
    }

    /// Append every object and mesh of `other` into this scene.
    pub fn absorb(&mut self, other: Scene) {
        let mesh_base = self.meshes.len();
        let object_base = self.objects.len();
        self.meshes.extend(other.meshes);
        for mut object in other.objects {
            object.parent = object.parent.map(|p| p + object_base);
            for child in &mut object.children {
                *child += object_base;
            }
            object.mesh = object.mesh.map(|m| m + mesh_base);
            self.objects.push(object);
        }
    }

    /// Ids of all parentless objects, in scene order.
    pub fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.parent.is_none())
            .map(|(id, _)| id)
    }

    /// Ids of the objects whose names appear in `names`, in scene order.
    pub fn objects_named(&self, names: &[String]) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| names.iter().any(|n| *n == o.name))
            .map(|(id, _)| id)
            .collect()
    }

    /// Accumulated root-to-node transform of `id`.
    pub fn world_matrix(&self, id: ObjectId) -> Matrix4<Real> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.objects[current].parent;
        }
        let mut world = Matrix4::identity();
        for &node in chain.iter().rev() {
            world *= self.objects[node].transform.to_matrix();
        }
        world
    }

    /// [`Mesh::weld_vertices`] over every mesh in the scene.
    pub fn weld_vertices(&mut self, threshold: Real) {
        for mesh in &mut self.meshes {
            mesh.weld_vertices(threshold);
        }
    }

    /// A standalone single-object scene holding `id`'s mesh baked into world
    /// space, for exporting objects to separate files. None when `id` has no
    /// mesh.
    pub fn isolate_baked(&self, id: ObjectId) -> Option<Scene> {
        let mesh_id = self.objects[id].mesh?;
        let mut baked = Mesh::default();
        baked.append_transformed(&self.meshes[mesh_id], &self.world_matrix(id));
        Some(Scene::from_mesh(&self.objects[id].name, baked))
    }

    /// [`Mesh::enforce_collision_ids`](crate::mesh::Mesh::enforce_collision_ids)
    /// over every mesh in the scene.
    pub fn enforce_collision_ids(&mut self, default_name: &str) {
        for mesh in &mut self.meshes {
            mesh.enforce_collision_ids(default_name);
        }
    }

    /// Bake every object's accumulated world transform into its mesh and
    /// reset the local transforms to identity. Instanced meshes are copied
    /// per object first. Objects more than `APPLY_DEPTH_LIMIT` levels below
    /// their root keep their transforms.
    pub fn apply_transforms(&mut self) {
        self.unshare_meshes();

        let mut targets: Vec<(ObjectId, Matrix4<Real>)> = Vec::new();
        let roots: Vec<ObjectId> = self.roots().collect();
        for root in roots {
            let mut stack = vec![(root, Matrix4::identity(), 0usize)];
            while let Some((id, parent_world, depth)) = stack.pop() {
                if depth > APPLY_DEPTH_LIMIT {
                    continue;
                }
                let world = parent_world * self.objects[id].transform.to_matrix();
                targets.push((id, world));
                for &child in &self.objects[id].children {
                    stack.push((child, world, depth + 1));
                }
            }
        }

        for (id, world) in targets {
            if let Some(mesh_id) = self.objects[id].mesh {
                for v in &mut self.meshes[mesh_id].vertices {
                    *v = world.transform_point(v);
                }
            }
            self.objects[id].transform = Transform::identity();
        }
    }

    /// Editor-style join: bake every source's geometry into the first
    /// source's local space as one mesh (material slots merge by name in
    /// first-seen order), rename it to `name`, and drop the consumed
    /// objects. Returns the merged object's id after the drop.
    pub fn merge_objects(&mut self, sources: &[ObjectId], name: &str) -> Option<ObjectId> {
        let (&target, rest) = sources.split_first()?;
        let target_world = self.world_matrix(target);
        let into_target = target_world.try_inverse().unwrap_or_else(Matrix4::identity);

        let mut merged = Mesh::default();
        for &id in sources {
            if let Some(mesh_id) = self.objects[id].mesh {
                let to_target = into_target * self.world_matrix(id);
                merged.append_transformed(&self.meshes[mesh_id], &to_target);
            }
        }

        let mesh_id = self.add_mesh(merged);
        self.objects[target].mesh = Some(mesh_id);
        self.objects[target].name = name.to_string();

        let drop: HashSet<ObjectId> = rest.iter().copied().collect();
        let keep: Vec<bool> = (0..self.objects.len()).map(|id| !drop.contains(&id)).collect();
        let new_target = keep[..target].iter().filter(|k| **k).count();
        self.retain_objects(&keep);
        Some(new_target)
    }

    /// Keep only the objects `keep` approves of. Children of dropped
    /// objects move up to their nearest kept ancestor; meshes no object
    /// references anymore are dropped too.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(ObjectId, &Object) -> bool,
    {
        let flags: Vec<bool> = self
            .objects
            .iter()
            .enumerate()
            .map(|(id, o)| keep(id, o))
            .collect();
        self.retain_objects(&flags);
    }

    /// Rebuild the visual objects as one object per material: join every
    /// mesh object not named `*_collider` into one, split the result per
    /// used material slot, and rename the pieces to their running index
    /// ("0", "1", ...). A collider whose base name matched a piece's
    /// pre-rename name follows it, keeping the `_collider` suffix.
    pub fn regroup_visuals_by_material(&mut self) {
        let sources: Vec<ObjectId> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.mesh.is_some() && !o.name.ends_with(COLLIDER_SUFFIX))
            .map(|(id, _)| id)
            .collect();
        let Some(&first) = sources.first() else {
            return;
        };
        let base_name = self.objects[first].name.clone();
        let Some(joined) = self.merge_objects(&sources, &base_name) else {
            return;
        };

        // The joined object keeps the first piece; the rest become siblings
        // with editor-style numbered names.
        if let Some(mesh_id) = self.objects[joined].mesh {
            let pieces = self.meshes[mesh_id].split_by_material();
            if let Some((head, tail)) = pieces.split_first() {
                self.meshes[mesh_id] = head.clone();
                let parent = self.objects[joined].parent;
                let transform = self.objects[joined].transform.clone();
                for (i, piece) in tail.iter().enumerate() {
                    let piece_mesh = self.add_mesh(piece.clone());
                    self.add_object(Object {
                        name: format!("{}.{:03}", base_name, i + 1),
                        transform: transform.clone(),
                        parent,
                        children: Vec::new(),
                        mesh: Some(piece_mesh),
                    });
                }
            }
        }

        let mut rename_map: HashMap<String, String> = HashMap::new();
        let mut idx = 0usize;
        for object in &mut self.objects {
            if object.mesh.is_some() && !object.name.ends_with(COLLIDER_SUFFIX) {
                let renamed = idx.to_string();
                let old = std::mem::replace(&mut object.name, renamed.clone());
                rename_map.insert(old, renamed);
                idx += 1;
            }
        }
        for object in &mut self.objects {
            if let Some(base) = object.name.strip_suffix(COLLIDER_SUFFIX) {
                if let Some(renamed) = rename_map.get(base) {
                    object.name = format!("{}{}", renamed, COLLIDER_SUFFIX);
                }
            }
        }
    }

    /// Give every object its own copy of a mesh that is referenced more
    /// than once.
    fn unshare_meshes(&mut self) {
        let mut seen = vec![false; self.meshes.len()];
        for id in 0..self.objects.len() {
            let Some(mesh_id) = self.objects[id].mesh else {
                continue;
            };
            if seen[mesh_id] {
                let copy = self.meshes[mesh_id].clone();
                let new_id = self.meshes.len();
                self.meshes.push(copy);
                self.objects[id].mesh = Some(new_id);
            } else {
                seen[mesh_id] = true;
            }
        }
    }

    fn retain_objects(&mut self, keep: &[bool]) {
        let count = self.objects.len();
        let mut new_ids = vec![usize::MAX; count];
        let mut next = 0usize;
        for id in 0..count {
            if keep[id] {
                new_ids[id] = next;
                next += 1;
            }
        }

        // Nearest kept ancestor, walked on the old tree.
        let mut new_parent: Vec<Option<usize>> = Vec::with_capacity(count);
        for id in 0..count {
            let mut parent = self.objects[id].parent;
            while let Some(p) = parent {
                if keep[p] {
                    break;
                }
                parent = self.objects[p].parent;
            }
            new_parent.push(parent.map(|p| new_ids[p]));
        }

        let old = std::mem::take(&mut self.objects);
        let mut objects: Vec<Object> = Vec::with_capacity(next);
        for (id, mut object) in old.into_iter().enumerate() {
            if !keep[id] {
                continue;
            }
            object.parent = new_parent[id];
            object.children.clear();
            objects.push(object);
        }
        for id in 0..objects.len() {
            if let Some(parent) = objects[id].parent {
                objects[parent].children.push(id);
            }
        }
        self.objects = objects;
        self.collect_unused_meshes();
    }

    fn collect_unused_meshes(&mut self) {
        let mut used = vec![false; self.meshes.len()];
        for object in &self.objects {
            if let Some(mesh) = object.mesh {
                used[mesh] = true;
            }
        }
        let mut new_ids = vec![usize::MAX; self.meshes.len()];
        let mut next = 0usize;
        for (id, in_use) in used.iter().enumerate() {
            if *in_use {
                new_ids[id] = next;
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.meshes);
        self.meshes = old
            .into_iter()
            .enumerate()
            .filter(|(id, _)| used[*id])
            .map(|(_, m)| m)
            .collect();
        for object in &mut self.objects {
            object.mesh = object.mesh.map(|m| new_ids[m]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Material, Polygon};
    use nalgebra::Point3;

    fn triangle_mesh() -> Mesh {
        let mut mesh = Mesh::default();
        mesh.vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        mesh.polygons.push(Polygon::new(vec![0, 1, 2], 0));
        mesh.materials.push(Material::new("base"));
        mesh
    }

    #[test]
    fn world_matrix_accumulates_down_the_tree() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object {
            name: "root".to_string(),
            transform: Transform {
                translation: Vector3::new(1.0, 0.0, 0.0),
                ..Transform::identity()
            },
            parent: None,
            children: Vec::new(),
            mesh: None,
        });
        let child = scene.add_object(Object {
            name: "child".to_string(),
            transform: Transform {
                translation: Vector3::new(0.0, 2.0, 0.0),
                ..Transform::identity()
            },
            parent: Some(root),
            children: Vec::new(),
            mesh: None,
        });
        let world = scene.world_matrix(child);
        let p = world.transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert_eq!(p, Point3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn apply_transforms_bakes_and_resets() {
        let mut scene = Scene::from_mesh("a", triangle_mesh());
        scene.objects[0].transform.translation = Vector3::new(5.0, 0.0, 0.0);
        scene.apply_transforms();
        assert_eq!(scene.objects[0].transform, Transform::identity());
        assert_eq!(scene.meshes[0].vertices[0], Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn apply_transforms_copies_instanced_meshes() {
        let mut scene = Scene::from_mesh("a", triangle_mesh());
        let shared = scene.objects[0].mesh;
        scene.add_object(Object {
            name: "b".to_string(),
            transform: Transform {
                translation: Vector3::new(3.0, 0.0, 0.0),
                ..Transform::identity()
            },
            parent: None,
            children: Vec::new(),
            mesh: shared,
        });
        scene.apply_transforms();
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[0].vertices[0], Point3::new(0.0, 0.0, 0.0));
        let b_mesh = scene.objects[1].mesh.unwrap();
        assert_eq!(scene.meshes[b_mesh].vertices[0], Point3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn merge_objects_bakes_world_space_and_drops_sources() {
        let mut scene = Scene::from_mesh("a", triangle_mesh());
        let mesh_b = scene.add_mesh(triangle_mesh());
        scene.add_object(Object {
            name: "b".to_string(),
            transform: Transform {
                translation: Vector3::new(10.0, 0.0, 0.0),
                ..Transform::identity()
            },
            parent: None,
            children: Vec::new(),
            mesh: Some(mesh_b),
        });

        let merged = scene.merge_objects(&[0, 1], "joined").unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[merged].name, "joined");
        let mesh = &scene.meshes[scene.objects[merged].mesh.unwrap()];
        assert_eq!(mesh.polygons.len(), 2);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.vertices[3], Point3::new(10.0, 0.0, 0.0));
        // Same slot name on both sources merges into one.
        assert_eq!(mesh.materials.len(), 1);
    }

    #[test]
    fn retain_reparents_to_nearest_kept_ancestor() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object {
            name: "root".to_string(),
            transform: Transform::identity(),
            parent: None,
            children: Vec::new(),
            mesh: None,
        });
        let middle = scene.add_object(Object {
            name: "middle".to_string(),
            transform: Transform::identity(),
            parent: Some(root),
            children: Vec::new(),
            mesh: None,
        });
        scene.add_object(Object {
            name: "leaf".to_string(),
            transform: Transform::identity(),
            parent: Some(middle),
            children: Vec::new(),
            mesh: None,
        });

        scene.retain(|_, o| o.name != "middle");
        assert_eq!(scene.objects.len(), 2);
        let leaf = &scene.objects[1];
        assert_eq!(leaf.name, "leaf");
        assert_eq!(leaf.parent, Some(0));
        assert_eq!(scene.objects[0].children, vec![1]);
    }

    #[test]
    fn regroup_splits_pieces_and_renames_colliders() {
        let mut mesh = triangle_mesh();
        mesh.materials.push(Material::new("second"));
        mesh.vertices.push(Point3::new(2.0, 0.0, 0.0));
        mesh.vertices.push(Point3::new(3.0, 0.0, 0.0));
        mesh.vertices.push(Point3::new(2.0, 1.0, 0.0));
        mesh.polygons.push(Polygon { vertices: vec![3, 4, 5], uvs: None, material: 1 });

        let mut scene = Scene::from_mesh("tree", mesh);
        let collider_mesh = scene.add_mesh(triangle_mesh());
        scene.add_object(Object {
            name: "tree_collider".to_string(),
            transform: Transform::identity(),
            parent: None,
            children: Vec::new(),
            mesh: Some(collider_mesh),
        });

        scene.regroup_visuals_by_material();

        let names: Vec<&str> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"0"));
        assert!(names.contains(&"1"));
        assert!(names.contains(&"0_collider"));
        for object in &scene.objects {
            if object.name == "0" || object.name == "1" {
                let mesh = &scene.meshes[object.mesh.unwrap()];
                assert_eq!(mesh.materials.len(), 1);
                assert_eq!(mesh.polygons.len(), 1);
            }
        }
    }
}
