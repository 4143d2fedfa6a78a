//! Headless mesh preparation for game asset pipelines.
//!
//! Everything operates on one shared data model: a [`mesh::Mesh`] is an
//! indexed polygon soup with named material slots and optional per-loop
//! texture coordinates, and a [`scene::Scene`] arranges meshes in an object
//! tree with translation/rotation/scale transforms and mesh instancing.
//!
//! The passes are small and composable:
//! - [`Mesh::wrap_uvs`](mesh::Mesh::wrap_uvs) re-wraps each polygon's UV
//!   island into the unit square by whole-tile translation.
//! - [`collision::consolidate`] merges a scene into one triangulated
//!   collision mesh with subdivided faces and normalized `col_*` materials.
//! - [`mesh::Mesh::weld_vertices`], [`mesh::Mesh::make_normals_consistent`],
//!   [`mesh::Mesh::split_by_material`] and the [`scene::Scene`] transform
//!   baking cover the surrounding cleanup steps.
//! - [`io`] reads glTF and OBJ scenes and writes glTF, GLB, OBJ and COLLADA.
//!
//! The `meshprep` binary exposes each pipeline as a subcommand.

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod collision;
pub mod errors;
pub mod float_types;
pub mod io;
pub mod mesh;
pub mod scene;
pub mod uvwrap;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use errors::PipelineError;
pub use mesh::Mesh;
pub use scene::Scene;
