//! Scene import and export
//!
//! Formats are picked by file extension. glTF (text and binary) and
//! Wavefront OBJ load and save; COLLADA saves only. Writes go through a
//! temporary file in the destination directory so an aborted export never
//! leaves a truncated file behind.

pub mod dae;
pub mod gltf;
pub mod obj;

use crate::errors::PipelineError;
use crate::scene::Scene;
use std::io::Write;
use std::path::Path;

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Load a scene from `path`, dispatching on the file extension.
pub fn load(path: &Path) -> Result<Scene, PipelineError> {
    match extension_of(path).as_str() {
        "gltf" | "glb" => gltf::import(path),
        "obj" => obj::import(path),
        other => Err(PipelineError::UnsupportedFormat(other.to_string())),
    }
}

/// Save a scene to `path`, dispatching on the file extension.
pub fn save(scene: &Scene, path: &Path) -> Result<(), PipelineError> {
    let bytes = match extension_of(path).as_str() {
        "gltf" => gltf::export_gltf(scene).into_bytes(),
        "glb" => gltf::export_glb(scene),
        "dae" => dae::export(scene).into_bytes(),
        "obj" => obj::export(scene).into_bytes(),
        other => return Err(PipelineError::UnsupportedFormat(other.to_string())),
    };
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}
