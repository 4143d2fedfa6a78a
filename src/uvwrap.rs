//! Per-polygon UV re-wrapping into the unit square
//!
//! Tiled texturing leaves faces mapped several tiles away from the origin.
//! Because the texture repeats, translating a whole face by whole tiles
//! changes nothing visually, so each face can be pulled back until its UV
//! centroid sits inside [0,1] x [0,1]. The translation is applied to every
//! loop of the face at once, which keeps the face's UV shape intact.

use crate::errors::PipelineError;
use crate::float_types::Real;
use crate::mesh::{Mesh, Polygon};
use crate::scene::Scene;

/// Steps granted per polygon before a centroid that never lands inside the
/// unit square (infinite or absurdly distant UVs) is reported instead of
/// looping forever.
pub const MAX_WRAP_STEPS: usize = 10_000;

impl Mesh {
    /// Translate each polygon's loop UVs by whole tiles until the loop
    /// centroid lies inside the closed unit square.
    ///
    /// Each step moves at most one tile per axis, the axes step
    /// independently, and the centroid is recomputed after every step.
    /// Wrapping is idempotent: a centroid already inside the square is not
    /// touched. Polygons without a UV layer are skipped, and a NaN centroid
    /// fails every bounds comparison and exits immediately.
    pub fn wrap_uvs(&mut self) -> Result<(), PipelineError> {
        for (index, poly) in self.polygons.iter_mut().enumerate() {
            if !wrap_polygon(poly) {
                return Err(PipelineError::UnboundedNormalization {
                    polygon: index,
                    limit: MAX_WRAP_STEPS,
                });
            }
        }
        Ok(())
    }
}

impl Scene {
    /// [`Mesh::wrap_uvs`] over every mesh in the scene.
    pub fn wrap_uvs(&mut self) -> Result<(), PipelineError> {
        for mesh in &mut self.meshes {
            mesh.wrap_uvs()?;
        }
        Ok(())
    }
}

/// Returns false when the step bound ran out.
fn wrap_polygon(poly: &mut Polygon) -> bool {
    let Some(mut centroid) = poly.uv_centroid() else {
        return true;
    };
    let mut steps = 0usize;
    while centroid.x > 1.0 || centroid.x < 0.0 || centroid.y > 1.0 || centroid.y < 0.0 {
        if steps == MAX_WRAP_STEPS {
            return false;
        }
        steps += 1;

        let du: Real = if centroid.x > 1.0 {
            -1.0
        } else if centroid.x < 0.0 {
            1.0
        } else {
            0.0
        };
        let dv: Real = if centroid.y > 1.0 {
            -1.0
        } else if centroid.y < 0.0 {
            1.0
        } else {
            0.0
        };
        poly.offset_uvs(du, dv);

        match poly.uv_centroid() {
            Some(next) => centroid = next,
            None => break,
        }
    }
    true
}
