//! meshprep - game asset mesh preparation tool
//!
//! Converts meshes between formats (glTF, GLB, OBJ, COLLADA) and runs the
//! export pipeline passes: collision consolidation, collider material ids,
//! shrub flattening and UV wrap normalization.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use meshprep::collision;
use meshprep::float_types::Real;
use meshprep::io;
use meshprep::mesh::DEFAULT_WELD_THRESHOLD;
use meshprep::scene::Scene;

#[derive(Parser)]
#[command(name = "meshprep")]
#[command(about = "Game asset mesh preparation tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a mesh file to another format
    Convert {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output mesh file (glTF/GLB/DAE/OBJ)
        output: PathBuf,

        /// Weld vertices and make face windings consistent
        #[arg(long)]
        fix_normals: bool,
    },

    /// Double every face so the mesh renders from both sides
    DupeNormals {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,
    },

    /// Merge whole scenes into one triangulated collision mesh
    ExportCollision {
        /// Output mesh file
        output: PathBuf,

        /// Input mesh files, merged in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Subdivide faces until no edge is longer than this
        #[arg(long, default_value_t = collision::DEFAULT_EDGE_THRESHOLD)]
        edge_threshold: Real,
    },

    /// Weld a collider mesh and give unnamed materials collision ids
    PrepareCollider {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Collision id for material slots that lack one
        default_material: String,
    },

    /// Flatten a shrub scene into per-material objects
    PrepareShrub {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Semicolon-separated object names to merge into one shrub;
        /// regroups all visual objects by material when omitted
        #[arg(long)]
        objects: Option<String>,
    },

    /// Pull every face's UV island back into the unit square
    FixUvs {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,
    },

    /// Export every mesh object to its own file in a directory
    BatchExport {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Directory the per-object files land in
        out_dir: PathBuf,

        /// Output extension (gltf, glb, dae, obj)
        #[arg(long, default_value = "obj")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            fix_normals,
        } => {
            tracing::info!("Converting {:?} -> {:?}", input, output);
            let mut scene = io::load(&input)?;
            if fix_normals {
                for mesh in &mut scene.meshes {
                    mesh.weld_vertices(DEFAULT_WELD_THRESHOLD);
                    mesh.make_normals_consistent();
                }
            }
            io::save(&scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::DupeNormals { input, output } => {
            tracing::info!("Doubling faces {:?} -> {:?}", input, output);
            let mut scene = io::load(&input)?;
            for mesh in &mut scene.meshes {
                mesh.make_double_sided();
            }
            io::save(&scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::ExportCollision {
            output,
            inputs,
            edge_threshold,
        } => {
            let mut scene = Scene::new();
            for input in &inputs {
                tracing::info!("Loading {:?}", input);
                scene.absorb(io::load(input)?);
            }
            let mesh = collision::consolidate(&scene, edge_threshold)?;
            let collision_scene = Scene::from_mesh("collision", mesh);
            io::save(&collision_scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::PrepareCollider {
            input,
            output,
            default_material,
        } => {
            tracing::info!("Preparing collider {:?} -> {:?}", input, output);
            let mut scene = io::load(&input)?;
            scene.weld_vertices(DEFAULT_WELD_THRESHOLD);
            scene.enforce_collision_ids(&default_material);
            io::save(&scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::PrepareShrub {
            input,
            output,
            objects,
        } => {
            tracing::info!("Preparing shrub {:?} -> {:?}", input, output);
            let mut scene = io::load(&input)?;
            scene.weld_vertices(DEFAULT_WELD_THRESHOLD);
            scene.apply_transforms();

            let names: Vec<String> = objects
                .as_deref()
                .unwrap_or_default()
                .split(';')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                scene.wrap_uvs()?;
                scene.regroup_visuals_by_material();
            } else {
                let ids = scene.objects_named(&names);
                if ids.is_empty() {
                    anyhow::bail!("no objects named {:?} in {:?}", names, input);
                }
                if let Some(target) = scene.merge_objects(&ids, "shrub") {
                    scene.retain(|id, _| id == target);
                }
            }
            io::save(&scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::FixUvs { input, output } => {
            tracing::info!("Fixing UVs {:?} -> {:?}", input, output);
            let mut scene = io::load(&input)?;
            scene.wrap_uvs()?;
            io::save(&scene, &output)?;
            tracing::info!("Done!");
        }

        Commands::BatchExport {
            input,
            out_dir,
            format,
        } => {
            tracing::info!("Batch exporting {:?} -> {:?}", input, out_dir);
            let scene = io::load(&input)?;
            std::fs::create_dir_all(&out_dir)?;
            let mut exported = 0usize;
            for id in 0..scene.objects.len() {
                let Some(isolated) = scene.isolate_baked(id) else {
                    continue;
                };
                let path = out_dir.join(format!("{}.{}", scene.objects[id].name, format));
                tracing::info!("Writing {:?}", path);
                io::save(&isolated, &path)?;
                exported += 1;
            }
            if exported == 0 {
                anyhow::bail!("no mesh objects in {:?}", input);
            }
            tracing::info!("Done!");
        }
    }

    Ok(())
}
