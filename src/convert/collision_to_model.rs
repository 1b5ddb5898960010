//! Collision model → render model, so collision geometry can be viewed and
//! edited as an ordinary model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Converted, Diagnostic, FileOutcome, GBXMODEL_EXTENSION};
use crate::error::TagError;
use crate::math::Point3;
use crate::skeleton::{resolve_transforms, AbsoluteTransform};
use crate::tag::{read_tag_file, write_tag_file, Reflexive, TagReference};
use crate::tags::collision::{BspSurface, CollisionBsp, CollisionModel};
use crate::tags::gbxmodel::{
    GbxModel, ModelGeometry, ModelNode, ModelPart, ModelPermutation, ModelRegion, ModelShader, ModelTriangle,
    ModelVertex, MODEL_NONE,
};
use crate::tags::SHADER_CLASS;
use crate::topology::{edge_loop_to_tris, get_surface_edge_loops};

pub const FALLBACK_NODE_NAME: &str = "COLLISION ROOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConvertOptions {
    /// One shader per collision material; otherwise surfaces are also split by flags.
    pub use_materials_as_shaders: bool,
    pub make_fans: bool,
    /// Append `@` to shaders of invisible surfaces (only when splitting by flags).
    pub mark_invisible_collision_only: bool,
    /// Prefix for generated shader paths.
    pub shader_directory: String,
}

impl Default for CollisionConvertOptions {
    fn default() -> Self {
        Self {
            use_materials_as_shaders: true,
            make_fans: true,
            mark_invisible_collision_only: true,
            shader_directory: String::new(),
        }
    }
}

/// Surfaces sharing a key end up in the same part and shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceKey {
    pub material: i16,
    pub flags: u8,
}

pub fn surface_key(surface: &BspSurface, options: &CollisionConvertOptions) -> SurfaceKey {
    if options.use_materials_as_shaders {
        return SurfaceKey {
            material: surface.material,
            flags: 0,
        };
    }
    let mut mask = BspSurface::TWO_SIDED | BspSurface::LARGE_COLLIDEABLE | BspSurface::CLIMBABLE | BspSurface::BREAKABLE;
    if options.mark_invisible_collision_only {
        mask |= BspSurface::INVISIBLE;
    }
    SurfaceKey {
        material: surface.material,
        flags: surface.flags & mask,
    }
}

/// Material name plus the suffix symbols the model compiler reads back as surface flags.
pub fn shader_name(material: &str, flags: u8) -> String {
    let mut name = material.to_string();
    for (flag, symbol) in [
        (BspSurface::TWO_SIDED, '%'),
        (BspSurface::LARGE_COLLIDEABLE, '*'),
        (BspSurface::CLIMBABLE, '^'),
        (BspSurface::BREAKABLE, '-'),
        (BspSurface::INVISIBLE, '@'),
    ] {
        if flags & flag != 0 {
            name.push(symbol);
        }
    }
    name
}

struct ShaderTable<'a> {
    options: &'a CollisionConvertOptions,
    material_names: Vec<String>,
    indices: BTreeMap<SurfaceKey, i16>,
    shaders: Vec<ModelShader>,
}

impl<'a> ShaderTable<'a> {
    fn index_of(&mut self, key: SurfaceKey) -> anyhow::Result<i16> {
        if let Some(&index) = self.indices.get(&key) {
            return Ok(index);
        }
        let material = usize::try_from(key.material)
            .ok()
            .and_then(|m| self.material_names.get(m))
            .ok_or_else(|| TagError::MalformedInput(format!("surface uses missing material {}", key.material)))?;
        let name = shader_name(material, key.flags);
        let index = self.shaders.len() as i16;
        self.shaders.push(ModelShader {
            shader: TagReference::new(SHADER_CLASS, format!("{}{}", self.options.shader_directory, name)),
            permutation: 0,
        });
        self.indices.insert(key, index);
        Ok(index)
    }
}

fn vertex_index(index: usize) -> anyhow::Result<i16> {
    i16::try_from(index).map_err(|_| anyhow::anyhow!("part needs more than {} vertices", i16::MAX))
}

/// Parts for one node's BSP, one per surface key, in world space.
fn bsp_parts(
    bsp: &CollisionBsp,
    transform: &AbsoluteTransform,
    model_node: i16,
    shaders: &mut ShaderTable,
) -> anyhow::Result<Vec<ModelPart>> {
    let options = shaders.options;
    let loops = get_surface_edge_loops(&bsp.surfaces, &bsp.edges, |_, s| surface_key(s, options))?;

    let mut parts = Vec::with_capacity(loops.len());
    for (key, edge_loops) in loops {
        let mut part = ModelPart::new(shaders.index_of(key)?);
        part.local_nodes = vec![model_node].into();
        part.centroid_primary_node = model_node;

        for edge_loop in edge_loops {
            let surface = &bsp.surfaces[edge_loop.surface];
            let (plane_index, flipped) = surface.plane_index();
            let plane = bsp.planes.get(plane_index).ok_or_else(|| {
                TagError::MalformedInput(format!("surface {} uses missing plane {}", edge_loop.surface, plane_index))
            })?;
            let normal = if flipped { -plane.normal() } else { plane.normal() };
            let normal = Point3(transform.transform_vector(normal));

            let base = part.vertices.len();
            for &v in &edge_loop.vertices {
                let vertex = bsp.vertices.get(v).ok_or_else(|| {
                    TagError::MalformedInput(format!("surface {} uses missing vertex {}", edge_loop.surface, v))
                })?;
                let position = Point3(transform.transform_point(vertex.point.0));
                // vertices reference the part's local node list
                part.vertices.push(ModelVertex::rigid(position, normal, 0));
            }

            let positions: Vec<usize> = (0..edge_loop.vertices.len()).collect();
            for triangle in edge_loop_to_tris(&positions, key, base as u32, options.make_fans) {
                let [a, b, c] = triangle.indices;
                part.triangles.push(ModelTriangle {
                    vertex0_index: vertex_index(a as usize)?,
                    vertex1_index: vertex_index(b as usize)?,
                    vertex2_index: vertex_index(c as usize)?,
                });
            }
        }

        part.centroid = part.compute_centroid();
        parts.push(part);
    }
    Ok(parts)
}

/// Build a render model from collision geometry.
///
/// `render` supplies the node hierarchy; without it every collision node is
/// attached to a single synthetic root node.
pub fn collision_to_model(
    collision: &CollisionModel,
    render: Option<&GbxModel>,
    options: &CollisionConvertOptions,
) -> anyhow::Result<Converted<GbxModel>> {
    let mut diagnostics = Vec::new();

    let render = match render {
        Some(model) if model.nodes.is_empty() => None,
        Some(model) => match model.validate_nodes() {
            Ok(()) => Some(model),
            Err(err) => {
                warn!("ignoring render model nodes: {}", err);
                diagnostics.push(Diagnostic::warning(format!("render model nodes are unusable: {}", err)));
                None
            }
        },
        None => None,
    };

    let (nodes, node_list_checksum) = match render {
        Some(model) => (model.nodes.clone(), model.node_list_checksum),
        None => {
            warn!("no render model to take nodes from, using '{}'", FALLBACK_NODE_NAME);
            diagnostics.push(Diagnostic::warning(format!(
                "no matching gbxmodel found, all collision is attached to '{}'",
                FALLBACK_NODE_NAME
            )));
            (vec![ModelNode::new(FALLBACK_NODE_NAME, MODEL_NONE)].into(), 0)
        }
    };

    let mut model = GbxModel {
        node_list_checksum,
        base_map_u_scale: 1.0,
        base_map_v_scale: 1.0,
        nodes,
        ..Default::default()
    };
    let transforms = resolve_transforms(&model.skeleton_nodes())?;

    // collision node index -> model node index
    let mut node_map = Vec::with_capacity(collision.nodes.len());
    for node in collision.nodes.iter() {
        let index = match model.find_node(node.name.as_str()) {
            Some(index) => index,
            None => {
                if render.is_some() {
                    diagnostics.push(Diagnostic::warning(format!(
                        "collision node '{}' is not in the render model, attaching it to '{}'",
                        node.name, model.nodes[0].name
                    )));
                }
                0
            }
        };
        node_map.push(index);
    }

    let mut shaders = ShaderTable {
        options,
        material_names: collision.materials.iter().map(|m| m.name.to_string()).collect(),
        indices: BTreeMap::new(),
        shaders: Vec::new(),
    };

    let mut regions = Vec::with_capacity(collision.regions.len());
    let mut geometries = Vec::new();
    for (region_index, region) in collision.regions.iter().enumerate() {
        let mut permutations = Vec::with_capacity(region.permutations.len());
        for (permutation_index, permutation) in region.permutations.iter().enumerate() {
            let mut geometry = ModelGeometry::default();

            for (collision_node, node) in collision.nodes.iter().enumerate() {
                if usize::try_from(node.region).ok() != Some(region_index) {
                    continue;
                }
                let Some(bsp) = node.bsps.get(permutation_index) else {
                    continue;
                };
                let model_node = node_map[collision_node];
                let parts = bsp_parts(bsp, &transforms[model_node], model_node as i16, &mut shaders)
                    .with_context(|| format!("node '{}' permutation '{}'", node.name, permutation.name))?;
                geometry.parts.extend(parts);
            }

            debug!(
                region = %region.name,
                permutation = %permutation.name,
                parts = geometry.parts.len(),
                "built collision geometry"
            );
            permutations.push(ModelPermutation::new(permutation.name.as_str(), geometries.len() as i16));
            geometries.push(geometry);
        }
        regions.push(ModelRegion {
            name: region.name.clone(),
            permutations: permutations.into(),
        });
    }

    if shaders.shaders.is_empty() && !collision.materials.is_empty() {
        diagnostics.push(Diagnostic::info("collision model has no surfaces"));
    }

    model.regions = regions.into();
    model.geometries = geometries.into();
    model.shaders = Reflexive::new(shaders.shaders);
    model.validate()?;

    Ok(Converted {
        tag: model,
        diagnostics,
    })
}

/// The render model that sits next to a collision tag, if any.
pub fn find_sibling_gbxmodel(collision_path: &Path) -> Option<PathBuf> {
    let candidate = collision_path.with_extension(GBXMODEL_EXTENSION);
    candidate.is_file().then_some(candidate)
}

fn load_render_model(collision_path: &Path) -> (Option<GbxModel>, Option<Diagnostic>) {
    let Some(path) = find_sibling_gbxmodel(collision_path) else {
        return (None, None);
    };
    match read_tag_file::<GbxModel>(&path) {
        Ok(model) => (Some(model), None),
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable gbxmodel: {}", err);
            let diagnostic = Diagnostic::warning(format!("could not read render model {}: {}", path.display(), err));
            (None, Some(diagnostic))
        }
    }
}

pub fn convert_collision_file(
    source: &Path,
    destination: &Path,
    options: &CollisionConvertOptions,
) -> anyhow::Result<FileOutcome> {
    let collision: CollisionModel =
        read_tag_file(source).with_context(|| format!("Failed to read collision tag {}", source.display()))?;
    let (render, render_diagnostic) = load_render_model(source);

    let mut converted = collision_to_model(&collision, render.as_ref(), options)?;
    if let Some(diagnostic) = render_diagnostic {
        converted.diagnostics.insert(0, diagnostic);
    }
    if converted.tag.geometries.is_empty() {
        bail!("collision tag has no regions to convert");
    }
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(
        path = %source.display(),
        geometries = converted.tag.geometries.len(),
        shaders = converted.tag.shaders.len(),
        "converted collision to gbxmodel"
    );
    Ok(FileOutcome::written(converted.diagnostics))
}
