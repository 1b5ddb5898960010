//! Structure BSP → render model, one permutation per kind of BSP content so
//! each can be inspected on its own.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::collision_to_model::{shader_name, surface_key, CollisionConvertOptions};
use super::{Converted, Diagnostic, FileOutcome};
use crate::error::TagError;
use crate::math::polyhedron::polyhedron_faces;
use crate::math::{Point3, Quaternion};
use crate::tag::{read_tag_file, write_tag_file, TagReference};
use crate::tags::gbxmodel::{
    GbxModel, ModelGeometry, ModelMarker, ModelNode, ModelPart, ModelPermutation, ModelRegion, ModelShader,
    ModelTriangle, ModelVertex, MODEL_NONE,
};
use crate::tags::structure_bsp::{BspMaterial, StructureBsp};
use crate::tags::SHADER_CLASS;
use crate::topology::{edge_loop_to_tris, get_surface_edge_loops};

pub const REGION_NAME: &str = "structure";
pub const NODE_NAME: &str = "frame";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BspConvertOptions {
    pub markers: bool,
    pub lens_flares: bool,
    pub fog_planes: bool,
    pub mirrors: bool,
    pub cluster_portals: bool,
    pub weather_polyhedra: bool,
    pub collision: bool,
    pub renderable: bool,
    pub lightmaps: bool,
    /// Distance within which weather polyhedron corners count as on a plane.
    pub weather_tolerance: f32,
    /// Half width of the quad drawn for each lens flare marker.
    pub lens_flare_size: f32,
    pub make_fans: bool,
    /// Prefix for shaders of content without a shader of its own.
    pub shader_directory: String,
}

impl Default for BspConvertOptions {
    fn default() -> Self {
        Self {
            markers: true,
            lens_flares: true,
            fog_planes: true,
            mirrors: true,
            cluster_portals: true,
            weather_polyhedra: true,
            collision: true,
            renderable: true,
            lightmaps: true,
            weather_tolerance: 0.0001,
            lens_flare_size: 0.1,
            make_fans: true,
            shader_directory: String::new(),
        }
    }
}

/// Accumulates shaders and geometries for a single-node model.
struct ModelBuilder<'a> {
    options: &'a BspConvertOptions,
    model: GbxModel,
    permutations: Vec<ModelPermutation>,
    shader_indices: HashMap<String, i16>,
}

impl<'a> ModelBuilder<'a> {
    fn new(options: &'a BspConvertOptions) -> Self {
        Self {
            options,
            model: GbxModel {
                base_map_u_scale: 1.0,
                base_map_v_scale: 1.0,
                nodes: vec![ModelNode::new(NODE_NAME, MODEL_NONE)].into(),
                ..Default::default()
            },
            permutations: Vec::new(),
            shader_indices: HashMap::new(),
        }
    }

    fn shader(&mut self, path: &str) -> i16 {
        if let Some(&index) = self.shader_indices.get(path) {
            return index;
        }
        let index = self.model.shaders.len() as i16;
        self.model.shaders.push(ModelShader {
            shader: TagReference::new(SHADER_CLASS, path),
            permutation: 0,
        });
        self.shader_indices.insert(path.to_string(), index);
        index
    }

    /// Shader for content that has none of its own.
    fn placeholder_shader(&mut self, name: &str) -> i16 {
        let path = format!("{}{}", self.options.shader_directory, name);
        self.shader(&path)
    }

    fn add_permutation(&mut self, name: &str, parts: Vec<ModelPart>, markers: Vec<ModelMarker>) {
        let mut permutation = ModelPermutation::new(name, self.model.geometries.len() as i16);
        permutation.markers = markers.into();
        debug!(permutation = name, parts = parts.len(), "built bsp permutation");
        self.model.geometries.push(ModelGeometry {
            flags: 0,
            parts: parts.into(),
        });
        self.permutations.push(permutation);
    }

    fn finish(mut self) -> anyhow::Result<GbxModel> {
        self.model.regions = vec![ModelRegion {
            name: REGION_NAME.into(),
            permutations: self.permutations.into(),
        }]
        .into();
        self.model.validate()?;
        Ok(self.model)
    }
}

fn new_part(shader_index: i16) -> ModelPart {
    let mut part = ModelPart::new(shader_index);
    part.local_nodes = vec![0i16].into();
    part
}

/// Vertices a part can hold with `i16` triangle indices.
const MAX_PART_VERTICES: usize = i16::MAX as usize;

/// Parts keyed by shader. Content that would push a part past
/// [`MAX_PART_VERTICES`] goes into a fresh part with the same shader.
#[derive(Default)]
struct PartSet {
    parts: Vec<ModelPart>,
}

impl PartSet {
    fn part(&mut self, shader_index: i16, vertex_count: usize) -> &mut ModelPart {
        let last = self.parts.iter().rposition(|p| p.shader_index == shader_index);
        let index = match last {
            Some(index) if self.parts[index].vertices.len() + vertex_count <= MAX_PART_VERTICES => index,
            _ => {
                self.parts.push(new_part(shader_index));
                self.parts.len() - 1
            }
        };
        &mut self.parts[index]
    }

    fn finish(self) -> Vec<ModelPart> {
        self.parts.into_iter().filter_map(finish_part).collect()
    }
}

fn vertex_index(index: u32) -> anyhow::Result<i16> {
    i16::try_from(index).map_err(|_| anyhow::anyhow!("part needs more than {} vertices", i16::MAX))
}

/// Append a convex polygon to `part`.
fn push_polygon(part: &mut ModelPart, points: &[Vector3<f32>], normal: Vector3<f32>, make_fans: bool) -> anyhow::Result<()> {
    if points.len() < 3 {
        return Ok(());
    }
    let base = part.vertices.len() as u32;
    for point in points {
        part.vertices.push(ModelVertex::rigid(Point3(*point), Point3(normal), 0));
    }
    let positions: Vec<usize> = (0..points.len()).collect();
    for triangle in edge_loop_to_tris(&positions, (), base, make_fans) {
        let [a, b, c] = triangle.indices;
        part.triangles.push(ModelTriangle {
            vertex0_index: vertex_index(a)?,
            vertex1_index: vertex_index(b)?,
            vertex2_index: vertex_index(c)?,
        });
    }
    Ok(())
}

/// Newell normal of a polygon; zero for degenerate input.
fn polygon_normal(points: &[Vector3<f32>]) -> Vector3<f32> {
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    if normal.magnitude2() > 0.0 {
        normal.normalize()
    } else {
        normal
    }
}

fn finish_part(mut part: ModelPart) -> Option<ModelPart> {
    if part.triangles.is_empty() {
        return None;
    }
    part.centroid = part.compute_centroid();
    Some(part)
}

fn markers(bsp: &StructureBsp) -> Vec<ModelMarker> {
    let mut markers: Vec<ModelMarker> = bsp
        .markers
        .iter()
        .map(|m| ModelMarker {
            name: m.name.clone(),
            node_index: 0,
            rotation: m.rotation,
            translation: m.position,
        })
        .collect();

    for flare in bsp.lens_flare_markers.iter() {
        let name = usize::try_from(flare.lens_flare_index)
            .ok()
            .and_then(|i| bsp.lens_flares.get(i))
            .map(|f| f.lens.name().to_string())
            .unwrap_or_else(|| "lens_flare".to_string());
        markers.push(ModelMarker {
            name: name.into(),
            node_index: 0,
            rotation: Quaternion::identity(),
            translation: flare.position,
        });
    }
    markers
}

fn flare_direction(i: i8, j: i8, k: i8) -> Vector3<f32> {
    let d = Vector3::new(i as f32, j as f32, k as f32) / 127.0;
    if d.magnitude2() > 0.0 {
        d.normalize()
    } else {
        Vector3::unit_z()
    }
}

fn lens_flare_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let size = builder.options.lens_flare_size;
    let shader = builder.placeholder_shader("lens_flare");
    let mut parts = PartSet::default();
    for flare in bsp.lens_flare_markers.iter() {
        let normal = flare_direction(flare.direction_i, flare.direction_j, flare.direction_k);
        let helper = if normal.z.abs() < 0.9 { Vector3::unit_z() } else { Vector3::unit_x() };
        let u = normal.cross(helper).normalize() * size;
        let v = normal.cross(u);
        let c = flare.position.0;
        let quad = [c - u - v, c + u - v, c + u + v, c - u + v];
        push_polygon(parts.part(shader, quad.len()), &quad, normal, builder.options.make_fans)?;
    }
    Ok(parts.finish())
}

fn fog_plane_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let shader = builder.placeholder_shader("fog_plane");
    let mut parts = PartSet::default();
    for fog in bsp.fog_planes.iter() {
        let points: Vec<Vector3<f32>> = fog.vertices.iter().map(|p| p.0).collect();
        push_polygon(parts.part(shader, points.len()), &points, fog.plane.normal(), builder.options.make_fans)?;
    }
    Ok(parts.finish())
}

fn mirror_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let mut parts = PartSet::default();
    for mirror in bsp.clusters.iter().flat_map(|c| c.mirrors.iter()) {
        let shader = if mirror.shader.is_null() {
            builder.placeholder_shader("mirror")
        } else {
            builder.shader(&mirror.shader.path)
        };
        let points: Vec<Vector3<f32>> = mirror.vertices.iter().map(|p| p.0).collect();
        push_polygon(parts.part(shader, points.len()), &points, mirror.plane.normal(), builder.options.make_fans)?;
    }
    Ok(parts.finish())
}

fn cluster_portal_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let shader = builder.placeholder_shader("cluster_portal");
    let mut parts = PartSet::default();
    for portal in bsp.cluster_portals.iter() {
        let points: Vec<Vector3<f32>> = portal.vertices.iter().map(|p| p.0).collect();
        push_polygon(parts.part(shader, points.len()), &points, polygon_normal(&points), builder.options.make_fans)?;
    }
    Ok(parts.finish())
}

fn weather_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let shader = builder.placeholder_shader("weather_polyhedron");
    let mut parts = PartSet::default();
    for polyhedron in bsp.weather_polyhedra.iter() {
        for face in polyhedron_faces(&polyhedron.planes, builder.options.weather_tolerance) {
            push_polygon(parts.part(shader, face.len()), &face, polygon_normal(&face), builder.options.make_fans)?;
        }
    }
    Ok(parts.finish())
}

fn collision_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let key_options = CollisionConvertOptions {
        use_materials_as_shaders: false,
        mark_invisible_collision_only: true,
        make_fans: builder.options.make_fans,
        shader_directory: builder.options.shader_directory.clone(),
    };

    let mut parts = PartSet::default();
    for collision in bsp.collision_bsp.iter() {
        let loops = get_surface_edge_loops(&collision.surfaces, &collision.edges, |_, s| surface_key(s, &key_options))?;
        for (key, edge_loops) in loops {
            let material = usize::try_from(key.material)
                .ok()
                .and_then(|m| bsp.collision_materials.get(m))
                .ok_or_else(|| TagError::MalformedInput(format!("surface uses missing material {}", key.material)))?;
            let base_name = if material.shader.is_null() {
                format!("{}collision", key_options.shader_directory)
            } else {
                material.shader.path.clone()
            };
            let shader = builder.shader(&shader_name(&base_name, key.flags));

            for edge_loop in edge_loops {
                let surface = &collision.surfaces[edge_loop.surface];
                let (plane_index, flipped) = surface.plane_index();
                let plane = collision.planes.get(plane_index).ok_or_else(|| {
                    TagError::MalformedInput(format!("surface {} uses missing plane {}", edge_loop.surface, plane_index))
                })?;
                let normal = if flipped { -plane.normal() } else { plane.normal() };
                let points = edge_loop
                    .vertices
                    .iter()
                    .map(|&v| {
                        collision.vertices.get(v).map(|vertex| vertex.point.0).ok_or_else(|| {
                            TagError::MalformedInput(format!("surface {} uses missing vertex {}", edge_loop.surface, v))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                push_polygon(parts.part(shader, points.len()), &points, normal, builder.options.make_fans)?;
            }
        }
    }
    Ok(parts.finish())
}

/// Triangles of one lightmap material, indexing its own vertex list.
fn material_triangles(bsp: &StructureBsp, material: &BspMaterial) -> crate::error::Result<Vec<[usize; 3]>> {
    let range = material.surface_range(bsp.surfaces.len())?;
    let vertex_count = material.rendered_vertices_count as usize;
    bsp.surfaces[range]
        .iter()
        .map(|t| {
            let indices = [t.vertex0_index, t.vertex1_index, t.vertex2_index];
            let mut out = [0usize; 3];
            for (slot, index) in out.iter_mut().zip(indices) {
                *slot = usize::try_from(index)
                    .ok()
                    .filter(|&i| i < vertex_count)
                    .ok_or_else(|| {
                        TagError::MalformedInput(format!(
                            "material '{}' triangle uses vertex {} of {}",
                            material.shader.path, index, vertex_count
                        ))
                    })?;
            }
            Ok(out)
        })
        .collect()
}

fn push_mesh(parts: &mut PartSet, shader: i16, vertices: Vec<ModelVertex>, triangles: &[[usize; 3]]) -> anyhow::Result<()> {
    let part = parts.part(shader, vertices.len());
    let base = part.vertices.len() as u32;
    part.vertices.extend(vertices);
    for [a, b, c] in triangles {
        part.triangles.push(ModelTriangle {
            vertex0_index: vertex_index(base + *a as u32)?,
            vertex1_index: vertex_index(base + *b as u32)?,
            vertex2_index: vertex_index(base + *c as u32)?,
        });
    }
    Ok(())
}

fn renderable_parts(builder: &mut ModelBuilder, bsp: &StructureBsp) -> anyhow::Result<Vec<ModelPart>> {
    let mut parts = PartSet::default();
    for material in bsp.lightmaps.iter().flat_map(|l| l.materials.iter()) {
        let shader = builder.shader(&material.shader.path);
        let triangles = material_triangles(bsp, material)?;
        let vertices = material
            .rendered_vertices()?
            .into_iter()
            .map(|v| ModelVertex {
                binormal: v.binormal,
                tangent: v.tangent,
                tex_coords: v.tex_coords,
                ..ModelVertex::rigid(v.position, v.normal, 0)
            })
            .collect();

        push_mesh(&mut parts, shader, vertices, &triangles)
            .with_context(|| format!("shader '{}'", material.shader.path))?;
    }
    Ok(parts.finish())
}

fn lightmap_parts(
    builder: &mut ModelBuilder,
    bsp: &StructureBsp,
    diagnostics: &mut Vec<Diagnostic>,
) -> anyhow::Result<Vec<ModelPart>> {
    let mut parts = PartSet::default();
    for lightmap in bsp.lightmaps.iter() {
        if lightmap.bitmap_index < 0 {
            continue;
        }
        let shader = builder.placeholder_shader(&format!("lightmap_{}", lightmap.bitmap_index));
        for material in lightmap.materials.iter() {
            if material.lightmap_vertices_count != material.rendered_vertices_count {
                diagnostics.push(Diagnostic::warning(format!(
                    "material '{}' of lightmap {} has {} lightmap vertices for {} vertices, skipped",
                    material.shader.path,
                    lightmap.bitmap_index,
                    material.lightmap_vertices_count,
                    material.rendered_vertices_count
                )));
                continue;
            }
            let triangles = material_triangles(bsp, material)?;
            let vertices = material
                .rendered_vertices()?
                .into_iter()
                .zip(material.lightmap_vertices()?)
                .map(|(v, l)| ModelVertex {
                    tex_coords: l.tex_coords,
                    ..ModelVertex::rigid(v.position, l.normal, 0)
                })
                .collect();
            push_mesh(&mut parts, shader, vertices, &triangles)?;
        }
    }
    Ok(parts.finish())
}

type PartBuilder = fn(&mut ModelBuilder, &StructureBsp) -> anyhow::Result<Vec<ModelPart>>;

/// Build a render model showing the selected parts of a structure BSP.
pub fn bsp_to_model(bsp: &StructureBsp, options: &BspConvertOptions) -> anyhow::Result<Converted<GbxModel>> {
    let mut builder = ModelBuilder::new(options);
    let mut diagnostics = Vec::new();

    if options.markers {
        let markers = markers(bsp);
        if markers.is_empty() {
            diagnostics.push(Diagnostic::info("bsp has no markers"));
        } else {
            builder.add_permutation("markers", Vec::new(), markers);
        }
    }

    let sections: [(&str, bool, PartBuilder); 7] = [
        ("lens_flares", options.lens_flares, lens_flare_parts),
        ("fog_planes", options.fog_planes, fog_plane_parts),
        ("mirrors", options.mirrors, mirror_parts),
        ("cluster_portals", options.cluster_portals, cluster_portal_parts),
        ("weather_polyhedra", options.weather_polyhedra, weather_parts),
        ("collision", options.collision, collision_parts),
        ("renderable", options.renderable, renderable_parts),
    ];
    for (name, enabled, build) in sections {
        if !enabled {
            continue;
        }
        let parts = build(&mut builder, bsp).with_context(|| format!("Failed to build '{}'", name))?;
        if parts.is_empty() {
            diagnostics.push(Diagnostic::info(format!("bsp has no {}", name.replace('_', " "))));
        } else {
            builder.add_permutation(name, parts, Vec::new());
        }
    }

    if options.lightmaps {
        let parts = lightmap_parts(&mut builder, bsp, &mut diagnostics).context("Failed to build 'lightmaps'")?;
        if !parts.is_empty() {
            builder.add_permutation("lightmaps", parts, Vec::new());
        }
    }

    Ok(Converted {
        tag: builder.finish()?,
        diagnostics,
    })
}

pub fn convert_bsp_file(source: &Path, destination: &Path, options: &BspConvertOptions) -> anyhow::Result<FileOutcome> {
    let bsp: StructureBsp =
        read_tag_file(source).with_context(|| format!("Failed to read structure bsp {}", source.display()))?;
    let converted = bsp_to_model(&bsp, options)?;
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(
        path = %source.display(),
        permutations = converted.tag.geometries.len(),
        "converted structure bsp to gbxmodel"
    );
    Ok(FileOutcome::written(converted.diagnostics))
}
