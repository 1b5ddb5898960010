use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use super::collision::CollisionBsp;
use crate::error::{Result, TagError};
use crate::math::{Plane3, Point2, Point3, Quaternion};
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagData, TagDefinition, TagReference};

tag_block! {
    /// Level geometry (`sbsp`).
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct StructureBsp {
        pub lightmaps_bitmap: TagReference,
        pub vehicle_floor: f32,
        pub vehicle_ceiling: f32,
        pub collision_materials: Reflexive<BspCollisionMaterial>,
        pub collision_bsp: Reflexive<CollisionBsp>,
        /// Triangles of every lightmap material, indexing that material's vertices.
        pub surfaces: Reflexive<BspTriangle>,
        pub lightmaps: Reflexive<BspLightmap>,
        pub lens_flares: Reflexive<BspLensFlare>,
        pub lens_flare_markers: Reflexive<LensFlareMarker>,
        pub clusters: Reflexive<BspCluster>,
        pub cluster_portals: Reflexive<ClusterPortal>,
        pub fog_planes: Reflexive<FogPlane>,
        pub weather_polyhedra: Reflexive<WeatherPolyhedron>,
        pub markers: Reflexive<BspMarker>,
    }
}

impl TagDefinition for StructureBsp {
    const CLASS: FourCC = FourCC::new(b"sbsp");
    const VERSION: u16 = 5;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspCollisionMaterial {
        pub shader: TagReference,
        pub material_type: i16,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BspTriangle {
        pub vertex0_index: i16,
        pub vertex1_index: i16,
        pub vertex2_index: i16,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspLightmap {
        /// Index into the lightmaps bitmap, `-1` when unlit.
        pub bitmap_index: i16,
        pub materials: Reflexive<BspMaterial>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspMaterial {
        pub shader: TagReference,
        pub shader_permutation: i16,
        pub flags: u16,
        pub surfaces: i32,
        pub surface_count: i32,
        pub centroid: Point3,
        pub ambient_color: Point3,
        pub distant_light_count: i16,
        pub rendered_vertices_count: u32,
        pub lightmap_vertices_count: u32,
        /// Rendered vertices followed by lightmap vertices, little-endian.
        pub uncompressed_vertices: TagData,
    }
}

/// Uncompressed rendered vertex as stored in a BSP material.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderedVertex {
    pub position: Point3,
    pub normal: Point3,
    pub binormal: Point3,
    pub tangent: Point3,
    pub tex_coords: Point2,
}

/// Uncompressed lightmap vertex as stored in a BSP material.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightmapVertex {
    pub normal: Point3,
    pub tex_coords: Point2,
}

pub const RENDERED_VERTEX_SIZE: usize = 56;
pub const LIGHTMAP_VERTEX_SIZE: usize = 20;

impl BspMaterial {
    fn check_vertex_data(&self) -> Result<()> {
        let expected = self.rendered_vertices_count as usize * RENDERED_VERTEX_SIZE
            + self.lightmap_vertices_count as usize * LIGHTMAP_VERTEX_SIZE;
        if self.uncompressed_vertices.bytes.len() < expected {
            return Err(TagError::MalformedInput(format!(
                "material '{}' declares {} bytes of vertices but has {}",
                self.shader.path,
                expected,
                self.uncompressed_vertices.bytes.len()
            )));
        }
        Ok(())
    }

    pub fn rendered_vertices(&self) -> Result<Vec<RenderedVertex>> {
        self.check_vertex_data()?;
        let mut cursor = Cursor::new(self.uncompressed_vertices.bytes.as_slice());
        (0..self.rendered_vertices_count)
            .map(|_| -> Result<RenderedVertex> { Ok(RenderedVertex::read(&mut cursor)?) })
            .collect()
    }

    pub fn lightmap_vertices(&self) -> Result<Vec<LightmapVertex>> {
        self.check_vertex_data()?;
        let start = self.rendered_vertices_count as usize * RENDERED_VERTEX_SIZE;
        let mut cursor = Cursor::new(&self.uncompressed_vertices.bytes[start..]);
        (0..self.lightmap_vertices_count)
            .map(|_| -> Result<LightmapVertex> { Ok(LightmapVertex::read(&mut cursor)?) })
            .collect()
    }

    pub fn set_vertices(&mut self, rendered: &[RenderedVertex], lightmap: &[LightmapVertex]) -> Result<()> {
        let mut cursor = Cursor::new(Vec::new());
        for v in rendered {
            v.write(&mut cursor)?;
        }
        for v in lightmap {
            v.write(&mut cursor)?;
        }
        self.rendered_vertices_count = rendered.len() as u32;
        self.lightmap_vertices_count = lightmap.len() as u32;
        self.uncompressed_vertices = TagData::new(cursor.into_inner());
        Ok(())
    }

    /// This material's range of the BSP surface list.
    pub fn surface_range(&self, surface_total: usize) -> Result<std::ops::Range<usize>> {
        let start = usize::try_from(self.surfaces).ok();
        let count = usize::try_from(self.surface_count).ok();
        match (start, count) {
            (Some(start), Some(count)) if start + count <= surface_total => Ok(start..start + count),
            _ => Err(TagError::MalformedInput(format!(
                "material '{}' surfaces {}+{} are outside the {} BSP surfaces",
                self.shader.path, self.surfaces, self.surface_count, surface_total
            ))),
        }
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspLensFlare {
        pub lens: TagReference,
    }
}

tag_block! {
    /// Direction is packed as signed bytes scaled by 127.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct LensFlareMarker {
        pub position: Point3,
        pub direction_i: i8,
        pub direction_j: i8,
        pub direction_k: i8,
        pub lens_flare_index: i8,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspCluster {
        pub sky: i16,
        pub fog: i16,
        pub background_sound: i16,
        pub sound_environment: i16,
        pub weather: i16,
        pub mirrors: Reflexive<BspMirror>,
        pub portals: Reflexive<i16>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspMirror {
        pub plane: Plane3,
        pub shader: TagReference,
        pub vertices: Reflexive<Point3>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ClusterPortal {
        pub front_cluster: i16,
        pub back_cluster: i16,
        pub plane_index: i32,
        pub centroid: Point3,
        pub bounding_radius: f32,
        pub flags: u32,
        pub vertices: Reflexive<Point3>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct FogPlane {
        pub front_region: i16,
        pub material_type: i16,
        pub plane: Plane3,
        pub vertices: Reflexive<Point3>,
    }
}

tag_block! {
    /// Convex volume described only by its bounding planes.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct WeatherPolyhedron {
        pub bounding_sphere_center: Point3,
        pub bounding_sphere_radius: f32,
        pub planes: Reflexive<Plane3>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BspMarker {
        pub name: String32,
        pub rotation: Quaternion,
        pub position: Point3,
    }
}
