use cgmath::Vector3;

use crate::error::{Result, TagError};
use crate::math::{Point2, Point3, Quaternion};
use crate::skeleton::Node;
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagDefinition, TagReference};

pub const MODEL_NONE: i16 = -1;

tag_block! {
    /// Render model (`mod2`).
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct GbxModel {
        pub flags: u32,
        pub node_list_checksum: i32,
        pub base_map_u_scale: f32,
        pub base_map_v_scale: f32,
        pub nodes: Reflexive<ModelNode>,
        pub regions: Reflexive<ModelRegion>,
        pub geometries: Reflexive<ModelGeometry>,
        pub shaders: Reflexive<ModelShader>,
    }
}

impl TagDefinition for GbxModel {
    const CLASS: FourCC = FourCC::new(b"mod2");
    const VERSION: u16 = 5;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelNode {
        pub name: String32,
        pub next_sibling_node_index: i16,
        pub first_child_node_index: i16,
        pub parent_node_index: i16,
        pub translation: Point3,
        pub rotation: Quaternion,
        pub distance_from_parent: f32,
    }
}

impl ModelNode {
    pub fn new(name: &str, parent_node_index: i16) -> Self {
        Self {
            name: name.into(),
            next_sibling_node_index: MODEL_NONE,
            first_child_node_index: MODEL_NONE,
            parent_node_index,
            ..Default::default()
        }
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelRegion {
        pub name: String32,
        pub permutations: Reflexive<ModelPermutation>,
    }
}

tag_block! {
    /// Geometry indices per level of detail, lowest first.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelPermutation {
        pub name: String32,
        pub flags: u32,
        pub super_low: i16,
        pub low: i16,
        pub medium: i16,
        pub high: i16,
        pub super_high: i16,
        pub markers: Reflexive<ModelMarker>,
    }
}

impl ModelPermutation {
    /// Permutation using one geometry at every level of detail.
    pub fn new(name: &str, geometry_index: i16) -> Self {
        Self {
            name: name.into(),
            flags: 0,
            super_low: geometry_index,
            low: geometry_index,
            medium: geometry_index,
            high: geometry_index,
            super_high: geometry_index,
            markers: Reflexive::default(),
        }
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelMarker {
        pub name: String32,
        pub node_index: i16,
        pub rotation: Quaternion,
        pub translation: Point3,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelGeometry {
        pub flags: u32,
        pub parts: Reflexive<ModelPart>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelPart {
        pub flags: u32,
        pub shader_index: i16,
        pub previous_filthy_part_index: i8,
        pub next_filthy_part_index: i8,
        pub centroid_primary_node: i16,
        pub centroid: Point3,
        pub vertices: Reflexive<ModelVertex>,
        pub triangles: Reflexive<ModelTriangle>,
        /// Model node indices used by this part's vertices.
        pub local_nodes: Reflexive<i16>,
    }
}

impl ModelPart {
    pub fn new(shader_index: i16) -> Self {
        Self {
            shader_index,
            previous_filthy_part_index: -1,
            next_filthy_part_index: -1,
            ..Default::default()
        }
    }

    /// Mean vertex position.
    pub fn compute_centroid(&self) -> Point3 {
        if self.vertices.is_empty() {
            return Point3::default();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::new(0.0, 0.0, 0.0), |acc, v| acc + v.position.0);
        Point3(sum / self.vertices.len() as f32)
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelVertex {
        pub position: Point3,
        pub normal: Point3,
        pub binormal: Point3,
        pub tangent: Point3,
        pub tex_coords: Point2,
        pub node0_index: i16,
        pub node1_index: i16,
        pub node0_weight: f32,
        pub node1_weight: f32,
    }
}

impl ModelVertex {
    /// Vertex fully weighted to one node.
    pub fn rigid(position: Point3, normal: Point3, node_index: i16) -> Self {
        Self {
            position,
            normal,
            node0_index: node_index,
            node1_index: MODEL_NONE,
            node0_weight: 1.0,
            ..Default::default()
        }
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModelTriangle {
        pub vertex0_index: i16,
        pub vertex1_index: i16,
        pub vertex2_index: i16,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ModelShader {
        pub shader: TagReference,
        pub permutation: i16,
    }
}

impl GbxModel {
    /// Nodes as a transform hierarchy (`-1` parents become roots).
    pub fn skeleton_nodes(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .map(|n| Node {
                name: n.name.to_string(),
                parent_index: usize::try_from(n.parent_node_index).ok(),
                local_translation: n.translation.0,
                local_rotation: n.rotation,
            })
            .collect()
    }

    /// Every node's parent is `MODEL_NONE` or an earlier node.
    pub fn validate_nodes(&self) -> Result<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.parent_node_index != MODEL_NONE
                && (node.parent_node_index < 0 || node.parent_node_index as usize >= i)
            {
                return Err(TagError::MalformedInput(format!(
                    "node {} ('{}') has parent {}, which is not an earlier node",
                    i, node.name, node.parent_node_index
                )));
            }
        }
        Ok(())
    }

    /// Checks node, shader and vertex references of every part.
    pub fn validate(&self) -> Result<()> {
        self.validate_nodes()?;
        let node_count = self.nodes.len();

        for (g, geometry) in self.geometries.iter().enumerate() {
            for (p, part) in geometry.parts.iter().enumerate() {
                if part.shader_index < 0 || part.shader_index as usize >= self.shaders.len() {
                    return Err(TagError::MalformedInput(format!(
                        "geometry {} part {} uses shader {} of {}",
                        g,
                        p,
                        part.shader_index,
                        self.shaders.len()
                    )));
                }
                if let Some(bad) = part
                    .local_nodes
                    .iter()
                    .find(|&&n| n < 0 || n as usize >= node_count)
                {
                    return Err(TagError::MalformedInput(format!(
                        "geometry {} part {} references node {} of {}",
                        g, p, bad, node_count
                    )));
                }
                let vertex_count = part.vertices.len();
                for triangle in part.triangles.iter() {
                    for index in [triangle.vertex0_index, triangle.vertex1_index, triangle.vertex2_index] {
                        if index < 0 || index as usize >= vertex_count {
                            return Err(TagError::MalformedInput(format!(
                                "geometry {} part {} triangle references vertex {} of {}",
                                g, p, index, vertex_count
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.as_str().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{parse_tag, serialize_tag};
    use crate::tags::SHADER_CLASS;

    fn sample_model() -> GbxModel {
        let mut pelvis = ModelNode::new("bip01 pelvis", 0);
        pelvis.translation = Point3::new(0.0, 0.0, 0.5);
        let mut part = ModelPart::new(0);
        part.vertices = vec![
            ModelVertex::rigid(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 1.0), 0),
            ModelVertex::rigid(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 0.0, 1.0), 0),
            ModelVertex::rigid(Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 0.0, 1.0), 1),
        ]
        .into();
        part.triangles = vec![ModelTriangle {
            vertex0_index: 0,
            vertex1_index: 1,
            vertex2_index: 2,
        }]
        .into();
        part.local_nodes = vec![0i16, 1].into();

        let mut permutation = ModelPermutation::new("base", 0);
        permutation.markers = vec![ModelMarker {
            name: "head".into(),
            node_index: 1,
            ..Default::default()
        }]
        .into();

        GbxModel {
            base_map_u_scale: 1.0,
            base_map_v_scale: 1.0,
            nodes: vec![ModelNode::new("frame", MODEL_NONE), pelvis].into(),
            regions: vec![ModelRegion {
                name: "body".into(),
                permutations: vec![permutation].into(),
            }]
            .into(),
            geometries: vec![ModelGeometry {
                flags: 0,
                parts: vec![part].into(),
            }]
            .into(),
            shaders: vec![ModelShader {
                shader: TagReference::new(SHADER_CLASS, "characters\\test\\shaders\\skin"),
                permutation: 0,
            }]
            .into(),
            ..Default::default()
        }
    }

    #[test]
    fn model_round_trip() {
        let model = sample_model();
        let bytes = serialize_tag(&model).unwrap();
        let parsed: GbxModel = parse_tag(&bytes).unwrap();
        assert_eq!(parsed, model);
        assert_eq!(serialize_tag(&parsed).unwrap(), bytes);
    }

    #[test]
    fn skeleton_nodes_map_parents() {
        let nodes = sample_model().skeleton_nodes();
        assert_eq!(nodes[0].parent_index, None);
        assert_eq!(nodes[1].parent_index, Some(0));
        assert_eq!(nodes[1].local_translation, Vector3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn validate_catches_bad_references() {
        let mut model = sample_model();
        assert!(model.validate().is_ok());

        model.geometries[0].parts[0].local_nodes.push(7);
        assert!(model.validate().is_err());

        let mut model = sample_model();
        model.nodes[1].parent_node_index = 1;
        assert!(model.validate().is_err());

        let mut model = sample_model();
        model.geometries[0].parts[0].triangles[0].vertex2_index = 3;
        assert!(model.validate().is_err());
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let part = &sample_model().geometries[0].parts[0];
        let c = part.compute_centroid();
        assert!((c.0.x - 1.0 / 3.0).abs() < 1e-6);
        assert!((c.0.y - 1.0 / 3.0).abs() < 1e-6);
    }
}
