// Common test utilities: build small tag trees on disk
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tag_convert_lib::dds::{DdsFile, DdsHeader, DdsPixelFormat, DDPF_ALPHAPIXELS, DDPF_RGB};
use tag_convert_lib::math::{Plane3, Point3};
use tag_convert_lib::tag::{serialize_tag, TagDefinition};
use tag_convert_lib::tags::collision::{
    BspEdge, BspSurface, BspVertex, CollisionBsp, CollisionMaterial, CollisionNode, CollisionPermutation,
    CollisionRegion,
};
use tag_convert_lib::tags::gbxmodel::{ModelNode, MODEL_NONE};
use tag_convert_lib::tags::{CollisionModel, GbxModel};

/// Write `bytes` to `root/relative`, creating directories on the way.
pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("relative path has a parent")).expect("create test directories");
    fs::write(&path, bytes).expect("write test file");
    path
}

pub fn write_tag<T: TagDefinition>(root: &Path, relative: &str, tag: &T) -> PathBuf {
    let bytes = serialize_tag(tag).expect("serialize test tag");
    write_file(root, relative, &bytes)
}

pub fn argb() -> DdsPixelFormat {
    DdsPixelFormat::masked(
        DDPF_RGB | DDPF_ALPHAPIXELS,
        32,
        [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000],
    )
}

/// 4x4 A8R8G8B8 image without mipmaps.
pub fn plain_dds() -> Vec<u8> {
    DdsFile {
        header: DdsHeader::new(4, 4, argb()),
        data: (0..64).map(|i| i as u8).collect(),
    }
    .to_bytes()
    .expect("encode dds")
}

/// Cubemap header that only declares the given faces.
pub fn partial_cubemap_dds(face_bits: u32) -> Vec<u8> {
    DdsFile {
        header: DdsHeader::new(4, 4, argb()).with_cubemap_faces(face_bits),
        data: vec![0; 64 * 6],
    }
    .to_bytes()
    .expect("encode dds")
}

fn edge(start: i32, end: i32, forward: i32) -> BspEdge {
    BspEdge {
        start_vertex: start,
        end_vertex: end,
        forward_edge: forward,
        reverse_edge: -1,
        left_surface: 0,
        right_surface: -1,
    }
}

/// One triangle in z = 0 on a node called `node_name`.
pub fn triangle_collision(node_name: &str) -> CollisionModel {
    let bsp = CollisionBsp {
        planes: vec![Plane3::new(0.0, 0.0, 1.0, 0.0)].into(),
        surfaces: vec![BspSurface {
            plane: 0,
            first_edge: 0,
            flags: 0,
            breakable_surface: -1,
            material: 0,
        }]
        .into(),
        edges: vec![edge(0, 1, 1), edge(1, 2, 2), edge(2, 0, 0)].into(),
        vertices: [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| BspVertex {
                point: Point3::new(x, y, 0.0),
                first_edge: 0,
            })
            .collect(),
        ..Default::default()
    };

    CollisionModel {
        materials: vec![CollisionMaterial {
            name: "stone".into(),
            ..Default::default()
        }]
        .into(),
        regions: vec![CollisionRegion {
            name: "base".into(),
            permutations: vec![CollisionPermutation { name: "__base".into() }].into(),
            ..Default::default()
        }]
        .into(),
        nodes: vec![CollisionNode {
            name: node_name.into(),
            region: 0,
            parent_node: -1,
            next_sibling_node: -1,
            first_child_node: -1,
            bsps: vec![bsp].into(),
        }]
        .into(),
        ..Default::default()
    }
}

/// Render model with a root frame and one child node.
pub fn render_model(child: &str, checksum: i32) -> GbxModel {
    let mut root = ModelNode::new("frame", MODEL_NONE);
    root.first_child_node_index = 1;
    let mut node = ModelNode::new(child, 0);
    node.translation = Point3::new(0.0, 0.0, 2.0);
    GbxModel {
        node_list_checksum: checksum,
        nodes: vec![root, node].into(),
        ..Default::default()
    }
}
