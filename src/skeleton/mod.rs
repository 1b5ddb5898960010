use cgmath::{Matrix3, SquareMatrix, Vector3};

use crate::error::{Result, TagError};
use crate::math::Quaternion;

/// A skeletal node with a parent-relative transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Always refers to an earlier node.
    pub parent_index: Option<usize>,
    pub local_translation: Vector3<f32>,
    pub local_rotation: Quaternion,
}

impl Node {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_index: None,
            local_translation: Vector3::new(0.0, 0.0, 0.0),
            local_rotation: Quaternion::identity(),
        }
    }
}

/// World-space placement of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteTransform {
    pub position: Vector3<f32>,
    pub parent_rotation: Matrix3<f32>,
    pub local_rotation_composed: Matrix3<f32>,
}

impl AbsoluteTransform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            parent_rotation: Matrix3::identity(),
            local_rotation_composed: Matrix3::identity(),
        }
    }

    /// Node-local point to world space.
    pub fn transform_point(&self, local: Vector3<f32>) -> Vector3<f32> {
        self.position + self.local_rotation_composed * local
    }

    /// Node-local direction to world space (no translation).
    pub fn transform_vector(&self, local: Vector3<f32>) -> Vector3<f32> {
        self.local_rotation_composed * local
    }
}

/// Absolute transforms for every node, indexed like `nodes`.
///
/// Single forward pass: each node's parent must already be resolved, so a
/// parent index that is not smaller than the node's own is `MalformedInput`.
pub fn resolve_transforms(nodes: &[Node]) -> Result<Vec<AbsoluteTransform>> {
    let mut transforms: Vec<AbsoluteTransform> = Vec::with_capacity(nodes.len());

    for (index, node) in nodes.iter().enumerate() {
        let local_rotation = node.local_rotation.to_matrix();

        let transform = match node.parent_index {
            None => AbsoluteTransform {
                position: node.local_translation,
                parent_rotation: Matrix3::identity(),
                local_rotation_composed: local_rotation,
            },
            Some(parent_index) => {
                let parent = transforms.get(parent_index).ok_or_else(|| {
                    TagError::MalformedInput(format!(
                        "node {} ('{}') has parent {}, which is not an earlier node",
                        index, node.name, parent_index
                    ))
                })?;
                let parent_rotation = parent.local_rotation_composed;
                AbsoluteTransform {
                    position: parent.position + parent_rotation * node.local_translation,
                    parent_rotation,
                    local_rotation_composed: parent_rotation * local_rotation,
                }
            }
        };

        transforms.push(transform);
    }

    Ok(transforms)
}

/// Index of the first node with the given name (case-insensitive).
pub fn find_node(nodes: &[Node], name: &str) -> Option<usize> {
    nodes.iter().position(|n| n.name.eq_ignore_ascii_case(name))
}
