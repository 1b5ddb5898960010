//! Reader for JMS intermediate models (version 8200).
//!
//! A JMS file is line oriented: every name sits on its own line and every
//! vector is one line of whitespace separated numbers.
//!
//! ```text
//! 8200
//! node_list_checksum
//! node count, then per node:      name / first_child sibling / i j k w / x y z
//! material count, then per material: name / tif path
//! marker count, then per marker:  name / region / parent / i j k w / x y z / radius
//! region count, then per region:  name
//! vertex count, then per vertex:  node0 / x y z / i j k / node1 / node1_weight / u v / unused
//! triangle count, then per tri:   region / shader / v0 v1 v2
//! ```
//!
//! Distances are in JMS units (one hundredth of a world unit).

use std::path::Path;
use std::str::FromStr;

use cgmath::Vector3;

use crate::error::{Result, TagError};
use crate::math::Quaternion;

pub const JMS_VERSION: u32 = 8200;

#[derive(Debug, Clone, PartialEq)]
pub struct JmsNode {
    pub name: String,
    pub first_child: i32,
    pub sibling: i32,
    pub rotation: Quaternion,
    pub translation: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JmsMaterial {
    pub name: String,
    pub tif_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JmsMarker {
    pub name: String,
    pub region: i32,
    pub parent: i32,
    pub rotation: Quaternion,
    pub translation: Vector3<f32>,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JmsVertex {
    pub node0: i32,
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub node1: i32,
    pub node1_weight: f32,
    pub tex_coords: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JmsTriangle {
    pub region: i32,
    pub shader: i32,
    pub vertices: [i32; 3],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JmsModel {
    pub node_list_checksum: i32,
    pub nodes: Vec<JmsNode>,
    pub materials: Vec<JmsMaterial>,
    pub markers: Vec<JmsMarker>,
    pub regions: Vec<String>,
    pub vertices: Vec<JmsVertex>,
    pub triangles: Vec<JmsTriangle>,
}

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines().enumerate(),
            line: 0,
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> TagError {
        TagError::MalformedInput(format!("JMS line {}: {}", self.line, message))
    }

    /// Next non-blank line, trimmed.
    fn next_line(&mut self) -> Result<&'a str> {
        for (index, raw) in self.inner.by_ref() {
            self.line = index + 1;
            let line = raw.trim();
            if !line.is_empty() {
                return Ok(line);
            }
        }
        Err(self.error("unexpected end of file"))
    }

    fn value<T: FromStr>(&mut self) -> Result<T> {
        let line = self.next_line()?;
        line.parse()
            .map_err(|_| self.error(format_args!("expected a number, found '{}'", line)))
    }

    fn values<T: FromStr + Copy + Default, const N: usize>(&mut self) -> Result<[T; N]> {
        let line = self.next_line()?;
        let mut out = [T::default(); N];
        let mut parts = line.split_whitespace();
        for slot in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| self.error(format_args!("expected {} values, found '{}'", N, line)))?;
            *slot = part
                .parse()
                .map_err(|_| self.error(format_args!("'{}' is not a number", part)))?;
        }
        Ok(out)
    }

    fn count(&mut self) -> Result<usize> {
        let count: i64 = self.value()?;
        usize::try_from(count).map_err(|_| self.error(format_args!("negative count {}", count)))
    }

    fn vector(&mut self) -> Result<Vector3<f32>> {
        let [x, y, z] = self.values::<f32, 3>()?;
        Ok(Vector3::new(x, y, z))
    }

    fn quaternion(&mut self) -> Result<Quaternion> {
        let [i, j, k, w] = self.values::<f32, 4>()?;
        Ok(Quaternion::new(i, j, k, w))
    }
}

pub fn parse_jms(text: &str) -> Result<JmsModel> {
    let mut lines = Lines::new(text);

    let version: u32 = lines.value()?;
    if version != JMS_VERSION {
        return Err(lines.error(format_args!("unsupported JMS version {}", version)));
    }

    let node_list_checksum = lines.value()?;

    let node_count = lines.count()?;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let name = lines.next_line()?.to_string();
        let [first_child, sibling] = lines.values::<i32, 2>()?;
        nodes.push(JmsNode {
            name,
            first_child,
            sibling,
            rotation: lines.quaternion()?,
            translation: lines.vector()?,
        });
    }

    let material_count = lines.count()?;
    let mut materials = Vec::with_capacity(material_count);
    for _ in 0..material_count {
        materials.push(JmsMaterial {
            name: lines.next_line()?.to_string(),
            tif_path: lines.next_line()?.to_string(),
        });
    }

    let marker_count = lines.count()?;
    let mut markers = Vec::with_capacity(marker_count);
    for _ in 0..marker_count {
        markers.push(JmsMarker {
            name: lines.next_line()?.to_string(),
            region: lines.value()?,
            parent: lines.value()?,
            rotation: lines.quaternion()?,
            translation: lines.vector()?,
            radius: lines.value()?,
        });
    }

    let region_count = lines.count()?;
    let mut regions = Vec::with_capacity(region_count);
    for _ in 0..region_count {
        regions.push(lines.next_line()?.to_string());
    }

    let vertex_count = lines.count()?;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let node0 = lines.value()?;
        let position = lines.vector()?;
        let normal = lines.vector()?;
        let node1 = lines.value()?;
        let node1_weight = lines.value()?;
        let tex_coords = lines.values::<f32, 2>()?;
        let _unused: i32 = lines.value()?;
        vertices.push(JmsVertex {
            node0,
            position,
            normal,
            node1,
            node1_weight,
            tex_coords,
        });
    }

    let triangle_count = lines.count()?;
    let mut triangles = Vec::with_capacity(triangle_count);
    for _ in 0..triangle_count {
        triangles.push(JmsTriangle {
            region: lines.value()?,
            shader: lines.value()?,
            vertices: lines.values::<i32, 3>()?,
        });
    }

    let model = JmsModel {
        node_list_checksum,
        nodes,
        materials,
        markers,
        regions,
        vertices,
        triangles,
    };
    model.validate()?;
    Ok(model)
}

pub fn read_jms_file(path: &Path) -> Result<JmsModel> {
    let text = std::fs::read_to_string(path)?;
    parse_jms(&text)
}

impl JmsModel {
    fn validate(&self) -> Result<()> {
        let node_count = self.nodes.len() as i32;
        for marker in &self.markers {
            if marker.parent < 0 || marker.parent >= node_count {
                return Err(TagError::MalformedInput(format!(
                    "marker '{}' is attached to node {} of {}",
                    marker.name, marker.parent, node_count
                )));
            }
        }
        let vertex_count = self.vertices.len() as i32;
        for (i, triangle) in self.triangles.iter().enumerate() {
            if triangle.vertices.iter().any(|&v| v < 0 || v >= vertex_count) {
                return Err(TagError::MalformedInput(format!(
                    "triangle {} references a vertex outside 0..{}",
                    i, vertex_count
                )));
            }
        }
        Ok(())
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.eq_ignore_ascii_case(name))
    }
}
