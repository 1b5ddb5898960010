//! Polygon topology: triangulating edge loops and recovering edge loops from
//! a collision BSP's half-edge structure.

use std::collections::BTreeMap;

use crate::error::{Result, TagError};
use crate::tags::collision::{BspEdge, BspSurface};

/// One output triangle, indices already offset into the destination vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triangle<K> {
    pub key: K,
    pub indices: [u32; 3],
}

/// Ordered boundary walk of one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLoop {
    pub surface: usize,
    /// Vertex indices in walk order.
    pub vertices: Vec<usize>,
}

/// Triangulate a polygon boundary as a fan around `edge_loop[0]` or as an
/// alternating strip. Winding follows the loop's winding in both modes.
///
/// The strip zig-zags from both ends of the loop, so for four or more
/// vertices its first triangle is `(v0, v1, v[n-1])` rather than `(v0, v1, v2)`.
pub fn edge_loop_to_tris<K: Clone>(
    edge_loop: &[usize],
    key: K,
    base_vertex_offset: u32,
    make_fans: bool,
) -> Vec<Triangle<K>> {
    let n = edge_loop.len();
    if n < 3 {
        return Vec::new();
    }
    let index = |i: usize| edge_loop[i] as u32 + base_vertex_offset;

    if make_fans {
        return (1..n - 1)
            .map(|i| Triangle {
                key: key.clone(),
                indices: [index(0), index(i), index(i + 1)],
            })
            .collect();
    }

    // zig-zag across the polygon: 0, 1, n-1, 2, n-2, ...
    let mut order = Vec::with_capacity(n);
    let (mut lo, mut hi) = (0usize, n - 1);
    order.push(lo);
    lo += 1;
    let mut take_low = true;
    while lo <= hi {
        if take_low {
            order.push(lo);
            lo += 1;
        } else {
            order.push(hi);
            hi -= 1;
        }
        take_low = !take_low;
    }

    (0..n - 2)
        .map(|t| {
            let (a, b, c) = (order[t], order[t + 1], order[t + 2]);
            let indices = if t % 2 == 0 {
                [index(a), index(b), index(c)]
            } else {
                [index(b), index(a), index(c)]
            };
            Triangle {
                key: key.clone(),
                indices,
            }
        })
        .collect()
}

/// Walk every surface's edge ring and group the resulting loops by `key_fn`.
///
/// The walk is bounded by the edge count, so a ring that never returns to the
/// surface's first edge is reported as malformed input instead of looping.
pub fn get_surface_edge_loops<K, F>(
    surfaces: &[BspSurface],
    edges: &[BspEdge],
    mut key_fn: F,
) -> Result<BTreeMap<K, Vec<EdgeLoop>>>
where
    K: Ord,
    F: FnMut(usize, &BspSurface) -> K,
{
    let mut loops: BTreeMap<K, Vec<EdgeLoop>> = BTreeMap::new();

    for (surface_index, surface) in surfaces.iter().enumerate() {
        let vertices = walk_surface(surface_index, surface, edges)?;
        loops
            .entry(key_fn(surface_index, surface))
            .or_default()
            .push(EdgeLoop {
                surface: surface_index,
                vertices,
            });
    }

    Ok(loops)
}

fn walk_surface(surface_index: usize, surface: &BspSurface, edges: &[BspEdge]) -> Result<Vec<usize>> {
    let first_edge = edge_slot(surface.first_edge, edges.len()).ok_or_else(|| {
        TagError::MalformedInput(format!(
            "surface {} starts at invalid edge {}",
            surface_index, surface.first_edge
        ))
    })?;

    let mut vertices = Vec::new();
    let mut edge_index = first_edge;
    loop {
        let edge = &edges[edge_index];
        let (vertex, next) = if edge.left_surface == surface_index as i32 {
            (edge.start_vertex, edge.forward_edge)
        } else {
            (edge.end_vertex, edge.reverse_edge)
        };

        if vertex < 0 {
            return Err(TagError::MalformedInput(format!(
                "edge {} of surface {} has no vertex",
                edge_index, surface_index
            )));
        }
        vertices.push(vertex as usize);

        edge_index = edge_slot(next, edges.len()).ok_or_else(|| {
            TagError::MalformedInput(format!(
                "edge {} of surface {} links to invalid edge {}",
                edge_index, surface_index, next
            ))
        })?;
        if edge_index == first_edge {
            return Ok(vertices);
        }
        if vertices.len() > edges.len() {
            return Err(TagError::MalformedInput(format!(
                "edge ring of surface {} does not close",
                surface_index
            )));
        }
    }
}

fn edge_slot(index: i32, edge_count: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < edge_count)
}
