//! Boundary reconstruction for convex regions described only by planes
//! (weather polyhedra carry no vertices or edges of their own).

use cgmath::{InnerSpace, Vector3};

use super::Plane3;

const PARALLEL_EPSILON: f32 = 1e-9;

/// Intersection point of three planes, `None` when any two are parallel.
pub fn intersect_planes(a: &Plane3, b: &Plane3, c: &Plane3) -> Option<Vector3<f32>> {
    let (na, nb, nc) = (a.normal(), b.normal(), c.normal());
    let bc = nb.cross(nc);
    let det = na.dot(bc);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let ca = nc.cross(na);
    let ab = na.cross(nb);
    Some((bc * a.d + ca * b.d + ab * c.d) / det)
}

/// Polygon loops bounding the region `distance(p) <= tolerance` of every plane.
///
/// One loop per plane that contributes a face, each wound counter-clockwise
/// when viewed from the front of its plane. Planes that only touch the region
/// at an edge or a vertex produce no loop.
pub fn polyhedron_faces(planes: &[Plane3], tolerance: f32) -> Vec<Vec<Vector3<f32>>> {
    let mut corners: Vec<Vector3<f32>> = Vec::new();

    for a in 0..planes.len() {
        for b in a + 1..planes.len() {
            for c in b + 1..planes.len() {
                let Some(point) = intersect_planes(&planes[a], &planes[b], &planes[c]) else {
                    continue;
                };
                if planes.iter().any(|plane| plane.distance(point) > tolerance) {
                    continue;
                }
                if corners
                    .iter()
                    .all(|existing| (*existing - point).magnitude() > tolerance)
                {
                    corners.push(point);
                }
            }
        }
    }

    planes
        .iter()
        .filter_map(|plane| {
            let on_plane: Vec<Vector3<f32>> = corners
                .iter()
                .copied()
                .filter(|p| plane.distance(*p).abs() <= tolerance)
                .collect();
            if on_plane.len() < 3 {
                return None;
            }
            Some(order_around_normal(on_plane, plane.normal()))
        })
        .collect()
}

fn order_around_normal(points: Vec<Vector3<f32>>, normal: Vector3<f32>) -> Vec<Vector3<f32>> {
    let centroid = points.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, p| acc + *p)
        / points.len() as f32;

    let u = match points
        .iter()
        .map(|p| *p - centroid)
        .find(|d| d.magnitude2() > 0.0)
    {
        Some(d) => d.normalize(),
        None => return points,
    };
    let v = normal.cross(u);

    let mut keyed: Vec<(f32, Vector3<f32>)> = points
        .into_iter()
        .map(|p| {
            let d = p - centroid;
            (d.dot(v).atan2(d.dot(u)), p)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, p)| p).collect()
}
