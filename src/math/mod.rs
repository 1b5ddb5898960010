pub mod polyhedron;

use binrw::binrw;
use cgmath::{Matrix3, Quaternion as CgQuaternion, Vector2, Vector3};

use crate::tag::impl_leaf_block;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Point3(Vector3::new(x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl From<Vector3<f32>> for Point3 {
    fn from(v: Vector3<f32>) -> Self {
        Point3(v)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl Default for Point2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

/// Stored as `i, j, k, w`.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion(
    #[br(map = |raw: [f32; 4]| CgQuaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &CgQuaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub CgQuaternion<f32>,
);

impl Quaternion {
    pub fn new(i: f32, j: f32, k: f32, w: f32) -> Self {
        Quaternion(CgQuaternion::new(w, i, j, k))
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn to_matrix(&self) -> Matrix3<f32> {
        quaternion_to_matrix(self.0.v.x, self.0.v.y, self.0.v.z, self.0.s)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// `i*x + j*y + k*z = d`; points with positive distance are in front.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane3 {
    pub i: f32,
    pub j: f32,
    pub k: f32,
    pub d: f32,
}

impl Plane3 {
    pub fn new(i: f32, j: f32, k: f32, d: f32) -> Self {
        Self { i, j, k, d }
    }

    pub fn normal(&self) -> Vector3<f32> {
        Vector3::new(self.i, self.j, self.k)
    }

    pub fn distance(&self, p: Vector3<f32>) -> f32 {
        self.i * p.x + self.j * p.y + self.k * p.z - self.d
    }

    pub fn flipped(&self) -> Self {
        Self::new(-self.i, -self.j, -self.k, -self.d)
    }
}

impl_leaf_block!(Point3, Point2, Quaternion, Plane3);

/// Rotation matrix of a quaternion given as `(i, j, k, w)`.
///
/// The input is not normalized; a non-unit quaternion yields a scaled,
/// non-orthonormal matrix.
pub fn quaternion_to_matrix(i: f32, j: f32, k: f32, w: f32) -> Matrix3<f32> {
    let ii = i * i;
    let jj = j * j;
    let kk = k * k;
    let ij = i * j;
    let ik = i * k;
    let jk = j * k;
    let iw = i * w;
    let jw = j * w;
    let kw = k * w;

    // cgmath takes columns
    Matrix3::new(
        1.0 - 2.0 * (jj + kk),
        2.0 * (ij + kw),
        2.0 * (ik - jw),
        2.0 * (ij - kw),
        1.0 - 2.0 * (ii + kk),
        2.0 * (jk + iw),
        2.0 * (ik + jw),
        2.0 * (jk - iw),
        1.0 - 2.0 * (ii + jj),
    )
}

pub fn mat3_mul_vec3(m: &Matrix3<f32>, v: Vector3<f32>) -> Vector3<f32> {
    m * v
}

pub fn mat3_mul_mat3(a: &Matrix3<f32>, b: &Matrix3<f32>) -> Matrix3<f32> {
    a * b
}
