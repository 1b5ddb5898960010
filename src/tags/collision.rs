use crate::math::{Plane3, Point3};
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagDefinition};

tag_block! {
    /// Collision model (`coll`).
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionModel {
        pub flags: u32,
        pub indirect_damage_material: i16,
        pub maximum_body_vitality: f32,
        pub maximum_shield_vitality: f32,
        pub materials: Reflexive<CollisionMaterial>,
        pub regions: Reflexive<CollisionRegion>,
        pub pathfinding_spheres: Reflexive<PathfindingSphere>,
        pub nodes: Reflexive<CollisionNode>,
    }
}

impl TagDefinition for CollisionModel {
    const CLASS: FourCC = FourCC::new(b"coll");
    const VERSION: u16 = 10;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionMaterial {
        pub name: String32,
        pub flags: u32,
        pub material_type: i16,
        pub shield_leak_percentage: f32,
        pub shield_damage_multiplier: f32,
        pub body_damage_multiplier: f32,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionRegion {
        pub name: String32,
        pub flags: u32,
        pub damage_threshold: f32,
        pub permutations: Reflexive<CollisionPermutation>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionPermutation {
        pub name: String32,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct PathfindingSphere {
        pub node: i16,
        pub center: Point3,
        pub radius: f32,
    }
}

tag_block! {
    /// One node's collision; `bsps[p]` is the geometry of permutation `p`
    /// of the node's region.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionNode {
        pub name: String32,
        pub region: i16,
        pub parent_node: i16,
        pub next_sibling_node: i16,
        pub first_child_node: i16,
        pub bsps: Reflexive<CollisionBsp>,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CollisionBsp {
        pub bsp3d_nodes: Reflexive<Bsp3dNode>,
        pub planes: Reflexive<Plane3>,
        pub leaves: Reflexive<BspLeaf>,
        pub bsp2d_references: Reflexive<Bsp2dReference>,
        pub bsp2d_nodes: Reflexive<Bsp2dNode>,
        pub surfaces: Reflexive<BspSurface>,
        pub edges: Reflexive<BspEdge>,
        pub vertices: Reflexive<BspVertex>,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Bsp3dNode {
        pub plane: i32,
        pub back_child: i32,
        pub front_child: i32,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BspLeaf {
        pub flags: u16,
        pub bsp2d_reference_count: i16,
        pub first_bsp2d_reference: i32,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Bsp2dReference {
        pub plane: i32,
        pub bsp2d_node: i32,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Bsp2dNode {
        pub plane_i: f32,
        pub plane_j: f32,
        pub plane_d: f32,
        pub left_child: i32,
        pub right_child: i32,
    }
}

tag_block! {
    /// A convex polygon. The high bit of `plane` means it faces away from the plane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BspSurface {
        pub plane: i32,
        pub first_edge: i32,
        pub flags: u8,
        pub breakable_surface: i8,
        pub material: i16,
    }
}

impl BspSurface {
    pub const TWO_SIDED: u8 = 0x1;
    pub const INVISIBLE: u8 = 0x2;
    pub const CLIMBABLE: u8 = 0x4;
    pub const BREAKABLE: u8 = 0x8;
    pub const LARGE_COLLIDEABLE: u8 = 0x10;

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Plane index with the facing bit stripped, and whether the surface faces away from it.
    pub fn plane_index(&self) -> (usize, bool) {
        let flipped = self.plane < 0;
        ((self.plane as u32 & 0x7FFF_FFFF) as usize, flipped)
    }
}

tag_block! {
    /// Half-edge pair: walking `left_surface` goes start→end then `forward_edge`,
    /// walking `right_surface` goes end→start then `reverse_edge`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BspEdge {
        pub start_vertex: i32,
        pub end_vertex: i32,
        pub forward_edge: i32,
        pub reverse_edge: i32,
        pub left_surface: i32,
        pub right_surface: i32,
    }
}

tag_block! {
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct BspVertex {
        pub point: Point3,
        pub first_edge: i32,
    }
}

impl CollisionModel {
    /// Regions and their permutation counts, in tag order.
    pub fn permutation_counts(&self) -> Vec<usize> {
        self.regions.iter().map(|r| r.permutations.len()).collect()
    }
}
