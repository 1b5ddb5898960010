use crate::math::Point3;
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagDefinition};

tag_block! {
    /// Rigid body physics (`phys`).
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Physics {
        pub radius: f32,
        pub moment_scale: f32,
        pub mass: f32,
        pub center_of_mass: Point3,
        pub density: f32,
        pub gravity_scale: f32,
        pub ground_friction: f32,
        pub ground_depth: f32,
        pub ground_damp_fraction: f32,
        pub ground_normal_k1: f32,
        pub ground_normal_k0: f32,
        pub water_friction: f32,
        pub water_depth: f32,
        pub water_density: f32,
        pub air_friction: f32,
        pub xx_moment: f32,
        pub yy_moment: f32,
        pub zz_moment: f32,
        pub powered_mass_points: Reflexive<PoweredMassPoint>,
        pub mass_points: Reflexive<MassPoint>,
    }
}

impl TagDefinition for Physics {
    const CLASS: FourCC = FourCC::new(b"phys");
    const VERSION: u16 = 4;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct PoweredMassPoint {
        pub name: String32,
        pub flags: u32,
        pub antigrav_strength: f32,
        pub antigrav_offset: f32,
        pub antigrav_height: f32,
        pub antigrav_damp_fraction: f32,
        pub antigrav_normal_k1: f32,
        pub antigrav_normal_k0: f32,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct MassPoint {
        pub name: String32,
        pub powered_mass_point: i16,
        pub model_node: i16,
        pub flags: u32,
        pub relative_mass: f32,
        pub mass: f32,
        pub relative_density: f32,
        pub density: f32,
        pub position: Point3,
        pub forward: Point3,
        pub up: Point3,
        pub friction_type: u16,
        pub friction_parallel_scale: f32,
        pub friction_perpendicular_scale: f32,
        pub radius: f32,
    }
}

impl MassPoint {
    pub const METALLIC: u32 = 0x1;

    /// A mass point with default tunables.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            powered_mass_point: -1,
            model_node: -1,
            relative_mass: 1.0,
            relative_density: 1.0,
            friction_parallel_scale: 1.0,
            friction_perpendicular_scale: 1.0,
            ..Default::default()
        }
    }
}

impl Physics {
    pub fn new() -> Self {
        Self {
            moment_scale: 1.0,
            mass: 1.0,
            density: 1.0,
            gravity_scale: 1.0,
            ..Default::default()
        }
    }
}
