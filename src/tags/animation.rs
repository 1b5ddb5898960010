//! Model animation graphs (`antr`) in the current layout (v4) and the legacy
//! layout (v3), which stores per-node flags in a single word and keeps its own
//! enumerations for animation type, frame info and compression.

use crate::math::Point3;
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagData, TagDefinition, TagReference};

pub const ANIMATION_TYPE_BASE: u16 = 0;
pub const ANIMATION_TYPE_OVERLAY: u16 = 1;
pub const ANIMATION_TYPE_REPLACEMENT: u16 = 2;

pub const FRAME_INFO_NONE: u16 = 0;
pub const FRAME_INFO_DX_DY: u16 = 1;
pub const FRAME_INFO_DX_DY_DYAW: u16 = 2;
pub const FRAME_INFO_DX_DY_DZ_DYAW: u16 = 3;

/// `Animation::flags` bit marking `frame_data` as compressed.
pub const ANIMATION_FLAG_COMPRESSED_DATA: u16 = 0x1;
pub const ANIMATION_FLAG_WORLD_RELATIVE: u16 = 0x2;

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct AnimationNode {
        pub name: String32,
        pub next_sibling_node_index: i16,
        pub first_child_node_index: i16,
        pub parent_node_index: i16,
        pub node_joint_flags: u32,
        pub base_vector: Point3,
        pub vector_range: f32,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct AnimationSoundReference {
        pub sound: TagReference,
    }
}

tag_block! {
    /// Animation graph (`antr`) in the current layout.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct AnimationGraph {
        pub flags: u16,
        pub limp_body_node_radius: f32,
        pub nodes: Reflexive<AnimationNode>,
        pub sound_references: Reflexive<AnimationSoundReference>,
        pub animations: Reflexive<Animation>,
    }
}

impl TagDefinition for AnimationGraph {
    const CLASS: FourCC = FourCC::new(b"antr");
    const VERSION: u16 = 4;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Animation {
        pub name: String32,
        pub animation_type: u16,
        pub frame_count: i16,
        pub frame_size: i16,
        pub frame_info_type: u16,
        pub node_list_checksum: i32,
        pub node_count: i16,
        pub loop_frame_index: i16,
        pub weight: f32,
        pub key_frame_index: i16,
        pub second_key_frame_index: i16,
        pub next_animation: i16,
        pub flags: u16,
        pub sound: i16,
        pub sound_frame_index: i16,
        pub left_foot_frame_index: i8,
        pub right_foot_frame_index: i8,
        /// Root motion per frame.
        pub frame_info: TagData,
        pub node_trans_flag_data0: u32,
        pub node_trans_flag_data1: u32,
        pub node_rotation_flag_data0: u32,
        pub node_rotation_flag_data1: u32,
        pub node_scale_flag_data0: u32,
        pub node_scale_flag_data1: u32,
        pub offset_to_compressed_data: u32,
        pub default_data: TagData,
        pub frame_data: TagData,
    }
}

tag_block! {
    /// Animation graph (`antr`) in the legacy layout.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct LegacyAnimationGraph {
        pub flags: u16,
        pub limp_body_node_radius: f32,
        pub nodes: Reflexive<AnimationNode>,
        pub sound_references: Reflexive<AnimationSoundReference>,
        pub animations: Reflexive<LegacyAnimation>,
    }
}

impl TagDefinition for LegacyAnimationGraph {
    const CLASS: FourCC = FourCC::new(b"antr");
    const VERSION: u16 = 3;
}

pub const LEGACY_TYPE_OVERLAY: u16 = 0;
pub const LEGACY_TYPE_BASE: u16 = 1;
pub const LEGACY_TYPE_REPLACEMENT: u16 = 2;

pub const LEGACY_FRAME_INFO_NONE: u16 = 0;
pub const LEGACY_FRAME_INFO_DX_DY_DYAW: u16 = 1;
pub const LEGACY_FRAME_INFO_DX_DY: u16 = 2;
pub const LEGACY_FRAME_INFO_DX_DY_DZ_DYAW: u16 = 3;

pub const LEGACY_COMPRESSION_NONE: u16 = 0;
pub const LEGACY_COMPRESSION_QUANTIZED: u16 = 1;

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct LegacyAnimation {
        pub name: String32,
        pub animation_type: u16,
        pub frame_count: i16,
        pub frame_size: i16,
        pub frame_info_type: u16,
        pub node_list_checksum: i32,
        pub node_count: i16,
        pub loop_frame_index: i16,
        pub weight: f32,
        pub key_frame_index: i16,
        pub second_key_frame_index: i16,
        pub next_animation: i16,
        pub flags: u16,
        pub compression: u16,
        pub sound: i16,
        pub sound_frame_index: i16,
        pub left_foot_frame_index: i8,
        pub right_foot_frame_index: i8,
        pub frame_info: TagData,
        pub node_trans_flag_data: u32,
        pub node_rotation_flag_data: u32,
        pub node_scale_flag_data: u32,
        pub default_data: TagData,
        pub frame_data: TagData,
    }
}
