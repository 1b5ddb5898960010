use crate::math::Point3;
use crate::tag::{tag_block, FourCC, Reflexive, TagDefinition, TagReference};

pub const SHADER_TYPE_TRANSPARENT_CHICAGO: u16 = 6;
pub const SHADER_TYPE_TRANSPARENT_CHICAGO_EXTENDED: u16 = 7;

tag_block! {
    /// Fields every shader class starts with.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ShaderHeader {
        pub radiosity_flags: u16,
        pub detail_level: u16,
        pub power: f32,
        pub color_of_emitted_light: Point3,
        pub tint_color: Point3,
        pub physics_flags: u16,
        pub material_type: u16,
        pub shader_type: u16,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ChicagoMap {
        pub flags: u16,
        pub color_function: u16,
        pub alpha_function: u16,
        pub map_u_scale: f32,
        pub map_v_scale: f32,
        pub map_u_offset: f32,
        pub map_v_offset: f32,
        pub map_rotation: f32,
        pub mipmap_bias: f32,
        pub map: TagReference,
    }
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ExtraLayer {
        pub shader: TagReference,
    }
}

tag_block! {
    /// Transparent chicago shader (`schi`).
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ShaderTransparentChicago {
        pub header: ShaderHeader,
        pub numeric_counter_limit: u8,
        pub chicago_flags: u8,
        pub first_map_type: u16,
        pub framebuffer_blend_function: u16,
        pub framebuffer_fade_mode: u16,
        pub framebuffer_fade_source: u16,
        pub lens_flare_spacing: f32,
        pub lens_flare: TagReference,
        pub extra_layers: Reflexive<ExtraLayer>,
        pub maps: Reflexive<ChicagoMap>,
        pub extra_flags: u32,
    }
}

impl TagDefinition for ShaderTransparentChicago {
    const CLASS: FourCC = FourCC::new(b"schi");
    const VERSION: u16 = 1;
}

tag_block! {
    /// Transparent chicago extended shader (`scex`): separate map sets for
    /// four-stage and two-stage hardware.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ShaderTransparentChicagoExtended {
        pub header: ShaderHeader,
        pub numeric_counter_limit: u8,
        pub chicago_flags: u8,
        pub first_map_type: u16,
        pub framebuffer_blend_function: u16,
        pub framebuffer_fade_mode: u16,
        pub framebuffer_fade_source: u16,
        pub lens_flare_spacing: f32,
        pub lens_flare: TagReference,
        pub extra_layers: Reflexive<ExtraLayer>,
        pub four_stage_maps: Reflexive<ChicagoMap>,
        pub two_stage_maps: Reflexive<ChicagoMap>,
        pub extra_flags: u32,
    }
}

impl TagDefinition for ShaderTransparentChicagoExtended {
    const CLASS: FourCC = FourCC::new(b"scex");
    const VERSION: u16 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{parse_tag, serialize_tag};
    use crate::tags::BITMAP_CLASS;

    #[test]
    fn extended_round_trip() {
        let shader = ShaderTransparentChicagoExtended {
            header: ShaderHeader {
                shader_type: SHADER_TYPE_TRANSPARENT_CHICAGO_EXTENDED,
                ..Default::default()
            },
            four_stage_maps: vec![ChicagoMap {
                map_u_scale: 1.0,
                map_v_scale: 1.0,
                map: TagReference::new(BITMAP_CLASS, "effects\\bitmaps\\glow"),
                ..Default::default()
            }]
            .into(),
            ..Default::default()
        };
        let bytes = serialize_tag(&shader).unwrap();
        assert_eq!(parse_tag::<ShaderTransparentChicagoExtended>(&bytes).unwrap(), shader);
    }
}
