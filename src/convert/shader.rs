//! Transparent chicago extended shader → transparent chicago shader.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Converted, Diagnostic, FileOutcome};
use crate::tag::{read_tag_file, write_tag_file};
use crate::tags::shader::{
    ShaderHeader, ShaderTransparentChicago, ShaderTransparentChicagoExtended, SHADER_TYPE_TRANSPARENT_CHICAGO,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConvertOptions {
    /// Take the two-stage map set instead of the four-stage one.
    pub prefer_two_stage_maps: bool,
}

pub fn chicago_extended_to_chicago(
    extended: &ShaderTransparentChicagoExtended,
    options: &ShaderConvertOptions,
) -> Converted<ShaderTransparentChicago> {
    let mut diagnostics = Vec::new();

    let (preferred, fallback, preferred_name) = if options.prefer_two_stage_maps {
        (&extended.two_stage_maps, &extended.four_stage_maps, "two-stage")
    } else {
        (&extended.four_stage_maps, &extended.two_stage_maps, "four-stage")
    };
    let maps = if preferred.is_empty() && !fallback.is_empty() {
        diagnostics.push(Diagnostic::info(format!(
            "shader has no {} maps, using the other map set",
            preferred_name
        )));
        fallback.clone()
    } else {
        preferred.clone()
    };

    let shader = ShaderTransparentChicago {
        header: ShaderHeader {
            shader_type: SHADER_TYPE_TRANSPARENT_CHICAGO,
            ..extended.header.clone()
        },
        numeric_counter_limit: extended.numeric_counter_limit,
        chicago_flags: extended.chicago_flags,
        first_map_type: extended.first_map_type,
        framebuffer_blend_function: extended.framebuffer_blend_function,
        framebuffer_fade_mode: extended.framebuffer_fade_mode,
        framebuffer_fade_source: extended.framebuffer_fade_source,
        lens_flare_spacing: extended.lens_flare_spacing,
        lens_flare: extended.lens_flare.clone(),
        extra_layers: extended.extra_layers.clone(),
        maps,
        extra_flags: extended.extra_flags,
    };

    Converted {
        tag: shader,
        diagnostics,
    }
}

pub fn convert_shader_file(source: &Path, destination: &Path, options: &ShaderConvertOptions) -> anyhow::Result<FileOutcome> {
    let extended: ShaderTransparentChicagoExtended =
        read_tag_file(source).with_context(|| format!("Failed to read shader {}", source.display()))?;
    let converted = chicago_extended_to_chicago(&extended, options);
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(path = %source.display(), maps = converted.tag.maps.len(), "converted chicago extended shader");
    Ok(FileOutcome::written(converted.diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagReference;
    use crate::tags::shader::{ChicagoMap, ExtraLayer, SHADER_TYPE_TRANSPARENT_CHICAGO_EXTENDED};
    use crate::tags::{BITMAP_CLASS, LENS_FLARE_CLASS};

    fn map(path: &str) -> ChicagoMap {
        ChicagoMap {
            map_u_scale: 1.0,
            map_v_scale: 1.0,
            map: TagReference::new(BITMAP_CLASS, path),
            ..Default::default()
        }
    }

    fn extended() -> ShaderTransparentChicagoExtended {
        ShaderTransparentChicagoExtended {
            header: ShaderHeader {
                power: 2.0,
                material_type: 5,
                shader_type: SHADER_TYPE_TRANSPARENT_CHICAGO_EXTENDED,
                ..Default::default()
            },
            framebuffer_blend_function: 3,
            lens_flare_spacing: 1.5,
            lens_flare: TagReference::new(LENS_FLARE_CLASS, "effects\\flares\\glint"),
            extra_layers: vec![ExtraLayer::default()].into(),
            four_stage_maps: vec![map("a"), map("b"), map("c")].into(),
            two_stage_maps: vec![map("a2")].into(),
            extra_flags: 1,
            ..Default::default()
        }
    }

    #[test]
    fn four_stage_maps_by_default() {
        let converted = chicago_extended_to_chicago(&extended(), &Default::default());
        let shader = converted.tag;
        assert_eq!(shader.maps.len(), 3);
        assert_eq!(shader.header.shader_type, SHADER_TYPE_TRANSPARENT_CHICAGO);
        assert_eq!(shader.header.power, 2.0);
        assert_eq!(shader.header.material_type, 5);
        assert_eq!(shader.framebuffer_blend_function, 3);
        assert_eq!(shader.lens_flare.path, "effects\\flares\\glint");
        assert_eq!(shader.extra_layers.len(), 1);
        assert_eq!(shader.extra_flags, 1);
        assert!(converted.diagnostics.is_empty());
    }

    #[test]
    fn two_stage_maps_on_request() {
        let options = ShaderConvertOptions {
            prefer_two_stage_maps: true,
        };
        let shader = chicago_extended_to_chicago(&extended(), &options).tag;
        assert_eq!(shader.maps.len(), 1);
        assert_eq!(shader.maps[0].map.path, "a2");
    }

    #[test]
    fn empty_four_stage_set_falls_back() {
        let mut source = extended();
        source.four_stage_maps.clear();
        let converted = chicago_extended_to_chicago(&source, &Default::default());
        assert_eq!(converted.tag.maps.len(), 1);
        assert_eq!(converted.diagnostics.len(), 1);
    }
}
