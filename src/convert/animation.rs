//! Legacy (v3) animation graphs → current (v4) layout.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Converted, Diagnostic, FileOutcome};
use crate::error::{Result, TagError};
use crate::tag::{parse_tag, peek_header, write_tag_file, TagDefinition};
use crate::tags::animation::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConvertOptions {
    /// Skip graphs already in the current layout; otherwise they are re-saved unchanged.
    pub skip_current: bool,
}

impl Default for AnimationConvertOptions {
    fn default() -> Self {
        Self { skip_current: true }
    }
}

fn animation_type(legacy: u16) -> Option<u16> {
    match legacy {
        LEGACY_TYPE_OVERLAY => Some(ANIMATION_TYPE_OVERLAY),
        LEGACY_TYPE_BASE => Some(ANIMATION_TYPE_BASE),
        LEGACY_TYPE_REPLACEMENT => Some(ANIMATION_TYPE_REPLACEMENT),
        _ => None,
    }
}

fn frame_info_type(legacy: u16) -> Option<u16> {
    match legacy {
        LEGACY_FRAME_INFO_NONE => Some(FRAME_INFO_NONE),
        LEGACY_FRAME_INFO_DX_DY_DYAW => Some(FRAME_INFO_DX_DY_DYAW),
        LEGACY_FRAME_INFO_DX_DY => Some(FRAME_INFO_DX_DY),
        LEGACY_FRAME_INFO_DX_DY_DZ_DYAW => Some(FRAME_INFO_DX_DY_DZ_DYAW),
        _ => None,
    }
}

/// Current flag bits for a legacy compression mode.
fn compression_flags(legacy: u16) -> Option<u16> {
    match legacy {
        LEGACY_COMPRESSION_NONE => Some(0),
        LEGACY_COMPRESSION_QUANTIZED => Some(ANIMATION_FLAG_COMPRESSED_DATA),
        _ => None,
    }
}

fn unknown(animation: &LegacyAnimation, field: &str, value: u16) -> TagError {
    TagError::MalformedInput(format!(
        "animation '{}' has unknown {} {}",
        animation.name, field, value
    ))
}

fn convert_animation(legacy: &LegacyAnimation) -> Result<Animation> {
    let animation_type =
        animation_type(legacy.animation_type).ok_or_else(|| unknown(legacy, "type", legacy.animation_type))?;
    let frame_info_type = frame_info_type(legacy.frame_info_type)
        .ok_or_else(|| unknown(legacy, "frame info type", legacy.frame_info_type))?;
    let compression = compression_flags(legacy.compression)
        .ok_or_else(|| unknown(legacy, "compression", legacy.compression))?;

    Ok(Animation {
        name: legacy.name.clone(),
        animation_type,
        frame_count: legacy.frame_count,
        frame_size: legacy.frame_size,
        frame_info_type,
        node_list_checksum: legacy.node_list_checksum,
        node_count: legacy.node_count,
        loop_frame_index: legacy.loop_frame_index,
        weight: legacy.weight,
        key_frame_index: legacy.key_frame_index,
        second_key_frame_index: legacy.second_key_frame_index,
        next_animation: legacy.next_animation,
        flags: (legacy.flags & !ANIMATION_FLAG_COMPRESSED_DATA) | compression,
        sound: legacy.sound,
        sound_frame_index: legacy.sound_frame_index,
        left_foot_frame_index: legacy.left_foot_frame_index,
        right_foot_frame_index: legacy.right_foot_frame_index,
        frame_info: legacy.frame_info.clone(),
        node_trans_flag_data0: legacy.node_trans_flag_data,
        node_trans_flag_data1: 0,
        node_rotation_flag_data0: legacy.node_rotation_flag_data,
        node_rotation_flag_data1: 0,
        node_scale_flag_data0: legacy.node_scale_flag_data,
        node_scale_flag_data1: 0,
        offset_to_compressed_data: 0,
        default_data: legacy.default_data.clone(),
        frame_data: legacy.frame_data.clone(),
    })
}

pub fn upgrade_animation_graph(legacy: &LegacyAnimationGraph) -> anyhow::Result<Converted<AnimationGraph>> {
    let mut diagnostics = Vec::new();
    let animations = legacy
        .animations
        .iter()
        .map(convert_animation)
        .collect::<Result<Vec<_>>>()?;

    let compressed = animations
        .iter()
        .filter(|a| a.flags & ANIMATION_FLAG_COMPRESSED_DATA != 0)
        .count();
    if compressed > 0 {
        diagnostics.push(Diagnostic::info(format!(
            "{} of {} animations carry compressed frame data",
            compressed,
            animations.len()
        )));
    }
    debug!(animations = animations.len(), "upgraded animation graph");

    Ok(Converted {
        tag: AnimationGraph {
            flags: legacy.flags,
            limp_body_node_radius: legacy.limp_body_node_radius,
            nodes: legacy.nodes.clone(),
            sound_references: legacy.sound_references.clone(),
            animations: animations.into(),
        },
        diagnostics,
    })
}

/// Upgrade one animation tag. `destination` may be the source itself.
pub fn convert_animation_file(
    source: &Path,
    destination: &Path,
    options: &AnimationConvertOptions,
) -> anyhow::Result<FileOutcome> {
    let bytes = std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let header = peek_header(&bytes).with_context(|| format!("Failed to read tag header of {}", source.display()))?;

    if header.version == AnimationGraph::VERSION {
        if options.skip_current {
            return Ok(FileOutcome::Skipped {
                reason: format!("already version {}", header.version),
            });
        }
        let current: AnimationGraph =
            parse_tag(&bytes).with_context(|| format!("Failed to parse animation graph {}", source.display()))?;
        write_tag_file(destination, &current)
            .with_context(|| format!("Failed to write {}", destination.display()))?;
        return Ok(FileOutcome::written(Vec::new()));
    }

    let legacy: LegacyAnimationGraph =
        parse_tag(&bytes).with_context(|| format!("Failed to parse animation graph {}", source.display()))?;
    let converted = upgrade_animation_graph(&legacy)?;
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(
        path = %source.display(),
        animations = converted.tag.animations.len(),
        "upgraded animation graph"
    );
    Ok(FileOutcome::written(converted.diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{serialize_tag, TagData};

    fn legacy_animation(animation_type: u16, frame_info_type: u16, compression: u16) -> LegacyAnimation {
        LegacyAnimation {
            name: "walk".into(),
            animation_type,
            frame_count: 30,
            frame_size: 12,
            frame_info_type,
            compression,
            flags: ANIMATION_FLAG_WORLD_RELATIVE,
            frame_info: TagData::new(vec![1; 12]),
            node_trans_flag_data: 0b101,
            node_rotation_flag_data: 0xFFFF_FFFF,
            node_scale_flag_data: 0,
            default_data: TagData::new(vec![2; 8]),
            frame_data: TagData::new(vec![3; 16]),
            ..Default::default()
        }
    }

    fn graph(animations: Vec<LegacyAnimation>) -> LegacyAnimationGraph {
        LegacyAnimationGraph {
            limp_body_node_radius: 0.4,
            nodes: vec![AnimationNode {
                name: "bip01 pelvis".into(),
                parent_node_index: -1,
                ..Default::default()
            }]
            .into(),
            animations: animations.into(),
            ..Default::default()
        }
    }

    #[test]
    fn enum_tables() {
        assert_eq!(animation_type(LEGACY_TYPE_OVERLAY), Some(ANIMATION_TYPE_OVERLAY));
        assert_eq!(animation_type(LEGACY_TYPE_BASE), Some(ANIMATION_TYPE_BASE));
        assert_eq!(animation_type(LEGACY_TYPE_REPLACEMENT), Some(ANIMATION_TYPE_REPLACEMENT));
        assert_eq!(animation_type(3), None);

        assert_eq!(frame_info_type(LEGACY_FRAME_INFO_DX_DY_DYAW), Some(FRAME_INFO_DX_DY_DYAW));
        assert_eq!(frame_info_type(LEGACY_FRAME_INFO_DX_DY), Some(FRAME_INFO_DX_DY));
        assert_eq!(frame_info_type(4), None);

        assert_eq!(compression_flags(LEGACY_COMPRESSION_QUANTIZED), Some(ANIMATION_FLAG_COMPRESSED_DATA));
        assert_eq!(compression_flags(2), None);
    }

    #[test]
    fn blocks_and_data_are_copied() {
        let source = graph(vec![legacy_animation(LEGACY_TYPE_BASE, LEGACY_FRAME_INFO_DX_DY, LEGACY_COMPRESSION_NONE)]);
        let converted = upgrade_animation_graph(&source).unwrap();
        let graph = converted.tag;
        assert_eq!(graph.nodes, source.nodes);
        assert_eq!(graph.limp_body_node_radius, 0.4);

        let animation = &graph.animations[0];
        assert_eq!(animation.animation_type, ANIMATION_TYPE_BASE);
        assert_eq!(animation.frame_info_type, FRAME_INFO_DX_DY);
        assert_eq!(animation.flags, ANIMATION_FLAG_WORLD_RELATIVE);
        assert_eq!(animation.frame_info.bytes, vec![1; 12]);
        assert_eq!(animation.default_data.bytes, vec![2; 8]);
        assert_eq!(animation.frame_data.bytes, vec![3; 16]);
        assert_eq!(animation.node_trans_flag_data0, 0b101);
        assert_eq!(animation.node_trans_flag_data1, 0);
        assert_eq!(animation.node_rotation_flag_data0, 0xFFFF_FFFF);
        assert!(converted.diagnostics.is_empty());
    }

    #[test]
    fn quantized_sets_compressed_flag() {
        let source = graph(vec![legacy_animation(
            LEGACY_TYPE_OVERLAY,
            LEGACY_FRAME_INFO_NONE,
            LEGACY_COMPRESSION_QUANTIZED,
        )]);
        let converted = upgrade_animation_graph(&source).unwrap();
        let animation = &converted.tag.animations[0];
        assert_eq!(animation.animation_type, ANIMATION_TYPE_OVERLAY);
        assert_eq!(
            animation.flags,
            ANIMATION_FLAG_WORLD_RELATIVE | ANIMATION_FLAG_COMPRESSED_DATA
        );
        assert_eq!(converted.diagnostics.len(), 1);
    }

    #[test]
    fn unknown_enum_value_is_malformed() {
        let source = graph(vec![legacy_animation(9, LEGACY_FRAME_INFO_NONE, LEGACY_COMPRESSION_NONE)]);
        let err = upgrade_animation_graph(&source).unwrap_err();
        assert!(matches!(err.downcast_ref::<TagError>(), Some(TagError::MalformedInput(_))));
        assert!(err.to_string().contains("walk"));
    }

    #[test]
    fn file_upgrade_in_place_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyborg.model_animations");
        let source = graph(vec![legacy_animation(LEGACY_TYPE_BASE, LEGACY_FRAME_INFO_NONE, LEGACY_COMPRESSION_NONE)]);
        std::fs::write(&path, serialize_tag(&source).unwrap()).unwrap();

        let outcome = convert_animation_file(&path, &path, &Default::default()).unwrap();
        assert!(matches!(outcome, FileOutcome::Written { .. }));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(peek_header(&bytes).unwrap().version, AnimationGraph::VERSION);
        assert_eq!(parse_tag::<AnimationGraph>(&bytes).unwrap().animations.len(), 1);

        let again = convert_animation_file(&path, &path, &Default::default()).unwrap();
        assert!(matches!(again, FileOutcome::Skipped { .. }));
    }
}
