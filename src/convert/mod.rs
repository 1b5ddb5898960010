//! Tag format converters and the context they run in.
//!
//! Every converter is a pure function from a typed source to a typed
//! destination plus diagnostics. The `*_file` wrappers add the IO and are
//! what the batch driver calls.

pub mod animation;
pub mod bsp_to_model;
pub mod collision_to_model;
pub mod dds_to_bitmap;
pub mod model_to_physics;
pub mod shader;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use animation::AnimationConvertOptions;
pub use bsp_to_model::BspConvertOptions;
pub use collision_to_model::CollisionConvertOptions;
pub use dds_to_bitmap::BitmapConvertOptions;
pub use model_to_physics::PhysicsConvertOptions;
pub use shader::ShaderConvertOptions;

pub const GBXMODEL_EXTENSION: &str = "gbxmodel";
pub const COLLISION_EXTENSION: &str = "model_collision_geometry";
pub const STRUCTURE_BSP_EXTENSION: &str = "scenario_structure_bsp";
pub const PHYSICS_EXTENSION: &str = "physics";
pub const JMS_EXTENSION: &str = "jms";
pub const DDS_EXTENSION: &str = "dds";
pub const BITMAP_EXTENSION: &str = "bitmap";
pub const CHICAGO_EXTENSION: &str = "shader_transparent_chicago";
pub const CHICAGO_EXTENDED_EXTENSION: &str = "shader_transparent_chicago_extended";
pub const ANIMATIONS_EXTENSION: &str = "model_animations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// Non-fatal finding produced while converting one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            DiagnosticLevel::Info => write!(f, "info: {}", self.message),
            DiagnosticLevel::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

/// Converted tag plus everything worth telling the user about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<T> {
    pub tag: T,
    pub diagnostics: Vec<Diagnostic>,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Written { diagnostics: Vec<Diagnostic> },
    Skipped { reason: String },
}

impl FileOutcome {
    pub fn written(diagnostics: Vec<Diagnostic>) -> Self {
        Self::Written { diagnostics }
    }
}

/// Options for every converter plus where outputs go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionContext {
    /// Outputs mirror the source tree under this directory; `None` writes beside the source.
    pub output_directory: Option<PathBuf>,
    pub collision: CollisionConvertOptions,
    pub bsp: BspConvertOptions,
    pub physics: PhysicsConvertOptions,
    pub bitmap: BitmapConvertOptions,
    pub shader: ShaderConvertOptions,
    pub animation: AnimationConvertOptions,
}

impl ConversionContext {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read conversion settings {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse conversion settings {}", path.display()))
    }
}

/// The conversions a batch can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    CollisionToModel,
    BspToModel,
    JmsToPhysics,
    DdsToBitmap,
    ChicagoExtendedToChicago,
    LegacyAnimations,
}

impl ConversionKind {
    pub fn source_extension(self) -> &'static str {
        match self {
            Self::CollisionToModel => COLLISION_EXTENSION,
            Self::BspToModel => STRUCTURE_BSP_EXTENSION,
            Self::JmsToPhysics => JMS_EXTENSION,
            Self::DdsToBitmap => DDS_EXTENSION,
            Self::ChicagoExtendedToChicago => CHICAGO_EXTENDED_EXTENSION,
            Self::LegacyAnimations => ANIMATIONS_EXTENSION,
        }
    }

    pub fn destination_extension(self) -> &'static str {
        match self {
            Self::CollisionToModel | Self::BspToModel => GBXMODEL_EXTENSION,
            Self::JmsToPhysics => PHYSICS_EXTENSION,
            Self::DdsToBitmap => BITMAP_EXTENSION,
            Self::ChicagoExtendedToChicago => CHICAGO_EXTENSION,
            Self::LegacyAnimations => ANIMATIONS_EXTENSION,
        }
    }

    /// Output file name stem; collision output must not clobber the model it reads nodes from.
    fn destination_stem(self, stem: &str) -> String {
        match self {
            Self::CollisionToModel => format!("{}_collision", stem),
            Self::BspToModel => format!("{}_bsp", stem),
            _ => stem.to_string(),
        }
    }

    /// Where the output for `source` (found under `root`) is written.
    pub fn destination_path(self, source: &Path, root: &Path, context: &ConversionContext) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_name = format!("{}.{}", self.destination_stem(&stem), self.destination_extension());

        let directory = match &context.output_directory {
            Some(output) => {
                let relative = source
                    .parent()
                    .and_then(|parent| parent.strip_prefix(root).ok())
                    .unwrap_or_else(|| Path::new(""));
                output.join(relative)
            }
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        directory.join(file_name)
    }

    pub fn convert_file(self, source: &Path, destination: &Path, context: &ConversionContext) -> anyhow::Result<FileOutcome> {
        match self {
            Self::CollisionToModel => collision_to_model::convert_collision_file(source, destination, &context.collision),
            Self::BspToModel => bsp_to_model::convert_bsp_file(source, destination, &context.bsp),
            Self::JmsToPhysics => model_to_physics::convert_jms_file(source, destination, &context.physics),
            Self::DdsToBitmap => dds_to_bitmap::convert_dds_file(source, destination, &context.bitmap),
            Self::ChicagoExtendedToChicago => shader::convert_shader_file(source, destination, &context.shader),
            Self::LegacyAnimations => animation::convert_animation_file(source, destination, &context.animation),
        }
    }
}
