//! Typed records for the tag classes the converters read and write.

pub mod animation;
pub mod bitmap;
pub mod collision;
pub mod gbxmodel;
pub mod physics;
pub mod shader;
pub mod structure_bsp;

pub use animation::{AnimationGraph, LegacyAnimationGraph};
pub use bitmap::Bitmap;
pub use collision::CollisionModel;
pub use gbxmodel::GbxModel;
pub use physics::Physics;
pub use shader::{ShaderTransparentChicago, ShaderTransparentChicagoExtended};
pub use structure_bsp::StructureBsp;

use crate::tag::FourCC;

pub const SHADER_CLASS: FourCC = FourCC::new(b"shdr");
pub const BITMAP_CLASS: FourCC = FourCC::new(b"bitm");
pub const SOUND_CLASS: FourCC = FourCC::new(b"snd!");
pub const LENS_FLARE_CLASS: FourCC = FourCC::new(b"lens");
