//! Conversion engine for binary tag files: typed tag records, the geometry
//! and texture layout helpers they need, format converters and a batch driver.

pub mod batch;
pub mod convert;
pub mod dds;
pub mod error;
pub mod jms;
pub mod math;
pub mod skeleton;
pub mod tag;
pub mod tags;
pub mod texture;
pub mod topology;

pub use error::{Result, TagError};
