//! Error types for the atmosphere pipeline.

use crate::lut::LutKind;

/// Errors surfaced by parameter validation, table allocation and compositing.
///
/// Numeric edge cases inside the generators (ray misses, planet occlusion,
/// near-divergent multi-scattering) are resolved locally and never show up
/// here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AtmosphereError {
    /// A physical parameter is outside its valid range.
    #[error("invalid atmosphere parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },

    /// Storage for a lookup table could not be allocated.
    #[error("failed to allocate {table:?} table ({width}x{height} texels)")]
    Allocation {
        table: LutKind,
        width: u32,
        height: u32,
    },

    /// Compositor inputs disagree in size.
    #[error("buffer size mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
