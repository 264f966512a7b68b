//! Physically based sky and aerial perspective from precomputed lookup tables.
//!
//! Four tables are produced per frame by [`AtmospherePipeline`]:
//! transmittance and multiple scattering (regenerated when the
//! [`AtmosphereParameters`] change), sky view and the aerial-perspective
//! froxel volume (regenerated every frame for the current camera and sun).
//! The [`Compositor`] applies aerial perspective to a rendered scene, and
//! [`LutTextures`] uploads the tables to the GPU under their global names.

pub mod aerial_perspective;
pub mod camera;
pub mod compositor;
pub mod diagnostics;
mod error;
pub mod gpu;
pub mod lut;
pub mod mapping;
pub mod medium;
pub mod multi_scattering;
mod parallel;
mod params;
pub mod pipeline;
pub mod sky_view;
pub mod transmittance;
pub mod uniforms;

pub use aerial_perspective::AerialPerspectiveLut;
pub use camera::{CameraState, TargetDescriptor};
pub use compositor::{ColorBuffer, Compositor, DepthBuffer};
pub use diagnostics::{DebugLine, ReadbackReceiver, ReadbackSnapshot, debug_lines};
pub use error::AtmosphereError;
pub use gpu::LutTextures;
pub use lut::{LookupTable, LutKind, LutShape, Texel};
pub use parallel::worker_count;
pub use params::AtmosphereParameters;
pub use pipeline::{AtmospherePipeline, FrameTables, PipelineSettings};
pub use uniforms::{AtmosphereUniform, UniformValue, global_uniforms};
