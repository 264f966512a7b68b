//! Shader-facing atmosphere constants.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::lut::LutShape;
use crate::medium::{MIE_ABSORPTION, MIE_SCATTERING, OZONE_ABSORPTION, RAYLEIGH_SCATTERING};
use crate::params::AtmosphereParameters;

/// GPU-side atmosphere uniform block. Matches a WGSL struct made of
/// `vec3<f32>` + `f32` pairs, so every row is 16 bytes and no implicit
/// padding is needed.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct AtmosphereUniform {
    /// Unit vector towards the sun. (offset 0)
    pub sun_direction: [f32; 3],
    /// (offset 12)
    pub sun_intensity: f32,
    /// Linear RGB sun color. (offset 16)
    pub sun_color: [f32; 3],
    /// Cosine of the sun disk angular radius. (offset 28)
    pub sun_disk_cos: f32,
    /// Scaled Rayleigh scattering at sea level. (offset 32)
    pub rayleigh_scattering: [f32; 3],
    /// (offset 44)
    pub rayleigh_scale_height: f32,
    /// Scaled ozone absorption at peak density. (offset 48)
    pub ozone_absorption: [f32; 3],
    /// (offset 60)
    pub ozone_center_height: f32,
    /// Scaled Mie scattering at sea level. (offset 64)
    pub mie_scattering: f32,
    /// Scaled Mie absorption at sea level. (offset 68)
    pub mie_absorption: f32,
    /// (offset 72)
    pub mie_scale_height: f32,
    /// Henyey-Greenstein g. (offset 76)
    pub mie_anisotropy: f32,
    /// (offset 80)
    pub planet_radius: f32,
    /// (offset 84)
    pub atmosphere_height: f32,
    /// (offset 88)
    pub sea_level: f32,
    /// (offset 92)
    pub ozone_width: f32,
    /// Voxels per axis of the aerial-perspective volume. (offset 96)
    pub aerial_perspective_size: [f32; 3],
    /// (offset 108)
    pub aerial_perspective_distance: f32,
}

impl AtmosphereUniform {
    pub fn new(params: &AtmosphereParameters, sun_direction: Vec3, aerial: LutShape) -> Self {
        let rayleigh = RAYLEIGH_SCATTERING * f64::from(params.rayleigh_scattering_scale);
        let ozone = OZONE_ABSORPTION * f64::from(params.ozone_absorption_scale);
        let mie_scale = f64::from(params.mie_scattering_scale);
        Self {
            sun_direction: sun_direction.normalize_or_zero().to_array(),
            sun_intensity: params.sun_intensity,
            sun_color: params.sun_color.to_array(),
            sun_disk_cos: params.sun_disk_cos() as f32,
            rayleigh_scattering: rayleigh.as_vec3().to_array(),
            rayleigh_scale_height: params.rayleigh_scale_height,
            ozone_absorption: ozone.as_vec3().to_array(),
            ozone_center_height: params.ozone_center_height,
            mie_scattering: (MIE_SCATTERING * mie_scale) as f32,
            mie_absorption: (MIE_ABSORPTION * mie_scale) as f32,
            mie_scale_height: params.mie_scale_height,
            mie_anisotropy: params.mie_anisotropy,
            planet_radius: params.planet_radius,
            atmosphere_height: params.atmosphere_height,
            sea_level: params.sea_level,
            ozone_width: params.ozone_width,
            aerial_perspective_size: [
                aerial.width as f32,
                aerial.height as f32,
                aerial.slices as f32,
            ],
            aerial_perspective_distance: params.aerial_perspective_distance,
        }
    }
}

/// Value of a named global uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
}

/// Named global uniforms shared with other render passes.
pub fn global_uniforms(
    params: &AtmosphereParameters,
    aerial: LutShape,
) -> Vec<(&'static str, UniformValue)> {
    use UniformValue::{Float, Vec3 as V3};
    vec![
        ("sea_level", Float(params.sea_level)),
        ("planet_radius", Float(params.planet_radius)),
        ("atmosphere_height", Float(params.atmosphere_height)),
        ("sun_light_intensity", Float(params.sun_intensity)),
        ("sun_light_color", V3(params.sun_color.to_array())),
        ("sun_disk_angle", Float(params.sun_disk_angle)),
        ("rayleigh_scattering_scale", Float(params.rayleigh_scattering_scale)),
        ("rayleigh_scale_height", Float(params.rayleigh_scale_height)),
        ("mie_scattering_scale", Float(params.mie_scattering_scale)),
        ("mie_anisotropy", Float(params.mie_anisotropy)),
        ("mie_scale_height", Float(params.mie_scale_height)),
        ("ozone_absorption_scale", Float(params.ozone_absorption_scale)),
        ("ozone_level_center_height", Float(params.ozone_center_height)),
        ("ozone_level_width", Float(params.ozone_width)),
        (
            "aerial_perspective_distance",
            Float(params.aerial_perspective_distance),
        ),
        (
            "aerial_perspective_voxel_size",
            V3([
                aerial.width as f32,
                aerial.height as f32,
                aerial.slices as f32,
            ]),
        ),
    ]
}
