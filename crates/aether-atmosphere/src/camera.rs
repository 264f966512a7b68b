//! Per-frame camera description supplied by the host.

use glam::{DVec3, Vec3};

use crate::params::AtmosphereParameters;

/// Color target the camera renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl TargetDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: wgpu::TextureFormat::Rgba16Float,
        }
    }

    /// Width over height, 1 for a degenerate target.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

const DEFAULT_VERTICAL_FOV_DEGREES: f64 = 60.0;
const MIN_VERTICAL_FOV_DEGREES: f64 = 0.1;
const MAX_VERTICAL_FOV_DEGREES: f64 = 179.0;

/// Camera position, orientation and projection for one frame. Y is up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// World-space position.
    pub position: Vec3,
    /// View direction. Need not be normalized.
    pub forward: Vec3,
    /// Approximate up vector, orthogonalized against `forward`.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub vertical_fov: f32,
    pub target: TargetDescriptor,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            vertical_fov: DEFAULT_VERTICAL_FOV_DEGREES.to_radians() as f32,
            target: TargetDescriptor::new(1280, 720),
        }
    }
}

/// Orthonormal camera frame in `f64`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraBasis {
    pub forward: DVec3,
    pub right: DVec3,
    pub up: DVec3,
}

impl CameraState {
    pub fn aspect_ratio(&self) -> f32 {
        self.target.aspect_ratio()
    }

    /// Right-handed orthonormal frame. Degenerate inputs fall back to
    /// looking down -Z with Y up.
    pub fn basis(&self) -> CameraBasis {
        let forward = self
            .forward
            .as_dvec3()
            .try_normalize()
            .unwrap_or(DVec3::NEG_Z);
        let right = forward
            .cross(self.up.as_dvec3())
            .try_normalize()
            .unwrap_or_else(|| forward.any_orthonormal_vector());
        let up = right.cross(forward);
        CameraBasis { forward, right, up }
    }

    /// Vertical field of view in radians, clamped to `[0.1, 179]` degrees.
    /// A non-finite value falls back to 60 degrees.
    pub fn field_of_view(&self) -> f64 {
        let fov = f64::from(self.vertical_fov);
        if !fov.is_finite() {
            return DEFAULT_VERTICAL_FOV_DEGREES.to_radians();
        }
        fov.clamp(
            MIN_VERTICAL_FOV_DEGREES.to_radians(),
            MAX_VERTICAL_FOV_DEGREES.to_radians(),
        )
    }

    /// Distance of the camera from the planet center.
    pub fn planet_radius(&self, params: &AtmosphereParameters) -> f64 {
        params.radius_at_world_y(self.position.y)
    }

    /// Camera position relative to the planet center, directly above it.
    pub fn planet_position(&self, params: &AtmosphereParameters) -> DVec3 {
        DVec3::new(0.0, self.planet_radius(params), 0.0)
    }

    /// World-space unit direction through screen coordinates `(u, v)`,
    /// with `v = 0` at the top edge.
    pub fn screen_direction(&self, u: f64, v: f64) -> DVec3 {
        let basis = self.basis();
        let tan_half = (self.field_of_view() * 0.5).tan();
        let aspect = f64::from(self.aspect_ratio());
        let x = (2.0 * u - 1.0) * tan_half * aspect;
        let y = (1.0 - 2.0 * v) * tan_half;
        (basis.forward + basis.right * x + basis.up * y).normalize()
    }
}
