//! Physical atmosphere parameters and their validation.

use aether_config::AtmosphereSettings;
use glam::Vec3;

use crate::error::AtmosphereError;

/// Physical parameters of a planet and its atmosphere.
///
/// Read-only to the generators. Distances are in meters; the scattering and
/// absorption scales multiply the Earth-like sea-level coefficients in
/// [`crate::medium`].
#[derive(Clone, Debug, PartialEq)]
pub struct AtmosphereParameters {
    /// World-space Y coordinate of the planet surface.
    pub sea_level: f32,
    /// Planet radius.
    pub planet_radius: f32,
    /// Thickness of the atmosphere shell.
    pub atmosphere_height: f32,
    /// Sun illuminance multiplier.
    pub sun_intensity: f32,
    /// Linear RGB sun color (not premultiplied by intensity).
    pub sun_color: Vec3,
    /// Angular radius of the sun disk in degrees.
    pub sun_disk_angle: f32,
    pub rayleigh_scattering_scale: f32,
    pub rayleigh_scale_height: f32,
    pub mie_scattering_scale: f32,
    pub mie_scale_height: f32,
    /// Henyey-Greenstein asymmetry factor g.
    pub mie_anisotropy: f32,
    pub ozone_absorption_scale: f32,
    /// Altitude of peak ozone density.
    pub ozone_center_height: f32,
    /// Half-width of the ozone tent profile.
    pub ozone_width: f32,
    /// Distance covered by the aerial-perspective volume.
    pub aerial_perspective_distance: f32,
}

impl Default for AtmosphereParameters {
    fn default() -> Self {
        Self::from(&AtmosphereSettings::default())
    }
}

impl From<&AtmosphereSettings> for AtmosphereParameters {
    fn from(settings: &AtmosphereSettings) -> Self {
        Self {
            sea_level: settings.sea_level,
            planet_radius: settings.planet_radius,
            atmosphere_height: settings.atmosphere_height,
            sun_intensity: settings.sun_light_intensity,
            sun_color: Vec3::from(settings.sun_light_color),
            sun_disk_angle: settings.sun_disk_angle,
            rayleigh_scattering_scale: settings.rayleigh_scattering_scale,
            rayleigh_scale_height: settings.rayleigh_scale_height,
            mie_scattering_scale: settings.mie_scattering_scale,
            mie_scale_height: settings.mie_scale_height,
            mie_anisotropy: settings.mie_anisotropy,
            ozone_absorption_scale: settings.ozone_absorption_scale,
            ozone_center_height: settings.ozone_level_center_height,
            ozone_width: settings.ozone_level_width,
            aerial_perspective_distance: settings.aerial_perspective_distance,
        }
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), AtmosphereError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AtmosphereError::InvalidParameter {
            name,
            value,
            reason: "must be finite and strictly positive",
        })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), AtmosphereError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AtmosphereError::InvalidParameter {
            name,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

impl AtmosphereParameters {
    /// Check every invariant the generators rely on.
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), AtmosphereError> {
        if !self.sea_level.is_finite() {
            return Err(AtmosphereError::InvalidParameter {
                name: "sea_level",
                value: self.sea_level,
                reason: "must be finite",
            });
        }
        positive("planet_radius", self.planet_radius)?;
        positive("atmosphere_height", self.atmosphere_height)?;
        positive("rayleigh_scale_height", self.rayleigh_scale_height)?;
        positive("mie_scale_height", self.mie_scale_height)?;
        positive("ozone_width", self.ozone_width)?;
        positive(
            "aerial_perspective_distance",
            self.aerial_perspective_distance,
        )?;

        non_negative("sun_intensity", self.sun_intensity)?;
        non_negative("sun_color.r", self.sun_color.x)?;
        non_negative("sun_color.g", self.sun_color.y)?;
        non_negative("sun_color.b", self.sun_color.z)?;
        non_negative("rayleigh_scattering_scale", self.rayleigh_scattering_scale)?;
        non_negative("mie_scattering_scale", self.mie_scattering_scale)?;
        non_negative("ozone_absorption_scale", self.ozone_absorption_scale)?;
        non_negative("ozone_center_height", self.ozone_center_height)?;

        if !(self.mie_anisotropy.is_finite() && self.mie_anisotropy.abs() < 1.0) {
            return Err(AtmosphereError::InvalidParameter {
                name: "mie_anisotropy",
                value: self.mie_anisotropy,
                reason: "must lie in the open interval (-1, 1)",
            });
        }
        if !(self.sun_disk_angle.is_finite() && (0.0..180.0).contains(&self.sun_disk_angle)) {
            return Err(AtmosphereError::InvalidParameter {
                name: "sun_disk_angle",
                value: self.sun_disk_angle,
                reason: "must lie in [0, 180) degrees",
            });
        }
        Ok(())
    }

    /// Radius of the planet surface.
    pub fn bottom_radius(&self) -> f64 {
        f64::from(self.planet_radius)
    }

    /// Radius of the top of the atmosphere.
    pub fn top_radius(&self) -> f64 {
        f64::from(self.planet_radius) + f64::from(self.atmosphere_height)
    }

    /// Distance from the planet center of a point at world-space `y`.
    ///
    /// The planet is flattened under the camera: only the vertical offset
    /// from sea level matters. Points below the surface are lifted onto it.
    pub fn radius_at_world_y(&self, y: f32) -> f64 {
        let altitude = f64::from(y) - f64::from(self.sea_level);
        self.bottom_radius() + altitude.max(0.0)
    }

    /// Sun color premultiplied by intensity.
    pub fn sun_luminance(&self) -> Vec3 {
        self.sun_color * self.sun_intensity
    }

    /// Cosine of the sun disk angular radius.
    pub fn sun_disk_cos(&self) -> f64 {
        f64::from(self.sun_disk_angle).to_radians().cos()
    }
}
