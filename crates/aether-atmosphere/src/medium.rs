//! Participating medium: density profiles, coefficients, phase functions and
//! planet geometry shared by every table generator.
//!
//! All integration math runs in `f64`. At planetary radii `f32` loses the
//! altitude of a point near the surface to cancellation, which shows up as
//! banding in the transmittance table.

use std::f64::consts::PI;

use glam::DVec3;

use crate::params::AtmosphereParameters;

/// Rayleigh scattering coefficients at sea level, per meter (RGB).
pub const RAYLEIGH_SCATTERING: DVec3 = DVec3::new(5.802e-6, 13.558e-6, 33.1e-6);
/// Mie scattering coefficient at sea level, per meter.
pub const MIE_SCATTERING: f64 = 3.996e-6;
/// Mie absorption coefficient at sea level, per meter.
pub const MIE_ABSORPTION: f64 = 4.4e-6;
/// Ozone absorption coefficients at peak density, per meter (RGB).
pub const OZONE_ABSORPTION: DVec3 = DVec3::new(0.650e-6, 1.881e-6, 0.085e-6);

/// Phase function of an isotropic scatterer.
pub const ISOTROPIC_PHASE: f64 = 1.0 / (4.0 * PI);

/// Scattering and extinction at one point of the atmosphere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MediumSample {
    pub rayleigh_scattering: DVec3,
    pub mie_scattering: DVec3,
    /// Scattering plus absorption of every constituent.
    pub extinction: DVec3,
}

impl MediumSample {
    /// Total scattering coefficient.
    pub fn scattering(&self) -> DVec3 {
        self.rayleigh_scattering + self.mie_scattering
    }
}

/// Ozone tent profile: 1 at the layer center, 0 beyond `width` from it.
pub fn ozone_density(params: &AtmosphereParameters, altitude: f64) -> f64 {
    let center = f64::from(params.ozone_center_height);
    let width = f64::from(params.ozone_width);
    (1.0 - (altitude - center).abs() / width).max(0.0)
}

/// Evaluate the medium at `altitude` meters above sea level.
///
/// Above the atmosphere shell the medium is vacuum; below the surface the
/// altitude is clamped to zero.
pub fn sample_medium(params: &AtmosphereParameters, altitude: f64) -> MediumSample {
    if altitude > f64::from(params.atmosphere_height) {
        return MediumSample::default();
    }
    let h = altitude.max(0.0);

    let rayleigh_density = (-h / f64::from(params.rayleigh_scale_height)).exp();
    let mie_density = (-h / f64::from(params.mie_scale_height)).exp();

    let rayleigh_scattering =
        RAYLEIGH_SCATTERING * (f64::from(params.rayleigh_scattering_scale) * rayleigh_density);
    let mie_scale = f64::from(params.mie_scattering_scale) * mie_density;
    let mie_scattering = DVec3::splat(MIE_SCATTERING * mie_scale);
    let mie_absorption = DVec3::splat(MIE_ABSORPTION * mie_scale);
    let ozone_absorption = OZONE_ABSORPTION
        * (f64::from(params.ozone_absorption_scale) * ozone_density(params, h));

    MediumSample {
        rayleigh_scattering,
        mie_scattering,
        extinction: rayleigh_scattering + mie_scattering + mie_absorption + ozone_absorption,
    }
}

/// Rayleigh phase function.
pub fn rayleigh_phase(cos_angle: f64) -> f64 {
    3.0 / (16.0 * PI) * (1.0 + cos_angle * cos_angle)
}

/// Cornette-Shanks form of the Henyey-Greenstein phase function.
pub fn mie_phase(cos_angle: f64, g: f64) -> f64 {
    let g2 = g * g;
    let num = 3.0 * (1.0 - g2) * (1.0 + cos_angle * cos_angle);
    let denom = 8.0 * PI * (2.0 + g2) * (1.0 + g2 - 2.0 * g * cos_angle).max(1e-12).powf(1.5);
    num / denom
}

/// Ray-sphere intersection against a sphere centered at the origin.
///
/// Returns `(t_near, t_far)`, or `None` on a miss.
pub fn ray_sphere_intersect(origin: DVec3, dir: DVec3, radius: f64) -> Option<(f64, f64)> {
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    Some((-b - sqrt_disc, -b + sqrt_disc))
}

/// Segment of a ray that lies inside the atmosphere and above the ground.
///
/// Returns `(t_start, t_end, hits_ground)`, or `None` if the ray never
/// enters the shell.
pub fn atmosphere_segment(
    origin: DVec3,
    dir: DVec3,
    bottom_radius: f64,
    top_radius: f64,
) -> Option<(f64, f64, bool)> {
    let (top_near, top_far) = ray_sphere_intersect(origin, dir, top_radius)?;
    if top_far <= 0.0 {
        return None;
    }
    let t_start = top_near.max(0.0);
    let mut t_end = top_far;
    let mut hits_ground = false;
    if let Some(ground) = ground_distance(origin, dir, bottom_radius)
        && ground < t_end
    {
        t_end = ground.max(t_start);
        hits_ground = true;
    }
    (t_end > t_start || hits_ground).then_some((t_start, t_end, hits_ground))
}

/// Distance along the ray to the planet surface, if the ray reaches it.
///
/// A ray starting on the surface and pointing below the horizontal hits it
/// at distance zero.
pub fn ground_distance(origin: DVec3, dir: DVec3, bottom_radius: f64) -> Option<f64> {
    let (near, far) = ray_sphere_intersect(origin, dir, bottom_radius)?;
    (far > 0.0).then(|| near.max(0.0))
}

/// Whether a ray from radius `r` with zenith cosine `mu` hits the planet.
pub fn ray_intersects_ground(r: f64, mu: f64, bottom_radius: f64) -> bool {
    mu < 0.0 && r * r * (mu * mu - 1.0) + bottom_radius * bottom_radius >= 0.0
}

/// Distance from radius `r` along zenith cosine `mu` to the top of the atmosphere.
pub fn distance_to_top(r: f64, mu: f64, top_radius: f64) -> f64 {
    let disc = (r * r * (mu * mu - 1.0) + top_radius * top_radius).max(0.0);
    (-r * mu + disc.sqrt()).max(0.0)
}

/// Altitude after travelling `t` from radius `r` along zenith cosine `mu`.
pub fn altitude_along(r: f64, mu: f64, t: f64, bottom_radius: f64) -> f64 {
    (t * t + 2.0 * r * mu * t + r * r).max(0.0).sqrt() - bottom_radius
}

/// Exact integral of a constant source over a homogeneous step.
///
/// `(S - S * T) / sigma_t`, falling back to `S * dt` for channels with no
/// extinction.
pub fn integrate_step(source: DVec3, extinction: DVec3, step_transmittance: DVec3, dt: f64) -> DVec3 {
    let integrate = |s: f64, sigma: f64, t: f64| {
        if sigma > 1e-12 { (s - s * t) / sigma } else { s * dt }
    };
    DVec3::new(
        integrate(source.x, extinction.x, step_transmittance.x),
        integrate(source.y, extinction.y, step_transmittance.y),
        integrate(source.z, extinction.z, step_transmittance.z),
    )
}

/// Component-wise `exp(-optical_depth)`.
pub fn transmittance_from_depth(optical_depth: DVec3) -> DVec3 {
    DVec3::new(
        (-optical_depth.x).exp(),
        (-optical_depth.y).exp(),
        (-optical_depth.z).exp(),
    )
}
