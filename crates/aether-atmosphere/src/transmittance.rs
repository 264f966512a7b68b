//! Transmittance table: fraction of light surviving from a point of the
//! atmosphere to its top boundary, per (altitude, zenith cosine).

use glam::DVec3;

use crate::lut::LookupTable;
use crate::mapping::{
    texel_unit, transmittance_params_to_uv, transmittance_uv_to_params, unit_to_texel_coord,
};
use crate::medium::{
    altitude_along, distance_to_top, ray_intersects_ground, sample_medium,
    transmittance_from_depth,
};
use crate::parallel::for_each_row;
use crate::params::AtmosphereParameters;

/// Fewer steps than this visibly under-integrates the Mie layer.
pub const MIN_TRANSMITTANCE_STEPS: u32 = 32;

/// Transmittance from radius `r` along zenith cosine `mu` to the top of the
/// atmosphere, by midpoint quadrature.
///
/// The planet is opaque: a ray that hits the ground transmits nothing.
pub fn transmittance_to_top(params: &AtmosphereParameters, r: f64, mu: f64, steps: u32) -> DVec3 {
    if ray_intersects_ground(r, mu, params.bottom_radius()) {
        return DVec3::ZERO;
    }
    integrate_to_top(params, r, mu, steps)
}

/// Quadrature without the ground test. Table rays end on the horizon at
/// worst, where rounding alone would flip the test.
fn integrate_to_top(params: &AtmosphereParameters, r: f64, mu: f64, steps: u32) -> DVec3 {
    let bottom = params.bottom_radius();
    let top = params.top_radius();
    let steps = steps.max(MIN_TRANSMITTANCE_STEPS);
    let dt = distance_to_top(r, mu, top) / f64::from(steps);
    let optical_depth = (0..steps).fold(DVec3::ZERO, |depth, i| {
        let t = (f64::from(i) + 0.5) * dt;
        let altitude = altitude_along(r, mu, t, bottom);
        depth + sample_medium(params, altitude).extinction * dt
    });
    transmittance_from_depth(optical_depth)
}

/// Fill `table` with transmittance. RGB holds the per-channel value, alpha is 1.
pub fn generate(params: &AtmosphereParameters, steps: u32, table: &mut LookupTable) {
    let shape = table.shape();
    let bottom = params.bottom_radius();
    let top = params.top_radius();

    for_each_row(table.texels_mut(), shape.width as usize, |y, row| {
        let v = texel_unit(y, shape.height);
        for (x, texel) in row.iter_mut().enumerate() {
            let u = texel_unit(x, shape.width);
            let (r, mu) = transmittance_uv_to_params(u, v, bottom, top);
            let t = integrate_to_top(params, r, mu, steps);
            *texel = [t.x as f32, t.y as f32, t.z as f32, 1.0];
        }
    });
}

/// Read-only lookups into a generated transmittance table.
#[derive(Clone, Copy)]
pub struct TransmittanceLut<'a> {
    table: &'a LookupTable,
    bottom: f64,
    top: f64,
}

impl<'a> TransmittanceLut<'a> {
    pub fn new(table: &'a LookupTable, params: &AtmosphereParameters) -> Self {
        Self {
            table,
            bottom: params.bottom_radius(),
            top: params.top_radius(),
        }
    }

    /// Transmittance from radius `r` along zenith cosine `mu` to space.
    /// Zero when the planet is in the way.
    pub fn lookup(&self, r: f64, mu: f64) -> DVec3 {
        if ray_intersects_ground(r, mu, self.bottom) {
            return DVec3::ZERO;
        }
        let r = r.clamp(self.bottom, self.top);
        let (u, v) = transmittance_params_to_uv(r, mu, self.bottom, self.top);
        let shape = self.table.shape();
        let u = unit_to_texel_coord(u, shape.width);
        let v = unit_to_texel_coord(v, shape.height);
        self.table.sample(u as f32, v as f32).truncate().as_dvec3()
    }

    /// Transmittance from `position` (planet-centered) towards the sun.
    pub fn toward(&self, position: DVec3, direction: DVec3) -> DVec3 {
        let r = position.length();
        if r <= 0.0 {
            return DVec3::ZERO;
        }
        self.lookup(r, position.dot(direction) / r)
    }
}
