//! Multiple-scattering table.
//!
//! Approximates the contribution of every scattering order beyond the first
//! with an isotropic transfer estimate: the second-order luminance `L2` and
//! the transfer factor `f_ms` are averaged over a stratified sphere of
//! directions, and the geometric series of higher orders sums to
//! `L2 / (1 - f_ms)`.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;
use tracing::trace;

use crate::lut::LookupTable;
use crate::mapping::{
    multi_scattering_params_to_uv, multi_scattering_uv_to_params, texel_unit, unit_to_texel_coord,
};
use crate::medium::{
    ISOTROPIC_PHASE, atmosphere_segment, integrate_step, sample_medium, transmittance_from_depth,
};
use crate::parallel::for_each_row;
use crate::params::AtmosphereParameters;
use crate::transmittance::TransmittanceLut;

/// Upper bound applied to each component of `f_ms` before the series sum.
pub const MAX_TRANSFER_FACTOR: f64 = 0.99;

/// Sampling density of one multiple-scattering evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultiScatteringSampling {
    /// Square root of the number of sphere directions.
    pub directions_sqrt: u32,
    /// Ray-march steps per direction.
    pub steps: u32,
}

impl Default for MultiScatteringSampling {
    fn default() -> Self {
        Self {
            directions_sqrt: 8,
            steps: 20,
        }
    }
}

/// Result for one `(altitude, sun zenith)` pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiScatteringSample {
    /// Multiple-scattering contribution per unit sun illuminance.
    pub psi: DVec3,
    /// Whether any component of `f_ms` hit [`MAX_TRANSFER_FACTOR`].
    pub clamped: bool,
}

/// Direction `(i, j)` of an `n x n` stratified set covering the sphere
/// uniformly.
fn sphere_direction(i: u32, j: u32, n: u32) -> DVec3 {
    let n = f64::from(n);
    let azimuth = 2.0 * PI * (f64::from(i) + 0.5) / n;
    let cos_zenith = 1.0 - 2.0 * (f64::from(j) + 0.5) / n;
    let sin_zenith = (1.0 - cos_zenith * cos_zenith).max(0.0).sqrt();
    DVec3::new(
        sin_zenith * azimuth.cos(),
        cos_zenith,
        sin_zenith * azimuth.sin(),
    )
}

/// Evaluate the multiple-scattering contribution at radius `r` with the sun
/// at zenith cosine `mu_s`.
pub fn multi_scattering_at(
    params: &AtmosphereParameters,
    transmittance: &TransmittanceLut<'_>,
    r: f64,
    mu_s: f64,
    sampling: MultiScatteringSampling,
) -> MultiScatteringSample {
    let bottom = params.bottom_radius();
    let top = params.top_radius();
    let origin = DVec3::new(0.0, r, 0.0);
    let sun_dir = DVec3::new((1.0 - mu_s * mu_s).max(0.0).sqrt(), mu_s, 0.0);

    let n = sampling.directions_sqrt.max(1);
    let steps = sampling.steps.max(1);
    let mut second_order = DVec3::ZERO;
    let mut transfer = DVec3::ZERO;

    for j in 0..n {
        for i in 0..n {
            let dir = sphere_direction(i, j, n);
            let Some((t_start, t_end, _)) = atmosphere_segment(origin, dir, bottom, top) else {
                continue;
            };
            let dt = (t_end - t_start) / f64::from(steps);
            let mut throughput = DVec3::ONE;
            for step in 0..steps {
                let t = t_start + (f64::from(step) + 0.5) * dt;
                let position = origin + dir * t;
                let medium = sample_medium(params, position.length() - bottom);
                let step_transmittance = transmittance_from_depth(medium.extinction * dt);

                let scattering = medium.scattering();
                let sun = transmittance.toward(position, sun_dir);
                let source = scattering * sun * ISOTROPIC_PHASE;
                second_order +=
                    throughput * integrate_step(source, medium.extinction, step_transmittance, dt);
                transfer += throughput
                    * integrate_step(scattering, medium.extinction, step_transmittance, dt);
                throughput *= step_transmittance;
            }
        }
    }

    // Uniform sphere weight 4pi/N times the isotropic phase 1/4pi.
    let weight = 1.0 / f64::from(n * n);
    let second_order = second_order * weight;
    let transfer = transfer * weight;
    let clamped_transfer = transfer.min(DVec3::splat(MAX_TRANSFER_FACTOR));

    MultiScatteringSample {
        psi: second_order / (DVec3::ONE - clamped_transfer),
        clamped: transfer.cmpgt(clamped_transfer).any(),
    }
}

/// Fill `table` with multiple-scattering values. RGB holds `psi`, alpha is 1.
pub fn generate(
    params: &AtmosphereParameters,
    transmittance: &TransmittanceLut<'_>,
    sampling: MultiScatteringSampling,
    table: &mut LookupTable,
) {
    let shape = table.shape();
    let atmosphere_height = f64::from(params.atmosphere_height);
    let bottom = params.bottom_radius();
    let clamped = AtomicUsize::new(0);

    for_each_row(table.texels_mut(), shape.width as usize, |y, row| {
        let v = texel_unit(y, shape.height);
        for (x, texel) in row.iter_mut().enumerate() {
            let u = texel_unit(x, shape.width);
            let (mu_s, altitude) = multi_scattering_uv_to_params(u, v, atmosphere_height);
            let sample = multi_scattering_at(params, transmittance, bottom + altitude, mu_s, sampling);
            if sample.clamped {
                clamped.fetch_add(1, Ordering::Relaxed);
            }
            let psi = sample.psi;
            *texel = [psi.x as f32, psi.y as f32, psi.z as f32, 1.0];
        }
    });

    let clamped = clamped.into_inner();
    if clamped > 0 {
        trace!(
            texels = clamped,
            limit = MAX_TRANSFER_FACTOR,
            "Multi-scattering transfer factor clamped"
        );
    }
}

/// Read-only lookups into a generated multiple-scattering table.
#[derive(Clone, Copy)]
pub struct MultiScatteringLut<'a> {
    table: &'a LookupTable,
    bottom: f64,
    atmosphere_height: f64,
}

impl<'a> MultiScatteringLut<'a> {
    pub fn new(table: &'a LookupTable, params: &AtmosphereParameters) -> Self {
        Self {
            table,
            bottom: params.bottom_radius(),
            atmosphere_height: f64::from(params.atmosphere_height),
        }
    }

    /// `psi` at planet-centered `position` for the sun along `sun_dir`.
    pub fn toward(&self, position: DVec3, sun_dir: DVec3) -> DVec3 {
        let r = position.length();
        if r <= 0.0 {
            return DVec3::ZERO;
        }
        let mu_s = position.dot(sun_dir) / r;
        let (u, v) = multi_scattering_params_to_uv(mu_s, r - self.bottom, self.atmosphere_height);
        let shape = self.table.shape();
        let u = unit_to_texel_coord(u, shape.width);
        let v = unit_to_texel_coord(v, shape.height);
        self.table.sample(u as f32, v as f32).truncate().as_dvec3()
    }
}
