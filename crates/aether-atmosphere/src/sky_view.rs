//! Sky-view table: distant-sky radiance around the camera, per view
//! direction, for the current camera height and sun direction.

use glam::DVec3;

use crate::lut::LookupTable;
use crate::mapping::{
    sky_view_direction_to_uv, sky_view_uv_to_direction, texel_unit, unit_to_texel_coord,
};
use crate::medium::{
    atmosphere_segment, integrate_step, mie_phase, rayleigh_phase, sample_medium,
    transmittance_from_depth,
};
use crate::multi_scattering::MultiScatteringLut;
use crate::parallel::for_each_row;
use crate::params::AtmosphereParameters;
use crate::transmittance::TransmittanceLut;

/// Ray-march settings for sky radiance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkyViewSampling {
    pub steps: u32,
    /// Add the sun disk on top of the scattered light.
    pub sun_disk: bool,
}

impl Default for SkyViewSampling {
    fn default() -> Self {
        Self {
            steps: 32,
            sun_disk: true,
        }
    }
}

/// Upstream tables and lighting shared by every sky ray of one frame.
#[derive(Clone, Copy)]
pub struct SkyInputs<'a> {
    pub params: &'a AtmosphereParameters,
    pub transmittance: TransmittanceLut<'a>,
    pub multi_scattering: MultiScatteringLut<'a>,
    /// Unit vector pointing at the sun.
    pub sun_direction: DVec3,
}

impl SkyInputs<'_> {
    /// Scattered light per unit length at `position`, before view attenuation.
    pub(crate) fn source(&self, position: DVec3, scattering_cos: f64) -> (DVec3, DVec3) {
        let params = self.params;
        let medium = sample_medium(params, position.length() - params.bottom_radius());
        let sun_transmittance = self.transmittance.toward(position, self.sun_direction);
        let psi = self.multi_scattering.toward(position, self.sun_direction);

        let single = medium.rayleigh_scattering * rayleigh_phase(scattering_cos)
            + medium.mie_scattering
                * mie_phase(scattering_cos, f64::from(params.mie_anisotropy));
        let luminance = params.sun_luminance().as_dvec3();
        let source = (single * sun_transmittance + medium.scattering() * psi) * luminance;
        (source, medium.extinction)
    }
}

/// Radiance reaching the camera at radius `camera_radius` from direction
/// `view`.
pub fn sky_radiance(
    inputs: &SkyInputs<'_>,
    camera_radius: f64,
    view: DVec3,
    sampling: SkyViewSampling,
) -> DVec3 {
    let params = inputs.params;
    let origin = DVec3::new(0.0, camera_radius, 0.0);
    let scattering_cos = view.dot(inputs.sun_direction);
    let steps = sampling.steps.max(1);

    let mut radiance = DVec3::ZERO;
    let mut throughput = DVec3::ONE;
    let mut hits_ground = false;
    if let Some((t_start, t_end, ground)) =
        atmosphere_segment(origin, view, params.bottom_radius(), params.top_radius())
    {
        hits_ground = ground;
        let dt = (t_end - t_start) / f64::from(steps);
        for step in 0..steps {
            let t = t_start + (f64::from(step) + 0.5) * dt;
            let (source, extinction) = inputs.source(origin + view * t, scattering_cos);
            let step_transmittance = transmittance_from_depth(extinction * dt);
            radiance += throughput * integrate_step(source, extinction, step_transmittance, dt);
            throughput *= step_transmittance;
        }
    }

    if sampling.sun_disk && !hits_ground && scattering_cos >= params.sun_disk_cos() {
        radiance += params.sun_luminance().as_dvec3() * throughput;
    }
    radiance
}

/// Fill `table` with sky radiance for a camera at `camera_radius`.
/// RGB holds radiance, alpha is 1.
pub fn generate(
    inputs: &SkyInputs<'_>,
    camera_radius: f64,
    sampling: SkyViewSampling,
    table: &mut LookupTable,
) {
    let shape = table.shape();
    let bottom = inputs.params.bottom_radius();

    for_each_row(table.texels_mut(), shape.width as usize, |y, row| {
        let v = texel_unit(y, shape.height);
        for (x, texel) in row.iter_mut().enumerate() {
            let u = texel_unit(x, shape.width);
            let view = sky_view_uv_to_direction(u, v, camera_radius, bottom);
            let l = sky_radiance(inputs, camera_radius, view, sampling);
            *texel = [l.x as f32, l.y as f32, l.z as f32, 1.0];
        }
    });
}

/// Read-only lookups into a generated sky-view table.
#[derive(Clone, Copy)]
pub struct SkyViewLut<'a> {
    table: &'a LookupTable,
    camera_radius: f64,
    bottom: f64,
}

impl<'a> SkyViewLut<'a> {
    pub fn new(table: &'a LookupTable, params: &AtmosphereParameters, camera_radius: f64) -> Self {
        Self {
            table,
            camera_radius,
            bottom: params.bottom_radius(),
        }
    }

    /// Sky radiance seen along world-space unit direction `view`.
    pub fn radiance(&self, view: DVec3) -> DVec3 {
        let (u, v) = sky_view_direction_to_uv(view, self.camera_radius, self.bottom);
        let shape = self.table.shape();
        let u = unit_to_texel_coord(u, shape.width);
        let v = unit_to_texel_coord(v, shape.height);
        self.table.sample(u as f32, v as f32).truncate().as_dvec3()
    }
}
