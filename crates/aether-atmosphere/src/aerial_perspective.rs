//! Aerial-perspective volume: in-scattered light and transmittance between
//! the camera and each froxel of its view frustum.
//!
//! Voxel `(x, y)` of slice `z` holds the values accumulated from the camera
//! to distance `aerial_slice_distance(z)` along the ray through the center of
//! screen cell `(x, y)`. RGB is in-scattered radiance, alpha the mean
//! transmittance over the three channels.

use glam::{DVec3, Vec3, Vec4};

use crate::camera::CameraState;
use crate::lut::{LookupTable, LutShape};
use crate::mapping::{aerial_distance_to_slice, aerial_slice_distance};
use crate::medium::{ground_distance, integrate_step, transmittance_from_depth};
use crate::parallel::for_each_row;
use crate::sky_view::SkyInputs;

/// Value of a zero-length path: nothing scattered in, everything transmitted.
pub const IDENTITY: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Direction through the center of every voxel column, row-major.
pub fn froxel_directions(camera: &CameraState, shape: LutShape) -> Vec<Vec3> {
    let width = f64::from(shape.width);
    let height = f64::from(shape.height);
    (0..shape.height)
        .flat_map(|y| (0..shape.width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let u = (f64::from(x) + 0.5) / width;
            let v = (f64::from(y) + 0.5) / height;
            camera.screen_direction(u, v).as_vec3()
        })
        .collect()
}

/// Fill `table` with the aerial-perspective volume seen from `camera`.
///
/// Each column is marched once, `steps_per_slice` sub-steps per slice. The
/// march stops at the planet surface; slices beyond it repeat the last
/// value.
pub fn generate(
    inputs: &SkyInputs<'_>,
    camera: &CameraState,
    steps_per_slice: u32,
    table: &mut LookupTable,
) {
    let params = inputs.params;
    let shape = table.shape();
    let width = shape.width as usize;
    let slices = shape.slices;
    let max_distance = f64::from(params.aerial_perspective_distance);
    let origin = camera.planet_position(params);
    let bottom = params.bottom_radius();
    let sub_steps = steps_per_slice.max(1);
    let height = f64::from(shape.height);

    for_each_row(table.texels_mut(), width * slices as usize, |y, row| {
        let v = (y as f64 + 0.5) / height;
        for x in 0..width {
            let u = (x as f64 + 0.5) / width as f64;
            let dir = camera.screen_direction(u, v);
            let ground = ground_distance(origin, dir, bottom).unwrap_or(f64::INFINITY);
            let scattering_cos = dir.dot(inputs.sun_direction);

            let mut inscatter = DVec3::ZERO;
            let mut throughput = DVec3::ONE;
            let mut travelled = 0.0_f64;
            for slice in 0..slices {
                let target = aerial_slice_distance(slice, slices, max_distance).min(ground);
                if target > travelled {
                    let dt = (target - travelled) / f64::from(sub_steps);
                    for step in 0..sub_steps {
                        let t = travelled + (f64::from(step) + 0.5) * dt;
                        let (source, extinction) = inputs.source(origin + dir * t, scattering_cos);
                        let step_transmittance = transmittance_from_depth(extinction * dt);
                        inscatter +=
                            throughput * integrate_step(source, extinction, step_transmittance, dt);
                        throughput *= step_transmittance;
                    }
                    travelled = target;
                }

                let mean = (throughput.x + throughput.y + throughput.z) / 3.0;
                row[slice as usize * width + x] = [
                    inscatter.x as f32,
                    inscatter.y as f32,
                    inscatter.z as f32,
                    mean as f32,
                ];
            }
        }
    });
}

/// Trilinear lookups into a generated aerial-perspective volume.
#[derive(Clone, Copy)]
pub struct AerialPerspectiveLut<'a> {
    table: &'a LookupTable,
    max_distance: f64,
}

impl<'a> AerialPerspectiveLut<'a> {
    pub fn new(table: &'a LookupTable, max_distance: f32) -> Self {
        Self {
            table,
            max_distance: f64::from(max_distance),
        }
    }

    /// In-scatter (xyz) and transmittance (w) at screen `(u, v)` and view
    /// distance `distance`.
    ///
    /// Below the first slice the value blends towards [`IDENTITY`]; past the
    /// last slice it is clamped.
    pub fn sample(&self, u: f32, v: f32, distance: f32) -> Vec4 {
        let slices = self.table.shape().slices;
        let s = aerial_distance_to_slice(f64::from(distance), slices, self.max_distance);
        if s < 0.0 {
            let first = self.table.sample_slice(u, v, 0);
            return IDENTITY.lerp(first, (s + 1.0).max(0.0) as f32);
        }

        let last = slices - 1;
        let s = s.min(f64::from(last));
        let s0 = s.floor() as u32;
        let s1 = (s0 + 1).min(last);
        let fraction = (s - f64::from(s0)) as f32;
        let near = self.table.sample_slice(u, v, s0);
        if s1 == s0 {
            return near;
        }
        near.lerp(self.table.sample_slice(u, v, s1), fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TargetDescriptor;
    use crate::lut::LutKind;
    use crate::multi_scattering::{self, MultiScatteringLut, MultiScatteringSampling};
    use crate::params::AtmosphereParameters;
    use crate::transmittance::{self, TransmittanceLut};

    const SHAPE: LutShape = LutShape::volume(8, 8, 16);

    struct Fixture {
        params: AtmosphereParameters,
        transmittance: LookupTable,
        multi_scattering: LookupTable,
    }

    impl Fixture {
        fn new() -> Self {
            let params = AtmosphereParameters::default();
            let mut t =
                LookupTable::try_new(LutKind::Transmittance, LutShape::plane(64, 16)).unwrap();
            transmittance::generate(&params, 40, &mut t);
            let mut ms =
                LookupTable::try_new(LutKind::MultiScattering, LutShape::plane(8, 8)).unwrap();
            let sampling = MultiScatteringSampling {
                directions_sqrt: 4,
                steps: 10,
            };
            multi_scattering::generate(&params, &TransmittanceLut::new(&t, &params), sampling, &mut ms);
            Self {
                params,
                transmittance: t,
                multi_scattering: ms,
            }
        }

        fn volume(&self, camera: &CameraState) -> LookupTable {
            let inputs = SkyInputs {
                params: &self.params,
                transmittance: TransmittanceLut::new(&self.transmittance, &self.params),
                multi_scattering: MultiScatteringLut::new(&self.multi_scattering, &self.params),
                sun_direction: DVec3::new(0.0, 0.5, -1.0).normalize(),
            };
            let mut table = LookupTable::try_new(LutKind::AerialPerspective, SHAPE).unwrap();
            generate(&inputs, camera, 2, &mut table);
            table
        }
    }

    fn horizon_camera(height: f32) -> CameraState {
        CameraState {
            position: Vec3::new(0.0, height, 0.0),
            forward: Vec3::new(0.0, 0.05, -1.0),
            target: TargetDescriptor::new(64, 64),
            ..Default::default()
        }
    }

    #[test]
    fn test_volume_is_physical() {
        let fixture = Fixture::new();
        let table = fixture.volume(&horizon_camera(0.0));
        assert!(table.is_physically_valid());
        for texel in table.texels() {
            assert!(texel[3] <= 1.0);
        }
    }

    #[test]
    fn test_transmittance_decreases_with_slice() {
        let fixture = Fixture::new();
        let table = fixture.volume(&horizon_camera(0.0));
        for y in 0..SHAPE.height {
            for x in 0..SHAPE.width {
                let mut previous = table.voxel(x, y, 0);
                for slice in 1..SHAPE.slices {
                    let texel = table.voxel(x, y, slice);
                    assert!(texel[3] <= previous[3], "({x}, {y}) slice {slice}");
                    for c in 0..3 {
                        assert!(texel[c] >= previous[c]);
                    }
                    previous = texel;
                }
            }
        }
    }

    #[test]
    fn test_columns_below_horizon_stop_at_ground() {
        let fixture = Fixture::new();
        let camera = CameraState {
            position: Vec3::new(0.0, 100.0, 0.0),
            forward: Vec3::NEG_Y,
            target: TargetDescriptor::new(64, 64),
            ..Default::default()
        };
        let table = fixture.volume(&camera);
        // Straight down the ground is 100 m away, inside the first slice.
        let center = SHAPE.width / 2;
        let first = table.voxel(center, center, 0);
        let last = table.voxel(center, center, SHAPE.slices - 1);
        assert_eq!(first, last);
        assert!(first[3] < 1.0);
    }

    #[test]
    fn test_froxel_directions_cover_frustum() {
        let camera = horizon_camera(0.0);
        let dirs = froxel_directions(&camera, SHAPE);
        assert_eq!(dirs.len(), (SHAPE.width * SHAPE.height) as usize);
        // Top-left cell looks up and to the left.
        assert!(dirs[0].x < 0.0 && dirs[0].y > 0.0);
        let last = dirs[dirs.len() - 1];
        assert!(last.x > 0.0);
    }

    #[test]
    fn test_sample_at_zero_distance_is_identity() {
        let fixture = Fixture::new();
        let table = fixture.volume(&horizon_camera(0.0));
        let lut = AerialPerspectiveLut::new(&table, fixture.params.aerial_perspective_distance);
        assert_eq!(lut.sample(0.5, 0.5, 0.0), IDENTITY);
    }

    #[test]
    fn test_sample_hits_slice_values_and_clamps() {
        let fixture = Fixture::new();
        let table = fixture.volume(&horizon_camera(0.0));
        let max = fixture.params.aerial_perspective_distance;
        let lut = AerialPerspectiveLut::new(&table, max);

        // Voxel (4, 4) center sits at u = v = 4.5 / 8.
        let uv = 4.5 / 8.0;
        let d3 = aerial_slice_distance(3, SHAPE.slices, f64::from(max)) as f32;
        let expected = Vec4::from(table.voxel(4, 4, 3));
        assert!((lut.sample(uv, uv, d3) - expected).abs().max_element() < 1e-4);

        let far = Vec4::from(table.voxel(4, 4, SHAPE.slices - 1));
        assert_eq!(lut.sample(uv, uv, max * 10.0), far);
    }
}
