//! Frame orchestration: parameter updates, table generation in dependency
//! order, buffer reuse and the error policy.
//!
//! Transmittance and multiple scattering depend only on the parameters and
//! are regenerated when they change. Sky view and aerial perspective follow
//! the camera and are regenerated on every [`AtmospherePipeline::compute`],
//! concurrently.

use std::time::Instant;

use aether_config::{Config, LutSettings};
use glam::{DVec3, Vec3};
use tracing::{debug, info, trace, warn};

use crate::aerial_perspective::{self, AerialPerspectiveLut, froxel_directions};
use crate::camera::CameraState;
use crate::diagnostics::{ReadbackReceiver, ReadbackSender, ReadbackSnapshot, readback_channel};
use crate::error::AtmosphereError;
use crate::lut::{LookupTable, LutKind, LutShape};
use crate::mapping::aerial_slice_distance;
use crate::multi_scattering::{self, MultiScatteringLut, MultiScatteringSampling};
use crate::params::AtmosphereParameters;
use crate::sky_view::{self, SkyInputs, SkyViewLut, SkyViewSampling};
use crate::transmittance::{self, TransmittanceLut};
use crate::uniforms::{AtmosphereUniform, UniformValue, global_uniforms};

/// Table shapes and sample counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub transmittance_shape: LutShape,
    pub multi_scattering_shape: LutShape,
    pub sky_view_shape: LutShape,
    pub aerial_perspective_shape: LutShape,
    pub transmittance_steps: u32,
    pub multi_scattering: MultiScatteringSampling,
    pub sky_view_steps: u32,
    pub aerial_perspective_steps_per_slice: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&LutSettings::default())
    }
}

impl From<&LutSettings> for PipelineSettings {
    fn from(lut: &LutSettings) -> Self {
        let (ap_width, ap_height, ap_slices) = lut.aerial_perspective_size;
        Self {
            transmittance_shape: LutShape::plane(lut.transmittance_size.0, lut.transmittance_size.1),
            multi_scattering_shape: LutShape::plane(
                lut.multi_scattering_size.0,
                lut.multi_scattering_size.1,
            ),
            sky_view_shape: LutShape::plane(lut.sky_view_size.0, lut.sky_view_size.1),
            aerial_perspective_shape: LutShape::volume(ap_width, ap_height, ap_slices),
            transmittance_steps: lut.transmittance_steps,
            multi_scattering: MultiScatteringSampling {
                directions_sqrt: lut.multi_scattering_directions_sqrt,
                steps: lut.multi_scattering_steps,
            },
            sky_view_steps: lut.sky_view_steps,
            aerial_perspective_steps_per_slice: lut.aerial_perspective_steps_per_slice,
        }
    }
}

impl PipelineSettings {
    fn shape(&self, kind: LutKind) -> LutShape {
        match kind {
            LutKind::Transmittance => self.transmittance_shape,
            LutKind::MultiScattering => self.multi_scattering_shape,
            LutKind::SkyView => self.sky_view_shape,
            LutKind::AerialPerspective => self.aerial_perspective_shape,
        }
    }
}

struct Tables {
    transmittance: LookupTable,
    multi_scattering: LookupTable,
    sky_view: LookupTable,
    aerial_perspective: LookupTable,
}

impl Tables {
    fn try_new(settings: &PipelineSettings) -> Result<Self, AtmosphereError> {
        let alloc = |kind| LookupTable::try_new(kind, settings.shape(kind));
        Ok(Self {
            transmittance: alloc(LutKind::Transmittance)?,
            multi_scattering: alloc(LutKind::MultiScattering)?,
            sky_view: alloc(LutKind::SkyView)?,
            aerial_perspective: alloc(LutKind::AerialPerspective)?,
        })
    }
}

/// Tables of one frame, borrowed from the pipeline until the next call that
/// mutates it.
#[derive(Clone, Copy)]
pub struct FrameTables<'a> {
    /// Index of the compute call, starting at 1.
    pub frame: u64,
    pub params: &'a AtmosphereParameters,
    /// Camera distance from the planet center.
    pub camera_radius: f64,
    pub sun_direction: DVec3,
    pub aerial_perspective_shape: LutShape,
    pub transmittance: &'a LookupTable,
    pub multi_scattering: &'a LookupTable,
    pub sky_view: &'a LookupTable,
    pub aerial_perspective: &'a LookupTable,
}

impl<'a> FrameTables<'a> {
    pub fn table(&self, kind: LutKind) -> &'a LookupTable {
        match kind {
            LutKind::Transmittance => self.transmittance,
            LutKind::MultiScattering => self.multi_scattering,
            LutKind::SkyView => self.sky_view,
            LutKind::AerialPerspective => self.aerial_perspective,
        }
    }

    /// All four tables in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &'a LookupTable> + use<'a> {
        let tables = *self;
        LutKind::ALL.into_iter().map(move |kind| tables.table(kind))
    }

    pub fn transmittance_lut(&self) -> TransmittanceLut<'a> {
        TransmittanceLut::new(self.transmittance, self.params)
    }

    pub fn multi_scattering_lut(&self) -> MultiScatteringLut<'a> {
        MultiScatteringLut::new(self.multi_scattering, self.params)
    }

    pub fn sky_view_lut(&self) -> SkyViewLut<'a> {
        SkyViewLut::new(self.sky_view, self.params, self.camera_radius)
    }

    pub fn aerial_perspective_lut(&self) -> AerialPerspectiveLut<'a> {
        AerialPerspectiveLut::new(self.aerial_perspective, self.params.aerial_perspective_distance)
    }

    pub fn uniform(&self) -> AtmosphereUniform {
        AtmosphereUniform::new(
            self.params,
            self.sun_direction.as_vec3(),
            self.aerial_perspective_shape,
        )
    }

    pub fn global_uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        global_uniforms(self.params, self.aerial_perspective_shape)
    }
}

/// Owns the lookup tables and regenerates them per frame.
pub struct AtmospherePipeline {
    settings: PipelineSettings,
    params: AtmosphereParameters,
    tables: Option<Tables>,
    /// Transmittance and multiple scattering need regenerating.
    stale: bool,
    allocation_failed: bool,
    frame: u64,
    readback: Option<(ReadbackSender, ReadbackReceiver)>,
}

impl Default for AtmospherePipeline {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

impl AtmospherePipeline {
    /// A pipeline with default parameters. No memory is allocated until the
    /// first [`compute`](Self::compute).
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            params: AtmosphereParameters::default(),
            tables: None,
            stale: true,
            allocation_failed: false,
            frame: 0,
            readback: None,
        }
    }

    /// Build a pipeline from the loaded configuration.
    ///
    /// Invalid atmosphere settings are logged and replaced by the defaults.
    pub fn from_config(config: &Config) -> Self {
        let mut pipeline = Self::new(PipelineSettings::from(&config.lut));
        // Rejection is logged by `configure`.
        let _ = pipeline.configure(AtmosphereParameters::from(&config.atmosphere));
        if config.debug.aerial_perspective_readback {
            pipeline.enable_readback(config.debug.readback_capacity);
        }
        pipeline
    }

    pub fn params(&self) -> &AtmosphereParameters {
        &self.params
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Number of successful compute calls so far.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Replace the atmosphere parameters.
    ///
    /// Invalid parameters are rejected and the previous set stays active.
    pub fn configure(&mut self, params: AtmosphereParameters) -> Result<(), AtmosphereError> {
        if let Err(err) = params.validate() {
            warn!(error = %err, "Rejected atmosphere parameters, keeping previous set");
            return Err(err);
        }
        if params != self.params {
            info!(
                planet_radius = params.planet_radius,
                atmosphere_height = params.atmosphere_height,
                mie_anisotropy = params.mie_anisotropy,
                "Atmosphere parameters updated"
            );
            self.params = params;
            self.stale = true;
        }
        Ok(())
    }

    /// Replace table shapes and sample counts. Tables whose shape changed are
    /// reallocated on the next compute.
    pub fn set_settings(&mut self, settings: PipelineSettings) {
        if settings == self.settings {
            return;
        }
        let shapes_changed = LutKind::ALL
            .into_iter()
            .any(|kind| settings.shape(kind) != self.settings.shape(kind));
        if shapes_changed {
            self.tables = None;
        }
        self.settings = settings;
        self.stale = true;
    }

    /// Start publishing aerial-perspective snapshots after every compute.
    pub fn enable_readback(&mut self, capacity: usize) -> ReadbackReceiver {
        let (sender, receiver) = readback_channel(capacity);
        self.readback = Some((sender, receiver.clone()));
        receiver
    }

    pub fn disable_readback(&mut self) {
        self.readback = None;
    }

    /// Consumer half of the read-back channel, when enabled.
    pub fn readback_receiver(&self) -> Option<ReadbackReceiver> {
        self.readback.as_ref().map(|(_, receiver)| receiver.clone())
    }

    /// Drop every table. The next compute allocates them again.
    pub fn release(&mut self) {
        if self.tables.take().is_some() {
            debug!("Released atmosphere tables");
        }
        self.stale = true;
    }

    fn allocate_tables(&mut self) -> Result<Tables, AtmosphereError> {
        match Tables::try_new(&self.settings) {
            Ok(tables) => {
                if self.allocation_failed {
                    info!("Atmosphere table allocation recovered");
                    self.allocation_failed = false;
                }
                self.stale = true;
                Ok(tables)
            }
            Err(err) => {
                if !self.allocation_failed {
                    warn!(error = %err, "Skipping atmosphere frame, table allocation failed");
                    self.allocation_failed = true;
                } else {
                    trace!(error = %err, "Table allocation still failing");
                }
                Err(err)
            }
        }
    }

    /// Regenerate the tables for `camera` with the sun along `sun_direction`.
    ///
    /// Allocation failure skips the frame and is retried on the next call.
    pub fn compute(
        &mut self,
        camera: &CameraState,
        sun_direction: Vec3,
    ) -> Result<FrameTables<'_>, AtmosphereError> {
        let tables = match self.tables.take() {
            Some(tables) => tables,
            None => self.allocate_tables()?,
        };
        let tables = self.tables.insert(tables);
        let params = &self.params;
        let settings = &self.settings;

        if self.stale {
            let start = Instant::now();
            transmittance::generate(params, settings.transmittance_steps, &mut tables.transmittance);
            debug!(
                elapsed_us = start.elapsed().as_micros() as u64,
                "Generated transmittance table"
            );

            let start = Instant::now();
            let transmittance_lut = TransmittanceLut::new(&tables.transmittance, params);
            multi_scattering::generate(
                params,
                &transmittance_lut,
                settings.multi_scattering,
                &mut tables.multi_scattering,
            );
            debug!(
                elapsed_us = start.elapsed().as_micros() as u64,
                "Generated multi-scattering table"
            );
            self.stale = false;
        }

        let sun = sun_direction.as_dvec3().try_normalize().unwrap_or(DVec3::Y);
        let camera_radius = camera.planet_radius(params);
        let inputs = SkyInputs {
            params,
            transmittance: TransmittanceLut::new(&tables.transmittance, params),
            multi_scattering: MultiScatteringLut::new(&tables.multi_scattering, params),
            sun_direction: sun,
        };
        let sky_sampling = SkyViewSampling {
            steps: settings.sky_view_steps,
            sun_disk: true,
        };

        let start = Instant::now();
        let sky_table = &mut tables.sky_view;
        let aerial_table = &mut tables.aerial_perspective;
        std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name("sky-view-lut".into())
                .spawn_scoped(scope, || {
                    sky_view::generate(&inputs, camera_radius, sky_sampling, sky_table);
                })
                .expect("failed to spawn sky-view thread");
            aerial_perspective::generate(
                &inputs,
                camera,
                settings.aerial_perspective_steps_per_slice,
                aerial_table,
            );
        });
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            "Generated sky-view and aerial-perspective tables"
        );

        self.frame += 1;
        if let Some((sender, _)) = &self.readback {
            sender.publish(first_slice_snapshot(
                self.frame,
                camera,
                params,
                &tables.aerial_perspective,
            ));
        }

        Ok(FrameTables {
            frame: self.frame,
            params,
            camera_radius,
            sun_direction: sun,
            aerial_perspective_shape: settings.aerial_perspective_shape,
            transmittance: &tables.transmittance,
            multi_scattering: &tables.multi_scattering,
            sky_view: &tables.sky_view,
            aerial_perspective: &tables.aerial_perspective,
        })
    }
}

fn first_slice_snapshot(
    frame: u64,
    camera: &CameraState,
    params: &AtmosphereParameters,
    aerial: &LookupTable,
) -> ReadbackSnapshot {
    let shape = aerial.shape();
    let texels = (0..shape.height)
        .flat_map(|y| (0..shape.width).map(move |x| aerial.voxel(x, y, 0)))
        .collect();
    ReadbackSnapshot {
        frame,
        camera_position: camera.position,
        width: shape.width,
        height: shape.height,
        slice_distance: aerial_slice_distance(
            0,
            shape.slices,
            f64::from(params.aerial_perspective_distance),
        ) as f32,
        directions: froxel_directions(camera, shape),
        texels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TargetDescriptor;

    fn small_settings() -> PipelineSettings {
        PipelineSettings {
            transmittance_shape: LutShape::plane(32, 8),
            multi_scattering_shape: LutShape::plane(8, 8),
            sky_view_shape: LutShape::plane(16, 8),
            aerial_perspective_shape: LutShape::volume(4, 4, 8),
            transmittance_steps: 32,
            multi_scattering: MultiScatteringSampling {
                directions_sqrt: 2,
                steps: 6,
            },
            sky_view_steps: 8,
            aerial_perspective_steps_per_slice: 1,
        }
    }

    fn camera() -> CameraState {
        CameraState {
            position: Vec3::new(0.0, 10.0, 0.0),
            target: TargetDescriptor::new(64, 64),
            ..Default::default()
        }
    }

    #[test]
    fn test_settings_from_lut_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.transmittance_shape, LutShape::plane(256, 64));
        assert_eq!(settings.aerial_perspective_shape, LutShape::volume(32, 32, 32));
        assert_eq!(settings.multi_scattering.directions_sqrt, 8);
        assert_eq!(settings.aerial_perspective_steps_per_slice, 4);
    }

    #[test]
    fn test_no_allocation_before_first_compute() {
        let pipeline = AtmospherePipeline::new(small_settings());
        assert!(pipeline.tables.is_none());
        assert_eq!(pipeline.frame_index(), 0);
    }

    #[test]
    fn test_compute_fills_all_tables() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        let frame = pipeline.compute(&camera(), Vec3::new(0.0, 1.0, -1.0)).unwrap();
        assert_eq!(frame.frame, 1);
        for table in frame.iter() {
            assert!(table.is_physically_valid(), "{:?}", table.kind());
            assert!(table.texels().iter().any(|t| t[0] > 0.0), "{:?}", table.kind());
        }
        assert!((frame.sun_direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_tables_only_regenerate_on_change() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        pipeline.compute(&camera(), Vec3::Y).unwrap();
        assert!(!pipeline.stale);

        pipeline.configure(AtmosphereParameters::default()).unwrap();
        assert!(!pipeline.stale, "identical parameters keep the tables");

        let params = AtmosphereParameters {
            mie_anisotropy: 0.5,
            ..Default::default()
        };
        pipeline.configure(params).unwrap();
        assert!(pipeline.stale);
    }

    #[test]
    fn test_rejected_parameters_keep_previous() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        let good = AtmosphereParameters {
            sun_intensity: 10.0,
            ..Default::default()
        };
        pipeline.configure(good.clone()).unwrap();
        let bad = AtmosphereParameters {
            planet_radius: f32::NAN,
            ..Default::default()
        };
        assert!(pipeline.configure(bad).is_err());
        assert_eq!(pipeline.params(), &good);
    }

    #[test]
    fn test_release_then_compute_reacquires() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        pipeline.compute(&camera(), Vec3::Y).unwrap();
        pipeline.release();
        assert!(pipeline.tables.is_none());
        let frame = pipeline.compute(&camera(), Vec3::Y).unwrap();
        assert_eq!(frame.frame, 2);
    }

    #[test]
    fn test_allocation_failure_then_recovery() {
        let mut broken = small_settings();
        broken.aerial_perspective_shape = LutShape::volume(u32::MAX, u32::MAX, 2);
        let mut pipeline = AtmospherePipeline::new(broken);
        for _ in 0..2 {
            let err = pipeline.compute(&camera(), Vec3::Y).err();
            assert!(matches!(
                err,
                Some(AtmosphereError::Allocation {
                    table: LutKind::AerialPerspective,
                    ..
                })
            ));
        }
        assert!(pipeline.allocation_failed);
        assert_eq!(pipeline.frame_index(), 0);

        pipeline.set_settings(small_settings());
        assert!(pipeline.compute(&camera(), Vec3::Y).is_ok());
        assert!(!pipeline.allocation_failed);
    }

    #[test]
    fn test_readback_disabled_by_default() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        pipeline.compute(&camera(), Vec3::Y).unwrap();
        assert!(pipeline.readback_receiver().is_none());
    }

    #[test]
    fn test_readback_snapshot_contents() {
        let mut pipeline = AtmospherePipeline::new(small_settings());
        let receiver = pipeline.enable_readback(4);
        pipeline.compute(&camera(), Vec3::Y).unwrap();
        let snapshot = receiver.try_recv().expect("snapshot published");
        assert_eq!(snapshot.frame, 1);
        assert_eq!(snapshot.camera_position, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(snapshot.directions.len(), 16);
        assert_eq!(snapshot.texels.len(), 16);
        assert!((snapshot.slice_distance - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_from_config_applies_sections() {
        let mut config = Config::default();
        config.atmosphere.sun_light_intensity = 20.0;
        config.lut.sky_view_size = (64, 32);
        config.debug.aerial_perspective_readback = true;
        let pipeline = AtmospherePipeline::from_config(&config);
        assert_eq!(pipeline.params().sun_intensity, 20.0);
        assert_eq!(pipeline.settings().sky_view_shape, LutShape::plane(64, 32));
        assert!(pipeline.readback_receiver().is_some());
    }

    #[test]
    fn test_from_config_with_invalid_atmosphere_uses_defaults() {
        let mut config = Config::default();
        config.atmosphere.mie_anisotropy = 2.0;
        let pipeline = AtmospherePipeline::from_config(&config);
        assert_eq!(pipeline.params(), &AtmosphereParameters::default());
    }
}
