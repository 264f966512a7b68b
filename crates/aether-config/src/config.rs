//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Physical atmosphere settings.
    pub atmosphere: AtmosphereSettings,
    /// Lookup-table shapes and integration sample counts.
    pub lut: LutSettings,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Physical description of the planet and its atmosphere.
///
/// Distances are in meters. Scales multiply fixed sea-level coefficients, so
/// `1.0` means Earth-like.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtmosphereSettings {
    /// World-space Y coordinate of the planet surface.
    pub sea_level: f32,
    /// Planet radius.
    pub planet_radius: f32,
    /// Thickness of the atmosphere shell above the surface.
    pub atmosphere_height: f32,
    /// Sun illuminance multiplier.
    pub sun_light_intensity: f32,
    /// Linear RGB sun color.
    pub sun_light_color: [f32; 3],
    /// Angular radius of the visible sun disk, in degrees.
    pub sun_disk_angle: f32,
    /// Rayleigh scattering scale.
    pub rayleigh_scattering_scale: f32,
    /// Rayleigh density scale height.
    pub rayleigh_scale_height: f32,
    /// Mie scattering scale.
    pub mie_scattering_scale: f32,
    /// Mie anisotropy (Henyey-Greenstein g), in (-1, 1).
    pub mie_anisotropy: f32,
    /// Mie density scale height.
    pub mie_scale_height: f32,
    /// Ozone absorption scale.
    pub ozone_absorption_scale: f32,
    /// Altitude of peak ozone density.
    pub ozone_level_center_height: f32,
    /// Half-width of the ozone layer.
    pub ozone_level_width: f32,
    /// Maximum distance covered by the aerial-perspective volume.
    pub aerial_perspective_distance: f32,
}

/// Lookup-table shapes and sample counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LutSettings {
    /// Transmittance table `(width, height)`.
    pub transmittance_size: (u32, u32),
    /// Multiple-scattering table `(width, height)`.
    pub multi_scattering_size: (u32, u32),
    /// Sky-view table `(width, height)`.
    pub sky_view_size: (u32, u32),
    /// Aerial-perspective volume `(width, height, slices)`.
    pub aerial_perspective_size: (u32, u32, u32),
    /// Quadrature steps per transmittance texel (at least 32).
    pub transmittance_steps: u32,
    /// Square root of the number of sphere directions per multi-scattering texel.
    pub multi_scattering_directions_sqrt: u32,
    /// Ray-march steps per multi-scattering direction.
    pub multi_scattering_steps: u32,
    /// Ray-march steps per sky-view texel.
    pub sky_view_steps: u32,
    /// Ray-march sub-steps per aerial-perspective slice.
    pub aerial_perspective_steps_per_slice: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Publish aerial-perspective snapshots for debug visualization.
    pub aerial_perspective_readback: bool,
    /// Capacity of the read-back channel. Snapshots beyond it are dropped.
    pub readback_capacity: usize,
}

// --- Default implementations ---

impl Default for AtmosphereSettings {
    fn default() -> Self {
        Self {
            sea_level: 0.0,
            planet_radius: 6_360_000.0,
            atmosphere_height: 60_000.0,
            sun_light_intensity: 31.4,
            sun_light_color: [1.0, 1.0, 1.0],
            sun_disk_angle: 9.0,
            rayleigh_scattering_scale: 1.0,
            rayleigh_scale_height: 8_000.0,
            mie_scattering_scale: 1.0,
            mie_anisotropy: 0.8,
            mie_scale_height: 1_200.0,
            ozone_absorption_scale: 1.0,
            ozone_level_center_height: 25_000.0,
            ozone_level_width: 15_000.0,
            aerial_perspective_distance: 32_000.0,
        }
    }
}

impl Default for LutSettings {
    fn default() -> Self {
        Self {
            transmittance_size: (256, 64),
            multi_scattering_size: (32, 32),
            sky_view_size: (256, 128),
            aerial_perspective_size: (32, 32, 32),
            transmittance_steps: 64,
            multi_scattering_directions_sqrt: 8,
            multi_scattering_steps: 20,
            sky_view_steps: 32,
            aerial_perspective_steps_per_slice: 4,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            aerial_perspective_readback: false,
            readback_capacity: 2,
        }
    }
}

/// Subdirectory of the platform config directory holding `config.ron`.
const APP_DIR_NAME: &str = "aether";

/// Default per-user configuration directory (`<config_dir>/aether`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    app_config_dir(dirs::config_dir())
}

fn app_config_dir(platform_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    platform_dir
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }

        let config = read_config(&config_path)?;
        log::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// [`Config::load_or_create`] in [`default_config_dir`].
    pub fn load_or_create_default() -> Result<Self, ConfigError> {
        Self::load_or_create(&default_config_dir()?)
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    ///
    /// An editor tweaking atmosphere values writes the file; the host polls
    /// this and feeds the new settings into the pipeline.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        if &new_config == self {
            return Ok(None);
        }
        log::info!("Config reloaded with changes");
        Ok(Some(new_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("planet_radius: 6360000"));
        assert!(ron_str.contains("aerial_perspective_readback: false"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_default_lut_shapes() {
        let lut = LutSettings::default();
        assert_eq!(lut.transmittance_size, (256, 64));
        assert_eq!(lut.multi_scattering_size, (32, 32));
        assert_eq!(lut.sky_view_size, (256, 128));
        assert_eq!(lut.aerial_perspective_size, (32, 32, 32));
        assert!(lut.transmittance_steps >= 32);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(atmosphere: (), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lut, LutSettings::default());
    }

    #[test]
    fn test_partial_atmosphere_section() {
        let ron_str = "(atmosphere: (mie_anisotropy: 0.95, sun_light_intensity: 20.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.atmosphere.mie_anisotropy, 0.95);
        assert_eq!(config.atmosphere.sun_light_intensity, 20.0);
        assert_eq!(config.atmosphere.planet_radius, 6_360_000.0);
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.atmosphere.atmosphere_height = 80_000.0;
        config.lut.sky_view_size = (192, 108);
        config.debug.aerial_perspective_readback = true;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.atmosphere.sun_disk_angle = 2.5;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().atmosphere.sun_disk_angle, 2.5);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_reload_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::default().reload(dir.path());
        match result {
            Err(ConfigError::Read { path, .. }) => assert!(path.ends_with(CONFIG_FILE_NAME)),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_app_config_dir_nests_under_platform_dir() {
        let dir = app_config_dir(Some(PathBuf::from("/home/user/.config"))).unwrap();
        assert_eq!(dir, Path::new("/home/user/.config/aether"));
        assert!(matches!(app_config_dir(None), Err(ConfigError::NoConfigDir)));
    }

    #[test]
    fn test_default_config_dir_follows_platform() {
        match (dirs::config_dir(), default_config_dir()) {
            (Some(platform), Ok(dir)) => {
                assert!(dir.starts_with(&platform));
                assert!(dir.ends_with(APP_DIR_NAME));
            }
            (None, Err(ConfigError::NoConfigDir)) => {}
            (platform, result) => panic!("platform dir {platform:?}, got {result:?}"),
        }
    }

    #[test]
    fn test_ron_comments_preserved() {
        let ron_str = "// This is a comment\n(\n  // Another comment\n)";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config, Config::default());
    }
}
