//! Configuration – reads `~/.mapfuse/config.toml` (or `--config <path>`).
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Values are read once at startup; geometry is validated when the
//! [`MapBuilder`][mapfuse_runtime::MapBuilder] is built.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mapfuse_perception::MapGeometry;
use mapfuse_runtime::MapBuilderConfig;
use mapfuse_types::{ImageEncoding, MapError};
use serde::{Deserialize, Serialize};

/// Canvas geometry, `[map]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
    pub origin_x: i64,
    pub origin_y: i64,
    pub meters_per_pixel: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        let g = MapGeometry::default();
        Self {
            width: g.width,
            height: g.height,
            origin_x: g.origin_x,
            origin_y: g.origin_y,
            meters_per_pixel: g.meters_per_pixel,
        }
    }
}

/// Simulated session, `[sim]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames to capture; `0` runs until Ctrl-C.
    pub frame_count: u64,
    pub period_ms: u64,
    pub encoding: ImageEncoding,
    /// Circle the agent drives, in metres and rad/s.
    pub radius_m: f64,
    pub angular_speed: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            frame_width: 120,
            frame_height: 90,
            frame_count: 100,
            period_ms: 100,
            encoding: ImageEncoding::Mono8,
            radius_m: 0.6,
            angular_speed: 0.4,
        }
    }
}

/// User configuration stored in `~/.mapfuse/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum wait for the pose of one frame.
    #[serde(default = "default_pose_timeout_ms")]
    pub pose_timeout_ms: u64,

    /// Initial frames that only fill the frame buffer.
    #[serde(default)]
    pub warmup_frames: u32,

    /// Pose history kept by the in-process pose buffer.
    #[serde(default = "default_pose_cache_secs")]
    pub pose_cache_secs: u64,

    #[serde(default)]
    pub map: MapSettings,

    #[serde(default)]
    pub sim: SimSettings,
}

fn default_pose_timeout_ms() -> u64 {
    3000
}
fn default_pose_cache_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pose_timeout_ms: default_pose_timeout_ms(),
            warmup_frames: 0,
            pose_cache_secs: default_pose_cache_secs(),
            map: MapSettings::default(),
            sim: SimSettings::default(),
        }
    }
}

impl Config {
    pub fn geometry(&self) -> MapGeometry {
        MapGeometry {
            width: self.map.width,
            height: self.map.height,
            origin_x: self.map.origin_x,
            origin_y: self.map.origin_y,
            meters_per_pixel: self.map.meters_per_pixel,
        }
    }

    pub fn builder_config(&self) -> MapBuilderConfig {
        MapBuilderConfig {
            geometry: self.geometry(),
            pose_timeout: Duration::from_millis(self.pose_timeout_ms),
            warmup_frames: self.warmup_frames,
        }
    }

    pub fn pose_cache(&self) -> Duration {
        Duration::from_secs(self.pose_cache_secs)
    }
}

/// Return the path to `~/.mapfuse/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mapfuse").join("config.toml")
}

/// Load `explicit` if given, else the default path.  A missing file yields
/// the defaults; environment overrides are applied either way.
pub fn load(explicit: Option<&Path>) -> Result<Config, MapError> {
    let path = explicit.map_or_else(config_path, Path::to_path_buf);
    let mut cfg = match load_from(&path)? {
        Some(cfg) => cfg,
        None if explicit.is_some() => {
            return Err(MapError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        None => Config::default(),
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, MapError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        MapError::Configuration(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| MapError::Configuration(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), MapError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            MapError::Configuration(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| MapError::Configuration(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        MapError::Configuration(format!("failed to write config at {}: {e}", path.display()))
    })
}

/// Apply `MAPFUSE_*` environment variable overrides to `cfg`.  Unparseable
/// values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `MAPFUSE_MAP_WIDTH` | `map.width` |
/// | `MAPFUSE_MAP_HEIGHT` | `map.height` |
/// | `MAPFUSE_ORIGIN_X` | `map.origin_x` |
/// | `MAPFUSE_ORIGIN_Y` | `map.origin_y` |
/// | `MAPFUSE_METERS_PER_PIXEL` | `map.meters_per_pixel` |
/// | `MAPFUSE_POSE_TIMEOUT_MS` | `pose_timeout_ms` |
/// | `MAPFUSE_WARMUP_FRAMES` | `warmup_frames` |
pub fn apply_env_overrides(cfg: &mut Config) {
    override_from_env("MAPFUSE_MAP_WIDTH", &mut cfg.map.width);
    override_from_env("MAPFUSE_MAP_HEIGHT", &mut cfg.map.height);
    override_from_env("MAPFUSE_ORIGIN_X", &mut cfg.map.origin_x);
    override_from_env("MAPFUSE_ORIGIN_Y", &mut cfg.map.origin_y);
    override_from_env("MAPFUSE_METERS_PER_PIXEL", &mut cfg.map.meters_per_pixel);
    override_from_env("MAPFUSE_POSE_TIMEOUT_MS", &mut cfg.pose_timeout_ms);
    override_from_env("MAPFUSE_WARMUP_FRAMES", &mut cfg.warmup_frames);
}

fn override_from_env<T: std::str::FromStr>(var: &str, field: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(parsed) = v.trim().parse::<T>()
    {
        *field = parsed;
    }
}
