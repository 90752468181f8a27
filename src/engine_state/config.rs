//! # World Configuration
//!
//! Tunables for the chunked world engine. Every field has a default so a
//! configuration file only needs to name what it changes:
//!
//! ```json
//! { "render_distance": 4, "device_profile": "Constrained" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Hardware class of the device running the engine.
///
/// Constrained devices (phones, tablets, integrated GPUs) get a smaller active
/// radius around the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceProfile {
    /// Desktop-class hardware.
    #[default]
    Desktop,
    /// Memory or fill-rate constrained hardware.
    Constrained,
}

/// Layout of the shared block texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Number of square slots per atlas row (the atlas is square).
    pub slots_per_row: u32,
    /// Edge length of one slot in texels.
    pub tile_pixels: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            slots_per_row: 16,
            tile_pixels: 16,
        }
    }
}

/// Configuration of one world instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Generation seed used when the store holds no world metadata yet.
    /// `None` picks a random seed.
    pub seed: Option<u32>,
    /// Horizontal edge length of a chunk in blocks.
    pub chunk_size: usize,
    /// Vertical extent of a chunk (and of the world) in blocks.
    pub chunk_height: usize,
    /// Active radius in chunks on desktop hardware.
    pub render_distance: i32,
    /// Active radius in chunks on constrained hardware.
    pub constrained_render_distance: i32,
    /// Which of the two radii applies.
    pub device_profile: DeviceProfile,
    /// Number of resident chunk buffers above which eviction kicks in.
    pub max_resident_chunks: usize,
    /// Maximum number of buffers released by one eviction pass.
    pub eviction_batch: usize,
    /// Probability per update that the eviction pass runs.
    pub eviction_probability: f64,
    /// Generation worker threads. `None` uses available parallelism minus one,
    /// `Some(0)` generates synchronously on the owner thread.
    pub worker_count: Option<usize>,
    /// Camera rotation (radians) that forces a full visibility pass.
    pub rotation_threshold: f32,
    /// Camera movement (blocks) that forces a full visibility pass.
    pub movement_threshold: f32,
    /// Neighbor meshes rebuilt per update after new chunks arrive.
    pub neighbor_remesh_per_update: usize,
    /// Seconds between background saves of dirty chunks. `0` disables autosave.
    pub autosave_interval_secs: u64,
    /// Maximum number of chunk meshes kept alive at once.
    pub mesh_capacity: usize,
    /// Texture atlas layout.
    pub atlas: AtlasConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            chunk_size: 32,
            chunk_height: 128,
            render_distance: 6,
            constrained_render_distance: 3,
            device_profile: DeviceProfile::Desktop,
            max_resident_chunks: 500,
            eviction_batch: 50,
            eviction_probability: 0.02,
            worker_count: None,
            rotation_threshold: 0.05,
            movement_threshold: 2.0,
            neighbor_remesh_per_update: 4,
            autosave_interval_secs: 30,
            mesh_capacity: 4096,
            atlas: AtlasConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Radius in chunks of the active square around the viewer.
    pub fn active_radius(&self) -> i32 {
        match self.device_profile {
            DeviceProfile::Desktop => self.render_distance,
            DeviceProfile::Constrained => self.constrained_render_distance,
        }
    }

    /// Number of generation worker threads to spawn.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(count) => count,
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(1),
        }
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size < 8 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: format!("must be at least 8, got {}", self.chunk_size),
            });
        }
        if !(16..=256).contains(&self.chunk_height) {
            return Err(ConfigError::Invalid {
                field: "chunk_height",
                reason: format!("must be within 16..=256, got {}", self.chunk_height),
            });
        }
        if self.render_distance < 1 || self.constrained_render_distance < 1 {
            return Err(ConfigError::Invalid {
                field: "render_distance",
                reason: "both radii must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.eviction_probability) {
            return Err(ConfigError::Invalid {
                field: "eviction_probability",
                reason: format!("must be within 0..=1, got {}", self.eviction_probability),
            });
        }
        if self.atlas.slots_per_row == 0 || self.atlas.tile_pixels == 0 {
            return Err(ConfigError::Invalid {
                field: "atlas",
                reason: "atlas dimensions must be non-zero".to_string(),
            });
        }
        if self.mesh_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "mesh_capacity",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorldConfig::default();
        assert_eq!(config.chunk_size, 32);
        assert_eq!(config.chunk_height, 128);
        assert_eq!(config.max_resident_chunks, 500);
        assert_eq!(config.eviction_batch, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            WorldConfig::from_json(r#"{ "render_distance": 4, "device_profile": "Constrained" }"#)
                .unwrap();
        assert_eq!(config.render_distance, 4);
        assert_eq!(config.chunk_size, 32);
        assert_eq!(config.active_radius(), config.constrained_render_distance);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = WorldConfig::from_json(r#"{ "chunk_height": 1000 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "chunk_height",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            WorldConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
