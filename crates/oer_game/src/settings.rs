//! Optional `oeracer.json` overrides. Every field has a default, so a partial
//! file only changes what it names.

use std::fs;
use std::path::{Path, PathBuf};

use oer_platform::FrameConfig;
use serde::{Deserialize, Serialize};

use crate::controller::ControllerConfig;
use crate::physics::PhysicsConfig;

pub const SETTINGS_FILE: &str = "oeracer.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadConfig {
    pub max_face_count: usize,
    pub max_quad_size: f32,
}

impl Default for QuadConfig {
    fn default() -> Self {
        Self {
            max_face_count: 500,
            max_quad_size: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        let frame = FrameConfig::default();
        Self {
            title: frame.title,
            width: frame.width,
            height: frame.height,
            depth: frame.depth,
        }
    }
}

impl WindowSettings {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub model_list: PathBuf,
    pub cache_path: PathBuf,
    /// Where debugging writes its `.dot` graphs.
    pub dot_dir: PathBuf,
    pub window: WindowSettings,
    pub near: f32,
    pub far: f32,
    pub vehicle_start: [f32; 3],
    pub vehicle_gravity: [f32; 3],
    pub static_quad: QuadConfig,
    pub controller: ControllerConfig,
    pub physics: PhysicsConfig,
    pub debugging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("projects/OERacer/data/"),
            model_list: PathBuf::from("projects/OERacer/models.txt"),
            cache_path: PathBuf::from("oeracer-physics-scene.bin"),
            dot_dir: PathBuf::from("."),
            window: WindowSettings::default(),
            near: 20.0,
            far: 3000.0,
            vehicle_start: [2.0, 100.0, 2.0],
            vehicle_gravity: [0.0, -9.82 * 20.0, 0.0],
            static_quad: QuadConfig::default(),
            controller: ControllerConfig::default(),
            physics: PhysicsConfig::default(),
            debugging: false,
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse settings JSON {}: {e}", path.display()))
}

/// Settings from `path`, or defaults when it is missing or malformed.
pub fn load_or_default(path: &Path) -> Settings {
    if !path.exists() {
        log::debug!("No {} found, using defaults", path.display());
        return Settings::default();
    }
    match load_settings(path) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path.display());
            settings
        }
        Err(err) => {
            log::warn!("{err}. Using defaults.");
            Settings::default()
        }
    }
}
