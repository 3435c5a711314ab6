use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pdf::{Granularity, RenderConfig, SelectionConfig};
use crate::placement::{BoxDefaults, CanvasBounds};
use crate::zones::{Template, ZoneLayout};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "zonepad";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub granularity: Granularity,

    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f32,

    #[serde(default = "default_collapse_min_run")]
    pub collapse_min_run: usize,

    #[serde(default = "default_collapse_keep")]
    pub collapse_keep: usize,

    #[serde(default = "default_scale")]
    pub default_scale: f32,

    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    #[serde(default = "default_one")]
    pub render_workers: usize,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_one")]
    pub prefetch_radius: usize,

    #[serde(default)]
    pub layout: ZoneLayout,

    #[serde(default)]
    pub canvas: CanvasBounds,

    #[serde(default = "default_box_width")]
    pub default_box_width: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_box_color: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_overlap_threshold() -> f32 {
    crate::pdf::DEFAULT_OVERLAP_THRESHOLD
}

fn default_collapse_min_run() -> usize {
    3
}

fn default_collapse_keep() -> usize {
    2
}

fn default_scale() -> f32 {
    1.0
}

fn default_min_scale() -> f32 {
    0.5
}

fn default_max_scale() -> f32 {
    2.0
}

fn default_render_timeout_ms() -> u64 {
    10_000
}

fn default_one() -> usize {
    1
}

fn default_cache_size() -> usize {
    8
}

fn default_box_width() -> f32 {
    200.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            granularity: Granularity::default(),
            overlap_threshold: default_overlap_threshold(),
            collapse_min_run: default_collapse_min_run(),
            collapse_keep: default_collapse_keep(),
            default_scale: default_scale(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            render_timeout_ms: default_render_timeout_ms(),
            render_workers: default_one(),
            cache_size: default_cache_size(),
            prefetch_radius: default_one(),
            layout: ZoneLayout::default(),
            canvas: CanvasBounds::default(),
            default_box_width: default_box_width(),
            default_box_color: None,
            templates: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML, repairing out-of-range values
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let mut settings: Settings = serde_yaml::from_str(content)?;
        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
        }
        settings.sanitize();
        Ok(settings)
    }

    fn sanitize(&mut self) {
        if !(self.overlap_threshold.is_finite() && (0.0..=1.0).contains(&self.overlap_threshold)) {
            warn!(
                "overlap_threshold {} out of range, using default",
                self.overlap_threshold
            );
            self.overlap_threshold = default_overlap_threshold();
        }
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            self.min_scale = default_min_scale();
        }
        if !(self.max_scale.is_finite() && self.max_scale >= self.min_scale) {
            self.max_scale = default_max_scale().max(self.min_scale);
        }
        if !self.default_scale.is_finite() {
            self.default_scale = default_scale();
        }
        self.default_scale = self.default_scale.clamp(self.min_scale, self.max_scale);
        if self.render_timeout_ms == 0 {
            self.render_timeout_ms = default_render_timeout_ms();
        }
    }

    #[must_use]
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            workers: self.render_workers.max(1),
            cache_size: self.cache_size,
            prefetch_radius: self.prefetch_radius,
            timeout: Duration::from_millis(self.render_timeout_ms),
        }
    }

    #[must_use]
    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            overlap_threshold: self.overlap_threshold,
            collapse_min_run: self.collapse_min_run,
            collapse_keep: self.collapse_keep,
        }
    }

    #[must_use]
    pub fn box_defaults(&self) -> BoxDefaults {
        BoxDefaults {
            width: self.default_box_width,
            height: None,
            color: self.default_box_color.clone(),
        }
    }
}

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path`, or from the user config directory.
///
/// A missing default config file is created with defaults. Read or parse
/// failures are logged and fall back to defaults.
pub fn load_settings(path: Option<&Path>) -> Settings {
    if let Some(path) = path {
        return load_settings_from_path(path).unwrap_or_default();
    }

    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };

    if path.exists() {
        load_settings_from_path(&path).unwrap_or_default()
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_file(&settings, &path);
        settings
    }
}

fn load_settings_from_path(path: &Path) -> Option<Settings> {
    match fs::read_to_string(path) {
        Ok(content) => match Settings::from_yaml(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {path:?}");
                Some(settings)
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                None
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{body}\n{CUSTOM_TEMPLATES_TEMPLATE}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const CUSTOM_TEMPLATES_TEMPLATE: &str = r#"# ============================================================================
# Custom Templates
# ============================================================================
# Add your own analysis frameworks below. A template with the id of a
# built-in one (swot, 4p, 3c, pest, five_forces, ...) replaces it.
# Zone order decides where the first box of each zone is placed.
#
# Example:
# templates:
#   - id: lean_canvas
#     name: "Lean Canvas"
#     zones:
#       - { id: problem, label: "Problem" }
#       - { id: solution, label: "Solution" }
#       - { id: unfair_advantage, label: "Unfair Advantage", group: analysis }
"#;
