//! User settings for drawing defaults and actor presets
//!
//! Stored as pretty JSON inside a versioned envelope.

use crate::actor::{ActorKind, ActorRegistry};
use crate::annotation::Color;
use crate::drawing::ShapeStyle;
use crate::error::OverlayError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_SCHEMA_VERSION: u32 = 1;
const CONFIG_FILE_NAME: &str = "overlay.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to resolve config directory")]
    NoConfigDirectory,
    #[error("config schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("actor preset rejected: {0}")]
    Actor(#[from] OverlayError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// An actor created when a document session starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorPreset {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: ActorKind,
    /// Overrides the kind's palette color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

fn default_kind() -> ActorKind {
    ActorKind::Other
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Stroke width in points.
    pub stroke_width: f32,
    /// Text box font size in points.
    pub text_size: f32,
    /// Drags shorter than this many view pixels are discarded.
    pub min_drag_px: f32,
    pub unique_actor_names: bool,
    pub actors: Vec<ActorPreset>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            text_size: 12.0,
            min_drag_px: 3.0,
            unique_actor_names: false,
            actors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: OverlayConfig,
}

impl OverlayConfig {
    /// Per-user config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "PdfOverlay", "PdfOverlay")
            .ok_or(ConfigError::NoConfigDirectory)?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let bytes = fs::read(path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: envelope.version,
                supported: CONFIG_SCHEMA_VERSION,
            });
        }

        envelope.config.validate()?;
        Ok(envelope.config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: self.clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        };
        positive("stroke_width", self.stroke_width)?;
        positive("text_size", self.text_size)?;

        if !self.min_drag_px.is_finite() || self.min_drag_px < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_drag_px must not be negative, got {}",
                self.min_drag_px
            )));
        }
        Ok(())
    }

    pub fn shape_style(&self) -> ShapeStyle {
        ShapeStyle {
            stroke_width: self.stroke_width,
            text_size: self.text_size,
            min_drag_px: self.min_drag_px,
        }
    }

    /// Build a registry holding every preset, the first one active
    pub fn build_registry(&self) -> Result<ActorRegistry, ConfigError> {
        let mut registry = ActorRegistry::with_unique_names(self.unique_actor_names);
        for preset in &self.actors {
            let color = preset.color.unwrap_or_else(|| preset.kind.default_color());
            let actor = registry.add_actor_with_kind(preset.name.clone(), preset.kind, color)?;
            log::debug!("loaded actor preset {} as {}", preset.name, actor.id());
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::UNASSIGNED_ACTOR_NAME;

    fn sample() -> OverlayConfig {
        OverlayConfig {
            stroke_width: 1.5,
            actors: vec![
                ActorPreset { name: "Acme".to_owned(), kind: ActorKind::Business, color: None },
                ActorPreset {
                    name: "Iron Gym".to_owned(),
                    kind: ActorKind::Gym,
                    color: Some(Color::rgb(10, 20, 30)),
                },
            ],
            ..OverlayConfig::default()
        }
    }

    #[test]
    fn config_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("nested").join(CONFIG_FILE_NAME);

        sample().save(&path).expect("save should succeed");
        let loaded = OverlayConfig::load(&path).expect("load should succeed");

        assert_eq!(loaded, sample());
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let loaded = OverlayConfig::load(&temp.path().join("missing.json")).expect("load should succeed");
        assert_eq!(loaded, OverlayConfig::default());
        assert_eq!(loaded.shape_style(), ShapeStyle::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"version":1,"config":{"actors":[{"name":"City","kind":"government"}]}}"#)
            .expect("write should succeed");

        let loaded = OverlayConfig::load(&path).expect("load should succeed");
        assert_eq!(loaded.stroke_width, 2.0);
        assert_eq!(loaded.actors[0].kind, ActorKind::Government);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"version":99,"config":{}}"#).expect("write should succeed");

        assert!(matches!(
            OverlayConfig::load(&path),
            Err(ConfigError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn invalid_stroke_width_is_rejected() {
        let config = OverlayConfig { stroke_width: 0.0, ..OverlayConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn registry_uses_palette_and_overrides() {
        let registry = sample().build_registry().expect("registry should build");
        let colors: Vec<_> = registry.iter().map(|actor| actor.color()).collect();

        assert_eq!(colors, vec![Color::rgb(0, 102, 204), Color::rgb(10, 20, 30)]);
        assert_eq!(registry.active().display_name(), "Acme");
    }

    #[test]
    fn duplicate_presets_fail_under_unique_policy() {
        let mut config = sample();
        config.unique_actor_names = true;
        config.actors.push(config.actors[0].clone());

        assert!(matches!(config.build_registry(), Err(ConfigError::Actor(_))));
    }

    #[test]
    fn preset_may_reuse_placeholder_name_under_unique_policy() {
        let config = OverlayConfig {
            unique_actor_names: true,
            actors: vec![ActorPreset {
                name: UNASSIGNED_ACTOR_NAME.to_owned(),
                kind: ActorKind::Other,
                color: Some(Color::BLUE),
            }],
            ..OverlayConfig::default()
        };

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active().color(), Color::BLUE);
    }
}
