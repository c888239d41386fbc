// User settings loaded from ~/.config/skymap/settings.toml

use crate::error::SettingsError;
use crate::export::ExportOptions;
use crate::filter::CategoryToggles;
use crate::layout::ViewMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/skymap/settings.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub view: ViewSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the enumeration service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// `container-grouped`, `linear-flow` or `hierarchical` (short keys accepted).
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub categories: CategorySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySettings {
    #[serde(default = "enabled")]
    pub resource: bool,
    #[serde(default = "enabled")]
    pub network: bool,
    #[serde(default = "enabled")]
    pub data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_padding")]
    pub padding: f32,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_mode() -> String {
    ViewMode::ContainerGrouped.as_str().to_string()
}

fn enabled() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

fn default_background() -> String {
    "#ffffff".to_string()
}

fn default_padding() -> f32 {
    40.0
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            categories: CategorySettings::default(),
        }
    }
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            resource: true,
            network: true,
            data: true,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            background: default_background(),
            padding: default_padding(),
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        PathBuf::from(shellexpand::tilde(DEFAULT_SETTINGS_PATH).as_ref())
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&contents)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if ViewMode::from_str(&self.view.mode).is_none() {
            return Err(SettingsError::Invalid {
                key: "view.mode".to_string(),
                message: format!("unknown view mode '{}'", self.view.mode),
            });
        }
        if !(self.export.scale.is_finite() && self.export.scale > 0.0) {
            return Err(SettingsError::Invalid {
                key: "export.scale".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.backend.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "backend.timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn view_mode(&self) -> ViewMode {
        ViewMode::from_str(&self.view.mode).unwrap_or_default()
    }

    pub fn category_toggles(&self) -> CategoryToggles {
        let c = &self.view.categories;
        CategoryToggles::new(c.resource, c.network, c.data)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            scale: self.export.scale,
            background: self.export.background.clone(),
            padding: self.export.padding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdgeCategory;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.backend.endpoint, "http://127.0.0.1:8000");
        assert_eq!(settings.backend.timeout_secs, 120);
        assert_eq!(settings.view_mode(), ViewMode::ContainerGrouped);
        assert_eq!(settings.category_toggles(), CategoryToggles::default());
        assert_eq!(settings.export_options(), ExportOptions::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = Settings::from_toml(
            r#"
[view]
mode = "service"

[view.categories]
network = false
"#,
        )
        .unwrap();
        assert_eq!(settings.view_mode(), ViewMode::LinearFlow);
        let toggles = settings.category_toggles();
        assert!(!toggles.is_enabled(EdgeCategory::Network));
        assert!(toggles.is_enabled(EdgeCategory::Data));
        assert_eq!(settings.export.padding, 40.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_toml("[view]\nmode = \"radial\"\n"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            Settings::from_toml("[export]\nscale = 0.0\n"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            Settings::from_toml("not = [valid"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_and_present() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        fs::write(&path, "[backend]\nendpoint = \"http://enum.internal:9000\"\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.backend.endpoint, "http://enum.internal:9000");
        assert_eq!(settings.backend.timeout_secs, 120);
    }

    #[test]
    fn test_default_path_is_expanded() {
        let path = Settings::default_path();
        assert!(path.ends_with(".config/skymap/settings.toml"));
    }
}
