//! # Layer Compiler Configuration
//!
//! Parses the TOML file that sets compile-wide options and the initial
//! session state. Every field is optional; omitted fields take the
//! compiler defaults.
//!
//! ```toml
//! render_bin_number = 20
//! fade_lods = true
//! workers = 4
//! resource_base_uri = "/data/project"
//!
//! [properties]
//! tree_height = "12.5"
//! ```

use crate::error::Result;
use crate::property::Property;
use crate::resource::ResourceLibrary;
use crate::script::BoxedScriptEngineFactory;
use crate::session::Session;
use crate::task::{BoxedTaskManager, ThreadPoolTaskManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Render bin value meaning "unset"
pub const RENDER_BIN_UNSET: i32 = i32::MAX;

/// Output shaping settings read by every compile task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSettings {
    /// Draw-order hint for compiled output
    pub render_bin_number: i32,
    /// Fade between levels of detail
    pub fade_lods: bool,
    /// Emit paged output
    pub paged: bool,
    /// Wrap output in an overlay node
    pub overlay: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            render_bin_number: RENDER_BIN_UNSET,
            fade_lods: false,
            paged: false,
            overlay: false,
        }
    }
}

/// Compile-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerCompilerConfig {
    /// Draw-order hint for compiled output
    pub render_bin_number: i32,
    /// Fade between levels of detail
    pub fade_lods: bool,
    /// Emit paged output
    pub paged: bool,
    /// Convert output to a terrain overlay
    pub overlay: bool,
    /// Worker threads for scheduled compiles (0 = one per CPU)
    pub workers: usize,
    /// Base uri relative resource uris resolve against
    pub resource_base_uri: Option<String>,
    /// Initial session properties
    pub properties: BTreeMap<String, String>,
}

impl Default for LayerCompilerConfig {
    fn default() -> Self {
        Self {
            render_bin_number: RENDER_BIN_UNSET,
            fade_lods: false,
            paged: false,
            overlay: false,
            workers: 0,
            resource_base_uri: None,
            properties: BTreeMap::new(),
        }
    }
}

impl LayerCompilerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Layer compiler config loaded");
        Ok(config)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Set the render bin number
    pub fn render_bin_number(mut self, value: i32) -> Self {
        self.render_bin_number = value;
        self
    }

    /// Enable/disable LOD fading
    pub fn fade_lods(mut self, enabled: bool) -> Self {
        self.fade_lods = enabled;
        self
    }

    /// Enable/disable paged output
    pub fn paged(mut self, enabled: bool) -> Self {
        self.paged = enabled;
        self
    }

    /// Enable/disable overlay output
    pub fn overlay(mut self, enabled: bool) -> Self {
        self.overlay = enabled;
        self
    }

    /// Set the worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the resource base uri
    pub fn resource_base_uri(mut self, base: impl Into<String>) -> Self {
        self.resource_base_uri = Some(base.into());
        self
    }

    /// Add an initial session property
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Output settings carried by this config
    pub fn settings(&self) -> CompileSettings {
        CompileSettings {
            render_bin_number: self.render_bin_number,
            fade_lods: self.fade_lods,
            paged: self.paged,
            overlay: self.overlay,
        }
    }

    /// Create a root session seeded with the configured library base and properties
    pub fn create_session(&self, engine_factory: BoxedScriptEngineFactory) -> Session {
        let library = match &self.resource_base_uri {
            Some(base) => ResourceLibrary::with_base_uri(base.clone()),
            None => ResourceLibrary::new(),
        };
        let session = Session::with_resources(engine_factory, Arc::new(library));
        session.with_locked(|locked| {
            for (name, value) in &self.properties {
                locked.set_property(Property::new(name.clone(), value));
            }
        });
        session
    }

    /// Create a thread-pool task manager with the configured worker count
    pub fn create_task_manager(&self) -> Result<BoxedTaskManager> {
        Ok(Arc::new(ThreadPoolTaskManager::new(self.workers)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::script::NativeScriptFactory;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LayerCompilerConfig::default();
        assert_eq!(config.render_bin_number, RENDER_BIN_UNSET);
        assert!(!config.fade_lods && !config.paged && !config.overlay);
        assert_eq!(LayerCompilerConfig::from_toml_str("").unwrap(), config);
        assert_eq!(config.settings(), CompileSettings::default());
    }

    #[test]
    fn test_parse_partial() {
        let config = LayerCompilerConfig::from_toml_str(
            r#"
            fade_lods = true
            workers = 3

            [properties]
            tree_height = "12.5"
            "#,
        )
        .unwrap();

        assert!(config.fade_lods);
        assert_eq!(config.workers, 3);
        assert_eq!(config.render_bin_number, RENDER_BIN_UNSET);
        assert_eq!(config.properties.get("tree_height").map(String::as_str), Some("12.5"));
    }

    #[test]
    fn test_parse_error() {
        let result = LayerCompilerConfig::from_toml_str("fade_lods = \"sometimes\"");
        assert!(matches!(result, Err(CompileError::ConfigParse(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "render_bin_number = 20\noverlay = true").unwrap();

        let config = LayerCompilerConfig::load(file.path()).unwrap();
        assert_eq!(config.render_bin_number, 20);
        assert!(config.overlay);
        assert_eq!(
            config.settings(),
            CompileSettings {
                render_bin_number: 20,
                overlay: true,
                ..CompileSettings::default()
            }
        );

        assert!(matches!(
            LayerCompilerConfig::load("/nonexistent/layer.toml"),
            Err(CompileError::Io(_))
        ));
    }

    #[test]
    fn test_create_session_seeds_state() {
        let config = LayerCompilerConfig::new()
            .resource_base_uri("/data")
            .property("lod", "2");

        let session = config.create_session(Arc::new(NativeScriptFactory::new()));
        assert_eq!(session.property("lod").as_i64(0), 2);
        assert_eq!(session.resources().base_uri(), Some("/data"));
    }
}
