//! Per-task filter environment
//!
//! Pipeline stages talk to the session through this context instead of
//! holding the session themselves. Locking stays the session's job.

use crate::config::CompileSettings;
use crate::error::Result;
use crate::geo::{GeoExtent, SpatialReference};
use crate::property::Property;
use crate::resource::ResourceRef;
use crate::script::ScriptRef;
use crate::session::Session;
use std::sync::Arc;

/// Execution context for one compilation task
///
/// Meant to be used by one task at a time; hand each worker its own
/// environment (see [`FilterEnv::advance`]).
#[derive(Debug, Clone)]
pub struct FilterEnv {
    session: Arc<Session>,
    terrain_srs: Option<SpatialReference>,
    terrain_extent: GeoExtent,
    extent: GeoExtent,
    range: Option<f64>,
    settings: CompileSettings,
}

impl FilterEnv {
    /// Create an environment bound to a session
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            terrain_srs: None,
            terrain_extent: GeoExtent::infinite(),
            extent: GeoExtent::infinite(),
            range: None,
            settings: CompileSettings::default(),
        }
    }

    /// Set the terrain frame; the working extent is reset to the terrain extent
    pub fn with_terrain(mut self, srs: Option<SpatialReference>, extent: GeoExtent) -> Self {
        self.terrain_srs = srs;
        self.extent = extent.clone();
        self.terrain_extent = extent;
        self
    }

    /// Set the extent of the cell being compiled
    pub fn with_extent(mut self, extent: GeoExtent) -> Self {
        self.extent = extent;
        self
    }

    /// Set the operating range value
    pub fn with_range(mut self, value: f64) -> Self {
        self.range = Some(value);
        self
    }

    /// Set the compiler output settings
    pub fn with_settings(mut self, settings: CompileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Copy of this environment for the next pipeline stage
    pub fn advance(&self) -> FilterEnv {
        self.clone()
    }

    /// The session this environment is bound to
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Look up a session property
    pub fn property(&self, name: &str) -> Property {
        self.session.property(name)
    }

    /// Set a session property
    pub fn set_property(&self, prop: Property) {
        self.session.set_property(prop);
    }

    /// Look up a resource and record it as used by the session
    pub fn resource(&self, name: &str) -> Result<ResourceRef> {
        let resource = self.session.resources().resource(name)?;
        self.session.mark_resource_used(&resource);
        Ok(resource)
    }

    /// Record a resource as used by the session
    pub fn mark_resource_used(&self, resource: &ResourceRef) {
        self.session.mark_resource_used(resource);
    }

    /// Snapshot of the session script list
    pub fn scripts(&self) -> Vec<ScriptRef> {
        self.session.scripts()
    }

    /// Terrain coordinate frame
    pub fn terrain_srs(&self) -> Option<&SpatialReference> {
        self.terrain_srs.as_ref()
    }

    /// Terrain extent
    pub fn terrain_extent(&self) -> &GeoExtent {
        &self.terrain_extent
    }

    /// Extent of the cell being compiled, clipped to the terrain extent
    pub fn extent(&self) -> GeoExtent {
        self.extent.intersection(&self.terrain_extent)
    }

    /// Operating range value, if the task has one
    pub fn range(&self) -> Option<f64> {
        self.range
    }

    /// Output settings of the compiler running this task
    pub fn settings(&self) -> &CompileSettings {
        &self.settings
    }
}
