//! Shared resource library
//!
//! ## Table of Contents
//! - **Resource**: A named asset (model, font, skin, SRS, path)
//! - **ResourceRef**: Shared handle; identity is pointer identity
//! - **ModelResourceQuery**: Tag filter for model lookups
//! - **ResourceLibrary**: Keyed store shared by a whole session tree

use crate::error::{CompileError, Result};
use crate::property::{Properties, Property};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Kind of asset a resource refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// External 3D model
    Model,
    /// Font for text labels
    Font,
    /// Texture skin applied to geometry
    Skin,
    /// Named spatial reference definition
    SpatialReference,
    /// Generic file path
    Path,
    /// Anything else
    Other,
}

/// A named asset stored in a [`ResourceLibrary`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    kind: ResourceKind,
    uri: String,
    base_uri: Option<String>,
    tags: Vec<String>,
    properties: Properties,
}

/// Shared resource handle; two handles are the same resource iff
/// [`Arc::ptr_eq`] holds
pub type ResourceRef = Arc<Resource>;

impl Resource {
    /// Create a new resource
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            uri: String::new(),
            base_uri: None,
            tags: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Create a model resource
    pub fn model(name: impl Into<String>) -> Self {
        Self::new(name, ResourceKind::Model)
    }

    /// Set the uri
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Set the base uri relative uris resolve against
    pub fn with_base_uri(mut self, base: impl Into<String>) -> Self {
        self.base_uri = Some(base.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Apply a property (see [`Resource::set_property`])
    pub fn with_property(mut self, prop: Property) -> Self {
        self.set_property(prop);
        self
    }

    /// Resource name (library key)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Uri as configured
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Base uri, if any
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    /// Tags attached to this resource
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Check for a tag (case-insensitive)
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Free-form properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Uri resolved against the base uri when relative
    pub fn absolute_uri(&self) -> String {
        let is_absolute = self.uri.contains("://") || Path::new(&self.uri).is_absolute();
        match &self.base_uri {
            Some(base) if !is_absolute && !self.uri.is_empty() => {
                Path::new(base).join(&self.uri).to_string_lossy().into_owned()
            }
            _ => self.uri.clone(),
        }
    }

    /// Apply a property
    ///
    /// `uri` sets the uri on any kind. Model resources also accept the
    /// legacy `model_path` and `path` names for their uri.
    pub fn set_property(&mut self, prop: Property) {
        match prop.name() {
            "uri" => self.uri = prop.value().to_string(),
            "model_path" | "path" if self.kind == ResourceKind::Model => {
                self.uri = prop.value().to_string();
            }
            _ => self.properties.set(prop),
        }
    }
}

/// Tag query over model resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResourceQuery {
    tags: Vec<String>,
}

impl ModelResourceQuery {
    /// Create an empty query (matches every model)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Required tags
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Check a resource against the query
    pub fn matches(&self, resource: &Resource) -> bool {
        resource.kind == ResourceKind::Model && self.tags.iter().all(|t| resource.has_tag(t))
    }
}

/// Keyed resource store shared by reference across a session tree
///
/// The map is internally synchronized, so lookups are safe from any
/// thread without going through a session.
#[derive(Debug, Default)]
pub struct ResourceLibrary {
    resources: DashMap<String, ResourceRef>,
    base_uri: Option<String>,
}

impl ResourceLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library whose relative uris resolve against `base`
    pub fn with_base_uri(base: impl Into<String>) -> Self {
        Self {
            resources: DashMap::new(),
            base_uri: Some(base.into()),
        }
    }

    /// Library base uri
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    /// Insert or replace a resource by name, returning the shared handle
    pub fn add_resource(&self, mut resource: Resource) -> ResourceRef {
        if resource.base_uri.is_none() {
            resource.base_uri = self.base_uri.clone();
        }
        let name = resource.name.clone();
        let shared = Arc::new(resource);
        self.resources.insert(name.clone(), Arc::clone(&shared));
        debug!(resource = %name, "Resource added");
        shared
    }

    /// Remove a resource by name
    pub fn remove_resource(&self, name: &str) -> Option<ResourceRef> {
        self.resources.remove(name).map(|(_, r)| r)
    }

    /// Look up a resource by name
    pub fn find(&self, name: &str) -> Option<ResourceRef> {
        self.resources.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Look up a resource by name, failing on a miss
    pub fn resource(&self, name: &str) -> Result<ResourceRef> {
        self.find(name)
            .ok_or_else(|| CompileError::resource_not_found(name))
    }

    /// Look up a model resource by name
    pub fn model_resource(&self, name: &str) -> Option<ResourceRef> {
        self.find(name).filter(|r| r.kind == ResourceKind::Model)
    }

    /// Look up a spatial reference resource by name
    pub fn spatial_reference(&self, name: &str) -> Option<ResourceRef> {
        self.find(name)
            .filter(|r| r.kind == ResourceKind::SpatialReference)
    }

    /// All model resources matching the query, sorted by name
    pub fn models(&self, query: &ModelResourceQuery) -> Vec<ResourceRef> {
        let mut found: Vec<ResourceRef> = self
            .resources
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| Arc::clone(r.value()))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Resource names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the library is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_compat() {
        let model = Resource::model("tree")
            .with_property(Property::new("model_path", "models/tree.osg"));
        assert_eq!(model.uri(), "models/tree.osg");

        let font = Resource::new("arial", ResourceKind::Font)
            .with_property(Property::new("path", "fonts/arial.ttf"));
        assert_eq!(font.uri(), "");
        assert_eq!(font.properties().get("path").value(), "fonts/arial.ttf");
    }

    #[test]
    fn test_absolute_uri() {
        let lib = ResourceLibrary::with_base_uri("/data/project");
        let rel = lib.add_resource(Resource::model("tree").with_uri("models/tree.osg"));
        assert_eq!(rel.absolute_uri(), "/data/project/models/tree.osg");

        let abs = lib.add_resource(Resource::model("rock").with_uri("/opt/rock.osg"));
        assert_eq!(abs.absolute_uri(), "/opt/rock.osg");

        let url = lib.add_resource(Resource::model("web").with_uri("http://host/m.osg"));
        assert_eq!(url.absolute_uri(), "http://host/m.osg");
    }

    #[test]
    fn test_lookup_and_miss() {
        let lib = ResourceLibrary::new();
        let added = lib.add_resource(Resource::model("tree"));

        let found = lib.resource("tree").unwrap();
        assert!(Arc::ptr_eq(&added, &found));
        assert!(matches!(
            lib.resource("shrub"),
            Err(CompileError::ResourceNotFound(name)) if name == "shrub"
        ));
        assert!(lib.spatial_reference("tree").is_none());
    }

    #[test]
    fn test_model_query() {
        let lib = ResourceLibrary::new();
        lib.add_resource(Resource::model("oak").with_tag("tree").with_tag("summer"));
        lib.add_resource(Resource::model("pine").with_tag("Tree"));
        lib.add_resource(Resource::model("house").with_tag("building"));
        lib.add_resource(Resource::new("arial", ResourceKind::Font).with_tag("tree"));

        let trees = lib.models(&ModelResourceQuery::new().with_tag("tree"));
        let names: Vec<_> = trees.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["oak", "pine"]);

        assert_eq!(lib.models(&ModelResourceQuery::new()).len(), 3);
    }

    #[test]
    fn test_kind_lookups_and_removal() {
        let lib = ResourceLibrary::new();
        lib.add_resource(Resource::model("oak"));
        lib.add_resource(Resource::new("utm44", ResourceKind::SpatialReference));
        assert_eq!(lib.names(), vec!["oak", "utm44"]);

        assert!(lib.model_resource("oak").is_some());
        assert!(lib.model_resource("utm44").is_none());
        assert!(lib.spatial_reference("utm44").is_some());

        let removed = lib.remove_resource("oak").unwrap();
        assert_eq!(removed.name(), "oak");
        assert!(lib.remove_resource("oak").is_none());
        assert!(lib.find("oak").is_none());
        assert_eq!(lib.len(), 1);
    }
}
