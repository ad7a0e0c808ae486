//! Scene-graph handles passed through the compiler
//!
//! The host renderer owns real node semantics. This module only carries
//! opaque node handles and describes the overlay wrapper the compiler
//! produces.

use std::fmt;
use std::sync::Arc;

/// Texture unit the overlay texture is bound to
pub const OVERLAY_TEXTURE_UNIT: u32 = 1;

/// Overlay texture size hint in texels
pub const OVERLAY_TEXTURE_SIZE_HINT: u32 = 1024;

/// A node owned by the host renderer
pub trait SceneNode: fmt::Debug + Send + Sync {
    /// Node name for logging
    fn name(&self) -> &str;
}

/// Shared node handle
pub type NodeRef = Arc<dyn SceneNode>;

/// A named group node; used for terrain placeholders and compiled output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    name: String,
}

impl GroupNode {
    /// Create a named group
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SceneNode for GroupNode {
    fn name(&self) -> &str {
        &self.name
    }
}

/// How the overlay texture combines with the surface below
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexEnvMode {
    /// Overlay color replaces the surface where the overlay is opaque
    Decal,
}

/// Wrapper that renders its subgraph as a screen-space overlay on terrain
#[derive(Debug, Clone)]
pub struct OverlayNode {
    subgraph: NodeRef,
    texture_unit: u32,
    tex_env: TexEnvMode,
    texture_size_hint: u32,
}

impl OverlayNode {
    /// Wrap a subgraph with the compiler's overlay settings
    pub fn new(subgraph: NodeRef) -> Self {
        Self {
            subgraph,
            texture_unit: OVERLAY_TEXTURE_UNIT,
            tex_env: TexEnvMode::Decal,
            texture_size_hint: OVERLAY_TEXTURE_SIZE_HINT,
        }
    }

    /// The wrapped subgraph
    pub fn subgraph(&self) -> &NodeRef {
        &self.subgraph
    }

    /// Texture unit the overlay is bound to
    pub fn texture_unit(&self) -> u32 {
        self.texture_unit
    }

    /// Texture environment mode
    pub fn tex_env(&self) -> TexEnvMode {
        self.tex_env
    }

    /// Overlay texture size hint
    pub fn texture_size_hint(&self) -> u32 {
        self.texture_size_hint
    }
}

impl SceneNode for OverlayNode {
    fn name(&self) -> &str {
        self.subgraph.name()
    }
}
