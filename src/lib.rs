//! # Layer Compiler
//!
//! Compilation sessions and shared-resource coordination for compiling
//! geospatial layers into scene content, plus range-scoped script dispatch
//! for switching behavior by level of detail.
//!
//! ## Features
//!
//! - **Sessions**: Lock-guarded scripts, properties and resource usage,
//!   shared by parallel tasks or derived per task
//! - **Resource Library**: Keyed assets shared by a whole session tree
//! - **Script Ranges**: `[min, max)` bands selecting scripts by operating value
//! - **Layer Compiler**: Wires session, terrain, ranges, archive and scheduler
//! - **Task Managers**: Thread-pool and inline execution with per-task outcomes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layer_compiler::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> layer_compiler::Result<()> {
//!     let factory = NativeScriptFactory::new()
//!         .with_function("detail", |env: &mut FilterEnv| {
//!             env.set_property(Property::new("detail", true));
//!             Ok(())
//!         });
//!
//!     let config = LayerCompilerConfig::default().workers(4);
//!     let session = Arc::new(config.create_session(Arc::new(factory)));
//!
//!     let mut compiler = LayerCompiler::from_config(&config);
//!     compiler.set_session(session);
//!     compiler.set_terrain(Arc::new(GroupNode::new("terrain")), SpatialReference::wgs84());
//!     compiler.set_task_manager(config.create_task_manager()?);
//!     compiler.add_script(0.0, 1000.0, Arc::new(Script::native("near", "detail")));
//!
//!     let outcomes = compiler.schedule(vec![
//!         CompileRequest::new("tile_0_0", 250.0),
//!         CompileRequest::new("tile_0_1", 4000.0).isolated(),
//!     ])?;
//!     assert_eq!(outcomes.len(), 2);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod archive;
pub mod compiler;
pub mod config;
pub mod error;
pub mod filter_env;
pub mod geo;
pub mod property;
pub mod range;
pub mod resource;
pub mod scene;
pub mod script;
pub mod session;
pub mod task;
pub mod telemetry;

// Re-exports for ergonomic API
pub use archive::{Archive, BoxedArchive, DirectoryArchive, MemoryArchive};
pub use compiler::{CompileReport, CompileRequest, CompileRun, LayerCompiler};
pub use config::{CompileSettings, LayerCompilerConfig};
pub use error::{CompileError, Result};
pub use filter_env::FilterEnv;
pub use geo::{GeoExtent, SpatialReference};
pub use property::{Properties, Property};
pub use range::{ScriptRange, ScriptRangeList};
pub use resource::{ModelResourceQuery, Resource, ResourceKind, ResourceLibrary, ResourceRef};
pub use scene::{GroupNode, NodeRef, OverlayNode, SceneNode};
pub use script::{
    BoxedScriptEngine, BoxedScriptEngineFactory, NativeScriptFactory, Script, ScriptEngine,
    ScriptEngineFactory, ScriptRef,
};
pub use session::{LockedSession, Session, SessionId};
pub use task::{
    BatchId, BoxedTaskManager, CompileTask, InlineTaskManager, TaskManager, TaskOutcome,
    ThreadPoolTaskManager,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compiler::{CompileRequest, LayerCompiler};
    pub use crate::config::LayerCompilerConfig;
    pub use crate::error::Result;
    pub use crate::filter_env::FilterEnv;
    pub use crate::geo::{GeoExtent, SpatialReference};
    pub use crate::property::Property;
    pub use crate::resource::Resource;
    pub use crate::scene::GroupNode;
    pub use crate::script::{NativeScriptFactory, Script};
    pub use crate::session::Session;
}
