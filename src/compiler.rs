//! Layer compiler
//!
//! ## Table of Contents
//! - **CompileRequest**: One unit of work (label, operating value, extent)
//! - **CompileReport**: What a compile task ran and consumed
//! - **LayerCompiler**: Wires session, terrain, script ranges and scheduler together
//! - **CompileRun**: Immutable snapshot of the compiler that tasks execute against

use crate::archive::{archive_write_json, BoxedArchive};
use crate::config::{CompileSettings, LayerCompilerConfig};
use crate::error::{CompileError, Result};
use crate::geo::{GeoExtent, SpatialReference};
use crate::range::{ScriptRange, ScriptRangeList};
use crate::scene::{GroupNode, NodeRef, OverlayNode};
use crate::script::ScriptRef;
use crate::session::Session;
use crate::task::{BoxedTaskManager, CompileTask, TaskOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A unit of compilation work
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    /// Label used for logging and archive placement
    pub label: String,
    /// Operating value (distance, LOD) that selects range scripts
    pub range: f64,
    /// Cell to compile; defaults to the terrain extent
    pub extent: Option<GeoExtent>,
    /// Run on a derived session instead of the shared one
    pub isolate: bool,
}

impl CompileRequest {
    /// Create a request on the shared session
    pub fn new(label: impl Into<String>, range: f64) -> Self {
        Self {
            label: label.into(),
            range,
            extent: None,
            isolate: false,
        }
    }

    /// Restrict the request to a cell
    pub fn with_extent(mut self, extent: GeoExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Run the request on its own derived session
    pub fn isolated(mut self) -> Self {
        self.isolate = true;
        self
    }
}

/// Outcome of a successful compile task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileReport {
    /// Request label
    pub label: String,
    /// Operating value
    pub range: f64,
    /// Session the task ran on
    pub session_id: Option<String>,
    /// Range scripts run, in order
    pub scripts_run: Vec<String>,
    /// Resources recorded as used, in first-seen order
    ///
    /// Isolated requests report exactly what their own task used. Shared
    /// requests report the shared session's whole usage list at the end of
    /// the task, which includes anything other tasks on that session marked.
    pub resources_used: Vec<String>,
    /// Output settings the task compiled with
    pub settings: CompileSettings,
    /// Texture unit of the overlay wrapper, when output was converted to an overlay
    pub overlay_texture_unit: Option<u32>,
    /// Task start time
    pub started_at: DateTime<Utc>,
    /// Task end time
    pub finished_at: DateTime<Utc>,
}

impl CompileReport {
    /// Create an empty report
    pub fn new(label: impl Into<String>, range: f64) -> Self {
        let now = Utc::now();
        Self {
            label: label.into(),
            range,
            session_id: None,
            scripts_run: Vec::new(),
            resources_used: Vec::new(),
            settings: CompileSettings::default(),
            overlay_texture_unit: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Archive path reports are stored under
    pub fn archive_path(&self) -> String {
        format!("reports/{}.json", self.label)
    }
}

/// Orchestrates compilation of a layer
///
/// Configure, then compile. Setters take `&mut self` while compiles borrow
/// `&self`, and scheduled tasks run against a [`CompileRun`] snapshot, so
/// the session cannot be swapped in the middle of a run.
pub struct LayerCompiler {
    terrain: Option<NodeRef>,
    terrain_srs: Option<SpatialReference>,
    terrain_extent: GeoExtent,
    settings: CompileSettings,
    archive: Option<BoxedArchive>,
    task_manager: Option<BoxedTaskManager>,
    session: Option<Arc<Session>>,
    script_ranges: ScriptRangeList,
}

impl LayerCompiler {
    /// Create a compiler with default settings
    pub fn new() -> Self {
        Self {
            terrain: None,
            terrain_srs: None,
            terrain_extent: GeoExtent::infinite(),
            settings: CompileSettings::default(),
            archive: None,
            task_manager: None,
            session: None,
            script_ranges: ScriptRangeList::new(),
        }
    }

    /// Create a compiler with settings taken from a config
    pub fn from_config(config: &LayerCompilerConfig) -> Self {
        let mut compiler = Self::new();
        compiler.settings = config.settings();
        compiler
    }

    /// Set the task manager used by [`LayerCompiler::schedule`]
    pub fn set_task_manager(&mut self, manager: BoxedTaskManager) {
        self.task_manager = Some(manager);
    }

    /// The task manager, if set
    pub fn task_manager(&self) -> Option<&BoxedTaskManager> {
        self.task_manager.as_ref()
    }

    /// Bind the compiler to a session
    pub fn set_session(&mut self, session: Arc<Session>) {
        debug!(session_id = %session.id(), "Compiler session bound");
        self.session = Some(session);
    }

    /// The bound session, if any
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// Register a script for the half-open band `[min_range, max_range)`
    pub fn add_script(&mut self, min_range: f64, max_range: f64, script: ScriptRef) {
        self.script_ranges.push(ScriptRange::new(min_range, max_range, script));
    }

    /// Registered script ranges
    pub fn scripts(&self) -> &ScriptRangeList {
        &self.script_ranges
    }

    /// Mutable access to the registered script ranges
    pub fn scripts_mut(&mut self) -> &mut ScriptRangeList {
        &mut self.script_ranges
    }

    /// Scripts applicable at `value`, in application order
    pub fn select_scripts(&self, value: f64) -> Vec<ScriptRef> {
        self.script_ranges.select(value)
    }

    /// Set the terrain with an unbounded extent
    pub fn set_terrain(&mut self, terrain: NodeRef, srs: SpatialReference) {
        self.set_terrain_with_extent(terrain, srs, GeoExtent::infinite());
    }

    /// Set the terrain and the extent output is clipped to
    pub fn set_terrain_with_extent(&mut self, terrain: NodeRef, srs: SpatialReference, extent: GeoExtent) {
        debug!(terrain = %terrain.name(), srs = %srs, "Compiler terrain set");
        self.terrain = Some(terrain);
        self.terrain_srs = Some(srs);
        self.terrain_extent = extent;
    }

    /// Terrain node, if set
    pub fn terrain_node(&self) -> Option<&NodeRef> {
        self.terrain.as_ref()
    }

    /// Terrain coordinate frame, if set
    pub fn terrain_srs(&self) -> Option<&SpatialReference> {
        self.terrain_srs.as_ref()
    }

    /// Terrain extent (unbounded unless one was supplied)
    pub fn terrain_extent(&self) -> &GeoExtent {
        &self.terrain_extent
    }

    /// Set the output archive
    pub fn set_archive(&mut self, archive: BoxedArchive) {
        self.archive = Some(archive);
    }

    /// The output archive, if set
    pub fn archive(&self) -> Option<&BoxedArchive> {
        self.archive.as_ref()
    }

    /// Set the render bin number
    pub fn set_render_bin_number(&mut self, value: i32) {
        self.settings.render_bin_number = value;
    }

    /// Render bin number ([`crate::config::RENDER_BIN_UNSET`] when unset)
    pub fn render_bin_number(&self) -> i32 {
        self.settings.render_bin_number
    }

    /// Enable/disable LOD fading
    pub fn set_fade_lods(&mut self, value: bool) {
        self.settings.fade_lods = value;
    }

    /// Whether LODs fade
    pub fn fade_lods(&self) -> bool {
        self.settings.fade_lods
    }

    /// Enable/disable paged output
    pub fn set_paged(&mut self, value: bool) {
        self.settings.paged = value;
    }

    /// Whether output is paged
    pub fn paged(&self) -> bool {
        self.settings.paged
    }

    /// Enable/disable overlay output
    pub fn set_overlay(&mut self, value: bool) {
        self.settings.overlay = value;
    }

    /// Whether output is an overlay
    pub fn overlay(&self) -> bool {
        self.settings.overlay
    }

    /// Current output settings
    pub fn settings(&self) -> CompileSettings {
        self.settings
    }

    /// Wrap a finished subgraph for overlay rendering
    pub fn convert_to_overlay(&self, input: NodeRef) -> Arc<OverlayNode> {
        Arc::new(OverlayNode::new(input))
    }

    /// Snapshot the compiler for a run, failing fast on missing collaborators
    pub fn prepare_run(&self) -> Result<CompileRun> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| CompileError::not_configured("session"))?;
        if self.terrain.is_none() {
            return Err(CompileError::not_configured("terrain"));
        }
        let terrain_srs = self
            .terrain_srs
            .clone()
            .ok_or_else(|| CompileError::not_configured("terrain SRS"))?;

        Ok(CompileRun {
            session,
            terrain_srs,
            terrain_extent: self.terrain_extent.clone(),
            script_ranges: self.script_ranges.clone(),
            settings: self.settings,
            archive: self.archive.clone(),
        })
    }

    /// Compile one request on the calling thread
    pub fn compile(&self, request: CompileRequest) -> Result<CompileReport> {
        self.prepare_run()?.execute(request)
    }

    /// Compile requests through the task manager and collect every outcome
    ///
    /// Per-task failures are reported in the returned outcomes; only
    /// configuration problems fail the call itself.
    pub fn schedule(&self, requests: impl IntoIterator<Item = CompileRequest>) -> Result<Vec<TaskOutcome>> {
        let manager = self
            .task_manager
            .clone()
            .ok_or_else(|| CompileError::not_configured("task manager"))?;
        let run = Arc::new(self.prepare_run()?);

        let batch = manager.begin_batch();
        let mut submitted = 0usize;
        for request in requests {
            let run = Arc::clone(&run);
            let label = request.label.clone();
            manager.submit(batch, CompileTask::new(label, move || run.execute(request)));
            submitted += 1;
        }

        info!(
            tasks = submitted,
            batch = %batch,
            manager = %manager.name(),
            session_id = %run.session.id(),
            "Compile tasks submitted"
        );

        let outcomes = manager.drain(batch);
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(batch = %batch, tasks = outcomes.len(), failed = failed, "Compile tasks drained");
        Ok(outcomes)
    }
}

impl Default for LayerCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiler state captured at the start of a run
#[derive(Clone)]
pub struct CompileRun {
    session: Arc<Session>,
    terrain_srs: SpatialReference,
    terrain_extent: GeoExtent,
    script_ranges: ScriptRangeList,
    settings: CompileSettings,
    archive: Option<BoxedArchive>,
}

impl CompileRun {
    /// Session the run draws scripts and resources from
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Output settings captured for the run
    pub fn settings(&self) -> &CompileSettings {
        &self.settings
    }

    /// Execute one request
    ///
    /// Range scripts for the request's value are installed on top of the
    /// session scripts and run in registration order.
    pub fn execute(&self, request: CompileRequest) -> Result<CompileReport> {
        let mut report = CompileReport::new(request.label.clone(), request.range);
        report.settings = self.settings;
        if let Some(archive) = &self.archive {
            archive.check_path(&report.archive_path())?;
        }

        let session = if request.isolate {
            Arc::new(self.session.derive())
        } else {
            Arc::clone(&self.session)
        };
        report.session_id = Some(session.id().to_string());

        let mut env = session
            .create_filter_env()
            .with_terrain(Some(self.terrain_srs.clone()), self.terrain_extent.clone())
            .with_range(request.range)
            .with_settings(self.settings);
        if let Some(extent) = request.extent {
            env = env.with_extent(extent);
        }

        let scripts = self.script_ranges.select(request.range);
        let mut engine = session.create_script_engine()?;
        for script in &scripts {
            engine.install(script)?;
            engine.run(script.name(), &mut env)?;
            report.scripts_run.push(script.name().to_string());
        }

        report.resources_used = session
            .resources_used(request.isolate)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        if self.settings.overlay {
            let overlay = OverlayNode::new(Arc::new(GroupNode::new(request.label.as_str())));
            report.overlay_texture_unit = Some(overlay.texture_unit());
        }
        report.finished_at = Utc::now();

        if let Some(archive) = &self.archive {
            archive_write_json(archive.as_ref(), &report.archive_path(), &report)?;
        }

        debug!(
            task = %report.label,
            range = report.range,
            scripts = report.scripts_run.len(),
            resources = report.resources_used.len(),
            "Compile task executed"
        );
        Ok(report)
    }
}
