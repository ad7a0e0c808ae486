//! Compilation sessions
//!
//! A session is the shared, lock-guarded context for one compilation
//! lineage: itself plus every session derived from it.
//!
//! ## Table of Contents
//! - **SessionId**: Unique session identifier used in log fields
//! - **LockedSession**: Session data; every method assumes the lock is held
//! - **Session**: Public wrapper; each method takes the lock exactly once
//!
//! Ownership is asymmetric. The [`ResourceLibrary`] is shared by every
//! session in a derivation tree; the script list is copied on
//! [`Session::derive`] and diverges freely afterwards.

use crate::error::Result;
use crate::filter_env::FilterEnv;
use crate::property::{Properties, Property};
use crate::resource::{ResourceLibrary, ResourceRef};
use crate::script::{BoxedScriptEngine, BoxedScriptEngineFactory, ScriptRef};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", &self.0.to_string()[..8])
    }
}

/// Session data behind the session lock
///
/// Obtained through [`Session::with_locked`]. Methods here never lock, so
/// several of them can be combined into one critical section.
#[derive(Debug, Default)]
pub struct LockedSession {
    scripts: Vec<ScriptRef>,
    properties: Properties,
    resources_used: Vec<ResourceRef>,
}

impl LockedSession {
    /// Append a script
    pub fn add_script(&mut self, script: ScriptRef) {
        self.scripts.push(script);
    }

    /// Installed scripts in insertion order
    pub fn scripts(&self) -> &[ScriptRef] {
        &self.scripts
    }

    /// Insert or replace a property
    pub fn set_property(&mut self, prop: Property) {
        self.properties.set(prop);
    }

    /// Look up a property; misses yield the empty property
    pub fn property(&self, name: &str) -> Property {
        self.properties.get(name)
    }

    /// Record a resource as used, once per identity
    pub fn mark_resource_used(&mut self, resource: &ResourceRef) -> bool {
        if self.resources_used.iter().any(|r| Arc::ptr_eq(r, resource)) {
            return false;
        }
        self.resources_used.push(Arc::clone(resource));
        true
    }

    /// Resources used so far, in first-seen order
    pub fn resources_used(&self) -> &[ResourceRef] {
        &self.resources_used
    }

    /// Copy the usage list, clearing it when `reset` is set
    pub fn take_resources_used(&mut self, reset: bool) -> Vec<ResourceRef> {
        if reset {
            std::mem::take(&mut self.resources_used)
        } else {
            self.resources_used.clone()
        }
    }
}

/// Shared coordination context for compilation tasks
pub struct Session {
    id: SessionId,
    parent: Option<SessionId>,
    state: Mutex<LockedSession>,
    resources: Arc<ResourceLibrary>,
    engine_factory: BoxedScriptEngineFactory,
}

impl Session {
    /// Create a session with an empty resource library
    pub fn new(engine_factory: BoxedScriptEngineFactory) -> Self {
        Self::with_resources(engine_factory, Arc::new(ResourceLibrary::new()))
    }

    /// Create a session around an existing resource library
    pub fn with_resources(
        engine_factory: BoxedScriptEngineFactory,
        resources: Arc<ResourceLibrary>,
    ) -> Self {
        let id = SessionId::new();
        debug!(session_id = %id, "Session created");
        Self {
            id,
            parent: None,
            state: Mutex::new(LockedSession::default()),
            resources,
            engine_factory,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Identifier of the session this one was derived from
    pub fn parent_id(&self) -> Option<SessionId> {
        self.parent
    }

    /// Create a child session
    ///
    /// The child gets a snapshot of the current script list, the same
    /// resource library and engine factory, its own lock, no properties,
    /// and an empty usage list. Scripts added to either session afterwards
    /// are invisible to the other.
    pub fn derive(&self) -> Session {
        let state = self.state.lock();

        let child = Session {
            id: SessionId::new(),
            parent: Some(self.id),
            state: Mutex::new(LockedSession {
                scripts: state.scripts.clone(),
                ..LockedSession::default()
            }),
            resources: Arc::clone(&self.resources),
            engine_factory: Arc::clone(&self.engine_factory),
        };

        debug!(
            session_id = %self.id,
            child_id = %child.id,
            scripts = state.scripts.len(),
            "Session derived"
        );
        child
    }

    /// Create an engine populated with every session script
    ///
    /// The engine is created and populated inside one critical section, so
    /// it reflects a single consistent snapshot of the script list. Any
    /// install failure aborts the whole call.
    pub fn create_script_engine(&self) -> Result<BoxedScriptEngine> {
        let state = self.state.lock();

        let mut engine = self.engine_factory.create_engine()?;
        for script in &state.scripts {
            engine.install(script)?;
        }

        debug!(
            session_id = %self.id,
            scripts = state.scripts.len(),
            "Script engine created"
        );
        Ok(engine)
    }

    /// Append a script (duplicates are allowed)
    pub fn add_script(&self, script: ScriptRef) {
        self.state.lock().add_script(script);
    }

    /// Snapshot of the script list
    pub fn scripts(&self) -> Vec<ScriptRef> {
        self.state.lock().scripts.clone()
    }

    /// The shared resource library
    pub fn resources(&self) -> &Arc<ResourceLibrary> {
        &self.resources
    }

    /// Create a filter environment bound to this session
    pub fn create_filter_env(self: &Arc<Self>) -> FilterEnv {
        FilterEnv::new(Arc::clone(self))
    }

    /// Insert or replace a property
    pub fn set_property(&self, prop: Property) {
        self.state.lock().set_property(prop);
    }

    /// Look up a property; misses yield the empty property
    pub fn property(&self, name: &str) -> Property {
        self.state.lock().property(name)
    }

    /// Record a resource as used; repeated calls with the same handle are no-ops
    pub fn mark_resource_used(&self, resource: &ResourceRef) {
        if self.state.lock().mark_resource_used(resource) {
            debug!(session_id = %self.id, resource = %resource.name(), "Resource marked used");
        }
    }

    /// Copy of the usage list; `reset` clears it in the same critical section
    pub fn resources_used(&self, reset: bool) -> Vec<ResourceRef> {
        self.state.lock().take_resources_used(reset)
    }

    /// Run `f` with the session lock held
    ///
    /// `f` must not call back into this session's public methods; use the
    /// [`LockedSession`] it receives instead.
    pub fn with_locked<R>(&self, f: impl FnOnce(&mut LockedSession) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut *state)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("resources", &self.resources.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::resource::Resource;
    use crate::script::{
        MockScriptEngine, MockScriptEngineFactory, NativeScriptFactory, Script,
    };

    fn native_session() -> Session {
        let factory = NativeScriptFactory::new()
            .with_function("noop", |_env: &mut FilterEnv| Ok(()));
        Session::new(Arc::new(factory))
    }

    fn script(name: &str) -> ScriptRef {
        Arc::new(Script::native(name, "noop"))
    }

    fn names(scripts: &[ScriptRef]) -> Vec<String> {
        scripts.iter().map(|s| s.name().to_string()).collect()
    }

    #[test]
    fn test_derive_snapshots_scripts() {
        let parent = native_session();
        parent.add_script(script("a"));
        parent.add_script(script("b"));

        let child = parent.derive();
        parent.add_script(script("c"));
        child.add_script(script("d"));

        assert_eq!(names(&parent.scripts()), vec!["a", "b", "c"]);
        assert_eq!(names(&child.scripts()), vec!["a", "b", "d"]);
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn test_derive_shares_library() {
        let root = native_session();
        let child = root.derive();
        let grandchild = child.derive();

        assert!(Arc::ptr_eq(root.resources(), child.resources()));
        assert!(Arc::ptr_eq(root.resources(), grandchild.resources()));

        let tree = child.resources().add_resource(Resource::model("tree"));
        assert!(Arc::ptr_eq(&root.resources().resource("tree").unwrap(), &tree));
    }

    #[test]
    fn test_derive_starts_with_empty_state() {
        let parent = native_session();
        parent.set_property(Property::new("lod", 1));
        let tree = parent.resources().add_resource(Resource::model("tree"));
        parent.mark_resource_used(&tree);

        let child = parent.derive();
        assert!(child.property("lod").is_empty());
        assert!(child.resources_used(false).is_empty());
    }

    #[test]
    fn test_mark_resource_used_is_idempotent() {
        let session = native_session();
        let tree = session.resources().add_resource(Resource::model("tree"));
        let rock = session.resources().add_resource(Resource::model("rock"));

        for _ in 0..5 {
            session.mark_resource_used(&tree);
        }
        session.mark_resource_used(&rock);
        session.mark_resource_used(&tree);

        let used = session.resources_used(false);
        assert_eq!(used.len(), 2);
        assert!(Arc::ptr_eq(&used[0], &tree));
        assert!(Arc::ptr_eq(&used[1], &rock));
    }

    #[test]
    fn test_identity_not_name() {
        let session = native_session();
        let first = Arc::new(Resource::model("tree"));
        let second = Arc::new(Resource::model("tree"));

        session.mark_resource_used(&first);
        session.mark_resource_used(&second);
        assert_eq!(session.resources_used(false).len(), 2);
    }

    #[test]
    fn test_drain_resources_used() {
        let session = native_session();
        let tree = session.resources().add_resource(Resource::model("tree"));
        session.mark_resource_used(&tree);

        let drained = session.resources_used(true);
        assert_eq!(drained.len(), 1);
        assert!(session.resources_used(false).is_empty());
    }

    #[test]
    fn test_property_miss_is_empty() {
        let session = native_session();
        assert!(session.property("missing").is_empty());

        session.set_property(Property::new("fade", true));
        session.set_property(Property::new("fade", false));
        assert!(!session.property("fade").as_bool(true));
    }

    #[test]
    fn test_create_script_engine_installs_in_order() {
        let session = native_session();
        session.add_script(script("first"));
        session.add_script(script("second"));
        session.add_script(script("first"));

        let engine = session.create_script_engine().unwrap();
        assert_eq!(engine.installed(), vec!["first", "second", "first"]);
    }

    #[test]
    fn test_install_failure_aborts() {
        let mut factory = MockScriptEngineFactory::new();
        factory.expect_create_engine().times(1).returning(|| {
            let mut engine = MockScriptEngine::new();
            let mut calls = 0;
            engine.expect_install().times(2).returning(move |_| {
                calls += 1;
                if calls == 2 {
                    Err(CompileError::script("bad script"))
                } else {
                    Ok(())
                }
            });
            Ok(Box::new(engine))
        });

        let session = Session::new(Arc::new(factory));
        session.add_script(script("ok"));
        session.add_script(script("broken"));
        session.add_script(script("never"));

        assert!(matches!(
            session.create_script_engine(),
            Err(CompileError::Script(_))
        ));

        // The lock was released on the error path
        session.add_script(script("after"));
        assert_eq!(session.scripts().len(), 4);
    }

    #[test]
    fn test_with_locked_batches_operations() {
        let session = native_session();
        let tree = session.resources().add_resource(Resource::model("tree"));

        let count = session.with_locked(|locked| {
            locked.add_script(script("a"));
            locked.set_property(Property::new("k", "v"));
            locked.mark_resource_used(&tree);
            locked.scripts().len()
        });

        assert_eq!(count, 1);
        assert_eq!(session.property("k").value(), "v");
        assert_eq!(session.resources_used(false).len(), 1);
    }
}
