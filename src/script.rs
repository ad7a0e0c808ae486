//! Scripts and script engines
//!
//! ## Table of Contents
//! - **Script**: Opaque installable unit of logic
//! - **ScriptEngine**: Execution context scripts are installed into
//! - **ScriptEngineFactory**: Produces fresh, empty engines (injected into sessions)
//! - **NativeScriptFactory / NativeScriptEngine**: Engine whose scripts name Rust functions

use crate::error::{CompileError, Result};
use crate::filter_env::FilterEnv;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Language tag for scripts handled by [`NativeScriptEngine`]
pub const NATIVE_LANGUAGE: &str = "native";

/// An installable unit of logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    name: String,
    language: String,
    code: String,
}

/// Shared script handle
pub type ScriptRef = Arc<Script>;

impl Script {
    /// Create a new script
    pub fn new(name: impl Into<String>, language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            code: code.into(),
        }
    }

    /// Create a script bound to a function registered on a [`NativeScriptFactory`]
    pub fn native(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self::new(name, NATIVE_LANGUAGE, function)
    }

    /// Script name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Language tag
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Script body (for native scripts, the function name)
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.language)
    }
}

/// Execution context that scripts are installed into
///
/// Implementations own their evaluation strategy; this crate only
/// installs scripts and asks for them to be run by name.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptEngine: Send {
    /// Install a script; later installs under the same name shadow earlier ones
    fn install(&mut self, script: &ScriptRef) -> Result<()>;

    /// Run an installed script against a filter environment
    fn run(&mut self, name: &str, env: &mut FilterEnv) -> Result<()>;

    /// Check whether a script name is installed
    fn is_installed(&self, name: &str) -> bool;

    /// Installed script names in install order
    fn installed(&self) -> Vec<String>;
}

/// Boxed engine as returned by factories
pub type BoxedScriptEngine = Box<dyn ScriptEngine>;

/// Creates empty script engines
#[cfg_attr(test, mockall::automock)]
pub trait ScriptEngineFactory: Send + Sync {
    /// Create a fresh engine with nothing installed
    fn create_engine(&self) -> Result<BoxedScriptEngine>;
}

/// Shared factory handle
pub type BoxedScriptEngineFactory = Arc<dyn ScriptEngineFactory>;

/// Function body for native scripts
pub type NativeFn = Arc<dyn Fn(&mut FilterEnv) -> Result<()> + Send + Sync>;

/// Factory for [`NativeScriptEngine`]s
///
/// Functions are registered once and shared by every engine the factory
/// creates.
#[derive(Clone, Default)]
pub struct NativeScriptFactory {
    functions: Arc<RwLock<HashMap<String, NativeFn>>>,
}

impl NativeScriptFactory {
    /// Create a factory with no registered functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a name
    pub fn register<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&mut FilterEnv) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(function = %name, "Native script function registered");
        self.functions.write().insert(name, Arc::new(function));
    }

    /// Builder-style [`NativeScriptFactory::register`]
    pub fn with_function<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut FilterEnv) -> Result<()> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    /// Check if no functions are registered
    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl fmt::Debug for NativeScriptFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("NativeScriptFactory")
            .field("functions", &names)
            .finish()
    }
}

impl ScriptEngineFactory for NativeScriptFactory {
    fn create_engine(&self) -> Result<BoxedScriptEngine> {
        Ok(Box::new(NativeScriptEngine {
            functions: Arc::clone(&self.functions),
            installed: Vec::new(),
        }))
    }
}

/// Engine that runs native scripts by looking up registered functions
pub struct NativeScriptEngine {
    functions: Arc<RwLock<HashMap<String, NativeFn>>>,
    installed: Vec<(String, NativeFn)>,
}

impl ScriptEngine for NativeScriptEngine {
    fn install(&mut self, script: &ScriptRef) -> Result<()> {
        if script.language() != NATIVE_LANGUAGE {
            return Err(CompileError::script(format!(
                "cannot install '{}': unsupported language '{}'",
                script.name(),
                script.language()
            )));
        }

        let function = self
            .functions
            .read()
            .get(script.code())
            .cloned()
            .ok_or_else(|| {
                CompileError::script(format!(
                    "cannot install '{}': no native function '{}'",
                    script.name(),
                    script.code()
                ))
            })?;

        self.installed.push((script.name().to_string(), function));
        Ok(())
    }

    fn run(&mut self, name: &str, env: &mut FilterEnv) -> Result<()> {
        let function = self
            .installed
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Arc::clone(f))
            .ok_or_else(|| CompileError::script(format!("script '{}' is not installed", name)))?;
        function(env)
    }

    fn is_installed(&self, name: &str) -> bool {
        self.installed.iter().any(|(n, _)| n == name)
    }

    fn installed(&self) -> Vec<String> {
        self.installed.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use crate::session::Session;

    fn factory() -> NativeScriptFactory {
        NativeScriptFactory::new().with_function("set_lod", |env: &mut FilterEnv| {
            env.set_property(Property::new("lod", 2));
            Ok(())
        })
    }

    #[test]
    fn test_install_and_run() {
        let factory = factory();
        let session = Arc::new(Session::new(Arc::new(factory.clone())));
        let mut env = session.create_filter_env();

        let mut engine = factory.create_engine().unwrap();
        engine.install(&Arc::new(Script::native("detail", "set_lod"))).unwrap();
        assert!(engine.is_installed("detail"));

        engine.run("detail", &mut env).unwrap();
        assert_eq!(session.property("lod").as_i64(0), 2);
    }

    #[test]
    fn test_install_rejects_unknown() {
        let mut engine = factory().create_engine().unwrap();

        let missing = Arc::new(Script::native("x", "no_such_fn"));
        assert!(matches!(engine.install(&missing), Err(CompileError::Script(_))));

        let lua = Arc::new(Script::new("y", "lua", "return 1"));
        assert!(matches!(engine.install(&lua), Err(CompileError::Script(_))));
        assert!(engine.installed().is_empty());
    }

    #[test]
    fn test_run_requires_install() {
        let factory = factory();
        let session = Arc::new(Session::new(Arc::new(factory.clone())));
        let mut env = session.create_filter_env();
        let mut engine = factory.create_engine().unwrap();

        assert!(engine.run("detail", &mut env).is_err());
    }
}
