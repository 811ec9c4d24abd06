//! Compile service boundary.
//!
//! Bundling and transpilation live outside the engine. A [`Compiler`] turns
//! a path into a [`CompiledFile`]: an executable [`TestProgram`] plus an
//! opaque source map.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::{CompileError, ScriptError};
use crate::sandbox::Sandbox;

/// Compiled top-level code of one test file.
///
/// `evaluate` runs registration synchronously against the sandbox and is
/// expected to end by calling [`Sandbox::run`].
pub trait TestProgram: Send + Sync {
    fn evaluate(&self, sandbox: &mut Sandbox) -> Result<(), ScriptError>;
}

impl<F> TestProgram for F
where
    F: Fn(&mut Sandbox) -> Result<(), ScriptError> + Send + Sync,
{
    fn evaluate(&self, sandbox: &mut Sandbox) -> Result<(), ScriptError> {
        self(sandbox)
    }
}

/// Wrap a closure as a shareable program.
pub fn program<F>(f: F) -> Arc<dyn TestProgram>
where
    F: Fn(&mut Sandbox) -> Result<(), ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Opaque source map passed through to reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap(pub serde_json::Value);

#[derive(Clone)]
pub struct CompiledFile {
    pub program: Arc<dyn TestProgram>,
    pub source_map: Option<SourceMap>,
}

impl CompiledFile {
    pub fn new(program: Arc<dyn TestProgram>) -> Self {
        Self {
            program,
            source_map: None,
        }
    }

    pub fn with_source_map(mut self, source_map: SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }
}

impl fmt::Debug for CompiledFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFile")
            .field("source_map", &self.source_map.is_some())
            .finish_non_exhaustive()
    }
}

/// External compile service.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, path: &Path) -> Result<CompiledFile, CompileError>;
}

#[derive(Clone)]
enum Entry {
    Compiled(CompiledFile),
    Broken { message: String, location: Option<String> },
}

/// In-process compile service keyed by path.
///
/// With `require_on_disk`, a registered path whose file is gone compiles
/// to [`CompileError::NotFound`], matching a real bundler.
#[derive(Default)]
pub struct StaticCompiler {
    entries: RwLock<HashMap<PathBuf, Entry>>,
    require_on_disk: bool,
}

impl StaticCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_on_disk(mut self, yes: bool) -> Self {
        self.require_on_disk = yes;
        self
    }

    /// Register or replace the program for `path`.
    pub fn register(&self, path: impl Into<PathBuf>, program: Arc<dyn TestProgram>) {
        self.entries
            .write()
            .insert(path.into(), Entry::Compiled(CompiledFile::new(program)));
    }

    pub fn register_with_source_map(
        &self,
        path: impl Into<PathBuf>,
        program: Arc<dyn TestProgram>,
        source_map: SourceMap,
    ) {
        let file = CompiledFile::new(program).with_source_map(source_map);
        self.entries.write().insert(path.into(), Entry::Compiled(file));
    }

    /// Make `path` fail to compile with a build error.
    pub fn fail(&self, path: impl Into<PathBuf>, message: impl Into<String>, location: Option<String>) {
        self.entries.write().insert(
            path.into(),
            Entry::Broken {
                message: message.into(),
                location,
            },
        );
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.entries.write().remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }
}

#[async_trait]
impl Compiler for StaticCompiler {
    async fn compile(&self, path: &Path) -> Result<CompiledFile, CompileError> {
        let not_found = || CompileError::NotFound {
            path: path.to_path_buf(),
        };
        if self.require_on_disk && !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(not_found());
        }
        let entry = self.entries.read().get(path).cloned();
        match entry.ok_or_else(not_found)? {
            Entry::Compiled(file) => Ok(file),
            Entry::Broken { message, location } => Err(CompileError::Build {
                path: path.to_path_buf(),
                message,
                location,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn TestProgram> {
        program(|sb| {
            sb.run();
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let compiler = StaticCompiler::new();
        let err = compiler.compile(Path::new("missing.test")).await.unwrap_err();
        assert!(matches!(err, CompileError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fail_then_register_recovers() {
        let compiler = StaticCompiler::new();
        compiler.fail("a.test", "unexpected token", Some("a.test:3:7".into()));
        let err = compiler.compile(Path::new("a.test")).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to compile a.test: unexpected token (a.test:3:7)");

        compiler.register("a.test", noop());
        assert!(compiler.compile(Path::new("a.test")).await.is_ok());
    }

    #[tokio::test]
    async fn test_source_map_passes_through() {
        let compiler = StaticCompiler::new();
        let map = SourceMap(serde_json::json!({"version": 3, "mappings": "AAAA"}));
        compiler.register_with_source_map("b.test", noop(), map.clone());
        let file = compiler.compile(Path::new("b.test")).await.unwrap();
        assert_eq!(file.source_map, Some(map));
    }

    #[tokio::test]
    async fn test_require_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.test");
        std::fs::write(&path, "").unwrap();

        let compiler = StaticCompiler::new().require_on_disk(true);
        compiler.register(&path, noop());
        assert!(compiler.compile(&path).await.is_ok());

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            compiler.compile(&path).await,
            Err(CompileError::NotFound { .. })
        ));
    }
}
