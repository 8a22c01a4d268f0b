//! Test-only helpers: stub goals, scratch projects, and fake Java installs.

use std::any::Any;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::core::goal::{Goal, GoalRef, ParserContext};
use crate::core::types::{Phase, PhaseId};

/// A goal with configurable dependencies that counts its setup calls.
#[derive(Debug, Default)]
pub struct StubGoal {
    name: String,
    dependencies: Vec<PhaseId>,
    serialize: bool,
    fail_setup: bool,
    option: Option<String>,
    setup_calls: Cell<u32>,
}

impl StubGoal {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_deps(mut self, dependencies: &[PhaseId]) -> Self {
        self.dependencies = dependencies.to_vec();
        self
    }

    pub fn serialized(mut self) -> Self {
        self.serialize = true;
        self
    }

    /// Make `setup_parser` fail.
    pub fn failing(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Register `flag` during `setup_parser`.
    pub fn with_option(mut self, flag: &str) -> Self {
        self.option = Some(flag.to_string());
        self
    }

    pub fn into_ref(self) -> GoalRef {
        Rc::new(self)
    }

    /// Keep the concrete type so tests can inspect `setup_calls`.
    pub fn into_shared(self) -> Rc<StubGoal> {
        Rc::new(self)
    }

    pub fn setup_calls(&self) -> u32 {
        self.setup_calls.get()
    }
}

impl Goal for StubGoal {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[PhaseId] {
        &self.dependencies
    }

    fn serialize(&self) -> bool {
        self.serialize
    }

    fn setup_parser(&self, phase: &Phase, parser: &mut ParserContext) -> Result<()> {
        self.setup_calls.set(self.setup_calls.get() + 1);
        if self.fail_setup {
            bail!("stub goal {} refused setup", self.name);
        }
        if let Some(flag) = &self.option {
            parser.add_option(phase, &self.name, flag, "stub option")?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stub goal without dependencies.
pub fn stub(name: &str) -> GoalRef {
    StubGoal::new(name).into_ref()
}

/// Stub goal depending on `dependencies`.
pub fn stub_with_deps(name: &str, dependencies: &[PhaseId]) -> GoalRef {
    StubGoal::new(name).with_deps(dependencies).into_ref()
}

/// Scratch project directory holding a build file.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` as `phases.toml` and return its path.
    pub fn write_build_file(&self, contents: &str) -> Result<PathBuf> {
        let path = self.path().join("phases.toml");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Script body for a fake `java` that reports `version` the way the probe expects.
pub fn java_script(version: &str) -> String {
    format!("#!/bin/sh\necho \"    java.version = {version}\" >&2\nexit 0\n")
}

/// Create `dir/name` with `contents`, marking it executable.
#[cfg(unix)]
pub fn write_executable(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    let mut perms = fs::metadata(&path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// Create `dir/name` as a plain, non-executable file.
pub fn touch(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, "").with_context(|| format!("touch {}", path.display()))?;
    Ok(path)
}
