//! Java distribution discovery and validation.
//!
//! A [`Distribution`] is a `bin` directory holding `java` (and `javac` for a
//! JDK). Validation checks the executables exist and, when a minimum version
//! is requested, probes `java` for its `java.version` property.

use std::cell::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::revision::Revision;
use crate::io::process::{ProcessLimits, run_captured};

const PROBE_LIMITS: ProcessLimits = ProcessLimits {
    timeout: Duration::from_secs(30),
    output_limit_bytes: 256 * 1024,
};

/// Errors raised while validating or locating a distribution.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("{} is not an executable", .path.display())]
    NotExecutable { path: PathBuf },

    #[error("java version {found} at {} is below the minimum {minimum}", .path.display())]
    TooOld {
        path: PathBuf,
        found: Revision,
        minimum: Revision,
    },

    #[error("could not determine java version of {}: {reason}", .path.display())]
    VersionProbe { path: PathBuf, reason: String },

    #[error("failed to locate a {kind} distribution, tried: [{}]", .tried.join(", "))]
    NotFound { kind: &'static str, tried: Vec<String> },
}

/// Requirements a distribution must meet.
#[derive(Debug, Clone, Default)]
pub struct DistributionOptions {
    /// Require a JDK (`javac` present), not just a JRE.
    pub jdk: bool,
    pub minimum_version: Option<Revision>,
}

impl DistributionOptions {
    fn kind(&self) -> &'static str {
        if self.jdk { "jdk" } else { "java" }
    }
}

/// Directories searched by [`Distribution::locate`].
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub jdk_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub path: Vec<PathBuf>,
}

impl SearchPaths {
    /// Read `JDK_HOME`, `JAVA_HOME` and `PATH` from the process environment.
    pub fn from_env() -> Self {
        Self {
            jdk_home: env::var_os("JDK_HOME").map(PathBuf::from),
            java_home: env::var_os("JAVA_HOME").map(PathBuf::from),
            path: env::var_os("PATH")
                .map(|raw| env::split_paths(&raw).collect())
                .unwrap_or_default(),
        }
    }

    /// Candidate `bin` directories in search order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = &self.jdk_home {
            candidates.push(home.join("bin"));
        }
        if let Some(home) = &self.java_home {
            candidates.push(home.join("bin"));
        }
        candidates.extend(self.path.iter().cloned());
        candidates
    }
}

/// A Java installation rooted at a `bin` directory.
#[derive(Debug)]
pub struct Distribution {
    bin_path: PathBuf,
    options: DistributionOptions,
    version: OnceCell<Revision>,
}

impl Distribution {
    pub fn new(bin_path: impl Into<PathBuf>, options: DistributionOptions) -> Self {
        Self {
            bin_path: bin_path.into(),
            options,
            version: OnceCell::new(),
        }
    }

    /// Find the first candidate directory that validates against `options`.
    #[instrument(skip_all, fields(jdk = options.jdk))]
    pub fn locate(
        search: &SearchPaths,
        options: &DistributionOptions,
    ) -> Result<Self, DistributionError> {
        let mut tried = Vec::new();
        for candidate in search.candidates() {
            let dist = Self::new(&candidate, options.clone());
            match dist.validate() {
                Ok(()) => {
                    debug!(bin_path = %candidate.display(), "located distribution");
                    return Ok(dist);
                }
                Err(err) => {
                    debug!(bin_path = %candidate.display(), %err, "rejected candidate");
                    tried.push(candidate.display().to_string());
                }
            }
        }
        Err(DistributionError::NotFound {
            kind: options.kind(),
            tried,
        })
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    pub fn is_jdk(&self) -> bool {
        self.options.jdk
    }

    /// Check required executables and the minimum version.
    pub fn validate(&self) -> Result<(), DistributionError> {
        self.executable("java")?;
        if self.options.jdk {
            self.executable("javac")?;
        }
        if let Some(minimum) = &self.options.minimum_version {
            let found = self.version()?;
            if found < minimum {
                return Err(DistributionError::TooOld {
                    path: self.bin_path.clone(),
                    found: found.clone(),
                    minimum: minimum.clone(),
                });
            }
        }
        Ok(())
    }

    /// Path of the executable `name` in this distribution, after validating it.
    pub fn binary(&self, name: &str) -> Result<PathBuf, DistributionError> {
        self.validate()?;
        self.executable(name)
    }

    /// The `java.version` reported by this distribution's `java`. Probed once.
    pub fn version(&self) -> Result<&Revision, DistributionError> {
        if let Some(version) = self.version.get() {
            return Ok(version);
        }
        let java = self.executable("java")?;
        let version = probe_version(&java)?;
        Ok(self.version.get_or_init(|| version))
    }

    fn executable(&self, name: &str) -> Result<PathBuf, DistributionError> {
        let path = self.bin_path.join(name);
        if is_executable(&path) {
            Ok(path)
        } else {
            Err(DistributionError::NotExecutable { path })
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn probe_version(java: &Path) -> Result<Revision, DistributionError> {
    let probe_err = |reason: String| DistributionError::VersionProbe {
        path: java.to_path_buf(),
        reason,
    };

    let mut cmd = Command::new(java);
    cmd.arg("-XshowSettings:properties").arg("-version");
    let output = run_captured(cmd, PROBE_LIMITS).map_err(|err| probe_err(format!("{err:#}")))?;
    if output.timed_out {
        return Err(probe_err(format!(
            "timed out after {}s",
            PROBE_LIMITS.timeout.as_secs()
        )));
    }
    if !output.status.success() {
        return Err(probe_err(format!("exited with {}", output.status)));
    }

    let text = output.combined_lossy();
    let raw = parse_java_version(&text)
        .ok_or_else(|| probe_err("no java.version property in output".to_string()))?;
    Revision::lenient(raw).map_err(|err| probe_err(err.to_string()))
}

/// Extract the `java.version` property from `-XshowSettings:properties` output.
fn parse_java_version(output: &str) -> Option<&str> {
    static VERSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\s*java\.version\s*=\s*(\S+)\s*$").unwrap());
    VERSION_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
