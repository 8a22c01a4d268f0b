//! Build file (`phases.toml`) describing phases, goals and registry edits.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::revision::Revision;
use crate::core::types::InstallOptions;

pub const DEFAULT_BUILD_FILE: &str = "phases.toml";

/// Build file contents (TOML).
///
/// Edits are applied in a fixed order: phases, goals, removals, copies,
/// renames, uninstalls. Within each table, entries apply in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    #[serde(rename = "phase")]
    pub phases: Vec<PhaseConfig>,

    #[serde(rename = "goal")]
    pub goals: Vec<GoalConfig>,

    #[serde(rename = "remove")]
    pub removals: Vec<RemoveConfig>,

    #[serde(rename = "copy")]
    pub copies: Vec<CopyConfig>,

    #[serde(rename = "rename")]
    pub renames: Vec<RenameConfig>,

    #[serde(rename = "uninstall")]
    pub uninstalls: Vec<UninstallConfig>,

    pub java: JavaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PhaseConfig {
    pub name: String,
    pub description: Option<String>,
}

/// A goal installed into `phase`.
///
/// `first`, `replace`, `before` and `after` are mutually exclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GoalConfig {
    pub name: String,
    pub phase: String,
    /// Names of phases this goal depends on.
    pub dependencies: Vec<String>,
    pub serialize: bool,
    pub first: bool,
    pub replace: bool,
    pub before: Option<String>,
    pub after: Option<String>,
    /// Options registered during parser setup.
    pub options: Vec<OptionConfig>,
}

impl GoalConfig {
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            first: self.first,
            replace: self.replace,
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptionConfig {
    pub flag: String,
    pub help: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoveConfig {
    pub phase: String,
    pub goal: String,
}

/// Append the goals of phase `from` onto phase `to`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CopyConfig {
    pub from: String,
    pub to: String,
}

/// Rename phase `from` to `to`; `from` stays an alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenameConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UninstallConfig {
    pub phase: String,
}

/// Requirements for `phases java` when no flags override them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JavaConfig {
    pub jdk: bool,
    pub minimum_version: Option<String>,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        for (index, phase) in self.phases.iter().enumerate() {
            require_name(&phase.name, &format!("phase[{index}].name"))?;
        }
        for (index, goal) in self.goals.iter().enumerate() {
            require_name(&goal.name, &format!("goal[{index}].name"))?;
            require_name(&goal.phase, &format!("goal[{index}].phase"))?;
            for dep in &goal.dependencies {
                require_name(dep, &format!("goal[{index}].dependencies"))?;
            }
            for option in &goal.options {
                if !option.flag.starts_with('-') {
                    return Err(anyhow!(
                        "goal[{index}].options: flag {:?} must start with '-'",
                        option.flag
                    ));
                }
            }
        }
        for (index, removal) in self.removals.iter().enumerate() {
            require_name(&removal.phase, &format!("remove[{index}].phase"))?;
            require_name(&removal.goal, &format!("remove[{index}].goal"))?;
        }
        for (index, copy) in self.copies.iter().enumerate() {
            require_name(&copy.from, &format!("copy[{index}].from"))?;
            require_name(&copy.to, &format!("copy[{index}].to"))?;
        }
        for (index, rename) in self.renames.iter().enumerate() {
            require_name(&rename.from, &format!("rename[{index}].from"))?;
            require_name(&rename.to, &format!("rename[{index}].to"))?;
        }
        for (index, uninstall) in self.uninstalls.iter().enumerate() {
            require_name(&uninstall.phase, &format!("uninstall[{index}].phase"))?;
        }
        self.java.minimum_revision()?;
        Ok(())
    }
}

impl JavaConfig {
    pub fn minimum_revision(&self) -> Result<Option<Revision>> {
        self.minimum_version
            .as_deref()
            .map(|raw| Revision::lenient(raw).context("java.minimum_version"))
            .transpose()
    }
}

fn require_name(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must be a non-empty string"));
    }
    Ok(())
}

/// Load the build file.
///
/// If the file is missing, returns `BuildConfig::default()`.
pub fn load_config(path: &Path) -> Result<BuildConfig> {
    if !path.exists() {
        return Ok(BuildConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BuildConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
