//! Build session assembly for the `phases` CLI.
//!
//! Turns a [`BuildConfig`] into a [`PhaseRegistry`] and runs the core
//! operations the commands report on.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::closure::setup_execution_plan;
use crate::core::goal::{Goal, GoalOption, GoalRef, ParserContext};
use crate::core::registry::PhaseRegistry;
use crate::core::types::{Phase, PhaseId};
use crate::io::config::{BuildConfig, GoalConfig, OptionConfig};
use crate::io::distribution::{Distribution, DistributionOptions, SearchPaths};

/// A goal declared in the build file.
#[derive(Debug)]
pub struct ConfiguredGoal {
    name: String,
    dependencies: Vec<PhaseId>,
    serialize: bool,
    options: Vec<OptionConfig>,
}

impl ConfiguredGoal {
    fn new(config: &GoalConfig, dependencies: Vec<PhaseId>) -> Self {
        Self {
            name: config.name.clone(),
            dependencies,
            serialize: config.serialize,
            options: config.options.clone(),
        }
    }
}

impl Goal for ConfiguredGoal {
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
        for option in &self.options {
            parser.add_option(phase, &self.name, &option.flag, &option.help)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Build a registry from `config`.
///
/// Dependencies are resolved through the registry, so they follow later renames.
pub fn build_registry(config: &BuildConfig) -> Result<PhaseRegistry> {
    let mut registry = PhaseRegistry::new();

    for phase in &config.phases {
        let id = registry.resolve(&phase.name);
        if let Some(description) = &phase.description {
            registry.with_description(id, description.clone())?;
        }
    }

    for goal in &config.goals {
        let placement = goal
            .install_options()
            .placement()
            .with_context(|| format!("install goal {} into {}", goal.name, goal.phase))?;
        let dependencies = goal
            .dependencies
            .iter()
            .map(|name| registry.resolve(name))
            .collect();
        let target = registry.resolve(&goal.phase);
        let handle: GoalRef = Rc::new(ConfiguredGoal::new(goal, dependencies));
        registry
            .install(target, handle, placement)
            .with_context(|| format!("install goal {} into {}", goal.name, goal.phase))?;
    }

    for removal in &config.removals {
        let id = existing(&registry, &removal.phase)?;
        registry
            .remove(id, &removal.goal)
            .with_context(|| format!("remove goal {} from {}", removal.goal, removal.phase))?;
    }

    for copy in &config.copies {
        let id = existing(&registry, &copy.from)?;
        registry
            .copy_to(id, &copy.to)
            .with_context(|| format!("copy {} to {}", copy.from, copy.to))?;
    }

    for rename in &config.renames {
        let id = existing(&registry, &rename.from)?;
        registry
            .rename(id, &rename.to)
            .with_context(|| format!("rename {} to {}", rename.from, rename.to))?;
    }

    for uninstall in &config.uninstalls {
        let id = existing(&registry, &uninstall.phase)?;
        registry
            .uninstall(id)
            .with_context(|| format!("uninstall {}", uninstall.phase))?;
    }

    info!(phases = registry.len(), "registry built");
    Ok(registry)
}

fn existing(registry: &PhaseRegistry, name: &str) -> Result<PhaseId> {
    registry.lookup(name).ok_or_else(|| {
        let known: Vec<String> = registry
            .all()
            .iter()
            .map(|(phase, _)| phase.name().to_string())
            .collect();
        anyhow!("unknown phase {name}, known phases are: [{}]", known.join(", "))
    })
}

/// A goal as shown by `phases list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalSummary {
    pub name: String,
    pub dependencies: Vec<String>,
    pub serialize: bool,
}

/// A phase as shown by `phases list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    pub name: String,
    pub description: Option<String>,
    pub serialize: bool,
    pub goals: Vec<GoalSummary>,
}

/// Every phase with its goals, sorted by phase name.
pub fn summarize(registry: &PhaseRegistry) -> Vec<PhaseSummary> {
    registry
        .all()
        .into_iter()
        .map(|(phase, goals)| PhaseSummary {
            name: phase.name().to_string(),
            description: phase.description.clone(),
            serialize: registry.serialize(phase.id()),
            goals: goals
                .iter()
                .map(|goal| GoalSummary {
                    name: goal.name().to_string(),
                    dependencies: goal
                        .dependencies()
                        .iter()
                        .map(|dep| phase_label(registry, *dep))
                        .collect(),
                    serialize: goal.serialize(),
                })
                .collect(),
        })
        .collect()
}

fn phase_label(registry: &PhaseRegistry, id: PhaseId) -> String {
    registry
        .name(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// One planned goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub phase: String,
    pub goal: String,
    pub serialize: bool,
}

/// Result of `phases plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPlan {
    pub steps: Vec<PlanStep>,
    pub options: Vec<GoalOption>,
}

/// Resolve `names` and set up their goals, dependencies first.
///
/// Unlike [`PhaseRegistry::resolve`], an unknown name is an error here: a
/// phase named on the command line must have been declared.
pub fn plan_phases(
    registry: &PhaseRegistry,
    names: &[String],
    args: Vec<String>,
) -> Result<SessionPlan> {
    let roots = names
        .iter()
        .map(|name| existing(registry, name))
        .collect::<Result<Vec<_>>>()?;

    let mut parser = ParserContext::new(args);
    let plan = setup_execution_plan(registry, &roots, &mut parser)
        .with_context(|| format!("plan {}", names.join(" ")))?;

    Ok(SessionPlan {
        steps: plan
            .steps
            .iter()
            .map(|step| PlanStep {
                phase: step.phase_name.clone(),
                goal: step.goal.name().to_string(),
                serialize: step.goal.serialize(),
            })
            .collect(),
        options: parser.options().to_vec(),
    })
}

/// Counts reported by `phases check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub phases: usize,
    pub goals: usize,
}

/// Walk every phase so cycles and option conflicts surface before a build.
pub fn check_registry(registry: &PhaseRegistry) -> Result<CheckReport> {
    let roots = registry.phase_ids();
    let mut parser = ParserContext::default();
    let plan = setup_execution_plan(registry, &roots, &mut parser).context("check phases")?;
    Ok(CheckReport {
        phases: roots.len(),
        goals: plan.len(),
    })
}

/// Load the build file at `path` and build its registry.
pub fn load_registry(path: &Path) -> Result<PhaseRegistry> {
    let config = crate::io::config::load_config(path)?;
    build_registry(&config).with_context(|| format!("build phases from {}", path.display()))
}

/// Result of `phases java`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JavaReport {
    pub bin_path: PathBuf,
    pub java: PathBuf,
    pub jdk: bool,
    pub version: Option<String>,
}

/// Locate a distribution and describe it.
///
/// The version is reported when `java` can be probed; a failed probe only
/// matters when `options` set a minimum version.
pub fn locate_java(search: &SearchPaths, options: &DistributionOptions) -> Result<JavaReport> {
    let dist = Distribution::locate(search, options)?;
    let java = dist.binary("java")?;
    let version = match dist.version() {
        Ok(version) => Some(version.to_string()),
        Err(err) => {
            warn!(%err, "could not probe java version");
            None
        }
    };
    Ok(JavaReport {
        bin_path: dist.bin_path().to_path_buf(),
        java,
        jdk: dist.is_jdk(),
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Placement;
    use crate::error::PhaseError;
    use crate::io::config::{
        CopyConfig, PhaseConfig, RemoveConfig, RenameConfig, UninstallConfig,
    };

    fn goal(name: &str, phase: &str, deps: &[&str]) -> GoalConfig {
        GoalConfig {
            name: name.to_string(),
            phase: phase.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..GoalConfig::default()
        }
    }

    fn sample() -> BuildConfig {
        BuildConfig {
            phases: vec![PhaseConfig {
                name: "compile".to_string(),
                description: Some("Compile sources".to_string()),
            }],
            goals: vec![
                goal("ivy", "resolve", &[]),
                goal("javac", "compile", &["resolve"]),
                goal("junit", "test", &["compile"]),
            ],
            ..BuildConfig::default()
        }
    }

    #[test]
    fn build_registry_installs_goals_in_file_order() {
        let registry = build_registry(&sample()).expect("registry");
        let names: Vec<String> = summarize(&registry).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["compile", "resolve", "test"]);
    }

    #[test]
    fn plan_orders_dependencies_first() {
        let registry = build_registry(&sample()).expect("registry");
        let plan = plan_phases(&registry, &["test".to_string()], Vec::new()).expect("plan");
        let labels: Vec<String> = plan
            .steps
            .iter()
            .map(|step| format!("{}:{}", step.phase, step.goal))
            .collect();
        assert_eq!(labels, vec!["resolve:ivy", "compile:javac", "test:junit"]);
    }

    #[test]
    fn dependencies_follow_renames() {
        let mut config = sample();
        config.renames.push(RenameConfig {
            from: "resolve".to_string(),
            to: "resolve-deps".to_string(),
        });
        let registry = build_registry(&config).expect("registry");
        let summary = summarize(&registry);
        let compile = summary.iter().find(|p| p.name == "compile").expect("compile");
        assert_eq!(compile.goals[0].dependencies, vec!["resolve-deps".to_string()]);

        let plan = plan_phases(&registry, &["resolve".to_string()], Vec::new()).expect("plan");
        assert_eq!(plan.steps[0].phase, "resolve-deps");
    }

    #[test]
    fn copy_lists_goals_under_the_new_phase() {
        let mut config = sample();
        config.copies.push(CopyConfig {
            from: "compile".to_string(),
            to: "compile-all".to_string(),
        });
        let registry = build_registry(&config).expect("registry");
        let summary = summarize(&registry);
        let copy = summary
            .iter()
            .find(|p| p.name == "compile-all")
            .expect("compile-all");
        assert_eq!(copy.description.as_deref(), Some("Compile sources"));
        assert_eq!(copy.goals[0].name, "javac");
    }

    #[test]
    fn conflicting_placement_is_a_configuration_error() {
        let mut config = sample();
        config.goals.push(GoalConfig {
            first: true,
            after: Some("javac".to_string()),
            ..goal("scalac", "compile", &[])
        });
        let err = build_registry(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhaseError>(),
            Some(PhaseError::Configuration { .. })
        ));
    }

    #[test]
    fn uninstall_of_depended_phase_fails() {
        let mut config = sample();
        config.uninstalls.push(UninstallConfig {
            phase: "resolve".to_string(),
        });
        let err = build_registry(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhaseError>(),
            Some(PhaseError::UnsatisfiedDependency { .. })
        ));
        assert_eq!(
            format!("{err:#}"),
            "uninstall resolve: resolve is depended on by compile:javac"
        );
    }

    #[test]
    fn remove_of_unknown_goal_names_members() {
        let mut config = sample();
        config.removals.push(RemoveConfig {
            phase: "compile".to_string(),
            goal: "scalac".to_string(),
        });
        let err = build_registry(&config).unwrap_err();
        assert!(format!("{err:#}").contains("members are: [javac]"));
    }

    #[test]
    fn plan_rejects_unknown_phase() {
        let registry = build_registry(&sample()).expect("registry");
        let err = plan_phases(&registry, &["deploy".to_string()], Vec::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown phase deploy, known phases are: [compile, resolve, test]"
        );
    }

    #[test]
    fn check_reports_cycles() {
        let mut config = sample();
        config.goals.push(goal("gen", "resolve", &["test"]));
        let registry = build_registry(&config).expect("registry");
        let err = check_registry(&registry).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhaseError>(),
            Some(PhaseError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn check_counts_every_goal_once() {
        let registry = build_registry(&sample()).expect("registry");
        let report = check_registry(&registry).expect("check");
        assert_eq!(report, CheckReport { phases: 3, goals: 3 });
    }

    #[test]
    fn configured_goals_are_found_by_type() {
        let mut registry = build_registry(&sample()).expect("registry");
        let extra = registry.resolve("extra");
        registry
            .install(extra, crate::test_support::stub("other"), Placement::Append)
            .expect("install");
        assert_eq!(registry.goals_of_type::<ConfiguredGoal>().len(), 3);
    }
}
