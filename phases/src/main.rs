//! `phases`: inspect and plan a build's phases and goals.
//!
//! Reads the build file (`phases.toml` by default), assembles the phase
//! registry, and reports on it. Also locates the Java distribution a build
//! would use.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use phases::core::revision::Revision;
use phases::error::PhaseError;
use phases::exit_codes;
use phases::io::config::{DEFAULT_BUILD_FILE, load_config};
use phases::io::distribution::{DistributionError, DistributionOptions, SearchPaths};
use phases::logging;
use phases::session::{
    CheckReport, JavaReport, PhaseSummary, SessionPlan, check_registry, load_registry,
    locate_java, plan_phases, summarize,
};

#[derive(Parser)]
#[command(name = "phases", version, about = "Build phase and goal registry")]
struct Cli {
    /// Build file to read.
    #[arg(long, global = true, default_value = DEFAULT_BUILD_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all phases with their goals, sorted by name.
    List {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the execution plan for the named phases, dependencies first.
    Plan {
        /// Phases to plan, in request order.
        #[arg(required = true)]
        phases: Vec<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Arguments passed through to goal parser setup.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Build the registry and walk every phase to catch cycles early.
    Check,
    /// Locate a Java distribution from JDK_HOME, JAVA_HOME and PATH.
    Java {
        /// Require a JDK (javac present).
        #[arg(long)]
        jdk: bool,
        /// Minimum acceptable java.version, e.g. 1.7.0_45.
        #[arg(long)]
        minimum_version: Option<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::List { json } => cmd_list(&cli.config, json),
        Command::Plan { phases, json, args } => cmd_plan(&cli.config, &phases, args, json),
        Command::Check => cmd_check(&cli.config),
        Command::Java {
            jdk,
            minimum_version,
            json,
        } => cmd_java(&cli.config, jdk, minimum_version, json),
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<PhaseError>() {
        return match err {
            PhaseError::CyclicDependency { .. } | PhaseError::UnsatisfiedDependency { .. } => {
                exit_codes::DEPENDENCY
            }
            _ => exit_codes::INVALID,
        };
    }
    if let Some(DistributionError::NotFound { .. }) = err.downcast_ref::<DistributionError>() {
        return exit_codes::NOT_FOUND;
    }
    exit_codes::INVALID
}

fn cmd_list(config: &Path, json: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let summary = summarize(&registry);
    if json {
        return print_json(&summary);
    }
    print!("{}", render_list(&summary));
    Ok(())
}

fn cmd_plan(config: &Path, phases: &[String], args: Vec<String>, json: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let plan = plan_phases(&registry, phases, args)?;
    if json {
        return print_json(&plan);
    }
    print!("{}", render_plan(&plan));
    Ok(())
}

fn cmd_check(config: &Path) -> Result<()> {
    let registry = load_registry(config)?;
    let CheckReport { phases, goals } = check_registry(&registry)?;
    println!("ok: {phases} phases, {goals} goals");
    Ok(())
}

fn cmd_java(config: &Path, jdk: bool, minimum_version: Option<String>, json: bool) -> Result<()> {
    let build = load_config(config)?;
    let minimum_version = match minimum_version {
        Some(raw) => Some(Revision::lenient(&raw).context("--minimum-version")?),
        None => build.java.minimum_revision()?,
    };
    let options = DistributionOptions {
        jdk: jdk || build.java.jdk,
        minimum_version,
    };
    let report = locate_java(&SearchPaths::from_env(), &options)?;
    if json {
        return print_json(&report);
    }
    print!("{}", render_java(&report));
    Ok(())
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

fn render_list(summary: &[PhaseSummary]) -> String {
    let mut out = String::new();
    for phase in summary {
        out.push_str(&phase.name);
        if let Some(description) = &phase.description {
            out.push_str(&format!(": {description}"));
        }
        if phase.serialize {
            out.push_str(" (serial)");
        }
        out.push('\n');
        for goal in &phase.goals {
            out.push_str(&format!("  {}", goal.name));
            if !goal.dependencies.is_empty() {
                out.push_str(&format!(" <- {}", goal.dependencies.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

fn render_plan(plan: &SessionPlan) -> String {
    let mut out = String::new();
    for (index, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("{}. {}:{}", index + 1, step.phase, step.goal));
        if step.serialize {
            out.push_str(" (serial)");
        }
        out.push('\n');
    }
    if !plan.options.is_empty() {
        out.push_str("options:\n");
        for option in &plan.options {
            out.push_str(&format!(
                "  {} ({}:{}) {}\n",
                option.flag, option.phase, option.goal, option.help
            ));
        }
    }
    out
}

fn render_java(report: &JavaReport) -> String {
    let kind = if report.jdk { "jdk" } else { "java" };
    let version = report.version.as_deref().unwrap_or("unknown");
    format!("{kind}: {}\nversion: {version}\n", report.java.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phases::session::{GoalSummary, PlanStep};

    #[test]
    fn parse_plan_with_passthrough_args() {
        let cli = Cli::parse_from(["phases", "plan", "compile", "test", "--", "--verbose"]);
        match cli.command {
            Command::Plan { phases, json, args } => {
                assert_eq!(phases, vec!["compile", "test"]);
                assert!(!json);
                assert_eq!(args, vec!["--verbose"]);
            }
            _ => panic!("expected plan"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_BUILD_FILE));
    }

    #[test]
    fn parse_plan_requires_a_phase() {
        assert!(Cli::try_parse_from(["phases", "plan"]).is_err());
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["phases", "check", "--config", "build/phases.toml"]);
        assert!(matches!(cli.command, Command::Check));
        assert_eq!(cli.config, PathBuf::from("build/phases.toml"));
    }

    #[test]
    fn parse_java_flags() {
        let cli = Cli::parse_from(["phases", "java", "--jdk", "--minimum-version", "1.7.0"]);
        assert!(matches!(
            cli.command,
            Command::Java { jdk: true, minimum_version: Some(ref v), json: false } if v == "1.7.0"
        ));
    }

    #[test]
    fn render_list_shows_descriptions_and_dependencies() {
        let summary = vec![PhaseSummary {
            name: "compile".to_string(),
            description: Some("Compile sources".to_string()),
            serialize: true,
            goals: vec![GoalSummary {
                name: "javac".to_string(),
                dependencies: vec!["resolve".to_string()],
                serialize: true,
            }],
        }];
        assert_eq!(
            render_list(&summary),
            "compile: Compile sources (serial)\n  javac <- resolve\n"
        );
    }

    #[test]
    fn render_plan_numbers_steps() {
        let plan = SessionPlan {
            steps: vec![
                PlanStep {
                    phase: "resolve".to_string(),
                    goal: "ivy".to_string(),
                    serialize: false,
                },
                PlanStep {
                    phase: "compile".to_string(),
                    goal: "javac".to_string(),
                    serialize: false,
                },
            ],
            options: Vec::new(),
        };
        assert_eq!(render_plan(&plan), "1. resolve:ivy\n2. compile:javac\n");
    }
}
