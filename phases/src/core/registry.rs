//! Phase identity registry and per-phase goal lists.
//!
//! The registry guarantees one live [`Phase`] per name. Lookups go through an
//! alias table so that a name renamed away keeps resolving to the same phase.
//! Goal lists are keyed by [`PhaseId`], so a rename never migrates a list.
//!
//! # Concurrency
//!
//! Mutation is single-writer: every mutating method takes `&mut self`, and goal
//! handles are `Rc`, so a registry never crosses threads. Build one per session
//! during setup and share it by reference while planning.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::core::goal::{Goal, GoalRef, goal_key};
use crate::core::lifecycle::find_dependents;
use crate::core::placement::place_goal;
use crate::core::types::{InstallOptions, Phase, PhaseId, Placement};
use crate::error::PhaseError;

#[derive(Debug)]
struct PhaseEntry {
    phase: Phase,
    goals: Vec<GoalRef>,
}

/// Registry of phases, their goal lists, and the reverse goal -> phase map.
#[derive(Debug, Default)]
pub struct PhaseRegistry {
    /// Live name -> id. Ordered so snapshots come out sorted by name.
    names: BTreeMap<String, PhaseId>,
    /// Historical name -> current canonical name. Always one hop.
    renames: HashMap<String, String>,
    entries: HashMap<PhaseId, PhaseEntry>,
    /// Reverse map in first-install order; the latest install wins.
    installed: Vec<(GoalRef, PhaseId)>,
    next_id: u64,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the phase registered under `name`, creating it on first use.
    ///
    /// Names that were renamed away resolve to the renamed phase.
    pub fn resolve(&mut self, name: &str) -> PhaseId {
        let canonical = self.canonical_name(name).to_string();
        if let Some(id) = self.names.get(&canonical) {
            return *id;
        }

        let id = PhaseId(self.next_id);
        self.next_id += 1;
        debug!(phase = %canonical, %id, "registering phase");
        self.entries.insert(
            id,
            PhaseEntry {
                phase: Phase {
                    id,
                    name: canonical.clone(),
                    description: None,
                },
                goals: Vec::new(),
            },
        );
        self.names.insert(canonical, id);
        id
    }

    /// Look up a phase without creating it.
    pub fn lookup(&self, name: &str) -> Option<PhaseId> {
        self.names.get(self.canonical_name(name)).copied()
    }

    fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn phase(&self, id: PhaseId) -> Option<&Phase> {
        self.entries.get(&id).map(|entry| &entry.phase)
    }

    /// Current name of `id`, or `None` once uninstalled.
    pub fn name(&self, id: PhaseId) -> Option<&str> {
        self.phase(id).map(Phase::name)
    }

    /// Goals of `id` in stored order. Uninstalled phases have no goals.
    pub fn goals(&self, id: PhaseId) -> &[GoalRef] {
        self.entries
            .get(&id)
            .map(|entry| entry.goals.as_slice())
            .unwrap_or(&[])
    }

    pub fn with_description(
        &mut self,
        id: PhaseId,
        description: impl Into<String>,
    ) -> Result<PhaseId, PhaseError> {
        self.entry_mut(id)?.phase.description = Some(description.into());
        Ok(id)
    }

    /// Rename `id` to `new_name`.
    ///
    /// The old name becomes a permanent alias; earlier aliases of the phase are
    /// redirected too, so every historical name resolves in one hop. A name that
    /// is live or an alias of another phase is taken.
    pub fn rename(&mut self, id: PhaseId, new_name: &str) -> Result<PhaseId, PhaseError> {
        let old_name = self.entry(id)?.phase.name.clone();
        if old_name == new_name {
            return Ok(id);
        }
        let held_elsewhere = self.names.contains_key(new_name)
            || self
                .renames
                .get(new_name)
                .is_some_and(|target| *target != old_name);
        if held_elsewhere {
            return Err(PhaseError::NameTaken {
                from: old_name,
                to: new_name.to_string(),
            });
        }

        debug!(from = %old_name, to = %new_name, %id, "renaming phase");
        self.names.remove(&old_name);
        self.renames.remove(new_name);
        for target in self.renames.values_mut() {
            if *target == old_name {
                *target = new_name.to_string();
            }
        }
        self.renames.insert(old_name, new_name.to_string());
        self.entry_mut(id)?.phase.name = new_name.to_string();
        self.names.insert(new_name.to_string(), id);
        Ok(id)
    }

    /// Install `goal` into `id` at `placement` and bind the goal to this phase.
    ///
    /// A goal already listed in another phase stays listed there; only the
    /// reverse binding moves.
    pub fn install(
        &mut self,
        id: PhaseId,
        goal: GoalRef,
        placement: Placement,
    ) -> Result<PhaseId, PhaseError> {
        let entry = self.entry_mut(id)?;
        debug!(phase = %entry.phase.name, goal = goal.name(), ?placement, "installing goal");
        place_goal(&mut entry.goals, Rc::clone(&goal), &placement);
        self.bind(goal, id);
        Ok(id)
    }

    /// Install with flag-style modifiers. Conflicting flags fail before any mutation.
    pub fn install_with(
        &mut self,
        id: PhaseId,
        goal: GoalRef,
        options: &InstallOptions,
    ) -> Result<PhaseId, PhaseError> {
        let placement = options.placement()?;
        self.install(id, goal, placement)
    }

    fn bind(&mut self, goal: GoalRef, id: PhaseId) {
        let key = goal_key(&goal);
        match self
            .installed
            .iter_mut()
            .find(|(existing, _)| goal_key(existing) == key)
        {
            Some(binding) => binding.1 = id,
            None => self.installed.push((goal, id)),
        }
    }

    /// Remove the first goal named `goal_name` from `id`'s list.
    pub fn remove(&mut self, id: PhaseId, goal_name: &str) -> Result<PhaseId, PhaseError> {
        let entry = self.entry_mut(id)?;
        match entry.goals.iter().position(|goal| goal.name() == goal_name) {
            Some(index) => {
                debug!(phase = %entry.phase.name, goal = goal_name, "removing goal");
                entry.goals.remove(index);
                Ok(id)
            }
            None => Err(PhaseError::GoalNotFound {
                phase: entry.phase.name.clone(),
                goal: goal_name.to_string(),
                members: entry.goals.iter().map(|g| g.name().to_string()).collect(),
            }),
        }
    }

    /// Append `id`'s goals and description onto the phase named `new_name`.
    ///
    /// Goals end up listed in both phases; the reverse map is left alone.
    pub fn copy_to(&mut self, id: PhaseId, new_name: &str) -> Result<PhaseId, PhaseError> {
        let source = self.entry(id)?;
        let goals = source.goals.clone();
        let description = source.phase.description.clone();
        let source_name = source.phase.name.clone();

        let copy = self.resolve(new_name);
        debug!(from = %source_name, to = %new_name, goals = goals.len(), "copying phase");
        let entry = self.entry_mut(copy)?;
        entry.goals.extend(goals);
        entry.phase.description = description;
        Ok(copy)
    }

    /// Remove the phase and its goal list.
    ///
    /// Fails with every `(phase, goal)` pair that still depends on it. Goals
    /// still listed in a live phase are rebound to it; the rest are unbound.
    pub fn uninstall(&mut self, id: PhaseId) -> Result<(), PhaseError> {
        let name = self.entry(id)?.phase.name.clone();
        let dependents = find_dependents(self, id);
        if !dependents.is_empty() {
            return Err(PhaseError::UnsatisfiedDependency {
                phase: name,
                dependents,
            });
        }

        debug!(phase = %name, %id, "uninstalling phase");
        self.entries.remove(&id);
        self.names.remove(&name);
        let installed: Vec<(GoalRef, PhaseId)> = std::mem::take(&mut self.installed)
            .into_iter()
            .filter_map(|(goal, bound)| {
                if bound != id {
                    return Some((goal, bound));
                }
                self.listing_phase(&goal).map(|phase| (goal, phase))
            })
            .collect();
        self.installed = installed;
        Ok(())
    }

    /// First live phase, by name, whose list holds `goal`.
    fn listing_phase(&self, goal: &GoalRef) -> Option<PhaseId> {
        let key = goal_key(goal);
        self.names
            .values()
            .copied()
            .find(|id| self.goals(*id).iter().any(|listed| goal_key(listed) == key))
    }

    /// Phase `goal` was most recently installed into.
    pub fn of(&self, goal: &GoalRef) -> Option<PhaseId> {
        let key = goal_key(goal);
        self.installed
            .iter()
            .find(|(existing, _)| goal_key(existing) == key)
            .map(|(_, id)| *id)
    }

    /// Installed goals accepted by `predicate`, in first-install order.
    pub fn goals_where(&self, predicate: impl Fn(&dyn Goal) -> bool) -> Vec<GoalRef> {
        self.installed
            .iter()
            .filter(|(goal, _)| predicate(goal.as_ref()))
            .map(|(goal, _)| Rc::clone(goal))
            .collect()
    }

    /// Installed goals whose concrete type is `T`.
    pub fn goals_of_type<T: Goal + 'static>(&self) -> Vec<GoalRef> {
        self.goals_where(|goal| goal.as_any().is::<T>())
    }

    /// True if any goal in `id`'s list asks for serialized execution.
    pub fn serialize(&self, id: PhaseId) -> bool {
        self.goals(id).iter().any(|goal| goal.serialize())
    }

    /// Snapshot of every live phase with its goals, sorted by phase name.
    pub fn all(&self) -> Vec<(&Phase, &[GoalRef])> {
        self.names
            .values()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| (&entry.phase, entry.goals.as_slice()))
            .collect()
    }

    /// Live phase ids in name order.
    pub fn phase_ids(&self) -> Vec<PhaseId> {
        self.names.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn entry(&self, id: PhaseId) -> Result<&PhaseEntry, PhaseError> {
        self.entries
            .get(&id)
            .ok_or_else(|| PhaseError::UnknownPhase(id.to_string()))
    }

    fn entry_mut(&mut self, id: PhaseId) -> Result<&mut PhaseEntry, PhaseError> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| PhaseError::UnknownPhase(id.to_string()))
    }
}
