//! Ordered goal-list surgery for `install`.

use crate::core::goal::GoalRef;
use crate::core::types::Placement;

/// Insert `goal` into `goals` according to `placement`.
///
/// `Before`/`After` anchor on the first goal with a matching name; when no goal
/// matches, the goal is appended instead of failing the install.
pub fn place_goal(goals: &mut Vec<GoalRef>, goal: GoalRef, placement: &Placement) {
    match placement {
        Placement::Replace => {
            goals.clear();
            goals.push(goal);
        }
        Placement::First => goals.insert(0, goal),
        Placement::Before(anchor) => match position_of(goals, anchor) {
            Some(index) => goals.insert(index, goal),
            None => goals.push(goal),
        },
        Placement::After(anchor) => match position_of(goals, anchor) {
            Some(index) => goals.insert(index + 1, goal),
            None => goals.push(goal),
        },
        Placement::Append => goals.push(goal),
    }
}

/// Index of the first goal named `name`.
pub fn position_of(goals: &[GoalRef], name: &str) -> Option<usize> {
    goals.iter().position(|goal| goal.name() == name)
}
