//! Lenient version ordering for tool versions such as `1.7.0_25`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One component of a revision. Numbers sort before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// A version split into comparable components.
///
/// Components are separated by `.`, `_`, `-` or `+`. A revision that is a
/// strict prefix of another sorts first, so `1.7.0 < 1.7.0_25`.
#[derive(Debug, Clone)]
pub struct Revision {
    raw: String,
    components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid revision {0:?}")]
pub struct InvalidRevision(pub String);

impl Revision {
    pub fn lenient(raw: &str) -> Result<Self, InvalidRevision> {
        let trimmed = raw.trim();
        let components: Vec<Component> = trimmed
            .split(['.', '_', '-', '+'])
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<u64>() {
                Ok(number) => Component::Number(number),
                Err(_) => Component::Text(part.to_string()),
            })
            .collect();
        if components.is_empty() {
            return Err(InvalidRevision(raw.to_string()));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Revision {
    type Err = InvalidRevision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lenient(s)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for Revision {}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}
