//! The three durable topic exchanges the platform declares.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the platform's three durable topic exchanges (spec.md §4.7,
/// §6). Commands flow orchestrator → participant, responses flow back,
/// events are public broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Orchestrator-issued commands.
    Commands,
    /// Public broadcasts driving inter-participant side effects.
    Events,
    /// Point-to-point replies to commands.
    Responses,
}

impl Exchange {
    /// The exchange's declared name on the broker.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Events => "events",
            Self::Responses => "responses",
        }
    }

    /// All exchanges the platform declares, for bootstrap code that
    /// needs to set up durable state for each of them.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Commands, Self::Events, Self::Responses]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
