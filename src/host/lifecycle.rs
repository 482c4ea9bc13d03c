//! Agent lifecycle state machine

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an agent instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Not yet installed
    #[default]
    Unregistered,
    /// Shell manifest is being cached
    Installing,
    /// Installed, waiting for the previous agent's clients to go away
    Waiting,
    /// Stale generations are being removed
    Activating,
    /// Controlling clients and handling fetches
    Active,
    /// Failed install or activation; never used again
    Redundant,
}

/// Events that move an agent between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    InstallStarted,
    InstallSucceeded,
    InstallFailed,
    ActivateStarted,
    ActivateSucceeded,
    ActivateFailed,
}

impl Transition {
    fn signal(&self) -> &'static str {
        match self {
            Self::InstallStarted | Self::InstallSucceeded | Self::InstallFailed => "install",
            Self::ActivateStarted | Self::ActivateSucceeded | Self::ActivateFailed => "activate",
        }
    }
}

impl LifecycleState {
    /// Apply a transition, rejecting ones the lifecycle does not allow
    pub fn apply(self, transition: Transition) -> AgentResult<Self> {
        use LifecycleState::*;
        use Transition::*;

        let next = match (self, transition) {
            (Unregistered | Waiting, InstallStarted) => Installing,
            (Installing, InstallSucceeded) => Waiting,
            (Installing, InstallFailed) => Redundant,
            (Installing | Waiting, ActivateStarted) => Activating,
            (Activating, ActivateSucceeded) => Active,
            (Activating, ActivateFailed) => Redundant,
            (from, transition) => {
                return Err(AgentError::InvalidTransition {
                    from: from.to_string(),
                    signal: transition.signal().to_string(),
                })
            }
        };
        Ok(next)
    }

    /// Whether fetches are routed to the agent in this state
    pub fn handles_fetches(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::Installing => write!(f, "installing"),
            Self::Waiting => write!(f, "waiting"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}
