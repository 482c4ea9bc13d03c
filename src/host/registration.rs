//! Registration record persistence
//!
//! A CLI process lives shorter than the agent it hosts. The registration
//! records which generation was last installed and how far its lifecycle
//! got, so the next invocation can resume an active agent.

use super::LifecycleState;
use crate::error::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// Persisted agent registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Unique id of the registered agent instance
    pub id: Uuid,

    /// Cache generation the agent serves
    pub generation: String,

    /// Last known lifecycle state
    pub state: LifecycleState,

    /// When the agent was registered
    pub registered_at: DateTime<Utc>,

    /// When the state last changed
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Create a new registration for a generation
    pub fn new(generation: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            generation: generation.into(),
            state: LifecycleState::Unregistered,
            registered_at: now,
            updated_at: now,
        }
    }

    /// Record a new state
    pub fn touch(&mut self, state: LifecycleState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// State an agent for `generation` can pick up from this registration
    pub fn resumable_state(&self, generation: &str) -> Option<LifecycleState> {
        if self.generation != generation {
            return None;
        }
        match self.state {
            LifecycleState::Waiting | LifecycleState::Active => Some(self.state),
            _ => None,
        }
    }

    /// Load registration from file
    pub async fn load(path: &Path) -> AgentResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            AgentError::io(format!("reading registration {}", path.display()), e)
        })?;

        let registration: Registration = serde_json::from_str(&content)?;
        Ok(Some(registration))
    }

    /// Save registration to file
    pub async fn save(&self, path: &Path) -> AgentResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            AgentError::io(format!("writing registration {}", path.display()), e)
        })?;

        Ok(())
    }
}
