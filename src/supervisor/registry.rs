//! In-process agent store
//!
//! Records persist after completion for historical status queries, but
//! retention is bounded: once terminal records exceed the configured
//! cap, the oldest-finished are evicted. Running records are never
//! evicted.

use std::collections::HashMap;

use crate::domain::{Agent, AgentStatus, Stage};

/// Counts of agents by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Keyed store of agent records, owned by the supervisor
#[derive(Debug)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    max_finished: usize,
}

impl AgentRegistry {
    pub fn new(max_finished: usize) -> Self {
        Self {
            agents: HashMap::new(),
            max_finished,
        }
    }

    /// Register a new agent, evicting old terminal records if over cap
    pub fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
        self.evict_finished();
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// All records, oldest spawn first
    pub fn all(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        agents
    }

    /// Records currently running, oldest spawn first
    pub fn running(&self) -> Vec<Agent> {
        self.all()
            .into_iter()
            .filter(|a| a.status == AgentStatus::Running)
            .collect()
    }

    /// Whether any agent is currently running in a stage's worktree
    pub fn running_in(&self, stage: Stage) -> bool {
        self.agents
            .values()
            .any(|a| a.stage == stage && a.status == AgentStatus::Running)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for agent in self.agents.values() {
            match agent.status {
                AgentStatus::Running => counts.running += 1,
                AgentStatus::Completed => counts.completed += 1,
                AgentStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn evict_finished(&mut self) {
        let mut finished: Vec<(String, i64)> = self
            .agents
            .values()
            .filter(|a| a.status.is_terminal())
            .map(|a| (a.id.clone(), a.finished_at.unwrap_or(a.started_at)))
            .collect();

        if finished.len() <= self.max_finished {
            return;
        }

        finished.sort_by_key(|(_, at)| *at);
        let excess = finished.len() - self.max_finished;
        for (id, _) in finished.into_iter().take(excess) {
            self.agents.remove(&id);
        }
    }
}
