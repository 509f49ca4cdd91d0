//! Per-session derived state: coalesced log, turn flag, prompt phase.
//!
//! The actor owns the mutable state; observers read through lock-free
//! `ArcSwap` snapshots, refreshed after every mutation.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::coalesce::{DisplayEntry, EventLog};
use crate::dispatch::PromptDispatcher;
use crate::turn::TurnTracker;

/// Metadata the backend reports for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub title: String,
    pub workspace_id: String,
    pub workspace_branch: String,
}

/// Which agent process backs the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentInfo {
    pub agent_type: String,
    pub agent_session_id: String,
}

/// Notifications fanned out to session subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A display entry was appended or updated in place (same `seq`).
    Entry(DisplayEntry),
    /// The derived working flag changed.
    Working(bool),
    Started(AgentInfo),
    Metadata(SessionMetadata),
    Ended {
        reason: String,
        error: Option<String>,
    },
    /// A server error scoped to this session (after repair filtering).
    SessionError {
        message: String,
    },
}

/// Lock-free read model of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub entries: Vec<DisplayEntry>,
    pub working: bool,
    pub agent: Option<AgentInfo>,
    pub metadata: Option<SessionMetadata>,
}

pub(crate) struct SessionState {
    pub(crate) id: String,
    pub(crate) log: EventLog,
    pub(crate) turns: TurnTracker,
    pub(crate) prompt: PromptDispatcher,
    pub(crate) agent: Option<AgentInfo>,
    pub(crate) metadata: Option<SessionMetadata>,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
}

impl SessionState {
    pub(crate) fn new(id: &str, display_cap: usize, raw_cap: usize) -> Self {
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot {
            session_id: id.to_string(),
            ..Default::default()
        }));
        Self {
            id: id.to_string(),
            log: EventLog::new(display_cap, raw_cap),
            turns: TurnTracker::new(),
            prompt: PromptDispatcher::new(),
            agent: None,
            metadata: None,
            snapshot,
        }
    }

    pub(crate) fn snapshot_arc(&self) -> Arc<ArcSwap<SessionSnapshot>> {
        self.snapshot.clone()
    }

    /// Publish the current derived state for lock-free readers.
    pub(crate) fn refresh_snapshot(&self) {
        self.snapshot.store(Arc::new(SessionSnapshot {
            session_id: self.id.clone(),
            entries: self.log.entries_snapshot(),
            working: self.turns.is_working(),
            agent: self.agent.clone(),
            metadata: self.metadata.clone(),
        }));
    }
}
