//! Turn state — a pure fold over the raw event feed.
//!
//! The tracker must see every event, including the ones the coalescer
//! filters, or telemetry-only bursts would desync idle/working.

use skiff_protocol::AgentEvent;

#[derive(Debug, Default)]
pub(crate) struct TurnTracker {
    working: bool,
}

impl TurnTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fold one event. Returns the new working flag when it changed.
    pub(crate) fn observe(&mut self, event: &AgentEvent) -> Option<bool> {
        let next = match event {
            AgentEvent::TurnStarted { .. } => true,
            e if e.ends_turn() => false,
            _ => return None,
        };
        if next == self.working {
            return None;
        }
        self.working = next;
        Some(next)
    }

    /// Optimistic local reset (stop requested, session ended). Returns true
    /// when the flag actually flipped.
    pub(crate) fn force_idle(&mut self) -> bool {
        if self.working {
            self.working = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_working(&self) -> bool {
        self.working
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(events: &[AgentEvent]) -> TurnTracker {
        let mut tracker = TurnTracker::new();
        for event in events {
            tracker.observe(event);
        }
        tracker
    }

    #[test]
    fn turn_started_alone_is_working() {
        let tracker = fold(&[AgentEvent::TurnStarted { turn_id: None }]);
        assert!(tracker.is_working());
    }

    #[test]
    fn final_assistant_message_ends_the_turn() {
        let tracker = fold(&[
            AgentEvent::TurnStarted { turn_id: None },
            AgentEvent::AssistantMessage {
                text: "working on it".to_string(),
                is_final: false,
            },
            AgentEvent::AssistantMessage {
                text: "done".to_string(),
                is_final: true,
            },
        ]);
        assert!(!tracker.is_working());
    }

    #[test]
    fn turn_failed_and_fatal_error_end_the_turn() {
        for terminal in [
            AgentEvent::TurnCompleted { turn_id: None },
            AgentEvent::TurnFailed {
                error: "boom".to_string(),
            },
            AgentEvent::FatalError {
                message: "gone".to_string(),
            },
        ] {
            let tracker = fold(&[AgentEvent::TurnStarted { turn_id: None }, terminal]);
            assert!(!tracker.is_working());
        }
    }

    #[test]
    fn telemetry_does_not_change_state() {
        let mut tracker = fold(&[AgentEvent::TurnStarted { turn_id: None }]);
        assert_eq!(
            tracker.observe(&AgentEvent::TokenUsage {
                usage: Default::default()
            }),
            None
        );
        assert_eq!(
            tracker.observe(&AgentEvent::Raw {
                payload: serde_json::json!({})
            }),
            None
        );
        assert!(tracker.is_working());
    }

    #[test]
    fn observe_reports_only_transitions() {
        let mut tracker = TurnTracker::new();
        assert_eq!(
            tracker.observe(&AgentEvent::TurnStarted { turn_id: None }),
            Some(true)
        );
        assert_eq!(
            tracker.observe(&AgentEvent::TurnStarted { turn_id: None }),
            None
        );
        assert_eq!(
            tracker.observe(&AgentEvent::TurnCompleted { turn_id: None }),
            Some(false)
        );
        assert_eq!(
            tracker.observe(&AgentEvent::TurnCompleted { turn_id: None }),
            None
        );
    }

    #[test]
    fn force_idle_flips_once() {
        let mut tracker = fold(&[AgentEvent::TurnStarted { turn_id: None }]);
        assert!(tracker.force_idle());
        assert!(!tracker.force_idle());
        assert!(!tracker.is_working());
    }
}
