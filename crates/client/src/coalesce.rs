//! Event coalescing — raw feed in, bounded render-ready log out.
//!
//! Merge decisions look only at the immediately preceding display entry,
//! never further back, so the cost per event is O(1). Telemetry events
//! (token usage, context compaction, unknown raw payloads) never reach the
//! display log; they land on a smaller diagnostic tap instead.

use std::collections::VecDeque;

use skiff_protocol::AgentEvent;

/// One render-ready entry in a session's coalesced log.
///
/// `seq` is stable for the lifetime of the entry: a merged fragment updates
/// the entry in place and keeps its `seq`, so observers can tell "updated"
/// from "appended".
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEntry {
    pub seq: u64,
    pub event: AgentEvent,
}

/// Per-session coalesced log plus raw diagnostic tap. A sliding window, not
/// history; durable history belongs to the REST collaborator.
pub(crate) struct EventLog {
    display_cap: usize,
    raw_cap: usize,
    next_seq: u64,
    entries: VecDeque<DisplayEntry>,
    raw: VecDeque<AgentEvent>,
}

impl EventLog {
    pub(crate) fn new(display_cap: usize, raw_cap: usize) -> Self {
        Self {
            display_cap,
            raw_cap,
            next_seq: 0,
            entries: VecDeque::new(),
            raw: VecDeque::new(),
        }
    }

    /// Ingest the next raw event. Returns the affected display entry —
    /// freshly appended or merged-into — or `None` for telemetry.
    pub(crate) fn push(&mut self, event: AgentEvent) -> Option<DisplayEntry> {
        if is_telemetry(&event) {
            self.raw.push_back(event);
            while self.raw.len() > self.raw_cap {
                self.raw.pop_front();
            }
            return None;
        }

        if let Some(last) = self.entries.back_mut() {
            if merge(&mut last.event, &event) {
                return Some(last.clone());
            }
        }

        let entry = DisplayEntry {
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.display_cap {
            self.entries.pop_front();
        }
        Some(entry)
    }

    pub(crate) fn entries_snapshot(&self) -> Vec<DisplayEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn raw_snapshot(&self) -> Vec<AgentEvent> {
        self.raw.iter().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Events that are never rendered.
fn is_telemetry(event: &AgentEvent) -> bool {
    matches!(
        event,
        AgentEvent::TokenUsage { .. }
            | AgentEvent::ContextCompaction { .. }
            | AgentEvent::Raw { .. }
    )
}

/// Try to fold `next` into the preceding entry. Returns true on merge.
fn merge(prev: &mut AgentEvent, next: &AgentEvent) -> bool {
    match (prev, next) {
        // Streamed command output: both sides streaming, same command.
        (
            AgentEvent::CommandOutput {
                command: prev_command,
                output: prev_output,
                is_streaming: prev_streaming,
            },
            AgentEvent::CommandOutput {
                command,
                output,
                is_streaming: true,
            },
        ) if *prev_streaming && prev_command.as_str() == command.as_str() => {
            prev_output.push_str(output);
            true
        }

        // Assistant text: merge into a not-yet-final fragment. A final
        // fragment that already contains the accumulated text as a prefix
        // wins outright — some backends send the full message instead of a
        // true delta (backend-contract drift, kept as a heuristic).
        (
            AgentEvent::AssistantMessage {
                text: prev_text,
                is_final: prev_final,
            },
            AgentEvent::AssistantMessage { text, is_final },
        ) if !*prev_final => {
            if *is_final && text.starts_with(prev_text.as_str()) {
                *prev_text = text.clone();
            } else {
                prev_text.push_str(text);
            }
            *prev_final = *is_final;
            true
        }

        // Reasoning text: plain concatenation, no containment check.
        (AgentEvent::Reasoning { text: prev_text }, AgentEvent::Reasoning { text }) => {
            prev_text.push_str(text);
            true
        }

        _ => false,
    }
}
