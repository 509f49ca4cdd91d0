//! Prompt dispatch — start a turn or append to a running one.
//!
//! The client cannot reliably know whether the backend is mid-turn when the
//! user submits (page reload, start still in flight). The dispatcher guesses
//! optimistically and repairs a wrong guess from the server's rejection. The
//! per-session state is a tagged variant so the one-shot-repair rule holds by
//! construction: repairing consumes the pending record, so a second rejection
//! finds nothing to re-issue.

use skiff_protocol::{ClientMessage, ImageInput};

/// Options accompanying a prompt. `working_dir` only matters when the
/// prompt opens a new session.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub working_dir: String,
    pub model: Option<String>,
    pub hidden: bool,
    pub images: Vec<ImageInput>,
}

impl PromptOptions {
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PromptPhase {
    Idle,
    /// A `start_session` is in flight; the server has not yet said which
    /// branch was right.
    PendingStart {
        prompt: String,
        hidden: bool,
        images: Vec<ImageInput>,
    },
    Running,
}

#[derive(Debug)]
pub(crate) struct PromptDispatcher {
    phase: PromptPhase,
}

impl PromptDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            phase: PromptPhase::Idle,
        }
    }

    /// Decide start-vs-append for a user prompt and return the control
    /// message to send. Records the pending prompt on the optimistic branch.
    pub(crate) fn dispatch(
        &mut self,
        session_id: &str,
        prompt: String,
        options: PromptOptions,
    ) -> ClientMessage {
        if self.phase == PromptPhase::Running {
            return ClientMessage::SendInput {
                session_id: session_id.to_string(),
                input: prompt,
                hidden: options.hidden,
                images: options.images,
            };
        }

        self.phase = PromptPhase::PendingStart {
            prompt: prompt.clone(),
            hidden: options.hidden,
            images: options.images.clone(),
        };
        ClientMessage::StartSession {
            session_id: session_id.to_string(),
            prompt,
            working_dir: options.working_dir,
            model: options.model,
            hidden: options.hidden,
            images: options.images,
        }
    }

    /// Server confirmed the start; the guess was right.
    pub(crate) fn confirm_started(&mut self) {
        self.phase = PromptPhase::Running;
    }

    /// Server said the session was already running. Returns the recorded
    /// prompt to re-issue as input — once. A repeat rejection returns None.
    pub(crate) fn repair(&mut self) -> Option<(String, bool, Vec<ImageInput>)> {
        match std::mem::replace(&mut self.phase, PromptPhase::Running) {
            PromptPhase::PendingStart {
                prompt,
                hidden,
                images,
            } => Some((prompt, hidden, images)),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// A turn-start lifecycle event was observed on the stream.
    pub(crate) fn on_turn_started(&mut self) {
        self.phase = PromptPhase::Running;
    }

    /// Terminal turn event: completion, failure, session end.
    pub(crate) fn on_turn_ended(&mut self) {
        self.phase = PromptPhase::Idle;
    }

    /// Optimistic local reset on a stop request; does not wait for the
    /// server's turn-ended confirmation.
    pub(crate) fn stop(&mut self) {
        self.phase = PromptPhase::Idle;
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.phase == PromptPhase::Running
    }
}

/// Signature match for the server rejection that proves the session was
/// already mid-turn.
pub(crate) fn is_already_running_error(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already running")
}
