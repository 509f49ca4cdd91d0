//! Terminal rendering for the coalesced event stream.
//!
//! Display entries update in place (same `seq`) as streaming text grows; the
//! renderer prints only the unseen suffix so a merged entry never repeats
//! what is already on screen. Merges only ever extend the text, so the byte
//! offset of the printed prefix stays valid.

use std::io::Write;

use console::style;
use serde_json::json;

use skiff_client::{DisplayEntry, SessionEvent};
use skiff_protocol::AgentEvent;

pub struct Renderer {
    json: bool,
    /// Entry currently streaming to the terminal: (seq, bytes printed).
    streaming: Option<(u64, usize)>,
}

impl Renderer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            streaming: None,
        }
    }

    pub fn render(&mut self, event: &SessionEvent) {
        if self.json {
            self.render_json(event);
            return;
        }
        match event {
            SessionEvent::Entry(entry) => self.render_entry(entry),
            SessionEvent::Working(true) => {
                self.finish();
                println!("{}", style("● working").yellow());
            }
            SessionEvent::Working(false) => {
                self.finish();
                println!("{}", style("○ idle").dim());
            }
            SessionEvent::Started(info) => {
                self.finish();
                println!(
                    "{}",
                    style(format!(
                        "session started ({} / {})",
                        info.agent_type, info.agent_session_id
                    ))
                    .dim()
                );
            }
            SessionEvent::Metadata(meta) => {
                self.finish();
                if !meta.title.is_empty() {
                    println!("{}", style(format!("» {}", meta.title)).dim());
                }
            }
            SessionEvent::Ended { reason, error } => {
                self.finish();
                match error {
                    Some(error) => println!(
                        "{}",
                        style(format!("session ended ({reason}): {error}")).red()
                    ),
                    None => println!("{}", style(format!("session ended ({reason})")).dim()),
                }
            }
            SessionEvent::SessionError { message } => {
                self.finish();
                println!("{}", style(format!("error: {message}")).red());
            }
        }
    }

    fn render_json(&mut self, event: &SessionEvent) {
        let value = match event {
            SessionEvent::Entry(entry) => json!({
                "type": "entry",
                "seq": entry.seq,
                "event": entry.event,
            }),
            SessionEvent::Working(working) => json!({ "type": "working", "working": working }),
            SessionEvent::Started(info) => json!({
                "type": "started",
                "agent_type": info.agent_type,
                "agent_session_id": info.agent_session_id,
            }),
            SessionEvent::Metadata(meta) => json!({
                "type": "metadata",
                "title": meta.title,
                "workspace_id": meta.workspace_id,
                "workspace_branch": meta.workspace_branch,
            }),
            SessionEvent::Ended { reason, error } => json!({
                "type": "ended",
                "reason": reason,
                "error": error,
            }),
            SessionEvent::SessionError { message } => {
                json!({ "type": "error", "message": message })
            }
        };
        println!("{value}");
    }

    fn render_entry(&mut self, entry: &DisplayEntry) {
        match &entry.event {
            AgentEvent::AssistantMessage { text, .. } => {
                self.stream(entry.seq, text, None, |chunk| chunk.to_string());
            }
            AgentEvent::Reasoning { text } => {
                self.stream(entry.seq, text, None, |chunk| {
                    style(chunk).dim().italic().to_string()
                });
            }
            AgentEvent::CommandOutput {
                command, output, ..
            } => {
                let header = format!("{}", style(format!("$ {command}")).cyan());
                self.stream(entry.seq, output, Some(&header), |chunk| {
                    style(chunk).dim().to_string()
                });
            }
            AgentEvent::ToolStarted { tool_name, .. } => {
                self.line(format!("{}", style(format!("→ {tool_name}")).cyan()));
            }
            AgentEvent::ToolCompleted {
                tool_id, is_error, ..
            } => {
                let mark = if *is_error {
                    style(format!("✗ {tool_id}")).red()
                } else {
                    style(format!("✓ {tool_id}")).green()
                };
                self.line(format!("{mark}"));
            }
            AgentEvent::ControlRequest {
                kind,
                command,
                prompt,
                ..
            } => {
                let detail = prompt
                    .as_deref()
                    .or(command.as_deref())
                    .unwrap_or_default();
                self.line(format!(
                    "{}",
                    style(format!("? {kind}: {detail}")).yellow()
                ));
            }
            AgentEvent::TurnStarted { .. } | AgentEvent::TurnCompleted { .. } => {}
            AgentEvent::TurnFailed { error } => {
                self.line(format!("{}", style(format!("turn failed: {error}")).red()));
            }
            AgentEvent::FatalError { message } => {
                self.line(format!("{}", style(format!("fatal: {message}")).red()));
            }
            // Telemetry never reaches the display log.
            _ => {}
        }
    }

    /// Print a streaming entry's unseen suffix, opening a new block (with an
    /// optional header line) when the seq changes.
    fn stream(
        &mut self,
        seq: u64,
        body: &str,
        header: Option<&str>,
        paint: impl Fn(&str) -> String,
    ) {
        let printed = match self.streaming {
            Some((last, printed)) if last == seq => printed,
            _ => {
                self.finish();
                if let Some(header) = header {
                    println!("{header}");
                }
                0
            }
        };
        if body.len() > printed {
            print!("{}", paint(&body[printed..]));
            let _ = std::io::stdout().flush();
        }
        self.streaming = Some((seq, body.len()));
    }

    fn line(&mut self, text: String) {
        self.finish();
        println!("{text}");
    }

    /// Close an open streaming line, if any.
    pub fn finish(&mut self) {
        if self.streaming.take().is_some() {
            println!();
        }
    }
}
