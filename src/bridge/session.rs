//! Per-run session state and the aggregator that builds it.

use std::io::Write;

use serde_json::Value;

use crate::bridge::{AgentKind, ClassifiedEvent, EventKind};

/// Counters for what the run saw, including what it threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events: usize,
    pub malformed_lines: usize,
    pub unclassified: usize,
}

/// Accumulated state of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    session_id: Option<String>,
    messages: Vec<Value>,
    stats: RunStats,
}

impl RunState {
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    #[must_use]
    pub fn into_parts(self) -> (Option<String>, Vec<Value>) {
        (self.session_id, self.messages)
    }
}

/// Folds classified events into a `RunState`, optionally echoing text to a
/// sink as it arrives.
#[derive(Debug)]
pub struct Aggregator<W: Write> {
    agent: AgentKind,
    state: RunState,
    sink: W,
    stream: bool,
    verbose: bool,
    at_line_start: bool,
}

impl<W: Write> Aggregator<W> {
    #[must_use]
    pub fn new(agent: AgentKind, sink: W, stream: bool, verbose: bool) -> Self {
        Self {
            agent,
            state: RunState::default(),
            sink,
            stream,
            verbose,
            at_line_start: true,
        }
    }

    /// Count a line that could not be decoded.
    pub fn record_malformed(&mut self, line: &str, reason: &str) {
        self.state.stats.malformed_lines = self.state.stats.malformed_lines.saturating_add(1);
        if self.verbose {
            tracing::debug!(%reason, "[{}] Non-JSON line: {line}", self.agent.tag());
        }
    }

    /// Apply one event.
    pub fn apply(&mut self, event: ClassifiedEvent) {
        self.state.stats.events = self.state.stats.events.saturating_add(1);

        if let Some(id) = event.session_id {
            if self.state.session_id.as_deref() != Some(id.as_str()) {
                tracing::debug!(session_id = %id, "Session id observed");
            }
            self.state.session_id = Some(id);
        }

        match &event.kind {
            EventKind::SessionId => {}
            EventKind::Reasoning { text } | EventKind::TextDelta { text } => {
                self.emit(text);
            }
            EventKind::ReasoningSummary { fragments } => {
                let unit: String = fragments
                    .iter()
                    .map(|fragment| format!("[reasoning] {fragment}\n"))
                    .collect();
                self.emit_unit(&unit);
            }
            EventKind::AgentMessage { text } => {
                if let Some(text) = text {
                    self.emit_unit(&format!("{text}\n"));
                }
            }
            EventKind::CommandExecution { command, output } => {
                if !output.is_empty() {
                    self.emit_unit(&format!("[cmd] {command}\n{output}"));
                }
            }
            EventKind::Unclassified {
                event_type,
                item_type,
            } => {
                self.state.stats.unclassified = self.state.stats.unclassified.saturating_add(1);
                if self.verbose {
                    tracing::debug!(
                        "[{}] event: {event_type} item_type: {item_type}",
                        self.agent.tag()
                    );
                }
            }
        }

        if event.kind.is_transcript() {
            self.state.messages.push(event.payload);
        }
    }

    /// Finish the run, closing any partial line on the sink.
    pub fn finish(mut self) -> RunState {
        if !self.at_line_start {
            self.emit("\n");
        }
        let stats = self.state.stats;
        tracing::debug!(
            events = stats.events,
            malformed = stats.malformed_lines,
            unclassified = stats.unclassified,
            messages = self.state.messages.len(),
            "Stream finished"
        );
        self.state
    }

    /// Write a complete unit, starting it on a fresh line.
    fn emit_unit(&mut self, text: &str) {
        if !self.at_line_start && !text.is_empty() {
            self.emit("\n");
        }
        self.emit(text);
    }

    fn emit(&mut self, text: &str) {
        if !self.stream || text.is_empty() {
            return;
        }
        let written = self
            .sink
            .write_all(text.as_bytes())
            .and_then(|()| self.sink.flush());
        match written {
            Ok(()) => self.at_line_start = text.ends_with('\n'),
            Err(e) => {
                tracing::warn!(error = %e, "Output sink failed, streaming disabled");
                self.stream = false;
            }
        }
    }
}
