//! Classification of agent JSON events.
//!
//! Neither agent emits a single discriminated schema: codex wraps most
//! records in `item.completed`/`item.streaming` envelopes while also using
//! flat top-level events, and gemini names the same things differently.
//! Classification therefore walks a fixed, per-agent list of shapes and
//! the first match wins. The session id is looked up on every event,
//! independent of its kind.

use serde_json::{Map, Value};

use crate::bridge::AgentKind;

/// One decoded line of agent output.
pub type RawEvent = Map<String, Value>;

/// Coarse category of a classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    SessionId,
    Reasoning,
    TextDelta,
    AgentMessage,
    CommandExecution,
    Unclassified,
}

/// What an event means to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Carries nothing but a session identifier.
    SessionId,
    /// A reasoning or thinking fragment.
    Reasoning { text: String },
    /// A reasoning summary, possibly split into several fragments.
    ReasoningSummary { fragments: Vec<String> },
    /// A streamed chunk of answer text.
    TextDelta { text: String },
    /// A complete agent message.
    AgentMessage { text: Option<String> },
    /// A finished shell command run by the agent.
    CommandExecution { command: String, output: String },
    /// Anything else, with its type tags for diagnostics.
    Unclassified {
        event_type: String,
        item_type: String,
    },
}

impl EventKind {
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::SessionId => Category::SessionId,
            Self::Reasoning { .. } | Self::ReasoningSummary { .. } => Category::Reasoning,
            Self::TextDelta { .. } => Category::TextDelta,
            Self::AgentMessage { .. } => Category::AgentMessage,
            Self::CommandExecution { .. } => Category::CommandExecution,
            Self::Unclassified { .. } => Category::Unclassified,
        }
    }

    /// Whether events of this kind belong in the run's message log.
    #[must_use]
    pub fn is_transcript(&self) -> bool {
        matches!(
            self.category(),
            Category::AgentMessage | Category::CommandExecution
        )
    }
}

/// A raw event together with its interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    /// Session identifier carried by the event, if any.
    pub session_id: Option<String>,
    pub kind: EventKind,
    /// The record kept in the message log: the nested `item` for wrapped
    /// codex events, otherwise the event itself.
    pub payload: Value,
}

impl ClassifiedEvent {
    #[must_use]
    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

/// Classify one event for the given agent.
#[must_use]
pub fn classify(event: &RawEvent, agent: AgentKind) -> ClassifiedEvent {
    let session_id = session_id(event, agent);
    let matched = match agent {
        AgentKind::Codex => classify_codex(event),
        AgentKind::Gemini => classify_gemini(event),
    };

    let (kind, payload) = matched.unwrap_or_else(|| {
        let kind = if session_id.is_some() {
            EventKind::SessionId
        } else {
            EventKind::Unclassified {
                event_type: str_field(event, "type").to_string(),
                item_type: item(event)
                    .map(|item| str_field(item, "type"))
                    .unwrap_or_default()
                    .to_string(),
            }
        };
        (kind, Value::Object(event.clone()))
    });

    ClassifiedEvent {
        session_id,
        kind,
        payload,
    }
}

/// First non-empty session identifier among the agent's candidate fields.
///
/// Numeric identifiers are accepted and rendered in decimal.
#[must_use]
pub fn session_id(event: &RawEvent, agent: AgentKind) -> Option<String> {
    let candidates: &[&str] = match agent {
        AgentKind::Codex => &["session_id", "thread_id"],
        AgentKind::Gemini => &["sessionId", "session_id"],
    };
    first_id(event, candidates).or_else(|| {
        (agent == AgentKind::Codex && str_field(event, "type") == "session.start")
            .then(|| first_id(event, &["id"]))
            .flatten()
    })
}

fn first_id(map: &RawEvent, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

fn classify_codex(event: &RawEvent) -> Option<(EventKind, Value)> {
    let event_type = str_field(event, "type");
    let inner = item(event);
    let item_type = inner.map_or("", |inner| str_field(inner, "type"));
    let whole = || Value::Object(event.clone());

    match (event_type, item_type) {
        ("reasoning" | "thinking" | "reasoning.delta", _) => {
            let text = first_text(event, &["text", "content", "delta"]).unwrap_or_default();
            Some((reasoning(text), whole()))
        }
        ("item.completed" | "item.streaming", "reasoning" | "thinking") => {
            let item = inner?;
            let text = first_text(item, &["text", "content"]).unwrap_or_default();
            Some((reasoning(text), Value::Object(item.clone())))
        }
        ("item.completed", "reasoning_summary") => {
            let item = inner?;
            let summary = item.get("summary").or_else(|| item.get("text"));
            let kind = EventKind::ReasoningSummary {
                fragments: summary.map(summary_fragments).unwrap_or_default(),
            };
            Some((kind, Value::Object(item.clone())))
        }
        ("content.delta" | "response.output_text.delta", _) => {
            let text = first_text(event, &["delta", "text"]).unwrap_or_default();
            Some((
                EventKind::TextDelta {
                    text: text.to_string(),
                },
                whole(),
            ))
        }
        ("item.completed", "agent_message") => {
            let item = inner?;
            Some((message(item), Value::Object(item.clone())))
        }
        ("item.completed", "command_execution") => {
            let item = inner?;
            let kind = EventKind::CommandExecution {
                command: str_field(item, "command").to_string(),
                output: str_field(item, "aggregated_output").to_string(),
            };
            Some((kind, Value::Object(item.clone())))
        }
        ("agent_message", _) => Some((message(event), whole())),
        ("message", _) if str_field(event, "role") == "assistant" => {
            Some((message(event), whole()))
        }
        _ => None,
    }
}

fn classify_gemini(event: &RawEvent) -> Option<(EventKind, Value)> {
    let whole = || Value::Object(event.clone());
    match str_field(event, "type") {
        "thought" | "thinking" => {
            let text = first_text(event, &["text", "content", "subject"]).unwrap_or_default();
            Some((reasoning(text), whole()))
        }
        // A user-role message is the prompt echoed back, not agent output.
        "message" if str_field(event, "role") == "user" => None,
        "modelTurn" | "agent_message" | "message" => {
            let mut text = String::new();
            if let Some(parts) = event.get("parts").and_then(Value::as_array) {
                for part in parts {
                    if let Some(part_text) = part.get("text").and_then(Value::as_str) {
                        text.push_str(part_text);
                    }
                }
            }
            if let Some(content) = event.get("content").and_then(Value::as_str) {
                text.push_str(content);
            }
            let text = Some(text).filter(|t| !t.is_empty());
            Some((EventKind::AgentMessage { text }, whole()))
        }
        "textDelta" => Some((
            EventKind::TextDelta {
                text: str_field(event, "text").to_string(),
            },
            whole(),
        )),
        _ => None,
    }
}

fn reasoning(text: &str) -> EventKind {
    EventKind::Reasoning {
        text: text.to_string(),
    }
}

fn message(record: &RawEvent) -> EventKind {
    EventKind::AgentMessage {
        text: first_text(record, &["text", "content"]).map(str::to_string),
    }
}

/// Split a summary into fragments. A summary is either one string or a
/// list whose entries are strings or `{"text": ...}` objects.
fn summary_fragments(summary: &Value) -> Vec<String> {
    match summary {
        Value::String(text) if text.is_empty() => Vec::new(),
        Value::String(text) => vec![text.clone()],
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::String(text) => text.clone(),
                Value::Object(map) => map
                    .get("text")
                    .and_then(Value::as_str)
                    .map_or_else(|| entry.to_string(), str::to_string),
                other => other.to_string(),
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn item(event: &RawEvent) -> Option<&RawEvent> {
    event.get("item").and_then(Value::as_object)
}

fn str_field<'a>(map: &'a RawEvent, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn first_text<'a>(map: &'a RawEvent, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
}
