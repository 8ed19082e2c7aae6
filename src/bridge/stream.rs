//! Line decoder for agent stdout.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::bridge::RawEvent;

/// Outcome of decoding one non-blank line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The line held one JSON object.
    Event(RawEvent),
    /// The line was not a JSON object. It is dropped by the caller.
    Malformed { line: String, reason: String },
}

/// Decode a single line of agent output.
///
/// Returns `None` for blank lines.
#[must_use]
pub fn decode_line(line: &str) -> Option<Decoded> {
    if line.trim().is_empty() {
        return None;
    }
    let decoded = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => Decoded::Event(map),
        Ok(other) => Decoded::Malformed {
            line: line.to_string(),
            reason: format!("expected a JSON object, found {}", kind_name(&other)),
        },
        Err(e) => Decoded::Malformed {
            line: line.to_string(),
            reason: e.to_string(),
        },
    };
    Some(decoded)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strip one trailing `\n` or `\r\n`.
fn strip_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Read decoded lines from agent stdout as they arrive.
///
/// Blank lines are skipped. Invalid UTF-8 is replaced rather than failing
/// the stream, so one bad byte costs at most one line.
pub fn read_lines<R>(reader: R) -> impl futures_core::Stream<Item = std::io::Result<Decoded>>
where
    R: AsyncRead + Unpin,
{
    let reader = BufReader::new(reader);
    futures_util::stream::unfold(
        (reader, Vec::new()),
        |(mut reader, mut buf)| async move {
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => return None,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(strip_terminator(&buf)).into_owned();
                        if let Some(decoded) = decode_line(&line) {
                            return Some((Ok(decoded), (reader, buf)));
                        }
                    }
                    Err(e) => return Some((Err(e), (reader, buf))),
                }
            }
        },
    )
}
