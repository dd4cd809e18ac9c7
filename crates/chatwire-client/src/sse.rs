//! Incremental decoder for the reply event stream.
//!
//! The backend answers a sent message with `text/event-stream` frames:
//!
//! ```text
//! : keep-alive
//!
//! data: {"conversationId":"...","messageId":"...","deltaText":"Hi","fullText":"Hi","done":false}
//!
//! data: {"done":true}
//!
//! ```
//!
//! A frame ends when the buffered bytes end with a blank line. Only `data:`
//! lines carry payload; several of them in one frame are joined with `\n`
//! before JSON decoding.

use serde::Deserialize;

/// One decoded event from the reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of reply text.
    DeltaText(String),
    /// The server finished the reply.
    Done,
    /// A frame whose `data:` payload is not a JSON object of the expected shape.
    /// Carries the joined payload. Consumers drop these.
    Malformed(String),
}

/// The JSON payload of a `data:` frame.
///
/// Every field is optional and unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    /// Conversation the event belongs to. Not interpreted.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Assistant message being written. Not interpreted.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Text appended since the previous event.
    #[serde(default)]
    pub delta_text: Option<String>,
    /// Full text so far. Not interpreted.
    #[serde(default)]
    pub full_text: Option<String>,
    /// Set on the terminal event.
    #[serde(default)]
    pub done: Option<bool>,
}

impl StreamPayload {
    /// Events carried by this payload: the delta first, then `Done`.
    #[must_use]
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(delta) = self.delta_text {
            events.push(StreamEvent::DeltaText(delta));
        }
        if self.done == Some(true) {
            events.push(StreamEvent::Done);
        }
        events
    }
}

/// Splits a byte stream into frames and decodes each one.
///
/// Bytes are buffered raw, so a multi-byte character split across chunks is
/// decoded intact once its frame completes.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
}

impl FrameParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the events of every frame it completes,
    /// in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            self.buffer.push(byte);
            if self.buffer.ends_with(b"\n\n") {
                let frame = std::mem::take(&mut self.buffer);
                events.extend(parse_frame(&String::from_utf8_lossy(&frame)));
            }
        }
        events
    }

    /// Number of bytes waiting for a frame terminator.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard the unterminated tail, returning how many bytes were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

/// Decode one complete frame.
///
/// Frames without a `data:` line yield nothing. A payload that is not a JSON
/// object, or whose known fields have the wrong type, yields
/// [`StreamEvent::Malformed`].
#[must_use]
pub fn parse_frame(frame: &str) -> Vec<StreamEvent> {
    let data: Vec<&str> = frame
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(strip_one_space)
        .collect();

    if data.is_empty() {
        return Vec::new();
    }

    let payload = data.join("\n");
    match decode_payload(&payload) {
        Some(payload) => payload.into_events(),
        None => {
            tracing::debug!(payload = %payload, "Malformed stream frame");
            vec![StreamEvent::Malformed(payload)]
        }
    }
}

fn decode_payload(raw: &str) -> Option<StreamPayload> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Strip exactly one leading whitespace character.
fn strip_one_space(value: &str) -> &str {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Vec<StreamEvent> {
        FrameParser::new().push(input.as_bytes())
    }

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::DeltaText(text.to_string())
    }

    fn without_malformed(events: Vec<StreamEvent>) -> Vec<StreamEvent> {
        events
            .into_iter()
            .filter(|e| !matches!(e, StreamEvent::Malformed(_)))
            .collect()
    }

    #[test]
    fn single_delta_frame() {
        assert_eq!(parse_all("data: {\"deltaText\":\"Hi\"}\n\n"), vec![delta("Hi")]);
    }

    #[test]
    fn delta_precedes_done_in_same_frame() {
        assert_eq!(
            parse_all("data: {\"deltaText\":\"Hi\",\"done\":true}\n\n"),
            vec![delta("Hi"), StreamEvent::Done]
        );
    }

    #[test]
    fn malformed_frame_does_not_stop_the_stream() {
        let events = parse_all("data: not-json\n\ndata: {\"deltaText\":\"ok\"}\n\n");
        assert_eq!(
            events,
            vec![StreamEvent::Malformed("not-json".into()), delta("ok")]
        );
        assert_eq!(without_malformed(events), vec![delta("ok")]);
    }

    #[test]
    fn comments_and_blank_frames_are_skipped() {
        assert_eq!(
            parse_all(": keep-alive\n\ndata: {\"done\":true}\n\n"),
            vec![StreamEvent::Done]
        );
        assert!(parse_all("\n\n\n\n").is_empty());
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let input = "data: {\"deltaText\":\ndata: \"joined\"}\n\n";
        assert_eq!(parse_all(input), vec![delta("joined")]);
    }

    #[test]
    fn frame_without_data_yields_nothing() {
        assert!(parse_all("event: ping\nid: 4\n\n").is_empty());
    }

    #[test]
    fn done_false_and_missing_fields_yield_nothing() {
        assert!(parse_all("data: {\"done\":false}\n\n").is_empty());
        assert!(parse_all("data: {\"conversationId\":\"c1\",\"messageId\":\"m1\"}\n\n").is_empty());
    }

    #[test]
    fn reserved_fields_are_ignored() {
        let input = "data: {\"conversationId\":\"c1\",\"messageId\":\"m1\",\"deltaText\":\" there\",\"fullText\":\"Hi there\",\"done\":false,\"extra\":[1]}\n\n";
        assert_eq!(parse_all(input), vec![delta(" there")]);
    }

    #[test]
    fn non_object_or_mistyped_payload_is_malformed() {
        assert!(matches!(
            parse_all("data: [1,2]\n\n").as_slice(),
            [StreamEvent::Malformed(_)]
        ));
        assert!(matches!(
            parse_all("data: {\"deltaText\":42}\n\n").as_slice(),
            [StreamEvent::Malformed(_)]
        ));
    }

    #[test]
    fn data_prefix_without_space() {
        assert_eq!(
            parse_all("data:{\"deltaText\":\"  two\"}\n\n"),
            vec![delta("  two")]
        );
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut parser = FrameParser::new();
        assert!(parser.push(b"data: {\"delta").is_empty());
        assert!(parser.push(b"Text\":\"Hel\"}\n").is_empty());
        assert_eq!(parser.push(b"\ndata: {\"deltaText\":\"lo\"}\n\n"), vec![
            delta("Hel"),
            delta("lo")
        ]);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn each_frame_is_emitted_once() {
        let mut parser = FrameParser::new();
        let first = parser.push(b"data: {\"deltaText\":\"a\"}\n\n");
        let second = parser.push(b"data: {\"deltaText\":\"b\"}\n\n");
        assert_eq!(first, vec![delta("a")]);
        assert_eq!(second, vec![delta("b")]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let bytes = "data: {\"deltaText\":\"caffè\"}\n\n".as_bytes();
        // Split inside the two-byte 'è'.
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut parser = FrameParser::new();
        assert!(parser.push(&bytes[..split]).is_empty());
        assert_eq!(parser.push(&bytes[split..]), vec![delta("caffè")]);
    }

    #[test]
    fn unterminated_tail_is_dropped() {
        let mut parser = FrameParser::new();
        let events = parser.push(b"data: {\"deltaText\":\"a\"}\n\ndata: {\"deltaText\":\"lost\"}\n");
        assert_eq!(events, vec![delta("a")]);
        assert!(parser.buffered() > 0);
        assert_eq!(parser.finish(), "data: {\"deltaText\":\"lost\"}\n".len());
        assert_eq!(parser.buffered(), 0);
    }
}
