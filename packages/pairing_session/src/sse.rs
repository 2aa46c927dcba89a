//! Incremental decoder for the `text/event-stream` wire format.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the server did not name it.
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream, if any.
    pub id: Option<String>,
}

/// Feeds arbitrary byte chunks, yields complete events.
///
/// Accepts `\n`, `\r\n` and lone `\r` line endings, including a `\r\n` pair
/// split across two chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    skip_lf: bool,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.skip_lf) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.skip_lf = true;
                    self.end_line(&mut events);
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }
        // comment / keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: payload\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "payload".into(),
                data: "{\"a\":1}".into(),
                id: None,
            }]
        );
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data:hello\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn multiline_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: pay").is_empty());
        assert!(decoder.feed(b"load\r").is_empty());
        assert!(decoder.feed(b"\ndata: x\r\n").is_empty());
        let events = decoder.feed(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "payload");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn lone_carriage_returns() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: payload\rdata: x\r\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "payload");
    }

    #[test]
    fn comments_and_keep_alives_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b":keep-alive\n\n: another\n\nevent: payload\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: payload\n\n").is_empty());
        // the name does not leak into the next event
        let events = decoder.feed(b"data: x\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn several_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: data\ndata: 1\n\nevent: payload\ndata: 2\n\n");
        let names: Vec<_> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["data", "payload"]);
    }

    #[test]
    fn id_persists_and_retry_is_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\nretry: 1000\ndata: a\n\ndata: b\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn field_without_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn only_one_leading_space_is_stripped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data:  padded\n\n");
        assert_eq!(events[0].data, " padded");
    }
}
