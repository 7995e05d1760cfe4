//! Incremental server-sent-events decoder
//!
//! SSE lines can be split across TCP chunks, so the decoder carries a
//! remainder buffer forward. Only complete lines (terminated by `\n`) are
//! parsed; anything left over is prepended to the next chunk. A blank line
//! dispatches the accumulated frame.

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` field; empty when the server sent none
    pub event: String,
    /// Concatenated `data:` lines, newline-joined per the SSE spec
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: String,
    event: String,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);

            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    frames.push(frame);
                }
                continue;
            }
            // Comment lines keep long-lived streams alive; skip them
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_str(), ""),
            };
            match field {
                "event" => self.event = value.to_string(),
                "data" => self.data.push(value.to_string()),
                // `id` and `retry` are legal fields we have no use for
                _ => {}
            }
        }
        frames
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.event.is_empty() && self.data.is_empty() {
            return None;
        }
        let frame = SseFrame {
            event: std::mem::take(&mut self.event),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: tasks\ndata: {\"action\":\"update\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tasks");
        assert_eq!(frames[0].data, "{\"action\":\"update\"}");
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ta").is_empty());
        assert!(decoder.feed(b"sks\ndata: {\"a\"").is_empty());
        let frames = decoder.feed(b":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tasks");
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let frames =
            decoder.feed(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "a");
        assert_eq!(frames[1].event, "b");
    }

    #[test]
    fn test_multiline_data_joined_with_newline() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
        assert_eq!(frames[0].event, "");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let frames =
            decoder.feed(b": keepalive\nid: 42\nretry: 1000\nevent: tasks\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tasks");
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: tasks\r\ndata: x\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tasks");
    }

    #[test]
    fn test_blank_lines_without_fields_emit_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\n\n").is_empty());
    }
}
