//! Server-sent event decoding for streamed chat completions
//!
//! The endpoint answers a streaming request with newline-delimited records:
//! blank keep-alive lines, `:`-prefixed comments, and `data: <json>` frames,
//! finished by `data: [DONE]`. Network chunks do not line up with any of
//! those boundaries, so [`FrameDecoder`] buffers bytes until a full line is
//! available and only then looks at it.

use async_stream::stream;
use futures::StreamExt;
use serde::Deserialize;
use std::pin::Pin;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Prefix that marks a data record
pub const DATA_PREFIX: &str = "data: ";

/// Payload that terminates the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events produced while decoding a completion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental assistant text
    Fragment(String),
    /// No further fragments will arrive
    Done,
}

impl StreamEvent {
    /// Check if this is the terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }

    /// Get the text if this is a fragment
    pub fn as_fragment(&self) -> Option<&str> {
        match self {
            StreamEvent::Fragment(text) => Some(text),
            StreamEvent::Done => None,
        }
    }
}

/// A stream of decoded completion events
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Incremental line decoder for one completion stream.
///
/// Splits on `\n` at the byte level. A newline byte never occurs inside a
/// multi-byte UTF-8 sequence, so a character torn across two chunks is whole
/// again by the time its line is decoded.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel (or end of input) has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes received but not yet terminated by a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk and collect the events from every line it completes.
    ///
    /// Once the sentinel is seen the remaining input is dropped and later
    /// calls return nothing.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        events
    }

    /// Flush at end of input.
    ///
    /// A trailing line without a newline is decoded, then `Done` is emitted
    /// unless the sentinel already was.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        if let Some(event) = self.decode_line(&rest) {
            events.push(event);
        }
        if !self.finished {
            self.finished = true;
            events.push(StreamEvent::Done);
        }
        events
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<StreamEvent> {
        let text = String::from_utf8_lossy(line);
        let payload = text.trim().strip_prefix(DATA_PREFIX)?;

        if payload == DONE_SENTINEL {
            self.finished = true;
            return Some(StreamEvent::Done);
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty())
                .map(StreamEvent::Fragment),
            Err(e) => {
                tracing::warn!("Failed to parse streaming chunk: {}", e);
                None
            }
        }
    }
}

/// Decode a raw body stream into completion events.
///
/// The stream ends after the first `Done`, after the first transport error,
/// or with `Error::Aborted` once `cancel` fires. Input after the sentinel is
/// never read.
pub fn decode_stream<S, B, E>(bytes: S, cancel: CancellationToken) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    Box::pin(stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = FrameDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = bytes.next() => Some(next),
            };

            let next = match next {
                Some(next) => next,
                None => {
                    yield Err(Error::Aborted);
                    return;
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.push(chunk.as_ref()) {
                        yield Ok(event);
                    }
                    if decoder.is_finished() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => {
                    for event in decoder.finish() {
                        yield Ok(event);
                    }
                    return;
                }
            }
        }
    })
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    fn fragments(events: &[StreamEvent]) -> Vec<&str> {
        events.iter().filter_map(|e| e.as_fragment()).collect()
    }

    #[test]
    fn test_single_chunk_with_done() {
        let mut decoder = FrameDecoder::new();
        let input = format!("{}{}data: [DONE]\n", frame("Hel"), frame("lo!"));
        let events = decoder.push(input.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment("Hel".into()),
                StreamEvent::Fragment("lo!".into()),
                StreamEvent::Done,
            ]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let input = frame("split me");
        let (a, b) = input.as_bytes().split_at(17);

        assert!(decoder.push(a).is_empty());
        assert_eq!(decoder.pending(), 17);
        assert_eq!(fragments(&decoder.push(b)), vec!["split me"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let input = frame("héllo ✓");
        let bytes = input.as_bytes();
        // Cut inside the three-byte check mark
        let cut = input.find('✓').unwrap() + 1;

        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(fragments(&decoder.push(&bytes[cut..])), vec!["héllo ✓"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        let input = format!("{}{}data: [DONE]\n", frame("a"), frame("b"));
        let mut events = Vec::new();
        for byte in input.as_bytes() {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(fragments(&events), vec!["a", "b"]);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn test_skips_comments_blank_lines_and_other_fields() {
        let mut decoder = FrameDecoder::new();
        let input = format!(
            ": OPENROUTER PROCESSING\n\n   \nevent: ping\n{}\r\n",
            frame("x").trim_end()
        );
        assert_eq!(fragments(&decoder.push(input.as_bytes())), vec!["x"]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut decoder = FrameDecoder::new();
        let input = format!("data: {{not json\n{}", frame("ok"));
        assert_eq!(fragments(&decoder.push(input.as_bytes())), vec!["ok"]);
    }

    #[test]
    fn test_empty_and_missing_content_is_not_emitted() {
        let mut decoder = FrameDecoder::new();
        let input = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            "data: {\"choices\":[]}\n",
            "data: {\"id\":\"gen-1\"}\n",
        );
        assert!(decoder.push(input.as_bytes()).is_empty());
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let mut decoder = FrameDecoder::new();
        let input = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"first\"}},",
            "{\"delta\":{\"content\":\"second\"}}]}\n",
        );
        assert_eq!(fragments(&decoder.push(input.as_bytes())), vec!["first"]);
    }

    #[test]
    fn test_input_after_done_is_ignored() {
        let mut decoder = FrameDecoder::new();
        let input = format!("{}data: [DONE]\n{}", frame("kept"), frame("dropped"));
        let events = decoder.push(input.as_bytes());
        assert_eq!(fragments(&events), vec!["kept"]);
        assert!(decoder.push(frame("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_without_done_completes_normally() {
        let mut decoder = FrameDecoder::new();
        decoder.push(frame("a").as_bytes());
        assert_eq!(decoder.finish(), vec![StreamEvent::Done]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_finish_decodes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        let input = frame("tail");
        decoder.push(input.trim_end().as_bytes());
        assert_eq!(
            decoder.finish(),
            vec![StreamEvent::Fragment("tail".into()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_concatenates_in_order() {
        let chunks = vec![
            Ok::<_, Error>(b"data: {\"choices\":[{\"delta\":{\"content\":\"He".to_vec()),
            Ok(b"l\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo!\"}}]}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
        ];
        let mut events = decode_stream(futures::stream::iter(chunks), CancellationToken::new());

        let mut text = String::new();
        let mut saw_done = false;
        while let Some(event) = events.next().await {
            match event.unwrap() {
                StreamEvent::Fragment(f) => text.push_str(&f),
                StreamEvent::Done => saw_done = true,
            }
        }
        assert_eq!(text, "Hello!");
        assert!(saw_done);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_done() {
        let chunks = vec![
            Ok::<_, Error>(format!("{}data: [DONE]\n", frame("a")).into_bytes()),
            Ok(frame("never").into_bytes()),
        ];
        let events: Vec<_> = decode_stream(futures::stream::iter(chunks), CancellationToken::new())
            .collect()
            .await;
        let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![StreamEvent::Fragment("a".into()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_surfaces_transport_error() {
        let chunks = vec![
            Ok(frame("partial").into_bytes()),
            Err(Error::NoResponseBody),
        ];
        let events: Vec<_> = decode_stream(futures::stream::iter(chunks), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(StreamEvent::Fragment(_))));
        assert!(matches!(events[1], Err(Error::NoResponseBody)));
    }

    #[tokio::test]
    async fn test_decode_stream_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let chunks = vec![Ok::<_, Error>(frame("a").into_bytes())];
        let events: Vec<_> = decode_stream(futures::stream::iter(chunks), cancel)
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn test_decode_stream_cancel_while_pending() {
        let cancel = CancellationToken::new();
        let body = futures::stream::iter(vec![Ok::<_, Error>(frame("first").into_bytes())])
            .chain(futures::stream::pending());
        let mut events = decode_stream(body, cancel.clone());

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            StreamEvent::Fragment("first".into())
        );
        cancel.cancel();
        assert!(matches!(events.next().await, Some(Err(Error::Aborted))));
        assert!(events.next().await.is_none());
    }
}
