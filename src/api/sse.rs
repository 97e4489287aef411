use futures_util::{Stream, StreamExt};

use crate::core::StudioError;

/// Incremental parser for `text/event-stream` bodies.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only complete
/// lines are decoded. Yields the payload of each `data:` line.
#[derive(Debug, Default)]
pub struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if let Some(data) = line.strip_prefix("data:") {
                events.push(data.trim_start().to_string());
            }
        }
        events
    }

    /// Whatever is left once the body ends without a trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        line.trim_end()
            .strip_prefix("data:")
            .map(|data| data.trim_start().to_string())
    }
}

/// Payloads of every `data:` line of a streamed HTTP body
pub fn data_events<S, B>(body: S) -> impl Stream<Item = Result<String, StudioError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut lines = SseLines::default();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for data in lines.push(chunk.as_ref()) {
                yield data;
            }
        }
        if let Some(data) = lines.finish() {
            yield data;
        }
    }
}
