use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use ragcrust_common::{Error, Result};

/// Turns one `data:` payload into zero or more stream items.
pub(crate) type DecodeFn<T> = fn(&str) -> Vec<Result<T>>;

/// Splits a server-sent-event byte stream into `data:` payloads and decodes
/// each with `decode`. `[DONE]` sentinels are skipped.
pub(crate) struct SseParser<T> {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    queue: VecDeque<Result<T>>,
    decode: DecodeFn<T>,
    finished: bool,
}

impl<T> SseParser<T> {
    pub(crate) fn new(
        stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
        decode: DecodeFn<T>,
    ) -> Self {
        Self {
            stream: Box::pin(stream),
            buffer: Vec::new(),
            queue: VecDeque::new(),
            decode,
            finished: false,
        }
    }

    fn drain_events(&mut self) {
        while let Some((pos, delimiter_len)) = find_event_boundary(&self.buffer) {
            let event = self.buffer.drain(..pos).collect::<Vec<u8>>();
            self.buffer.drain(..delimiter_len);
            self.decode_event(&event);
        }
    }

    fn decode_event(&mut self, event: &[u8]) {
        // Invalid UTF-8 frames are dropped.
        let Ok(text) = std::str::from_utf8(event) else {
            return;
        };
        for line in text.lines() {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                continue;
            }
            self.queue.extend((self.decode)(data));
        }
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

impl<T: Unpin> Stream for SseParser<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Poll::Ready(Some(item));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.drain_events();
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(Error::Provider(format!("stream error: {e}")))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    // Trailing event without a blank line terminator.
                    let rest = std::mem::take(&mut self.buffer);
                    if !rest.is_empty() {
                        self.decode_event(&rest);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn decode_upper(data: &str) -> Vec<Result<String>> {
        vec![Ok(data.to_uppercase())]
    }

    fn parser(chunks: Vec<&'static str>) -> SseParser<String> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c.as_bytes()))),
        );
        SseParser::new(stream, decode_upper)
    }

    #[tokio::test]
    async fn events_split_across_chunks_are_reassembled() {
        let items: Vec<_> = parser(vec!["data: he", "llo\n\ndata: wor", "ld\n\n"])
            .collect()
            .await;
        let texts: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(texts, vec!["HELLO", "WORLD"]);
    }

    #[tokio::test]
    async fn done_sentinel_and_other_fields_are_skipped() {
        let items: Vec<_> = parser(vec![
            "event: message\r\ndata: one\r\n\r\n",
            ": keep-alive\n\ndata: [DONE]\n\n",
        ])
        .collect()
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "ONE");
    }

    #[tokio::test]
    async fn trailing_event_without_terminator_is_decoded() {
        let items: Vec<_> = parser(vec!["data: tail"]).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "TAIL");
    }
}
