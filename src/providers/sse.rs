use serde::Deserialize;

use crate::error::StreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ServiceErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    message: String,
}

/// Incremental decoder for `text/event-stream` chat-completion bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes and drain every event completed by them.
    ///
    /// Decoding stops at the first failing frame; events decoded before it
    /// are returned ahead of the error.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<SseEvent, StreamError>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match decode_line(&line) {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => {}
                Err(err) => {
                    self.buffer.clear();
                    events.push(Err(err));
                    break;
                }
            }
        }

        events
    }

    /// Decode whatever is left once the body closes without a final newline.
    pub fn finish(&mut self) -> Result<Option<SseEvent>, StreamError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn malformed(payload: impl Into<String>, reason: impl Into<String>) -> StreamError {
    StreamError::MalformedChunk {
        payload: payload.into(),
        reason: reason.into(),
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<SseEvent>, StreamError> {
    let line = std::str::from_utf8(raw).map_err(|err| {
        malformed(
            String::from_utf8_lossy(raw).into_owned(),
            format!("invalid UTF-8: {err}"),
        )
    })?;
    let line = line.trim_end_matches(['\r', '\n']);

    // Blank separators, keep-alive comments and non-data fields carry no text.
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(payload).map_err(|err| malformed(payload, err.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(StreamError::Service {
            message: error.message,
        });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(SseEvent::Delta))
}
