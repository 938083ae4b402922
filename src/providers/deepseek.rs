use anyhow::{Result, anyhow};
use futures_util::{Stream, StreamExt, stream};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, trace};

use crate::completion::{CompletionFuture, CompletionService, CompletionStream};
use crate::config::Config;
use crate::error::StreamError;
use crate::model::Message;
use crate::providers::http_errors::model_api_request_error;
use crate::providers::sse::{SseDecoder, SseEvent};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

/// Streaming client for DeepSeek's OpenAI-compatible chat completions.
pub struct DeepSeekService<'a> {
    client: &'a Client,
    cfg: &'a Config,
    api_key: String,
}

impl<'a> DeepSeekService<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            anyhow!("Missing DEEPSEEK_API_KEY. Set it in the environment or in a .env file.")
        })?;
        Ok(Self {
            client,
            cfg,
            api_key,
        })
    }

    async fn open_stream(&self, messages: &[Message]) -> Result<CompletionStream, StreamError> {
        let api_url = chat_url(&self.cfg.model_base_url);
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: to_chat_messages(messages),
            stream: true,
            temperature: self.cfg.generation.temperature,
            max_tokens: self.cfg.generation.max_tokens,
        };
        debug!(
            api_url = %api_url,
            model = %self.cfg.model,
            message_count = messages.len(),
            "sending streaming chat request"
        );

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                debug!(
                    api_url = %api_url,
                    model = %self.cfg.model,
                    error = %err,
                    "chat request failed"
                );
                model_api_request_error(err, &api_url, self.cfg.connect_timeout_secs)
            })?;

        let status = response.status();
        if !status.is_success() {
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            debug!(
                api_url = %api_url,
                model = %self.cfg.model,
                status = %status,
                response_body_len = response_body.len(),
                "chat service returned non-success status"
            );
            return Err(StreamError::Status {
                status,
                body: response_body,
            });
        }

        debug!(status = %status, "chat stream opened");
        Ok(fragment_stream(response.bytes_stream()))
    }
}

impl CompletionService for DeepSeekService<'_> {
    fn stream_chat<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a> {
        Box::pin(async move { self.open_stream(messages).await })
    }
}

/// Turns a response body into a stream of reply fragments.
fn fragment_stream<S, B>(bytes: S) -> CompletionStream
where
    S: Stream<Item = reqwest::Result<B>> + 'static,
    B: AsRef<[u8]> + 'static,
{
    let state = FragmentState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_fragment().await?;
        Some((item, state))
    }))
}

struct FragmentState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, StreamError>>,
    finished: bool,
}

impl<S, B> FragmentState<S>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    async fn next_fragment(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            let decoded = match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    trace!(chunk_len = chunk.as_ref().len(), "received stream chunk");
                    self.decoder.feed(chunk.as_ref())
                }
                Some(Err(err)) => vec![Err(StreamError::Transport(err))],
                None => {
                    self.finished = true;
                    self.decoder.finish().transpose().into_iter().collect()
                }
            };
            self.absorb(decoded);
        }
    }

    /// Queues fragments up to the first terminal event; anything after it is dropped.
    fn absorb(&mut self, items: Vec<Result<SseEvent, StreamError>>) {
        for item in items {
            match item {
                Ok(SseEvent::Delta(text)) => self.pending.push_back(Ok(text)),
                Ok(SseEvent::Done) => {
                    debug!("chat stream completed");
                    self.finished = true;
                    return;
                }
                Err(err) => {
                    debug!(error = %err, "chat stream failed");
                    self.pending.push_back(Err(err));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}
