use futures_util::StreamExt;
use std::future::Future;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::completion::CompletionService;
use crate::error::TurnError;
use crate::model::{MessageRole, Transcript};

/// Runs one conversational turn at a time against a completion service.
///
/// The transcript is owned by the caller and lent for the duration of each
/// call. A successful call adds exactly one user and one assistant message;
/// a failed or cancelled call keeps the user message and adds nothing else.
pub struct TurnProcessor<S> {
    service: S,
}

impl<S: CompletionService> TurnProcessor<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Appends `user_text`, streams the reply into `out` and records it.
    ///
    /// Resolving `cancel` before the stream ends drops the in-flight
    /// request and returns [`TurnError::Cancelled`].
    pub async fn submit<W, C>(
        &self,
        transcript: &mut Transcript,
        user_text: &str,
        out: &mut W,
        cancel: C,
    ) -> Result<String, TurnError>
    where
        W: Write,
        C: Future<Output = ()>,
    {
        transcript.check_consistency()?;
        transcript.append(MessageRole::User, user_text);
        debug!(
            transcript_len = transcript.len(),
            input_len = user_text.len(),
            "submitting user turn"
        );
        self.complete(transcript, out, cancel).await
    }

    /// Re-requests a reply for the unanswered user message left by a failed
    /// turn, without adding another user message.
    pub async fn retry<W, C>(
        &self,
        transcript: &mut Transcript,
        out: &mut W,
        cancel: C,
    ) -> Result<String, TurnError>
    where
        W: Write,
        C: Future<Output = ()>,
    {
        transcript.check_consistency()?;
        if !transcript.has_dangling_user() {
            return Err(TurnError::TranscriptInconsistency(
                "there is no unanswered user message to retry".to_string(),
            ));
        }
        debug!(transcript_len = transcript.len(), "retrying unanswered turn");
        self.complete(transcript, out, cancel).await
    }

    async fn complete<W, C>(
        &self,
        transcript: &mut Transcript,
        out: &mut W,
        cancel: C,
    ) -> Result<String, TurnError>
    where
        W: Write,
        C: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            biased;
            _ = cancel => Err(TurnError::Cancelled),
            result = stream_reply(&self.service, transcript, out) => result,
        };

        match outcome {
            Ok(reply) => {
                info!(reply_len = reply.len(), "assistant reply completed");
                transcript.append(MessageRole::Assistant, reply.clone());
                Ok(reply)
            }
            Err(err) => {
                warn!(error = %err, "turn failed; reply discarded");
                Err(err)
            }
        }
    }
}

async fn stream_reply<S, W>(
    service: &S,
    transcript: &Transcript,
    out: &mut W,
) -> Result<String, TurnError>
where
    S: CompletionService,
    W: Write,
{
    let mut fragments = service.stream_chat(transcript.snapshot()).await?;
    let mut reply = String::new();

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        out.write_all(fragment.as_bytes())?;
        out.flush()?;
        reply.push_str(&fragment);
    }

    writeln!(out)?;
    out.flush()?;
    Ok(reply)
}
