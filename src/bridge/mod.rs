//! Chat completions bridge
//!
//! Drives one logical chat call against Emohaa: flatten the conversation,
//! then, under the retry policy, open a session, send the prompt and drain
//! the reply. The session is torn down in the background whatever the
//! outcome.

pub mod credentials;
pub mod prompt;
pub mod retry;
pub mod transcoder;
pub mod turn_log;
pub mod types;

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;

use crate::routes::metrics::record_attempt;
use crate::upstream::{ByteStream, Session, SessionManager, TurnError, UpstreamApi};

pub use credentials::{select_credential, split_credentials};
pub use prompt::flatten;
pub use retry::RetryPolicy;
pub use transcoder::{collect_completion, transcode, ChunkTranscoder, StreamOutcome};
pub use turn_log::TurnContext;
pub use types::{ChatCompletionRequest, ChatMessage, CompletionMeta, CompletionResult};

/// OpenAI-format SSE frames for one streaming turn
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// Orchestrates turns against the upstream
pub struct ChatBridge {
    upstream: Arc<dyn UpstreamApi>,
    sessions: SessionManager,
    policy: RetryPolicy,
    model: String,
}

impl ChatBridge {
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        policy: RetryPolicy,
        model: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(upstream.clone()),
            upstream,
            policy,
            model: model.into(),
        }
    }

    /// Model name reported in every response
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn meta_for(&self, session: &Session) -> CompletionMeta {
        CompletionMeta {
            id: session.id.clone(),
            model: self.model.clone(),
            created: session.created_at,
        }
    }

    /// Run a buffered turn and return the whole completion
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        credential: &str,
    ) -> Result<CompletionResult, TurnError> {
        let ctx = TurnContext::new(false, messages.len());
        let prompt = flatten(messages);
        ctx.log_turn_start(prompt.len());

        let result = self
            .policy
            .run(|attempt| self.buffered_attempt(&ctx, attempt, &prompt, credential))
            .await;

        match &result {
            Ok(completion) => ctx.log_turn_complete(completion.content().len()),
            Err(e) => ctx.log_turn_failed(&e.to_string()),
        }
        result
    }

    async fn buffered_attempt(
        &self,
        ctx: &TurnContext,
        attempt: u32,
        prompt: &str,
        credential: &str,
    ) -> Result<CompletionResult, TurnError> {
        record_attempt(ctx.mode());

        let session = self.sessions.open(credential).await.inspect_err(|e| {
            ctx.log_attempt_failed(attempt, &e.to_string());
        })?;
        ctx.log_session_opened(attempt, &session.id);

        let meta = self.meta_for(&session);
        let result = match self.upstream.open_chat(&session.id, prompt, credential).await {
            Ok(body) => collect_completion(body, &meta).await,
            Err(e) => Err(e),
        };

        self.sessions.close_detached(session, credential.to_string());

        if let Err(e) = &result {
            ctx.log_attempt_failed(attempt, &e.to_string());
        }
        result
    }

    /// Run a streaming turn.
    ///
    /// Retries cover everything up to the first upstream byte. Once the
    /// stream is handed back, upstream failures only end it early.
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        credential: &str,
    ) -> Result<FrameStream, TurnError> {
        let ctx = TurnContext::new(true, messages.len());
        let prompt = flatten(messages);
        ctx.log_turn_start(prompt.len());

        let (session, body) = self
            .policy
            .run(|attempt| self.stream_attempt(&ctx, attempt, &prompt, credential))
            .await
            .inspect_err(|e| ctx.log_turn_failed(&e.to_string()))?;

        let meta = self.meta_for(&session);
        let sessions = self.sessions.clone();
        let credential = credential.to_string();

        Ok(Box::pin(transcode(body, meta, move |summary| {
            ctx.log_stream_ended(summary.outcome.as_str(), summary.content_chunks);
            sessions.close_detached(session, credential);
        })))
    }

    async fn stream_attempt(
        &self,
        ctx: &TurnContext,
        attempt: u32,
        prompt: &str,
        credential: &str,
    ) -> Result<(Session, ByteStream), TurnError> {
        record_attempt(ctx.mode());

        let session = self.sessions.open(credential).await.inspect_err(|e| {
            ctx.log_attempt_failed(attempt, &e.to_string());
        })?;
        ctx.log_session_opened(attempt, &session.id);

        match self.upstream.open_chat(&session.id, prompt, credential).await {
            Ok(body) => Ok((session, body)),
            Err(e) => {
                ctx.log_attempt_failed(attempt, &e.to_string());
                self.sessions.close_detached(session, credential.to_string());
                Err(e)
            }
        }
    }
}
