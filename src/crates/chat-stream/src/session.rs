//! Stream session controller
//!
//! Drives one chat request from submission to its terminal outcome: resolves
//! the HTTP status, decodes the body through the frame decoder and envelope
//! classifier, and invokes the observer callbacks with the ordering and
//! exactly-once terminal guarantees the conversation layer relies on.

use crate::classifier::EnvelopeClassifier;
use crate::config::GatewayConfig;
use crate::frame::{Frame, FrameDecoder};
use crate::request::{build_chat_request, ChatRequestBody};
use crate::types::canonical::{ChatStreamEvent, ChatUsage, ToolCallPayload, ToolResponsePayload};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, warn};
use reqwest::StatusCode;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Typed callbacks for one stream session.
///
/// `on_chunk` delivers only the incremental text; the controller tracks the
/// cumulative content and hands it to `on_complete`. Exactly one of
/// `on_complete`/`on_error` fires per session, and none at all once the
/// session's cancellation token is cancelled.
pub trait StreamObserver: Send + Sync {
    fn on_start(&self, id: &str);
    fn on_chunk(&self, delta: &str);
    fn on_tool_call(&self, call: &ToolCallPayload);
    fn on_tool_response(&self, response: &ToolResponsePayload);
    fn on_complete(&self, full_content: &str, usage: &ChatUsage);
    fn on_error(&self, message: &str, code: Option<&str>);
}

/// Session/auth collaborator. A 403 means the stored credential is invalid;
/// the collaborator clears it and navigates to the login surface. The
/// controller never reports a 403 through `on_error`.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
    async fn on_forbidden(&self);
}

pub struct StreamSessionController {
    observer: Arc<dyn StreamObserver>,
    authority: Arc<dyn SessionAuthority>,
    cancel: CancellationToken,
    decoder: FrameDecoder,
    classifier: EnvelopeClassifier,
    accumulated: String,
    started: bool,
    body_emitted: bool,
    terminated: bool,
    started_at: Instant,
    first_byte_ms: Option<u64>,
    running_usage: ChatUsage,
}

impl StreamSessionController {
    pub fn new(
        observer: Arc<dyn StreamObserver>,
        authority: Arc<dyn SessionAuthority>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            observer,
            authority,
            cancel,
            decoder: FrameDecoder::new(),
            classifier: EnvelopeClassifier::new(),
            accumulated: String::new(),
            started: false,
            body_emitted: false,
            terminated: false,
            started_at: Instant::now(),
            first_byte_ms: None,
            running_usage: ChatUsage::default(),
        }
    }

    /// Submit the request and consume the response to a terminal outcome.
    pub async fn execute(
        mut self,
        client: &reqwest::Client,
        config: &GatewayConfig,
        body: &ChatRequestBody,
    ) {
        debug!(
            "Chat stream request: model_id={}, conversation_id={}, question_id={}",
            body.model_id, body.conversation_id, body.question_id
        );
        self.started_at = Instant::now();

        let response = match build_chat_request(client, config, body).send().await {
            Ok(response) => response,
            Err(e) => {
                self.finish_error(&format!("chat request failed: {}", e), None);
                return;
            }
        };

        // The HTTP status is resolved before any frame decoding begins.
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!(
                "Chat request rejected with 403, delegating to session authority: model_id={}",
                body.model_id
            );
            self.authority.on_forbidden().await;
            return;
        }
        if !status.is_success() {
            let code = status.as_u16().to_string();
            self.finish_error(
                &format!("chat request failed with status {}", code),
                Some(code.as_str()),
            );
            return;
        }

        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
        self.process_stream(response.bytes_stream(), idle_timeout)
            .await;
    }

    /// Decode loop over an already-resolved byte stream. Public for tests and
    /// for callers that manage the HTTP exchange themselves.
    pub async fn process_stream<S, E>(&mut self, stream: S, idle_timeout: Duration)
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut stream = stream;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let chunk = match timeout(idle_timeout, stream.next()).await {
                Err(_) => {
                    self.finish_error(
                        &format!("chat stream idle for {}s", idle_timeout.as_secs()),
                        None,
                    );
                    return;
                }
                Ok(None) => {
                    self.finish_on_close(None);
                    return;
                }
                Ok(Some(Err(e))) => {
                    self.finish_on_close(Some(e.to_string()));
                    return;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            for frame in self.decoder.feed(&chunk) {
                if self.handle_frame(frame) {
                    return;
                }
            }
        }
    }

    /// Returns true when the session reached a terminal state.
    fn handle_frame(&mut self, frame: Frame) -> bool {
        match frame {
            Frame::Done => {
                self.finish_complete(None, None);
                true
            }
            Frame::Record(payload) => match self.classifier.classify(&payload) {
                Some(event) => self.dispatch(event),
                None => false,
            },
        }
    }

    fn dispatch(&mut self, event: ChatStreamEvent) -> bool {
        match event {
            ChatStreamEvent::Start { id } => {
                self.emit_start(&id);
                false
            }
            ChatStreamEvent::Chunk { delta } => {
                if self.first_byte_ms.is_none() {
                    self.first_byte_ms = Some(self.started_at.elapsed().as_millis() as u64);
                }
                self.accumulated.push_str(&delta);
                self.emit_body(|observer| observer.on_chunk(&delta));
                false
            }
            ChatStreamEvent::ToolCall { call, usage } => {
                if let Some(usage) = usage {
                    self.running_usage.update(&usage);
                }
                self.emit_body(|observer| observer.on_tool_call(&call));
                false
            }
            ChatStreamEvent::ToolResponse { response, usage } => {
                if let Some(usage) = usage {
                    self.running_usage.update(&usage);
                }
                self.emit_body(|observer| observer.on_tool_response(&response));
                false
            }
            ChatStreamEvent::Complete { full_content, usage } => {
                self.finish_complete(full_content, usage);
                true
            }
            ChatStreamEvent::Error { message, code } => {
                self.finish_error(&message, code.as_deref());
                true
            }
        }
    }

    /// Transport ended without a terminator record. Non-empty accumulated
    /// content is treated as an implicit completion; an empty session is
    /// dropped without a terminal callback.
    fn finish_on_close(&mut self, read_error: Option<String>) {
        if let Some(error) = &read_error {
            warn!("Chat stream read error, treating as connection close: {}", error);
        }
        if let Some(frame) = self.decoder.finish() {
            if self.handle_frame(frame) {
                return;
            }
        }
        if self.terminated {
            return;
        }
        if self.accumulated.is_empty() {
            warn!("Chat stream closed with no terminator and no content; no terminal callback");
            return;
        }
        debug!("Chat stream closed without terminator; completing with accumulated content");
        self.finish_complete(None, None);
    }

    fn emit_start(&mut self, id: &str) {
        if self.terminated || self.started || self.body_emitted || self.cancel.is_cancelled() {
            return;
        }
        self.started = true;
        self.observer.on_start(id);
    }

    fn emit_body<F: FnOnce(&dyn StreamObserver)>(&mut self, invoke: F) {
        if self.terminated || self.cancel.is_cancelled() {
            return;
        }
        self.body_emitted = true;
        invoke(self.observer.as_ref());
    }

    fn finish_complete(&mut self, full_content: Option<String>, usage: Option<ChatUsage>) {
        if self.terminated || self.cancel.is_cancelled() {
            return;
        }
        self.terminated = true;

        let content = match full_content {
            Some(content) if !content.is_empty() => content,
            _ => self.accumulated.clone(),
        };

        // Wire-provided values win over cached usage, which wins over the
        // controller's own measurements.
        let mut merged = ChatUsage {
            first_byte_timeout: self.first_byte_ms,
            elapsed_time: Some(self.started_at.elapsed().as_millis() as u64),
            ..Default::default()
        };
        merged.update(&self.running_usage);
        if let Some(cached) = self.classifier.take_cached_usage() {
            merged.update(&cached);
        }
        if let Some(usage) = &usage {
            merged.update(usage);
        }

        self.observer.on_complete(&content, &merged);
    }

    fn finish_error(&mut self, message: &str, code: Option<&str>) {
        if self.terminated || self.cancel.is_cancelled() {
            return;
        }
        self.terminated = true;
        warn!("Chat stream failed: message={}, code={:?}", message, code);
        self.observer.on_error(message, code);
    }
}
