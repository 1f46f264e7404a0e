//! Multi-model chat coordinator
//!
//! Fans one submitted prompt out to every active model as independent,
//! fire-and-forget stream sessions, and bridges their callbacks into
//! identifier-keyed conversation store updates. Each task is closed over its
//! own model id; interleaving order across models is irrelevant to
//! correctness.

use crate::conversation::{
    ConversationStore, ModelConversation, ToolCallRecord, ToolResponseRecord, VersionDirection,
};
use crate::errors::{PortalError, PortalResult};
use crate::events::UiEventBus;
use aiportal_chat_stream::{
    ChatRequestBody, ChatUsage, GatewayConfig, SessionAuthority, StreamObserver,
    StreamSessionController, ToolCallPayload, ToolResponsePayload,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitOptions {
    pub tools_enabled: bool,
    pub web_search_enabled: bool,
}

/// Handle to one spawned question stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub model_id: String,
    pub conversation_id: String,
    pub question_id: String,
}

pub struct ChatCoordinator {
    store: Arc<ConversationStore>,
    events: UiEventBus,
    client: reqwest::Client,
    config: GatewayConfig,
    authority: Arc<dyn SessionAuthority>,
    session_id: RwLock<String>,
    /// Cancelled and replaced on new chat; suppresses callbacks of every
    /// stream spawned under the old session.
    cancel: RwLock<CancellationToken>,
}

impl ChatCoordinator {
    pub fn new(config: GatewayConfig, authority: Arc<dyn SessionAuthority>) -> Self {
        Self {
            store: Arc::new(ConversationStore::new()),
            events: UiEventBus::new(),
            client: reqwest::Client::new(),
            config,
            authority,
            session_id: RwLock::new(format!("session-{}", uuid::Uuid::new_v4())),
            cancel: RwLock::new(CancellationToken::new()),
        }
    }

    pub fn store(&self) -> Arc<ConversationStore> {
        self.store.clone()
    }

    pub fn events(&self) -> &UiEventBus {
        &self.events
    }

    pub fn add_model(&self, model_id: &str, display_name: &str) {
        self.store.add_model(model_id, display_name);
        self.events
            .emit("chat://model-added", json!({ "modelId": model_id }));
    }

    pub fn close_model(&self, model_id: &str) {
        self.store.remove_model(model_id);
        self.events
            .emit("chat://model-closed", json!({ "modelId": model_id }));
    }

    /// Submit a fresh prompt to every active model. Spawns one independent
    /// stream session per model and returns immediately with the created
    /// placeholders.
    pub fn submit_prompt(
        &self,
        prompt: &str,
        options: SubmitOptions,
    ) -> PortalResult<Vec<QuestionRef>> {
        let model_ids = self.store.model_ids();
        if model_ids.is_empty() {
            return Err(PortalError::Validation(
                "No active model conversations".to_string(),
            ));
        }

        let session_id = self.current_session_id();
        let cancel = self.current_cancel_token();
        let mut refs = Vec::with_capacity(model_ids.len());

        for model_id in model_ids {
            let conversation_id = format!("conv-{}", uuid::Uuid::new_v4());
            let question_id = format!("q-{}", uuid::Uuid::new_v4());
            self.store
                .begin_question(&model_id, &conversation_id, &question_id, prompt, true)?;
            self.events.emit(
                "chat://question-created",
                json!({
                    "modelId": model_id,
                    "conversationId": conversation_id,
                    "questionId": question_id,
                }),
            );

            let body = ChatRequestBody {
                model_id: model_id.clone(),
                session_id: session_id.clone(),
                conversation_id: conversation_id.clone(),
                question_id: question_id.clone(),
                prompt: prompt.to_string(),
                stream: true,
                tools_enabled: options.tools_enabled,
                web_search_enabled: options.web_search_enabled,
            };
            self.spawn_stream(body, false, cancel.clone());

            refs.push(QuestionRef {
                model_id,
                conversation_id,
                question_id,
            });
        }

        Ok(refs)
    }

    /// Re-run one specific question for one model. Appends a new answer
    /// version (history is never truncated) and drives a fresh session with
    /// the same conversation and question ids.
    pub fn regenerate(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        options: SubmitOptions,
    ) -> PortalResult<QuestionRef> {
        let prompt = self
            .store
            .question_prompt(model_id, conversation_id, question_id)?;
        self.store
            .begin_regeneration(model_id, conversation_id, question_id)?;
        self.events.emit(
            "chat://question-regenerating",
            json!({
                "modelId": model_id,
                "conversationId": conversation_id,
                "questionId": question_id,
            }),
        );

        let body = ChatRequestBody {
            model_id: model_id.to_string(),
            session_id: self.current_session_id(),
            conversation_id: conversation_id.to_string(),
            question_id: question_id.to_string(),
            prompt,
            stream: true,
            tools_enabled: options.tools_enabled,
            web_search_enabled: options.web_search_enabled,
        };
        self.spawn_stream(body, true, self.current_cancel_token());

        Ok(QuestionRef {
            model_id: model_id.to_string(),
            conversation_id: conversation_id.to_string(),
            question_id: question_id.to_string(),
        })
    }

    /// Move the active answer version pointer; pure store update, never
    /// triggers network activity.
    pub fn change_version(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        direction: VersionDirection,
    ) -> PortalResult<usize> {
        let index = self
            .store
            .change_version(model_id, conversation_id, question_id, direction)?;
        self.events.emit(
            "chat://version-changed",
            json!({
                "modelId": model_id,
                "questionId": question_id,
                "activeAnswerIndex": index,
            }),
        );
        Ok(index)
    }

    /// Start over: abandon every in-flight stream and destroy the forest.
    pub fn new_chat(&self) {
        let previous = {
            let mut guard = self
                .cancel
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        previous.cancel();

        {
            let mut guard = self
                .session_id
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = format!("session-{}", uuid::Uuid::new_v4());
        }

        self.store.reset();
        self.events.emit("chat://session-reset", json!({}));
    }

    /// Replace the forest with a historical session materialized from
    /// storage. In-flight streams are abandoned exactly as for a new chat.
    pub fn load_history(&self, models: Vec<ModelConversation>) {
        let previous = {
            let mut guard = self
                .cancel
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        previous.cancel();

        self.store.load_history(models);
        self.events.emit("chat://history-loaded", json!({}));
    }

    fn current_session_id(&self) -> String {
        self.session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_cancel_token(&self) -> CancellationToken {
        self.cancel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn_stream(&self, body: ChatRequestBody, regenerate: bool, cancel: CancellationToken) {
        let observer = Arc::new(TreeObserver {
            store: self.store.clone(),
            events: self.events.clone(),
            model_id: body.model_id.clone(),
            conversation_id: body.conversation_id.clone(),
            question_id: body.question_id.clone(),
            regenerate,
            accumulated: Mutex::new(String::new()),
        });
        let controller = StreamSessionController::new(observer, self.authority.clone(), cancel);
        let client = self.client.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            controller.execute(&client, &config, &body).await;
        });
    }
}

/// Bridges one stream session's callbacks into the conversation store.
///
/// Owns the chunk accumulator for its session (each active request has an
/// independent one) and addresses the store exclusively through its captured
/// model/conversation/question identifiers.
struct TreeObserver {
    store: Arc<ConversationStore>,
    events: UiEventBus,
    model_id: String,
    conversation_id: String,
    question_id: String,
    regenerate: bool,
    accumulated: Mutex<String>,
}

impl TreeObserver {
    fn target(&self) -> serde_json::Value {
        json!({
            "modelId": self.model_id,
            "conversationId": self.conversation_id,
            "questionId": self.question_id,
        })
    }

    fn warn_on_error(&self, operation: &str, result: PortalResult<()>) {
        if let Err(e) = result {
            warn!(
                "Dropping stream update: operation={}, model_id={}, error={}",
                operation, self.model_id, e
            );
        }
    }
}

impl StreamObserver for TreeObserver {
    fn on_start(&self, id: &str) {
        // Placeholder nodes were created at submission time.
        debug!("Chat stream started: model_id={}, chat_id={}", self.model_id, id);
    }

    fn on_chunk(&self, delta: &str) {
        let full = {
            let mut accumulated = self
                .accumulated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            accumulated.push_str(delta);
            accumulated.clone()
        };
        let result = self.store.set_answer_content(
            &self.model_id,
            &self.conversation_id,
            &self.question_id,
            &full,
        );
        self.warn_on_error("chunk", result);
        let mut payload = self.target();
        payload["content"] = json!(full);
        self.events.emit("chat://answer-updated", payload);
    }

    fn on_tool_call(&self, call: &ToolCallPayload) {
        let result = self.store.append_tool_call(
            &self.model_id,
            &self.conversation_id,
            &self.question_id,
            ToolCallRecord::from(call),
        );
        self.warn_on_error("tool_call", result);
        let mut payload = self.target();
        payload["toolRunning"] = json!(true);
        payload["toolCallId"] = json!(call.id);
        self.events.emit("chat://tool-state", payload);
    }

    fn on_tool_response(&self, response: &ToolResponsePayload) {
        let result = self.store.append_tool_response(
            &self.model_id,
            &self.conversation_id,
            &self.question_id,
            ToolResponseRecord::from(response),
        );
        self.warn_on_error("tool_response", result);
        let mut payload = self.target();
        payload["toolRunning"] = json!(false);
        payload["toolCallId"] = json!(response.id);
        self.events.emit("chat://tool-state", payload);
    }

    fn on_complete(&self, full_content: &str, usage: &ChatUsage) {
        let result = self.store.complete_answer(
            &self.model_id,
            &self.conversation_id,
            &self.question_id,
            full_content,
            usage,
            self.regenerate,
        );
        self.warn_on_error("complete", result);
        let mut payload = self.target();
        payload["usage"] = serde_json::to_value(usage).unwrap_or_default();
        self.events.emit("chat://answer-completed", payload);
    }

    fn on_error(&self, message: &str, code: Option<&str>) {
        let result = self.store.fail_answer(
            &self.model_id,
            &self.conversation_id,
            &self.question_id,
            message,
        );
        self.warn_on_error("error", result);
        let mut payload = self.target();
        payload["message"] = json!(message);
        payload["code"] = json!(code);
        self.events.emit("chat://answer-error", payload);
    }
}
