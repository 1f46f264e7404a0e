//! Conversation forest store
//!
//! The shared UI-facing state machine. Every mutation is a
//! lookup-by-identifier, clone, modify, insert on the model's entry — never a
//! positional update — so updates from concurrently interleaving streams for
//! different models cannot interfere.

use super::types::{
    Answer, Conversation, ModelConversation, Question, ToolCallRecord, ToolResponseRecord,
    VersionDirection,
};
use crate::errors::{PortalError, PortalResult};
use aiportal_chat_stream::ChatUsage;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::{PoisonError, RwLock};

pub struct ConversationStore {
    models: DashMap<String, ModelConversation>,
    /// Display order of the comparison columns.
    order: RwLock<Vec<String>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Add a model to the comparison. Re-adding an existing model keeps its
    /// history.
    pub fn add_model(&self, model_id: &str, display_name: &str) {
        if self.models.contains_key(model_id) {
            debug!("Model conversation already present: model_id={}", model_id);
            return;
        }
        self.models.insert(
            model_id.to_string(),
            ModelConversation::new(model_id, display_name),
        );
        self.order
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(model_id.to_string());
    }

    pub fn remove_model(&self, model_id: &str) {
        self.models.remove(model_id);
        self.order
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id| id != model_id);
    }

    /// Destroy the whole forest (new chat / session switch).
    pub fn reset(&self) {
        self.models.clear();
        self.order
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Replace the forest with history materialized from storage. History is
    /// loaded as data, never replayed through the streaming pipeline.
    pub fn load_history(&self, models: Vec<ModelConversation>) {
        self.reset();
        let mut order = self
            .order
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for model in models {
            order.push(model.model_id.clone());
            self.models.insert(model.model_id.clone(), model);
        }
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.order
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self, model_id: &str) -> PortalResult<ModelConversation> {
        self.models
            .get(model_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                PortalError::NotFound(format!("Model conversation not found: {}", model_id))
            })
    }

    pub fn snapshot_all(&self) -> Vec<ModelConversation> {
        self.model_ids()
            .into_iter()
            .filter_map(|model_id| self.models.get(&model_id).map(|entry| entry.clone()))
            .collect()
    }

    /// Synchronous placeholder for a freshly submitted prompt: a new
    /// `Conversation` with `loading` set, one `Question`, one empty `Answer`,
    /// appended before any network event so the UI renders a pending state
    /// immediately.
    pub fn begin_question(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        prompt: &str,
        is_new_question: bool,
    ) -> PortalResult<()> {
        self.with_model(model_id, |model| {
            model.conversations.push(Conversation {
                id: conversation_id.to_string(),
                loading: true,
                questions: vec![Question {
                    id: question_id.to_string(),
                    content: prompt.to_string(),
                    created_at_ms: chrono::Utc::now().timestamp_millis(),
                    active_answer_index: 0,
                    answers: vec![Answer::default()],
                    tool_calls: Vec::new(),
                    tool_responses: Vec::new(),
                    is_new_question,
                }],
            });
            Ok(())
        })
    }

    /// Append a fresh empty `Answer` version for a re-run of an existing
    /// question. Existing versions are never removed.
    pub fn begin_regeneration(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
    ) -> PortalResult<()> {
        self.with_question(model_id, conversation_id, question_id, |loading, question| {
            question.answers.push(Answer::default());
            *loading = true;
            Ok(())
        })
    }

    /// Overwrite the in-flight (last) answer version with the full
    /// accumulated content. Clears the conversation's `loading` flag.
    pub fn set_answer_content(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        full_content: &str,
    ) -> PortalResult<()> {
        self.with_question(model_id, conversation_id, question_id, |loading, question| {
            let answer = last_answer(question)?;
            answer.content = full_content.to_string();
            *loading = false;
            Ok(())
        })
    }

    pub fn append_tool_call(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        record: ToolCallRecord,
    ) -> PortalResult<()> {
        let result = self.with_question(
            model_id,
            conversation_id,
            question_id,
            |_loading, question| {
                question.tool_calls.push(record);
                Ok(())
            },
        );
        if result.is_ok() {
            self.set_tool_running(model_id, true)?;
        }
        result
    }

    /// Pair a tool response with its call by correlation id. An unmatched
    /// response is tolerated and ignored.
    pub fn append_tool_response(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        record: ToolResponseRecord,
    ) -> PortalResult<()> {
        let mut matched = false;
        self.with_question(
            model_id,
            conversation_id,
            question_id,
            |_loading, question| {
                if question.tool_calls.iter().any(|call| call.id == record.id) {
                    question.tool_responses.push(record);
                    matched = true;
                } else {
                    warn!(
                        "Ignoring tool response with no matching call: question_id={}, correlation_id={}",
                        question_id, record.id
                    );
                }
                Ok(())
            },
        )?;
        if matched {
            self.set_tool_running(model_id, false)?;
        }
        Ok(())
    }

    /// Terminal success for the in-flight answer version.
    pub fn complete_answer(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        full_content: &str,
        usage: &ChatUsage,
        regenerate: bool,
    ) -> PortalResult<()> {
        self.with_question(model_id, conversation_id, question_id, |loading, question| {
            let version_count = question.answers.len();
            let answer = last_answer(question)?;
            answer.content = full_content.to_string();
            answer.apply_usage(usage);
            if regenerate {
                question.active_answer_index = version_count - 1;
            }
            *loading = false;
            Ok(())
        })
    }

    /// Terminal failure: sets the in-flight answer's error, preserving any
    /// content already accumulated.
    pub fn fail_answer(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        message: &str,
    ) -> PortalResult<()> {
        self.with_question(model_id, conversation_id, question_id, |loading, question| {
            let answer = last_answer(question)?;
            answer.error = message.to_string();
            *loading = false;
            Ok(())
        })
    }

    /// Move the active version pointer. At either boundary this is a no-op;
    /// it never touches the network. Returns the resulting index.
    pub fn change_version(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        direction: VersionDirection,
    ) -> PortalResult<usize> {
        self.with_question(model_id, conversation_id, question_id, |_loading, question| {
            match direction {
                VersionDirection::Prev => {
                    if question.active_answer_index > 0 {
                        question.active_answer_index -= 1;
                    }
                }
                VersionDirection::Next => {
                    if question.active_answer_index + 1 < question.answers.len() {
                        question.active_answer_index += 1;
                    }
                }
            }
            Ok(question.active_answer_index)
        })
    }

    /// Prompt text of an existing question (used to rebuild the request body
    /// for a regenerate).
    pub fn question_prompt(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
    ) -> PortalResult<String> {
        self.with_question(model_id, conversation_id, question_id, |_loading, question| {
            Ok(question.content.clone())
        })
    }

    fn set_tool_running(&self, model_id: &str, running: bool) -> PortalResult<()> {
        self.with_model(model_id, |model| {
            model.tool_running = running;
            Ok(())
        })
    }

    /// Copy-on-write update of one model's entry, keyed by identifier.
    fn with_model<T>(
        &self,
        model_id: &str,
        mutate: impl FnOnce(&mut ModelConversation) -> PortalResult<T>,
    ) -> PortalResult<T> {
        let mut model = self
            .models
            .get(model_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                PortalError::NotFound(format!("Model conversation not found: {}", model_id))
            })?;
        let out = mutate(&mut model)?;
        self.models.insert(model_id.to_string(), model);
        Ok(out)
    }

    fn with_question<T>(
        &self,
        model_id: &str,
        conversation_id: &str,
        question_id: &str,
        mutate: impl FnOnce(&mut bool, &mut Question) -> PortalResult<T>,
    ) -> PortalResult<T> {
        self.with_model(model_id, |model| {
            let conversation = model
                .conversations
                .iter_mut()
                .find(|conversation| conversation.id == conversation_id)
                .ok_or_else(|| {
                    PortalError::NotFound(format!(
                        "Conversation not found: model_id={}, conversation_id={}",
                        model_id, conversation_id
                    ))
                })?;
            let Conversation { loading, questions, .. } = conversation;
            let question = questions
                .iter_mut()
                .find(|question| question.id == question_id)
                .ok_or_else(|| {
                    PortalError::NotFound(format!(
                        "Question not found: conversation_id={}, question_id={}",
                        conversation_id, question_id
                    ))
                })?;
            mutate(loading, question)
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn last_answer(question: &mut Question) -> PortalResult<&mut Answer> {
    question.answers.last_mut().ok_or_else(|| {
        PortalError::Validation(format!(
            "Question has no answer versions: question_id={}",
            question.id
        ))
    })
}
