//! [`ChatGptEngine`]: OpenAI chat completions behind [`ResponseEngine`].
//!
//! Every exchanged message is kept in memory with a link to its parent. The continuation token
//! handed back to the caller is the id of the last assistant message; a follow-up rebuilds the
//! conversation by walking that chain back, at most `max_history` messages. The store holds at
//! most `store_capacity` messages; the oldest are evicted first, which cuts long chains short.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::engine::{EngineReply, ResponseEngine};
use crate::error::{DispatchError, Result};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_HISTORY: usize = 20;
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

/// Masks an API key for logging: first 7 chars + "***" + last 4 chars, or just "***" when the
/// key is too short to show any part safely.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len <= 11 || !token.is_char_boundary(7) || !token.is_char_boundary(len - 4) {
        return "***".to_string();
    }
    format!("{}***{}", &token[..7], &token[len - 4..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub parent: Option<String>,
}

/// In-memory message tree, bounded by capacity.
#[derive(Debug)]
pub struct ConversationStore {
    messages: HashMap<String, StoredMessage>,
    /// Ids in insertion order, oldest at the front.
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a message under `parent` and returns its id, evicting the oldest message when full.
    pub fn append(&mut self, role: Role, content: impl Into<String>, parent: Option<String>) -> String {
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.messages.remove(&oldest);
            }
        }
        let id = Uuid::new_v4().to_string();
        self.order.push_back(id.clone());
        self.messages.insert(
            id.clone(),
            StoredMessage {
                id: id.clone(),
                role,
                content: content.into(),
                parent,
            },
        );
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The chain ending at `tip`, oldest first, holding at most `limit` messages.
    pub fn history(&self, tip: &str, limit: usize) -> Vec<StoredMessage> {
        let mut chain = Vec::new();
        let mut cursor = self.messages.get(tip);
        while let Some(message) = cursor {
            if chain.len() == limit {
                break;
            }
            chain.push(message.clone());
            cursor = message.parent.as_deref().and_then(|p| self.messages.get(p));
        }
        chain.reverse();
        chain
    }
}

pub struct ChatGptEngine {
    client: Client<OpenAIConfig>,
    api_key_for_logging: String,
    model: String,
    system_prompt: Option<String>,
    max_history: usize,
    store: Mutex<ConversationStore>,
}

impl ChatGptEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let config = OpenAIConfig::new().with_api_key(api_key.clone());
        Self::from_config(config, api_key)
    }

    /// Uses a custom base URL (proxies or compatible endpoints).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(base_url);
        Self::from_config(config, api_key)
    }

    fn from_config(config: OpenAIConfig, api_key: String) -> Self {
        Self {
            client: Client::with_config(config),
            api_key_for_logging: api_key,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_history: DEFAULT_MAX_HISTORY,
            store: Mutex::new(ConversationStore::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Bounds how many messages are kept in memory across all conversations.
    pub fn with_store_capacity(mut self, capacity: usize) -> Self {
        self.store = Mutex::new(ConversationStore::with_capacity(capacity));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn store(&self) -> std::sync::MutexGuard<'_, ConversationStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Prior messages for `continuation`, oldest first. Unknown tokens start a new conversation.
    fn prior_messages(&self, continuation: Option<&str>) -> Vec<StoredMessage> {
        let Some(token) = continuation else {
            return Vec::new();
        };
        let store = self.store();
        if !store.contains(token) {
            warn!(token = %token, "unknown continuation token, starting a new conversation");
            return Vec::new();
        }
        store.history(token, self.max_history)
    }

    fn build_request_messages(
        &self,
        history: &[StoredMessage],
        prompt: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);
        if let Some(system) = &self.system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()?
                    .into(),
            );
        }
        for message in history {
            let converted: ChatCompletionRequestMessage = match message.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()?
                    .into(),
            };
            messages.push(converted);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()?
                .into(),
        );
        Ok(messages)
    }

    /// Stores one exchange under `parent` and returns the new assistant message id.
    fn record_exchange(&self, parent: Option<String>, prompt: &str, reply: &str) -> String {
        let mut store = self.store();
        let user_id = store.append(Role::User, prompt, parent);
        store.append(Role::Assistant, reply, Some(user_id))
    }
}

#[async_trait]
impl ResponseEngine for ChatGptEngine {
    #[instrument(skip(self, prompt, continuation), fields(model = %self.model))]
    async fn complete(&self, prompt: &str, continuation: Option<String>) -> Result<EngineReply> {
        let history = self.prior_messages(continuation.as_deref());
        let parent = history.last().map(|m| m.id.clone());
        let messages = self.build_request_messages(&history, prompt)?;

        info!(
            message_count = messages.len(),
            api_key = %mask_token(&self.api_key_for_logging),
            "chat completion request"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .build()?;
        if let Ok(json) = serde_json::to_string(&request) {
            debug!(request_json = %json, "chat completion request JSON");
        }

        let response = self.client.chat().create(request).await?;
        if let Some(usage) = &response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }

        let text = response
            .choices
            .first()
            .map(|choice| choice.message.content.clone().unwrap_or_default())
            .ok_or_else(|| DispatchError::Engine("no choices in completion response".to_string()))?;

        let token = self.record_exchange(parent, prompt, &text);
        Ok(EngineReply::new(text, Some(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("sk-1234567890abcdef"), "sk-1234***cdef");
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("exactly11ch"), "***");
    }

    #[test]
    fn test_history_follows_parent_chain() {
        let mut store = ConversationStore::new();
        let q1 = store.append(Role::User, "q1", None);
        let a1 = store.append(Role::Assistant, "a1", Some(q1));
        let q2 = store.append(Role::User, "q2", Some(a1.clone()));
        let a2 = store.append(Role::Assistant, "a2", Some(q2));
        // A sibling branch from a1 must not leak into a2's history.
        let other = store.append(Role::User, "other", Some(a1));

        let contents: Vec<String> = store
            .history(&a2, 10)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(store.history(&other, 10).len(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = ConversationStore::new();
        let mut tip = None;
        for i in 0..10 {
            tip = Some(store.append(Role::User, format!("m{}", i), tip));
        }
        let tip = tip.unwrap();

        let history = store.history(&tip, 3);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m7", "m8", "m9"]);
        assert!(store.history("missing", 3).is_empty());
    }

    #[test]
    fn test_store_evicts_oldest_at_capacity() {
        let mut store = ConversationStore::with_capacity(4);
        let first = store.append(Role::User, "m0", None);
        let mut tip = first.clone();
        for i in 1..1000 {
            tip = store.append(Role::User, format!("m{}", i), Some(tip));
            assert!(store.len() <= 4);
        }

        assert_eq!(store.len(), 4);
        assert!(!store.contains(&first));
        let contents: Vec<String> = store.history(&tip, 10).into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["m996", "m997", "m998", "m999"]);
        assert_eq!(ConversationStore::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_engine_store_stays_bounded() {
        let engine = ChatGptEngine::new("sk-test-key-000000").with_store_capacity(100);
        let mut token = None;
        for i in 0..5_000 {
            token = Some(engine.record_exchange(token, &format!("q{}", i), "a"));
        }

        assert_eq!(engine.store().len(), 100);
        // The surviving tail of the chain is still usable as a continuation.
        let prior = engine.prior_messages(token.as_deref());
        assert_eq!(prior.len(), DEFAULT_MAX_HISTORY);
        assert_eq!(prior.last().map(|m| m.content.as_str()), Some("a"));
        assert_eq!(ConversationStore::new().capacity(), DEFAULT_STORE_CAPACITY);
    }

    #[test]
    fn test_exchange_continues_from_previous_token() {
        let engine = ChatGptEngine::new("sk-test-key-000000").with_max_history(4);
        let first = engine.record_exchange(None, "hello", "hi there");

        let prior = engine.prior_messages(Some(&first));
        assert_eq!(prior.len(), 2);
        assert_eq!(prior[0].role, Role::User);
        assert_eq!(prior[1].content, "hi there");

        let second = engine.record_exchange(prior.last().map(|m| m.id.clone()), "and?", "more");
        let prior = engine.prior_messages(Some(&second));
        let contents: Vec<&str> = prior.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi there", "and?", "more"]);

        assert!(engine.prior_messages(Some("unknown")).is_empty());
        assert!(engine.prior_messages(None).is_empty());
    }

    #[test]
    fn test_request_messages_layout() {
        let engine = ChatGptEngine::new("sk-test-key-000000").with_system_prompt("be brief");
        let first = engine.record_exchange(None, "hello", "hi");
        let history = engine.prior_messages(Some(&first));

        let messages = engine.build_request_messages(&history, "next").unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
        assert_eq!(engine.model(), DEFAULT_MODEL);
    }
}
