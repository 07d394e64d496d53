// ABOUTME: Chat route handlers for the knowledge-base grounded assistant
// ABOUTME: Streams completions over SSE and manages chat reads, sharing, and deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

//! Chat routes
//!
//! `POST /api/chat` persists the latest user turn, retrieves knowledge base
//! context, and relays the streamed completion as server-sent events. The
//! relay runs in its own task so a client disconnect never loses the reply.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants::completion::{
    FALLBACK_TITLE, STREAM_ERROR_MESSAGE, TITLE_MAX_TOKENS, TITLE_TEMPERATURE,
};
use crate::constants::routes::CHAT;
use crate::database::{ChatManager, NewMessage};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::llm::prompts::TITLE_SYSTEM_PROMPT;
use crate::llm::{build_system_prompt, normalize_title, ChatMessage, ChatRequest, ChatStream};
use crate::middleware::{authenticate_optional, authenticate_request};
use crate::models::{text_parts, Chat, Message, MessageRole, Visibility};
use crate::resources::ServerResources;
use crate::routes::ApiJson;

/// Buffered SSE events per in-flight reply
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Request/Response Types
// ============================================================================

/// A message as sent by the web client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    /// Client-generated message ID
    #[serde(default)]
    pub id: Option<String>,
    /// Role as sent by the client; unknown roles are treated as user turns
    pub role: String,
    /// Text content; anything other than a string counts as empty
    #[serde(default)]
    pub content: Value,
    /// Structured content parts
    #[serde(default)]
    pub parts: Option<Value>,
    /// File attachments
    #[serde(default, alias = "experimental_attachments")]
    pub attachments: Option<Value>,
}

impl ClientMessage {
    fn text(&self) -> &str {
        self.content.as_str().unwrap_or_default()
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct PostChatRequest {
    /// Chat ID, chosen by the client for new chats
    pub id: String,
    /// Conversation so far, oldest first
    pub messages: Vec<ClientMessage>,
}

/// Query of `DELETE /api/chat`
#[derive(Debug, Deserialize)]
pub struct DeleteChatQuery {
    /// Chat to delete
    pub id: Option<String>,
}

/// Body of `PATCH /api/chat/:id/visibility`
#[derive(Debug, Deserialize)]
pub struct UpdateVisibilityRequest {
    /// `private` or `public`
    pub visibility: String,
}

/// Chat with its messages
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatWithMessages {
    /// Chat metadata
    pub chat: Chat,
    /// Messages, oldest first
    pub messages: Vec<Message>,
}

/// Result of a trailing message deletion
#[derive(Debug, Serialize, Deserialize)]
pub struct TrailingDeleteResponse {
    /// Always `true` on success
    pub success: bool,
    /// Number of messages removed
    pub deleted: u64,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(CHAT, post(Self::post_chat).delete(Self::delete_chat))
            .route("/api/chat/:chat_id", get(Self::get_chat))
            .route("/api/chat/:chat_id/visibility", patch(Self::update_visibility))
            .route(
                "/api/messages/:message_id/trailing",
                delete(Self::delete_trailing_messages),
            )
            .with_state(resources)
    }

    /// Generate a chat title from the first user message
    ///
    /// Never fails: any provider error or empty result yields the fallback title.
    async fn generate_title(resources: &ServerResources, text: &str) -> String {
        let request = ChatRequest::new(vec![
            ChatMessage::system(TITLE_SYSTEM_PROMPT),
            ChatMessage::user(text),
        ])
        .with_model(&resources.chat.title_model)
        .with_temperature(TITLE_TEMPERATURE)
        .with_max_tokens(TITLE_MAX_TOKENS);

        match resources.llm.complete(&request).await {
            Ok(response) => normalize_title(&response.content),
            Err(e) => {
                warn!(error = %e, "Title generation failed");
                FALLBACK_TITLE.to_owned()
            }
        }
    }

    /// System prompt followed by the last `window` client messages
    fn build_llm_messages(
        system_prompt: String,
        history: &[ClientMessage],
        window: usize,
    ) -> Vec<ChatMessage> {
        let start = history.len().saturating_sub(window);
        let mut messages = Vec::with_capacity(history.len() - start + 1);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(
            history[start..]
                .iter()
                .map(|m| ChatMessage::new(MessageRole::from_client_role(&m.role), m.text())),
        );
        messages
    }

    /// Load a chat the caller owns
    async fn owned_chat(chats: &ChatManager, chat_id: &str, user_id: &str) -> AppResult<Chat> {
        let chat = chats
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))?;
        if !chat.is_owned_by(user_id) {
            return Err(AppError::permission_denied(
                "You do not have permission to access this chat",
            ));
        }
        Ok(chat)
    }

    /// Relay a chat turn through retrieval and the completion provider
    async fn post_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        ApiJson(request): ApiJson<PostChatRequest>,
    ) -> Result<Response, AppError> {
        let auth = authenticate_request(&resources.auth_manager, &headers)?;

        let user_message = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User.as_str())
            .ok_or_else(|| AppError::invalid_input("No user message found"))?;
        let query = user_message.text();

        let chats = resources.database.chats();
        match chats.get_chat(&request.id).await? {
            Some(chat) if !chat.is_owned_by(&auth.user_id) => {
                return Err(AppError::permission_denied(
                    "You do not have permission to access this chat",
                ));
            }
            Some(_) => {}
            None => {
                let title = Self::generate_title(&resources, query).await;
                chats
                    .save_chat(&request.id, &auth.user_id, auth.email.as_deref(), &title)
                    .await?;
                info!(chat_id = %request.id, user_id = %auth.user_id, title = %title, "Created chat");
            }
        }

        let user_message_id = user_message
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let parts = user_message
            .parts
            .clone()
            .filter(Value::is_array)
            .unwrap_or_else(|| text_parts(query));
        let attachments = user_message
            .attachments
            .clone()
            .filter(Value::is_array)
            .unwrap_or_else(|| json!([]));
        chats
            .save_message(&NewMessage {
                id: &user_message_id,
                chat_id: &request.id,
                role: MessageRole::User,
                content: query,
                parts: &parts,
                attachments: &attachments,
            })
            .await?;

        let context = resources.retriever.retrieve_context(query).await;
        let llm_request = ChatRequest::new(Self::build_llm_messages(
            build_system_prompt(&context),
            &request.messages,
            resources.chat.history_window,
        ))
        .with_model(&resources.chat.chat_model)
        .with_temperature(resources.chat.temperature)
        .with_streaming();

        let upstream = resources.llm.complete_stream(&llm_request).await?;

        let assistant_id = Uuid::new_v4().to_string();
        info!(
            chat_id = %request.id,
            user_id = %auth.user_id,
            message_id = %assistant_id,
            context_chars = context.len(),
            "Streaming assistant reply"
        );

        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let relay = ReplyRelay {
            events: EventSink::new(sender),
            chats,
            chat_id: request.id,
            message_id: assistant_id,
        };
        tokio::spawn(relay.run(upstream));

        Ok(Sse::new(ReceiverStream::new(receiver))
            .keep_alive(KeepAlive::default())
            .into_response())
    }

    /// Delete a chat owned by the caller
    async fn delete_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<DeleteChatQuery>,
    ) -> Result<Response, AppError> {
        let chat_id = query
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::new(ErrorCode::ResourceNotFound, "Chat ID is required"))?;

        let auth = authenticate_request(&resources.auth_manager, &headers)?;
        let chats = resources.database.chats();

        let owned = chats
            .get_chat(&chat_id)
            .await?
            .is_some_and(|chat| chat.is_owned_by(&auth.user_id));
        if !owned {
            return Err(AppError::permission_denied(
                "You do not have permission to delete this chat",
            ));
        }

        chats.delete_chat(&chat_id).await?;
        info!(chat_id = %chat_id, user_id = %auth.user_id, "Deleted chat");

        Ok(Json(json!({
            "success": true,
            "message": "Chat deleted successfully",
        }))
        .into_response())
    }

    /// Read a chat with its messages
    async fn get_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<String>,
    ) -> Result<Json<ChatWithMessages>, AppError> {
        let caller = authenticate_optional(&resources.auth_manager, &headers);
        let chats = resources.database.chats();

        let chat = chats
            .get_chat(&chat_id)
            .await?
            .filter(|chat| chat.is_readable_by(caller.as_ref().map(|a| a.user_id.as_str())))
            .ok_or_else(|| AppError::not_found("Chat"))?;
        let messages = chats.get_messages(&chat.id).await?;

        Ok(Json(ChatWithMessages { chat, messages }))
    }

    /// Change who can read a chat
    async fn update_visibility(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<String>,
        ApiJson(request): ApiJson<UpdateVisibilityRequest>,
    ) -> Result<Json<Chat>, AppError> {
        let auth = authenticate_request(&resources.auth_manager, &headers)?;
        let visibility: Visibility = request.visibility.parse()?;

        let chats = resources.database.chats();
        let mut chat = Self::owned_chat(&chats, &chat_id, &auth.user_id).await?;
        chats.update_visibility(&chat.id, visibility).await?;
        debug!(chat_id = %chat.id, %visibility, "Updated chat visibility");

        chat.visibility = visibility;
        Ok(Json(chat))
    }

    /// Delete a message and everything after it in its chat
    async fn delete_trailing_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(message_id): Path<String>,
    ) -> Result<Json<TrailingDeleteResponse>, AppError> {
        let auth = authenticate_request(&resources.auth_manager, &headers)?;
        let chats = resources.database.chats();

        let message = chats
            .get_message_by_id(&message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Message"))?;
        Self::owned_chat(&chats, &message.chat_id, &auth.user_id).await?;

        let deleted = chats
            .delete_messages_after(&message.chat_id, &message.created_at)
            .await?;
        info!(chat_id = %message.chat_id, deleted, "Deleted trailing messages");

        Ok(Json(TrailingDeleteResponse {
            success: true,
            deleted,
        }))
    }
}

// ============================================================================
// Streaming Relay
// ============================================================================

/// Sends SSE events until the client goes away, then drops them silently
struct EventSink {
    sender: mpsc::Sender<Result<Event, Infallible>>,
    connected: bool,
}

impl EventSink {
    const fn new(sender: mpsc::Sender<Result<Event, Infallible>>) -> Self {
        Self {
            sender,
            connected: true,
        }
    }

    async fn send(&mut self, name: &'static str, data: &Value) {
        if !self.connected {
            return;
        }
        let event = Event::default().event(name).data(data.to_string());
        if self.sender.send(Ok(event)).await.is_err() {
            debug!("Client disconnected, continuing without forwarding events");
            self.connected = false;
        }
    }
}

/// Drives one assistant reply from the upstream stream to the client and database
struct ReplyRelay {
    events: EventSink,
    chats: ChatManager,
    chat_id: String,
    message_id: String,
}

impl ReplyRelay {
    fn message_event(&self, content: &str) -> Value {
        json!({
            "id": self.message_id,
            "role": MessageRole::Assistant.as_str(),
            "content": content,
            "createdAt": chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn run(mut self, mut upstream: ChatStream) {
        self.events
            .send("id", &json!({ "id": self.message_id }))
            .await;
        let initial = self.message_event("");
        self.events.send("message", &initial).await;

        let mut content = String::new();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(chunk) if chunk.delta.is_empty() => {}
                Ok(chunk) => {
                    content.push_str(&chunk.delta);
                    let delta = json!({
                        "type": "text-delta",
                        "textDelta": chunk.delta,
                        "id": self.message_id,
                    });
                    self.events.send("text-delta", &delta).await;
                }
                Err(e) => {
                    error!(chat_id = %self.chat_id, error = %e, "Completion stream failed");
                    self.events
                        .send("error", &json!({ "message": STREAM_ERROR_MESSAGE }))
                        .await;
                    return;
                }
            }
        }

        if !content.is_empty() {
            self.persist(&content).await;
        }

        let last = self.message_event(&content);
        self.events.send("message", &last).await;
        self.events.send("done", &json!({})).await;
    }

    async fn persist(&self, content: &str) {
        let parts = text_parts(content);
        let attachments = json!([]);
        let saved = self
            .chats
            .save_message(&NewMessage {
                id: &self.message_id,
                chat_id: &self.chat_id,
                role: MessageRole::Assistant,
                content,
                parts: &parts,
                attachments: &attachments,
            })
            .await;

        match saved {
            Ok(_) => debug!(chat_id = %self.chat_id, chars = content.len(), "Saved assistant reply"),
            Err(e) => error!(chat_id = %self.chat_id, error = %e, "Failed to save assistant reply"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(role: &str, content: &str) -> ClientMessage {
        ClientMessage {
            id: None,
            role: role.to_owned(),
            content: Value::String(content.to_owned()),
            parts: None,
            attachments: None,
        }
    }

    #[test]
    fn test_history_window_keeps_latest_messages() {
        let history: Vec<ClientMessage> = (0..10)
            .map(|i| client(if i % 2 == 0 { "user" } else { "assistant" }, &i.to_string()))
            .collect();

        let messages = ChatRoutes::build_llm_messages("prompt".to_owned(), &history, 6);
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "4");
        assert_eq!(messages[6].content, "9");
    }

    #[test]
    fn test_unknown_roles_sent_as_user() {
        let history = vec![client("data", "x"), client("tool", "y")];
        let messages = ChatRoutes::build_llm_messages(String::new(), &history, 6);
        assert!(messages[1..].iter().all(|m| m.role == MessageRole::User));
    }

    #[test]
    fn test_non_string_content_is_empty() {
        let message: ClientMessage =
            serde_json::from_value(json!({"role": "user", "content": [1, 2]})).unwrap();
        assert_eq!(message.text(), "");
    }

    #[test]
    fn test_experimental_attachments_alias() {
        let message: ClientMessage = serde_json::from_value(json!({
            "role": "user",
            "content": "see file",
            "experimental_attachments": [{"url": "https://files.example/x.pdf"}]
        }))
        .unwrap();
        assert!(message.attachments.is_some_and(|a| a.is_array()));
    }
}
