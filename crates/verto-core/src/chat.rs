use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::PhoneError;
use crate::events::{ChatMessage, EventEmitter, PhoneEvent};
use crate::session::SessionData;
use crate::signaling::DirectMessage;

/// Shared message store between the session event loop and ChatService.
pub type MessageStore = Arc<Mutex<Vec<ChatMessage>>>;

/// Kind tag the conference expects on plain chat lines.
const CONFERENCE_CHAT_KIND: &str = "message";

/// Conference and user-to-user chat.
pub struct ChatService {
    state: Arc<Mutex<SessionData>>,
    messages: MessageStore,
}

impl ChatService {
    pub(crate) fn new(state: Arc<Mutex<SessionData>>, messages: MessageStore) -> Self {
        Self { state, messages }
    }

    /// Send a line to the conference chat. The server echoes it back
    /// through the conference chat callback.
    pub async fn send_conference_chat(&self, message: &str) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let conf = data.conference.as_ref().ok_or_else(|| {
            tracing::debug!("there is no conference to chat with");
            PhoneError::NoConference
        })?;
        conf.send_chat(message, CONFERENCE_CHAT_KIND);
        Ok(())
    }

    /// Send a user-to-user message over the active call.
    pub async fn send_message(&self, body: &str) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let call = data.call.as_ref().ok_or(PhoneError::NoActiveCall)?;
        call.message(DirectMessage {
            to: data.chatting_with.clone(),
            body: body.to_string(),
            from_msg_name: data.credentials.display_name(),
            from_msg_number: data.credentials.cid.clone().unwrap_or_default(),
        });
        Ok(())
    }

    /// Get all messages in the current session.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    /// Clear all messages (on disconnect).
    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}

/// Record an incoming message and notify listeners.
pub(crate) async fn deliver(messages: &MessageStore, emitter: &EventEmitter, from: String, body: String) {
    let msg = ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        from,
        body,
        timestamp_ms: chrono::Utc::now().timestamp_millis().max(0) as u64,
    };
    messages.lock().await.push(msg.clone());
    emitter.emit(PhoneEvent::ChatNewMessage(msg));
}

/// Sender and body of an `info` signaling message.
pub(crate) fn parse_info_message(params: &Value) -> (String, String) {
    let from = params["from_msg_name"]
        .as_str()
        .or_else(|| params["from"].as_str())
        .unwrap_or_default()
        .to_string();
    let body = params["body"].as_str().unwrap_or_default().to_string();
    (from, body)
}

/// Sender and body of a conference chat payload.
pub(crate) fn parse_conference_chat(data: &Value) -> (String, String) {
    let from = data["fromDisplay"]
        .as_str()
        .or_else(|| data["from"].as_str())
        .unwrap_or("Unknown")
        .to_string();
    let body = data["message"].as_str().unwrap_or_default().to_string();
    (from, body)
}
