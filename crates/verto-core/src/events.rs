use std::sync::Arc;

use tokio::sync::mpsc;

use crate::lifecycle::DialogState;

/// Events emitted by the core to UI listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PhoneEvent {
    /// A conference with video was joined.
    CallVideo,
    /// The primary call was destroyed.
    CallHangup,
    /// The UI should switch to the in-call view.
    PageInCall,
    /// The call reached the active state.
    CallActive { previous_state: DialogState },
    /// An outbound call received early media.
    CallCalling,
    /// An inbound call is ringing.
    CallIncoming { caller_id: String },
    ChatNewMessage(ChatMessage),
    ConferenceBroadcast(serde_json::Value),
    MembersBoot(Vec<Member>),
    MembersAdd(Member),
    MembersDel(String), // call id
    MembersClear,
    MembersUpdate(Member),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub from: String,
    pub body: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Live array key: the member's call id.
    pub call_id: String,
    pub member_id: String,
    pub number: String,
    pub name: String,
    pub email: Option<String>,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberStatus {
    pub audio_muted: bool,
    pub talking: bool,
    pub video_muted: bool,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait PhoneEventListener: Send + Sync {
    fn on_event(&self, event: PhoneEvent);
}

/// Listener that forwards every event into an unbounded channel.
///
/// Lets async consumers such as the call controller process events in
/// order on their own task.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<PhoneEvent>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PhoneEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl PhoneEventListener for ChannelListener {
    fn on_event(&self, event: PhoneEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event channel closed, dropping event");
        }
    }
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn PhoneEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn PhoneEventListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    pub fn emit(&self, event: PhoneEvent) {
        tracing::debug!("emit {event:?}");
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
