//! Contracts of the external Verto signaling library.
//!
//! The library owns SDP, ICE, the JSON-RPC websocket and media capture.
//! Calls into it return immediately; everything it reports back arrives
//! later as a [`ClientEvent`] on the channel handed to
//! [`SignalingConnector::connect`].

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::devices::DeviceInventory;
use crate::errors::PhoneError;
use crate::lifecycle::DialogInfo;
use crate::quality::ResolutionCheck;

/// Parameters used to construct a signaling client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// `extension@hostname`
    pub login: String,
    pub password: String,
    pub socket_url: String,
    /// Id of the element the remote video is rendered into.
    pub tag: String,
    pub ring_file: String,
    pub audio_params: AudioParams,
    pub use_stun: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioParams {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub highpass_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginData {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceParams {
    pub use_camera: Option<String>,
    pub use_mic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub min_frame_rate: u32,
    pub best_frame_rate: u32,
}

/// Video constraints of a resolved screen-capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConstraints {
    pub source_id: String,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserVariables {
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Parameters of an outbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParams {
    pub destination_number: String,
    pub caller_id_name: String,
    pub caller_id_number: String,
    pub outgoing_bandwidth: Option<String>,
    pub incoming_bandwidth: Option<String>,
    pub use_video: bool,
    pub use_stereo: bool,
    pub use_camera: Option<String>,
    pub use_mic: Option<String>,
    pub ded_enc: bool,
    pub mirror_input: bool,
    pub screen_share: bool,
    pub video_params: Option<ScreenConstraints>,
    pub user_variables: UserVariables,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerParams {
    pub use_stereo: bool,
    pub use_camera: Option<String>,
    pub use_mic: Option<String>,
    pub callee_id_name: String,
    pub callee_id_number: String,
}

/// User-to-user chat message carried over the call's dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub to: Option<String>,
    pub body: String,
    pub from_msg_name: String,
    pub from_msg_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConferenceOptions {
    pub dialog_call_id: Option<String>,
    pub has_video: bool,
    /// Private event payload the conference was announced with.
    pub live_array_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveArraySubscription {
    pub call_id: Option<String>,
}

/// Constructs signaling clients and enumerates local media devices.
pub trait SignalingConnector: Send + Sync {
    fn connect(
        &self,
        config: ClientConfig,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Arc<dyn SignalingClient>, PhoneError>;

    fn enumerate_devices(&self) -> DeviceInventory;
}

pub trait SignalingClient: Send + Sync {
    fn login(&self, data: LoginData);
    fn logout(&self);
    fn socket_ready(&self) -> bool;
    fn new_call(&self, params: CallParams) -> Result<Arc<dyn CallHandle>, PhoneError>;
    fn set_device_params(&self, params: DeviceParams);
    fn set_video_params(&self, params: VideoParams);
    fn new_conference(&self, options: ConferenceOptions) -> Arc<dyn ConferenceHandle>;
    fn new_live_array(
        &self,
        channel: &str,
        name: &str,
        subscription: LiveArraySubscription,
    ) -> Arc<dyn LiveArrayHandle>;
}

pub trait CallHandle: Send + Sync {
    fn call_id(&self) -> String;
    fn hangup(&self);
    fn dtmf(&self, digits: &str);
    fn answer(&self, params: AnswerParams);
    fn toggle_hold(&self);
    fn message(&self, message: DirectMessage);
}

pub trait ConferenceHandle: Send + Sync {
    fn list_video_layouts(&self);
    fn send_chat(&self, message: &str, kind: &str);
    fn destroy(&self);
    fn play(&self, file: &str);
    fn stop(&self);
    fn record(&self, file: &str);
    fn stop_record(&self);
    fn snapshot(&self, file: &str);
}

pub trait LiveArrayHandle: Send + Sync {
    fn destroy(&self);
}

/// Resolves the screen-capture source for a screen-share call.
pub trait ScreenSourceResolver: Send + Sync {
    fn resolve(&self) -> BoxFuture<'static, Result<ScreenConstraints, PhoneError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Display,
    Info,
    PvtEvent,
    ClientReady,
}

/// Dialog-state notification together with the dialog it concerns.
#[derive(Clone)]
pub struct DialogUpdate {
    pub dialog: Arc<dyn CallHandle>,
    pub info: DialogInfo,
}

impl fmt::Debug for DialogUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogUpdate")
            .field("dialog", &self.dialog.call_id())
            .field("info", &self.info)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveArrayChange {
    pub action: String,
    pub key: Option<String>,
    pub data: serde_json::Value,
}

/// Everything the signaling library reports back.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Login { success: bool },
    Message {
        dialog_call_id: Option<String>,
        kind: MessageKind,
        params: serde_json::Value,
    },
    DialogState(DialogUpdate),
    WsClose { success: bool },
    Event(serde_json::Value),
    /// Chat callback of the active conference (`e.data` payload).
    ConferenceChat(serde_json::Value),
    ConferenceBroadcast(serde_json::Value),
    LiveArrayChange(LiveArrayChange),
    LiveArrayError(String),
    ResolutionCheck(ResolutionCheck),
}
