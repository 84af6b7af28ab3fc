use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};

use crate::auth::{AuthService, Credentials};
use crate::chat::{self, ChatService, MessageStore};
use crate::conference::{self, ConferenceCommand, LIVE_ARRAY_JOIN, LIVE_ARRAY_PART};
use crate::controls::CallControls;
use crate::devices::DeviceLists;
use crate::errors::PhoneError;
use crate::events::{EventEmitter, Member, PhoneEvent, PhoneEventListener};
use crate::lifecycle::{self, CallState, DialogState, Effect};
use crate::members::MemberRoster;
use crate::preferences::PreferencesStore;
use crate::quality::{self, ResolutionCheck, VideoQuality};
use crate::signaling::{
    AnswerParams, AudioParams, CallHandle, CallParams, ClientConfig, ClientEvent,
    ConferenceHandle, DeviceParams, DialogUpdate, LiveArrayHandle, MessageKind,
    ScreenSourceResolver, SignalingClient, SignalingConnector, UserVariables,
};

const DEVICE_TAG: &str = "webcam";
const RING_FILE: &str = "sounds/bell_ring2.wav";

/// The session record. Only the session manager and its helpers mutate it.
pub(crate) struct SessionData {
    pub(crate) client: Option<Arc<dyn SignalingClient>>,
    pub(crate) connected: bool,
    pub(crate) credentials: Credentials,
    pub(crate) call: Option<Arc<dyn CallHandle>>,
    pub(crate) share_call: Option<Arc<dyn CallHandle>>,
    pub(crate) call_state: CallState,
    pub(crate) conference: Option<Arc<dyn ConferenceHandle>>,
    pub(crate) conf_layouts: Vec<String>,
    pub(crate) conf_role: Option<String>,
    pub(crate) chatting_with: Option<String>,
    pub(crate) live_array: Option<Arc<dyn LiveArrayHandle>>,
    pub(crate) members: MemberRoster,
    pub(crate) devices: DeviceLists,
    pub(crate) video_qualities: Vec<VideoQuality>,
    pub(crate) vid_qual: Option<String>,
    pub(crate) muted_mic: bool,
    pub(crate) muted_video: bool,
    login_waiter: Option<oneshot::Sender<bool>>,
}

impl SessionData {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            client: None,
            connected: false,
            credentials,
            call: None,
            share_call: None,
            call_state: CallState::Idle,
            conference: None,
            conf_layouts: Vec::new(),
            conf_role: None,
            chatting_with: None,
            live_array: None,
            members: MemberRoster::new(),
            devices: DeviceLists::default(),
            video_qualities: quality::VIDEO_QUALITIES.to_vec(),
            vid_qual: None,
            muted_mic: false,
            muted_video: false,
            login_waiter: None,
        }
    }

    fn connected_client(&self) -> Result<Arc<dyn SignalingClient>, PhoneError> {
        match &self.client {
            Some(client) if self.connected => Ok(client.clone()),
            _ => {
                tracing::debug!("not connected to the verto server");
                Err(PhoneError::NotConnected)
            }
        }
    }

    /// Forget the primary call and everything hanging off it.
    fn clean_call(&mut self) {
        self.call = None;
        self.call_state = CallState::Idle;
        self.conference = None;
        self.conf_layouts.clear();
        self.conf_role = None;
        self.chatting_with = None;
        self.members.clear();
    }
}

/// Read-only view of the session for UI layers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub login: String,
    pub name: Option<String>,
    pub hostname: String,
    pub socket_url: String,
    pub call_id: Option<String>,
    pub share_call_id: Option<String>,
    pub call_state: CallState,
    pub in_conference: bool,
    pub conf_layouts: Vec<String>,
    pub conf_role: Option<String>,
    pub chatting_with: Option<String>,
    pub members: Vec<Member>,
    pub devices: DeviceLists,
    pub video_qualities: Vec<VideoQuality>,
    pub vid_qual: Option<String>,
    pub muted_mic: bool,
    pub muted_video: bool,
}

/// Single point of contact with the signaling library.
///
/// Translates user intents into client calls, and client events into
/// [`PhoneEvent`]s. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    state: Arc<Mutex<SessionData>>,
    emitter: EventEmitter,
    prefs: Arc<PreferencesStore>,
    connector: Arc<dyn SignalingConnector>,
    screen: Arc<dyn ScreenSourceResolver>,
    messages: MessageStore,
}

impl SessionManager {
    pub fn new(
        hostname: &str,
        connector: Arc<dyn SignalingConnector>,
        screen: Arc<dyn ScreenSourceResolver>,
        prefs: Arc<PreferencesStore>,
    ) -> Self {
        let credentials = Credentials::from_preferences(hostname, &prefs.get());
        Self {
            state: Arc::new(Mutex::new(SessionData::new(credentials))),
            emitter: EventEmitter::new(),
            prefs,
            connector,
            screen,
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a listener for session events.
    pub fn add_listener(&self, listener: Arc<dyn PhoneEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub fn preferences(&self) -> Arc<PreferencesStore> {
        self.prefs.clone()
    }

    /// Create CallControls bound to this session.
    pub fn controls(&self) -> CallControls {
        CallControls::new(self.state.clone())
    }

    /// Create a ChatService bound to this session.
    pub fn chat(&self) -> ChatService {
        ChatService::new(self.state.clone(), self.messages.clone())
    }

    pub async fn credentials(&self) -> Credentials {
        self.state.lock().await.credentials.clone()
    }

    /// Validate and store the account used by the next `connect()`.
    /// The socket URL is stored in its normalized form.
    pub async fn set_credentials(&self, mut credentials: Credentials) -> Result<(), PhoneError> {
        credentials.login = AuthService::validate_extension(&credentials.login)?;
        credentials.socket_url = AuthService::parse_socket_url(&credentials.socket_url)?;
        self.state.lock().await.credentials = credentials;
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn has_call(&self) -> bool {
        self.state.lock().await.call.is_some()
    }

    pub async fn has_share_call(&self) -> bool {
        self.state.lock().await.share_call.is_some()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let data = self.state.lock().await;
        SessionSnapshot {
            connected: data.connected,
            login: data.credentials.login.clone(),
            name: data.credentials.name.clone(),
            hostname: data.credentials.hostname.clone(),
            socket_url: data.credentials.socket_url.clone(),
            call_id: data.call.as_ref().map(|c| c.call_id()),
            share_call_id: data.share_call.as_ref().map(|c| c.call_id()),
            call_state: data.call_state,
            in_conference: data.conference.is_some(),
            conf_layouts: data.conf_layouts.clone(),
            conf_role: data.conf_role.clone(),
            chatting_with: data.chatting_with.clone(),
            members: data.members.members().to_vec(),
            devices: data.devices.clone(),
            video_qualities: data.video_qualities.clone(),
            vid_qual: data.vid_qual.clone(),
            muted_mic: data.muted_mic,
            muted_video: data.muted_video,
        }
    }

    /// Connect to the verto server and log in.
    ///
    /// Resolves with the login result reported by the server. A client
    /// that goes away before reporting counts as a failed login.
    pub async fn connect(&self) -> Result<bool, PhoneError> {
        tracing::debug!("attempting to connect to verto");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut data = self.state.lock().await;
            AuthService::validate_extension(&data.credentials.login)?;
            AuthService::parse_socket_url(&data.credentials.socket_url)?;
            self.apply_device_refresh(&mut data);

            if let Some(previous) = data.client.take() {
                if previous.socket_ready() {
                    tracing::info!("replacing previous client");
                } else {
                    tracing::info!("previous client socket not ready, logging it out");
                    previous.logout();
                }
            }
            data.connected = false;

            let prefs = self.prefs.get();
            let config = ClientConfig {
                login: data.credentials.login_id(),
                password: data.credentials.password.clone(),
                socket_url: data.credentials.socket_url.clone(),
                tag: DEVICE_TAG.to_string(),
                ring_file: RING_FILE.to_string(),
                audio_params: AudioParams {
                    echo_cancellation: prefs.echo_cancellation,
                    noise_suppression: prefs.noise_suppression,
                    highpass_filter: prefs.highpass_filter,
                },
                use_stun: prefs.use_stun,
            };
            let client = self.connector.connect(config, events_tx)?;
            client.set_device_params(DeviceParams {
                use_camera: prefs.selected_video,
                use_mic: prefs.selected_audio,
            });
            data.client = Some(client);
            data.login_waiter = Some(done_tx);
        }

        let session = self.clone();
        tokio::spawn(async move {
            session.event_loop(events_rx).await;
        });

        let success = done_rx.await.unwrap_or(false);
        tracing::info!("connected to verto server: {success}");
        Ok(success)
    }

    /// Re-send the credentials on the existing client.
    pub async fn login(&self) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let client = data.client.as_ref().ok_or(PhoneError::NotConnected)?;
        client.login(data.credentials.login_data());
        Ok(())
    }

    /// Log out from the verto server.
    pub async fn disconnect(&self) {
        tracing::debug!("attempting to disconnect from verto");
        let mut data = self.state.lock().await;
        if let Some(client) = &data.client {
            client.logout();
        }
        data.connected = false;
        drop(data);
        self.messages.lock().await.clear();
        tracing::info!("disconnected from verto server");
    }

    /// Place an outbound call.
    pub async fn call(&self, destination: &str) -> Result<Arc<dyn CallHandle>, PhoneError> {
        tracing::debug!("attempting to call destination {destination}");
        let mut data = self.state.lock().await;
        let client = data.connected_client()?;
        let destination = destination.trim();
        if destination.is_empty() {
            tracing::debug!("no destination to call");
            return Err(PhoneError::MissingDestination);
        }

        let prefs = self.prefs.get();
        let call = client.new_call(CallParams {
            destination_number: destination.to_string(),
            caller_id_name: data.credentials.display_name(),
            caller_id_number: data.credentials.login.clone(),
            outgoing_bandwidth: Some(prefs.outgoing_bandwidth.clone()),
            incoming_bandwidth: Some(prefs.incoming_bandwidth.clone()),
            use_video: prefs.use_video,
            use_stereo: prefs.use_stereo,
            use_camera: prefs.selected_video.clone(),
            use_mic: prefs.selected_audio.clone(),
            ded_enc: prefs.use_dedenc,
            mirror_input: prefs.mirror_input,
            screen_share: false,
            video_params: None,
            user_variables: user_variables(prefs.email.as_deref()),
        })?;

        data.call = Some(call.clone());
        data.muted_mic = false;
        data.muted_video = false;
        self.apply_device_refresh(&mut data);
        Ok(call)
    }

    /// Start sharing the screen to `destination` on a second call leg.
    pub async fn screenshare(&self, destination: &str) -> Result<Arc<dyn CallHandle>, PhoneError> {
        tracing::debug!("attempting to share screen with {destination}");
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(PhoneError::MissingDestination);
        }
        let constraints = self.screen.resolve().await.inspect_err(|e| {
            tracing::warn!("screen source resolution failed: {e}");
        })?;

        let mut data = self.state.lock().await;
        let client = data.connected_client()?;
        let prefs = self.prefs.get();
        let name = data.credentials.display_name();
        let call = client.new_call(CallParams {
            destination_number: format!("{destination}-screen"),
            caller_id_name: format!("{name} (Screen)"),
            caller_id_number: format!("{} (Screen)", data.credentials.login),
            outgoing_bandwidth: Some(prefs.outgoing_bandwidth.clone()),
            incoming_bandwidth: Some(prefs.incoming_bandwidth.clone()),
            use_video: prefs.use_video,
            use_stereo: false,
            use_camera: None,
            use_mic: None,
            ded_enc: prefs.use_dedenc,
            mirror_input: prefs.mirror_input,
            screen_share: true,
            video_params: Some(constraints),
            user_variables: user_variables(prefs.email.as_deref()),
        })?;

        data.share_call = Some(call.clone());
        self.apply_device_refresh(&mut data);
        Ok(call)
    }

    pub async fn screenshare_hangup(&self) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let share = data.share_call.as_ref().ok_or_else(|| {
            tracing::debug!("there is no screen share to hang up");
            PhoneError::NoShareCall
        })?;
        share.hangup();
        tracing::debug!("screen share hung up");
        Ok(())
    }

    /// Hang up the active call. The call itself is released once the
    /// client reports the dialog destroyed.
    pub async fn hangup(&self) -> Result<(), PhoneError> {
        tracing::debug!("attempting to hang up the current call");
        let mut data = self.state.lock().await;
        let call = data.call.clone().ok_or_else(|| {
            tracing::debug!("there is no call to hang up");
            PhoneError::NoActiveCall
        })?;
        call.hangup();
        if let Some(conf) = data.conference.take() {
            conf.destroy();
        }
        tracing::debug!("the call was hung up");
        Ok(())
    }

    pub async fn dtmf(&self, digits: &str) -> Result<(), PhoneError> {
        self.controls().dtmf(digits).await
    }

    pub async fn mute_mic(&self) -> Result<bool, PhoneError> {
        self.controls().mute_mic().await
    }

    pub async fn mute_video(&self) -> Result<bool, PhoneError> {
        self.controls().mute_video().await
    }

    pub async fn toggle_hold(&self) -> Result<(), PhoneError> {
        self.controls().toggle_hold().await
    }

    pub async fn answer(&self, params: AnswerParams) -> Result<(), PhoneError> {
        self.controls().answer(params).await
    }

    pub async fn send_conference_chat(&self, message: &str) -> Result<(), PhoneError> {
        self.chat().send_conference_chat(message).await
    }

    pub async fn send_message(&self, body: &str) -> Result<(), PhoneError> {
        self.chat().send_message(body).await
    }

    pub async fn conference_command(&self, command: ConferenceCommand) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let conf = data.conference.as_ref().ok_or(PhoneError::NoConference)?;
        tracing::info!("conference command {command:?}");
        command.apply(conf.as_ref());
        Ok(())
    }

    /// Re-enumerate media devices.
    pub async fn refresh_devices(&self) {
        let mut data = self.state.lock().await;
        self.apply_device_refresh(&mut data);
    }

    /// Apply a camera resolution probe.
    pub async fn refresh_video_resolution(&self, check: ResolutionCheck) {
        let mut data = self.state.lock().await;
        self.apply_video_resolution(&mut data, &check);
    }

    fn apply_device_refresh(&self, data: &mut SessionData) {
        let inventory = self.connector.enumerate_devices();
        data.devices = DeviceLists::from_inventory(&inventory);

        let prefs = self.prefs.get();
        let first_video = inventory.video.first().map(|d| d.id.clone());
        let first_audio = inventory.audio_in.first().map(|d| d.id.clone());
        let pick_video = prefs.selected_video.is_none() && first_video.is_some();
        let pick_audio = prefs.selected_audio.is_none() && first_audio.is_some();
        if pick_video || pick_audio {
            self.prefs.update(|p| {
                if pick_video {
                    p.selected_video = first_video;
                }
                if pick_audio {
                    p.selected_audio = first_audio;
                }
            });
        }
        tracing::debug!(
            "devices refreshed: {} cameras, {} microphones",
            inventory.video.len(),
            inventory.audio_in.len()
        );
    }

    fn apply_video_resolution(&self, data: &mut SessionData, check: &ResolutionCheck) {
        let Some(client) = data.client.clone() else {
            tracing::debug!("there is no verto client to configure");
            return;
        };
        let (width, height) = quality::capped_resolution(check.best);

        data.video_qualities = quality::supported_qualities(&check.valid);
        data.vid_qual = data.video_qualities.last().map(|q| q.id.to_string());
        client.set_video_params(quality::video_params(width, height));

        let matching = data
            .video_qualities
            .iter()
            .find(|q| q.width == width && q.height == height)
            .map(|q| q.id.to_string());
        if let Some(id) = matching {
            if self.prefs.get().vid_qual.as_deref() != Some(id.as_str()) {
                self.prefs.update(|p| p.vid_qual = Some(id));
            }
        }
    }

    async fn event_loop(self, mut events: mpsc::UnboundedReceiver<ClientEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_client_event(event).await;
        }
        tracing::info!("signaling event loop ended");
    }

    /// Apply one client event. The session lock is held for the whole
    /// event so a teardown never interleaves with a setup.
    pub(crate) async fn handle_client_event(&self, event: ClientEvent) {
        let mut data = self.state.lock().await;
        match event {
            ClientEvent::Login { success } => {
                data.connected = success;
                tracing::debug!("connected to verto server: {success}");
                if let Some(waiter) = data.login_waiter.take() {
                    let _ = waiter.send(success);
                }
            }

            ClientEvent::Message {
                dialog_call_id,
                kind,
                params,
            } => match kind {
                MessageKind::PvtEvent => {
                    let Some(pvt) = params.get("pvtData") else {
                        return;
                    };
                    match pvt["action"].as_str() {
                        Some(LIVE_ARRAY_JOIN) => {
                            let has_video = self.prefs.get().use_video;
                            conference::start_conference(
                                &mut data,
                                &self.emitter,
                                has_video,
                                dialog_call_id,
                                pvt,
                            );
                        }
                        Some(LIVE_ARRAY_PART) => {
                            conference::stop_conference(&mut data, &self.emitter);
                        }
                        other => tracing::debug!("unhandled private event {other:?}"),
                    }
                }
                MessageKind::Info => {
                    let (from, body) = chat::parse_info_message(&params);
                    chat::deliver(&self.messages, &self.emitter, from, body).await;
                }
                other => tracing::debug!("ignoring {other:?} message"),
            },

            ClientEvent::DialogState(update) => {
                self.handle_dialog_state(&mut data, update);
            }

            ClientEvent::WsClose { success } => {
                tracing::debug!("websocket closed: {success}");
            }

            ClientEvent::Event(event) => {
                tracing::debug!("client event: {event}");
            }

            ClientEvent::ConferenceChat(payload) => {
                let (from, body) = chat::parse_conference_chat(&payload);
                chat::deliver(&self.messages, &self.emitter, from, body).await;
            }

            ClientEvent::ConferenceBroadcast(message) => {
                conference::handle_broadcast(&mut data, &self.emitter, message);
            }

            ClientEvent::LiveArrayChange(change) => {
                conference::handle_live_array_change(&mut data, &self.emitter, change);
            }

            ClientEvent::LiveArrayError(error) => {
                tracing::warn!("live array error: {error}");
            }

            ClientEvent::ResolutionCheck(check) => {
                self.apply_video_resolution(&mut data, &check);
            }
        }
    }

    fn handle_dialog_state(&self, data: &mut SessionData, update: DialogUpdate) {
        let info = &update.info;
        tracing::debug!(
            "dialog {} state {} (was {}){}",
            info.call_id,
            info.state,
            info.last_state,
            info.cause.as_deref().map(|c| format!(", cause {c}")).unwrap_or_default()
        );

        if !info.screen_share {
            if let Some(current) = &data.call {
                let current_id = current.call_id();
                if current_id != info.call_id {
                    if info.state == DialogState::Ringing {
                        tracing::info!(
                            "rejecting call {} from {} while {} is active",
                            info.call_id,
                            info.caller_id_number,
                            current_id
                        );
                        update.dialog.hangup();
                    } else {
                        tracing::debug!(
                            "ignoring dialog {} while {} is the active call",
                            info.call_id,
                            current_id
                        );
                    }
                    return;
                }
            }
        }

        let transition = lifecycle::transition(data.call.is_some(), info);
        if let Some(call_state) = transition.call_state {
            data.call_state = call_state;
        }

        for effect in transition.effects {
            match effect {
                Effect::AdoptCall => data.call = Some(update.dialog.clone()),
                Effect::EnterCallScreen => self.emitter.emit(PhoneEvent::PageInCall),
                Effect::Incoming { caller_id } => {
                    tracing::info!("incoming call from {caller_id}");
                    self.emitter.emit(PhoneEvent::CallIncoming { caller_id });
                }
                Effect::Calling => self.emitter.emit(PhoneEvent::CallCalling),
                Effect::Active { previous_state } => {
                    self.emitter.emit(PhoneEvent::CallActive { previous_state });
                }
                Effect::DestroyShareCall => {
                    data.share_call = None;
                    self.apply_device_refresh(data);
                    tracing::info!("screen share ended");
                }
                Effect::DestroyCall => {
                    conference::teardown(data);
                    data.clean_call();
                    tracing::info!("call {} destroyed", info.call_id);
                    self.emitter.emit(PhoneEvent::CallHangup);
                }
            }
        }
    }
}

fn user_variables(email: Option<&str>) -> UserVariables {
    UserVariables {
        email: email.map(str::to_string),
        avatar: email.map(|e| {
            let digest = md5::compute(e.trim().to_lowercase());
            format!("http://gravatar.com/avatar/{digest:x}.png?s=600")
        }),
    }
}
