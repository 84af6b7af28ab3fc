//! In-memory stand-ins for the signaling library, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::devices::{DeviceInventory, MediaDevice};
use crate::errors::PhoneError;
use crate::events::{EventEmitter, PhoneEvent, PhoneEventListener};
use crate::lifecycle::{DialogInfo, DialogState};
use crate::signaling::{
    AnswerParams, CallHandle, CallParams, ClientConfig, ClientEvent, ConferenceHandle,
    ConferenceOptions, DeviceParams, DialogUpdate, DirectMessage, LiveArrayHandle,
    LiveArraySubscription, LoginData, ScreenConstraints, ScreenSourceResolver, SignalingClient,
    SignalingConnector, VideoParams,
};

/// Ordered record of every call made into the fakes.
#[derive(Clone, Default)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub(crate) fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

pub(crate) struct FakeCall {
    id: String,
    log: Log,
}

impl FakeCall {
    pub(crate) fn new(id: &str, log: Log) -> Self {
        Self {
            id: id.to_string(),
            log,
        }
    }
}

impl CallHandle for FakeCall {
    fn call_id(&self) -> String {
        self.id.clone()
    }

    fn hangup(&self) {
        self.log.push(format!("call:{}:hangup", self.id));
    }

    fn dtmf(&self, digits: &str) {
        self.log.push(format!("call:{}:dtmf:{digits}", self.id));
    }

    fn answer(&self, params: AnswerParams) {
        self.log
            .push(format!("call:{}:answer:{}", self.id, params.callee_id_number));
    }

    fn toggle_hold(&self) {
        self.log.push(format!("call:{}:hold", self.id));
    }

    fn message(&self, message: DirectMessage) {
        self.log.push(format!(
            "call:{}:message:{}:{}",
            self.id,
            message.to.unwrap_or_default(),
            message.body
        ));
    }
}

pub(crate) struct FakeConference {
    log: Log,
}

impl ConferenceHandle for FakeConference {
    fn list_video_layouts(&self) {
        self.log.push("conf:list_video_layouts");
    }

    fn send_chat(&self, message: &str, kind: &str) {
        self.log.push(format!("conf:chat:{kind}:{message}"));
    }

    fn destroy(&self) {
        self.log.push("conf:destroy");
    }

    fn play(&self, file: &str) {
        self.log.push(format!("conf:play:{file}"));
    }

    fn stop(&self) {
        self.log.push("conf:stop");
    }

    fn record(&self, file: &str) {
        self.log.push(format!("conf:record:{file}"));
    }

    fn stop_record(&self) {
        self.log.push("conf:stop_record");
    }

    fn snapshot(&self, file: &str) {
        self.log.push(format!("conf:snapshot:{file}"));
    }
}

pub(crate) struct FakeLiveArray {
    log: Log,
}

impl LiveArrayHandle for FakeLiveArray {
    fn destroy(&self) {
        self.log.push("live_array:destroy");
    }
}

pub(crate) struct FakeClient {
    log: Log,
    next_call: AtomicUsize,
    ready: AtomicBool,
    pub(crate) calls: Mutex<Vec<CallParams>>,
    pub(crate) video_params: Mutex<Option<VideoParams>>,
    pub(crate) device_params: Mutex<Option<DeviceParams>>,
}

impl FakeClient {
    pub(crate) fn new(log: Log) -> Self {
        Self {
            log,
            next_call: AtomicUsize::new(1),
            ready: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            video_params: Mutex::new(None),
            device_params: Mutex::new(None),
        }
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl SignalingClient for FakeClient {
    fn login(&self, data: LoginData) {
        self.log.push(format!("client:login:{}", data.login));
    }

    fn logout(&self) {
        self.log.push("client:logout");
    }

    fn socket_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn new_call(&self, params: CallParams) -> Result<Arc<dyn CallHandle>, PhoneError> {
        let n = self.next_call.fetch_add(1, Ordering::SeqCst);
        self.log
            .push(format!("client:new_call:{}", params.destination_number));
        self.calls.lock().unwrap().push(params);
        Ok(Arc::new(FakeCall::new(&format!("call-{n}"), self.log.clone())))
    }

    fn set_device_params(&self, params: DeviceParams) {
        *self.device_params.lock().unwrap() = Some(params);
    }

    fn set_video_params(&self, params: VideoParams) {
        self.log.push(format!(
            "client:video_params:{}x{}",
            params.max_width, params.max_height
        ));
        *self.video_params.lock().unwrap() = Some(params);
    }

    fn new_conference(&self, options: ConferenceOptions) -> Arc<dyn ConferenceHandle> {
        self.log.push(format!(
            "client:new_conference:{}:video={}",
            options.dialog_call_id.as_deref().unwrap_or("-"),
            options.has_video
        ));
        Arc::new(FakeConference {
            log: self.log.clone(),
        })
    }

    fn new_live_array(
        &self,
        channel: &str,
        name: &str,
        subscription: LiveArraySubscription,
    ) -> Arc<dyn LiveArrayHandle> {
        self.log.push(format!(
            "client:new_live_array:{channel}:{name}:{}",
            subscription.call_id.as_deref().unwrap_or("-")
        ));
        Arc::new(FakeLiveArray {
            log: self.log.clone(),
        })
    }
}

pub(crate) struct FakeConnector {
    pub(crate) client: Arc<FakeClient>,
    pub(crate) inventory: Mutex<DeviceInventory>,
    /// Login result reported right after connecting; `None` reports nothing.
    pub(crate) login_result: Mutex<Option<bool>>,
    pub(crate) configs: Mutex<Vec<ClientConfig>>,
    pub(crate) sender: Mutex<Option<mpsc::UnboundedSender<ClientEvent>>>,
}

impl FakeConnector {
    pub(crate) fn new(log: Log) -> Self {
        Self {
            client: Arc::new(FakeClient::new(log)),
            inventory: Mutex::new(DeviceInventory {
                video: vec![MediaDevice::new("cam-1", "Webcam")],
                audio_in: vec![MediaDevice::new("mic-1", "Headset")],
            }),
            login_result: Mutex::new(Some(true)),
            configs: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
        }
    }
}

impl SignalingConnector for FakeConnector {
    fn connect(
        &self,
        config: ClientConfig,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<Arc<dyn SignalingClient>, PhoneError> {
        self.configs.lock().unwrap().push(config);
        if let Some(success) = *self.login_result.lock().unwrap() {
            let _ = events.send(ClientEvent::Login { success });
        }
        *self.sender.lock().unwrap() = Some(events);
        Ok(self.client.clone())
    }

    fn enumerate_devices(&self) -> DeviceInventory {
        self.inventory.lock().unwrap().clone()
    }
}

pub(crate) struct FakeScreen {
    pub(crate) result: Result<ScreenConstraints, PhoneError>,
}

impl FakeScreen {
    pub(crate) fn ok() -> Self {
        Self {
            result: Ok(ScreenConstraints {
                source_id: "screen:0".to_string(),
                max_width: 1920,
                max_height: 1080,
                max_frame_rate: 5,
            }),
        }
    }
}

impl ScreenSourceResolver for FakeScreen {
    fn resolve(&self) -> BoxFuture<'static, Result<ScreenConstraints, PhoneError>> {
        Box::pin(futures_util::future::ready(self.result.clone()))
    }
}

/// Collects emitted events for assertions.
#[derive(Default)]
pub(crate) struct CaptureListener {
    events: Mutex<Vec<PhoneEvent>>,
}

impl CaptureListener {
    pub(crate) fn attach(emitter: &EventEmitter) -> Arc<Self> {
        let listener = Arc::new(Self::default());
        emitter.add_listener(listener.clone());
        listener
    }

    pub(crate) fn take(&self) -> Vec<PhoneEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl PhoneEventListener for CaptureListener {
    fn on_event(&self, event: PhoneEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) fn dialog_event(
    call: &Arc<FakeCall>,
    state: DialogState,
    last_state: DialogState,
    screen_share: bool,
) -> ClientEvent {
    ClientEvent::DialogState(DialogUpdate {
        dialog: call.clone(),
        info: DialogInfo {
            call_id: call.call_id(),
            state,
            last_state,
            caller_id_number: "1000".to_string(),
            screen_share,
            cause: None,
        },
    })
}
