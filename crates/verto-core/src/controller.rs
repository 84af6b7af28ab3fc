//! UI-facing call lifecycle controller.
//!
//! Listens to [`PhoneEvent`]s and keeps preferences, call history and the
//! visible screen in step with the call. Anything that needs the user's
//! answer runs on its own task so the event stream keeps flowing.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::PhoneError;
use crate::events::{ChannelListener, PhoneEvent};
use crate::history::{CallDirection, CallHistory};
use crate::preferences::UserStatus;
use crate::session::SessionManager;
use crate::signaling::AnswerParams;

/// Screens the shell can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Dialpad,
    InCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// What the controller needs from the native UI.
pub trait UiShell: Send + Sync {
    /// Ask a yes/no question. Resolves `true` when the user accepts.
    fn confirm(&self, title: &str, message: &str) -> BoxFuture<'static, bool>;
    fn notify(&self, level: NoticeLevel, title: &str, message: &str);
    fn navigate(&self, view: View);
}

#[derive(Debug, Default)]
struct UiState {
    dialpad: String,
    chat_open: bool,
    unread: usize,
    incoming_call: bool,
    start_time: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CallController {
    session: SessionManager,
    ui: Arc<dyn UiShell>,
    history: Arc<CallHistory>,
    state: Arc<Mutex<UiState>>,
    prompts: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CallController {
    pub fn new(session: SessionManager, ui: Arc<dyn UiShell>) -> Self {
        Self::with_history(session, ui, Arc::new(CallHistory::new()))
    }

    /// Controller recording into the given history, e.g. one from
    /// [`CallHistory::persistent`].
    pub fn with_history(
        session: SessionManager,
        ui: Arc<dyn UiShell>,
        history: Arc<CallHistory>,
    ) -> Self {
        Self {
            session,
            ui,
            history,
            state: Arc::new(Mutex::new(UiState::default())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn ui_state(&self) -> MutexGuard<'_, UiState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn history(&self) -> Arc<CallHistory> {
        self.history.clone()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Subscribe to the session and process its events on a new task.
    pub fn attach(&self) -> JoinHandle<()> {
        let (listener, events) = ChannelListener::new();
        self.session.add_listener(listener);
        let controller = self.clone();
        tokio::spawn(async move { controller.run(events).await })
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<PhoneEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("controller event stream closed");
    }

    /// Wait for every prompt started so far to be answered.
    pub async fn wait_prompts(&self) {
        loop {
            let pending = std::mem::take(&mut *self.prompts.lock().unwrap_or_else(|e| e.into_inner()));
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::warn!("prompt task failed: {e}");
                }
            }
        }
    }

    fn spawn_prompt(&self, task: impl Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    pub async fn handle_event(&self, event: PhoneEvent) {
        let prefs = self.session.preferences();
        match event {
            PhoneEvent::CallVideo => {
                prefs.update(|p| p.video_call = true);
            }

            PhoneEvent::CallHangup => {
                {
                    let mut ui = self.ui_state();
                    ui.chat_open = false;
                    ui.dialpad.clear();
                    ui.incoming_call = false;
                    ui.start_time = None;
                }
                tracing::debug!("call ended, back to the dialpad");
                self.ui.navigate(View::Dialpad);
            }

            PhoneEvent::PageInCall => {
                if !prefs.get().ask_recover_call {
                    self.ui.navigate(View::InCall);
                    return;
                }
                let controller = self.clone();
                let answer = self.ui.confirm(
                    "Oops, Active Call in Course.",
                    "It seems you were in a call before leaving the last time. Wanna go back to that?",
                );
                self.spawn_prompt(async move {
                    if answer.await {
                        controller.ui.navigate(View::InCall);
                    } else {
                        controller
                            .session
                            .preferences()
                            .update(|p| p.user_status = Some(UserStatus::Connecting));
                        if let Err(e) = controller.session.hangup().await {
                            tracing::debug!("nothing to recover: {e}");
                        }
                    }
                });
            }

            PhoneEvent::CallActive { previous_state } => {
                tracing::debug!("call active (was {previous_state})");
                let saved = prefs.get();
                self.session
                    .controls()
                    .set_muted(saved.muted_mic, saved.muted_video)
                    .await;
                let start = prefs.update(|p| {
                    if !p.cur_call {
                        p.call_start = Some(Utc::now());
                    }
                    p.user_status = Some(UserStatus::Connected);
                    p.calling = false;
                    p.cur_call = true;
                    p.call_start
                });
                self.ui_state().start_time = start;
            }

            PhoneEvent::CallCalling => {
                prefs.update(|p| p.calling = true);
            }

            PhoneEvent::CallIncoming { caller_id } => {
                tracing::info!("incoming call from {caller_id}");
                prefs.update(|p| {
                    p.cur_call = false;
                    p.video_call = false;
                    p.muted_video = false;
                    p.muted_mic = false;
                });
                self.ui_state().incoming_call = true;

                let controller = self.clone();
                let answer = self
                    .ui
                    .confirm("Incoming Call", &format!("from {caller_id}"));
                self.spawn_prompt(async move {
                    if answer.await {
                        controller.ui_state().start_time = controller.session.preferences().get().call_start;
                        if let Err(e) = controller.accept().await {
                            tracing::warn!("could not answer call from {caller_id}: {e}");
                        }
                        let number = caller_id.clone();
                        controller
                            .session
                            .preferences()
                            .update(|p| p.called_number = Some(number));
                        controller
                            .history
                            .add(&caller_id, CallDirection::Inbound, true);
                        controller.ui.navigate(View::InCall);
                    } else {
                        controller.decline_call().await;
                        controller
                            .history
                            .add(&caller_id, CallDirection::Inbound, false);
                    }
                });
            }

            PhoneEvent::ChatNewMessage(message) => {
                let mut ui = self.ui_state();
                if !ui.chat_open {
                    ui.unread += 1;
                }
                tracing::debug!("chat message from {}", message.from);
            }

            _ => {}
        }
    }

    /// Log back in with the account saved at the last successful login.
    pub async fn restore_session(&self) -> Result<bool, PhoneError> {
        let prefs = self.session.preferences().get();
        if prefs.ui_connected && prefs.ws_connected {
            let mut credentials = self.session.credentials().await;
            if let Some(login) = prefs.login {
                credentials.login = login;
            }
            if let Some(password) = prefs.password {
                credentials.password = password;
            }
            credentials.name = prefs.name;
            credentials.email = prefs.email;
            self.session.set_credentials(credentials).await?;

            if self.session.connect().await? {
                self.ui
                    .notify(NoticeLevel::Success, "Welcome back", "Nice to see you again.");
                self.ui.navigate(View::Dialpad);
                return Ok(true);
            }
        }

        if !self.session.is_connected().await {
            tracing::debug!("not connected, redirecting to login");
            self.ui.navigate(View::Login);
        }
        Ok(false)
    }

    /// Connect with the session's credentials and remember them on success.
    pub async fn login(&self) -> Result<bool, PhoneError> {
        let connected = match self.session.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::warn!("connection failed: {e}");
                false
            }
        };
        if !connected {
            self.ui.notify(
                NoticeLevel::Error,
                "Error",
                "There was an error while trying to login. Please try again.",
            );
            return Ok(false);
        }

        let credentials = self.session.credentials().await;
        self.session.preferences().update(|p| {
            p.ui_connected = true;
            p.ws_connected = true;
            p.name = credentials.name.clone();
            p.email = credentials.email.clone();
            p.login = Some(credentials.login.clone());
            p.password = Some(credentials.password.clone());
        });
        self.ui.notify(NoticeLevel::Success, "Welcome", "Login successful.");
        self.ui.navigate(View::Dialpad);
        Ok(true)
    }

    /// Log out, asking first when a call is up. Returns `false` when the
    /// user chose to stay.
    pub async fn logout(&self) -> bool {
        if self.session.has_call().await {
            let stay = !self
                .ui
                .confirm(
                    "Oops, Active Call in Course.",
                    "It seems that you are in a call. Do you want to hang up?",
                )
                .await;
            if stay {
                return false;
            }
            if let Err(e) = self.session.hangup().await {
                tracing::debug!("hangup before logout: {e}");
            }
        }

        self.close_chat();
        self.session.disconnect().await;
        self.session.preferences().reset();
        self.ui.navigate(View::Login);
        true
    }

    /// Call `number`, or whatever is on the dialpad when it is empty.
    pub async fn dial(&self, number: &str) -> Result<(), PhoneError> {
        let number = match number.trim() {
            "" => self.ui_state().dialpad.clone(),
            n => n.to_string(),
        };
        self.session.call(&number).await?;

        let called = number.clone();
        self.session.preferences().update(|p| {
            p.called_number = Some(called);
            p.cur_call = false;
            p.video_call = false;
        });
        self.history.add(&number, CallDirection::Outbound, true);
        Ok(())
    }

    /// Append to the dialpad buffer, forwarding the digits to the call
    /// when there is one.
    pub async fn dtmf(&self, digits: &str) {
        self.ui_state().dialpad.push_str(digits);
        if self.session.has_call().await {
            if let Err(e) = self.session.dtmf(digits).await {
                tracing::debug!("dtmf not sent: {e}");
            }
        }
    }

    pub fn backspace(&self) {
        self.ui_state().dialpad.pop();
    }

    pub fn dialpad(&self) -> String {
        self.ui_state().dialpad.clone()
    }

    pub async fn hangup(&self) {
        if let Err(e) = self.session.hangup().await {
            tracing::debug!("hangup: {e}");
            self.ui
                .notify(NoticeLevel::Warning, "", "There is no call to hangup.");
            self.ui.navigate(View::Dialpad);
        }
    }

    async fn accept(&self) -> Result<(), PhoneError> {
        let prefs = self.session.preferences();
        let saved = prefs.update(|p| {
            p.on_hold = false;
            p.clone()
        });
        let credentials = self.session.credentials().await;
        self.session
            .answer(AnswerParams {
                use_stereo: saved.use_stereo,
                use_camera: saved.selected_video,
                use_mic: saved.selected_audio,
                callee_id_name: credentials.display_name(),
                callee_id_number: credentials.login,
            })
            .await
    }

    pub async fn answer_call(&self) -> Result<(), PhoneError> {
        self.accept().await?;
        self.ui_state().incoming_call = false;
        self.ui.navigate(View::InCall);
        Ok(())
    }

    pub async fn decline_call(&self) {
        self.hangup().await;
        self.ui_state().incoming_call = false;
    }

    pub fn has_incoming_call(&self) -> bool {
        self.ui_state().incoming_call
    }

    pub async fn hold(&self) -> Result<(), PhoneError> {
        self.session.toggle_hold().await?;
        self.session.preferences().update(|p| p.on_hold = !p.on_hold);
        Ok(())
    }

    /// Start sharing to the called number, or stop an ongoing share.
    pub async fn toggle_screenshare(&self) -> Result<(), PhoneError> {
        if self.session.has_share_call().await {
            return self.session.screenshare_hangup().await;
        }
        let destination = self
            .session
            .preferences()
            .get()
            .called_number
            .unwrap_or_default();
        match self.session.screenshare(&destination).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.ui
                    .notify(NoticeLevel::Error, "Screen share", &e.to_string());
                Err(e)
            }
        }
    }

    pub fn open_chat(&self) {
        let mut ui = self.ui_state();
        ui.chat_open = true;
        ui.unread = 0;
    }

    pub fn close_chat(&self) {
        self.ui_state().chat_open = false;
    }

    pub fn toggle_chat(&self) {
        let mut ui = self.ui_state();
        ui.chat_open = !ui.chat_open;
        if ui.chat_open {
            ui.unread = 0;
        }
    }

    pub fn is_chat_open(&self) -> bool {
        self.ui_state().chat_open
    }

    pub fn unread_messages(&self) -> usize {
        self.ui_state().unread
    }

    /// When the current call became active, for the call timer.
    pub fn call_started_at(&self) -> Option<DateTime<Utc>> {
        self.ui_state().start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::DialogState;
    use crate::preferences::PreferencesStore;
    use crate::testing::{FakeCall, FakeConnector, FakeScreen, Log, dialog_event};

    struct FakeUi {
        accept: bool,
        views: Mutex<Vec<View>>,
        notices: Mutex<Vec<(NoticeLevel, String)>>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeUi {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept,
                views: Mutex::new(Vec::new()),
                notices: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn views(&self) -> Vec<View> {
            self.views.lock().unwrap().clone()
        }
    }

    impl UiShell for FakeUi {
        fn confirm(&self, title: &str, message: &str) -> BoxFuture<'static, bool> {
            self.prompts.lock().unwrap().push(format!("{title}: {message}"));
            Box::pin(futures_util::future::ready(self.accept))
        }

        fn notify(&self, level: NoticeLevel, _title: &str, message: &str) {
            self.notices.lock().unwrap().push((level, message.to_string()));
        }

        fn navigate(&self, view: View) {
            self.views.lock().unwrap().push(view);
        }
    }

    async fn setup(accept: bool) -> (CallController, Arc<FakeUi>, Log) {
        let log = Log::default();
        let session = SessionManager::new(
            "pbx.example.com",
            Arc::new(FakeConnector::new(log.clone())),
            Arc::new(FakeScreen::ok()),
            Arc::new(PreferencesStore::in_memory()),
        );
        let ui = FakeUi::new(accept);
        let controller = CallController::new(session, ui.clone());
        assert_eq!(controller.login().await, Ok(true));
        log.clear();
        ui.views.lock().unwrap().clear();
        (controller, ui, log)
    }

    async fn ring(controller: &CallController, log: &Log) {
        let call = Arc::new(FakeCall::new("in-1", log.clone()));
        controller
            .session
            .handle_client_event(dialog_event(&call, DialogState::Ringing, DialogState::New, false))
            .await;
    }

    #[tokio::test]
    async fn accepting_incoming_call_answers_and_records() {
        let (controller, ui, log) = setup(true).await;
        ring(&controller, &log).await;

        controller
            .handle_event(PhoneEvent::CallIncoming { caller_id: "1000".into() })
            .await;
        controller.wait_prompts().await;

        assert_eq!(log.entries(), vec!["call:in-1:answer:1008"]);
        assert_eq!(ui.views(), vec![View::InCall]);
        assert_eq!(ui.prompts.lock().unwrap()[0], "Incoming Call: from 1000");
        let entries = controller.history().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].number, "1000");
        assert_eq!(entries[0].direction, CallDirection::Inbound);
        assert!(entries[0].accepted);
        let prefs = controller.session.preferences().get();
        assert_eq!(prefs.called_number.as_deref(), Some("1000"));
        assert!(!prefs.on_hold);
    }

    #[tokio::test]
    async fn declining_incoming_call_hangs_up() {
        let (controller, _ui, log) = setup(false).await;
        ring(&controller, &log).await;

        controller
            .handle_event(PhoneEvent::CallIncoming { caller_id: "1000".into() })
            .await;
        controller.wait_prompts().await;

        assert_eq!(log.entries(), vec!["call:in-1:hangup"]);
        let entries = controller.history().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].number, "1000");
        assert!(!entries[0].accepted);
        assert!(!controller.has_incoming_call());
    }

    #[tokio::test]
    async fn call_active_records_start_once() {
        let (controller, _ui, _log) = setup(true).await;
        let prefs = controller.session.preferences();
        prefs.update(|p| p.calling = true);

        controller
            .handle_event(PhoneEvent::CallActive { previous_state: DialogState::Early })
            .await;
        let first = prefs.get().call_start;
        assert!(first.is_some());
        controller
            .handle_event(PhoneEvent::CallActive { previous_state: DialogState::Held })
            .await;

        let saved = prefs.get();
        assert_eq!(saved.call_start, first);
        assert!(saved.cur_call);
        assert!(!saved.calling);
        assert_eq!(saved.user_status, Some(UserStatus::Connected));
        assert_eq!(controller.call_started_at(), first);
    }

    #[tokio::test]
    async fn hangup_event_resets_ui() {
        let (controller, ui, _log) = setup(true).await;
        controller.dtmf("12").await;
        controller.open_chat();

        controller.handle_event(PhoneEvent::CallHangup).await;

        assert_eq!(controller.dialpad(), "");
        assert!(!controller.is_chat_open());
        assert_eq!(ui.views(), vec![View::Dialpad]);
    }

    #[tokio::test]
    async fn declined_recovery_hangs_up() {
        let (controller, ui, log) = setup(false).await;
        controller.session.preferences().update(|p| p.ask_recover_call = true);
        controller.dial("3500").await.unwrap();
        log.clear();

        controller.handle_event(PhoneEvent::PageInCall).await;
        controller.wait_prompts().await;

        assert_eq!(log.entries(), vec!["call:call-1:hangup"]);
        assert!(ui.views().is_empty());
        assert_eq!(
            controller.session.preferences().get().user_status,
            Some(UserStatus::Connecting)
        );
    }

    #[tokio::test]
    async fn hangup_without_call_warns() {
        let (controller, ui, log) = setup(true).await;
        controller.hangup().await;
        assert!(log.entries().is_empty());
        assert_eq!(ui.views(), vec![View::Dialpad]);
        assert_eq!(ui.notices.lock().unwrap().last().unwrap().0, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn dial_uses_dialpad_and_records_history() {
        let (controller, _ui, log) = setup(true).await;
        controller.dtmf("35").await;
        controller.dtmf("01").await;
        controller.backspace();
        controller.dtmf("0").await;

        controller.dial("").await.unwrap();

        assert_eq!(log.entries(), vec!["client:new_call:3500"]);
        let entry = &controller.history().entries()[0];
        assert_eq!((entry.number.as_str(), entry.direction), ("3500", CallDirection::Outbound));
    }

    #[tokio::test]
    async fn logout_with_call_respects_refusal() {
        let (controller, ui, log) = setup(false).await;
        controller.dial("3500").await.unwrap();
        log.clear();

        assert!(!controller.logout().await);
        assert!(log.entries().is_empty());
        assert!(ui.views().is_empty());
    }

    #[tokio::test]
    async fn logout_resets_preferences() {
        let (controller, ui, log) = setup(true).await;
        assert!(controller.session.preferences().get().ui_connected);

        assert!(controller.logout().await);

        assert!(log.contains("client:logout"));
        assert!(!controller.session.preferences().get().ui_connected);
        assert_eq!(ui.views(), vec![View::Login]);
    }

    #[tokio::test]
    async fn restore_without_saved_login_goes_to_login() {
        let log = Log::default();
        let session = SessionManager::new(
            "pbx.example.com",
            Arc::new(FakeConnector::new(log.clone())),
            Arc::new(FakeScreen::ok()),
            Arc::new(PreferencesStore::in_memory()),
        );
        let ui = FakeUi::new(true);
        let controller = CallController::new(session, ui.clone());

        assert_eq!(controller.restore_session().await, Ok(false));
        assert_eq!(ui.views(), vec![View::Login]);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn restore_with_invalid_saved_login_is_rejected() {
        let log = Log::default();
        let connector = Arc::new(FakeConnector::new(log.clone()));
        let prefs = Arc::new(PreferencesStore::in_memory());
        prefs.update(|p| {
            p.ui_connected = true;
            p.ws_connected = true;
            p.login = Some("10 08".into());
        });
        let session = SessionManager::new(
            "pbx.example.com",
            connector.clone(),
            Arc::new(FakeScreen::ok()),
            prefs,
        );
        let ui = FakeUi::new(true);
        let controller = CallController::new(session, ui.clone());

        assert!(matches!(
            controller.restore_session().await,
            Err(PhoneError::InvalidCredentials(_))
        ));
        assert!(connector.configs.lock().unwrap().is_empty());
        assert!(ui.views().is_empty());
    }

    #[tokio::test]
    async fn screenshare_toggles() {
        let (controller, _ui, log) = setup(true).await;
        controller.dial("3500").await.unwrap();

        controller.toggle_screenshare().await.unwrap();
        assert!(log.contains("client:new_call:3500-screen"));
        controller.toggle_screenshare().await.unwrap();
        assert!(log.contains("call:call-2:hangup"));
    }

    #[tokio::test]
    async fn unread_counter_clears_on_open() {
        let (controller, _ui, _log) = setup(true).await;
        let message = crate::events::ChatMessage {
            id: "m1".into(),
            from: "1001".into(),
            body: "hi".into(),
            timestamp_ms: 0,
        };
        controller.handle_event(PhoneEvent::ChatNewMessage(message)).await;
        assert_eq!(controller.unread_messages(), 1);
        controller.toggle_chat();
        assert_eq!(controller.unread_messages(), 0);
    }
}
