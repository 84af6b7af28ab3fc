use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::PhoneError;
use crate::session::SessionData;
use crate::signaling::{AnswerParams, CallHandle};

/// DTMF code the conference server interprets as "toggle my audio".
const MUTE_MIC_DTMF: &str = "0";
/// DTMF code the conference server interprets as "toggle my video".
const MUTE_VIDEO_DTMF: &str = "*0";

/// In-call controls for the active call.
///
/// Mute is a server-side feature of Verto conferences, driven by DTMF
/// codes. The local flags are flipped optimistically.
pub struct CallControls {
    state: Arc<Mutex<SessionData>>,
}

impl CallControls {
    pub(crate) fn new(state: Arc<Mutex<SessionData>>) -> Self {
        Self { state }
    }

    fn active_call(data: &SessionData) -> Result<Arc<dyn CallHandle>, PhoneError> {
        data.call.clone().ok_or_else(|| {
            tracing::debug!("there is no active call");
            PhoneError::NoActiveCall
        })
    }

    /// Send DTMF digits to the active call.
    pub async fn dtmf(&self, digits: &str) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        let call = Self::active_call(&data)?;
        call.dtmf(digits);
        tracing::debug!("dtmf '{digits}' sent");
        Ok(())
    }

    /// Toggle the microphone. Returns the new muted state.
    pub async fn mute_mic(&self) -> Result<bool, PhoneError> {
        let mut data = self.state.lock().await;
        let call = Self::active_call(&data)?;
        call.dtmf(MUTE_MIC_DTMF);
        data.muted_mic = !data.muted_mic;
        tracing::info!("microphone muted: {}", data.muted_mic);
        Ok(data.muted_mic)
    }

    /// Toggle the camera. Returns the new muted state.
    pub async fn mute_video(&self) -> Result<bool, PhoneError> {
        let mut data = self.state.lock().await;
        let call = Self::active_call(&data)?;
        call.dtmf(MUTE_VIDEO_DTMF);
        data.muted_video = !data.muted_video;
        tracing::info!("video muted: {}", data.muted_video);
        Ok(data.muted_video)
    }

    pub async fn toggle_hold(&self) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        Self::active_call(&data)?.toggle_hold();
        Ok(())
    }

    pub async fn answer(&self, params: AnswerParams) -> Result<(), PhoneError> {
        let data = self.state.lock().await;
        Self::active_call(&data)?.answer(params);
        tracing::info!("call answered");
        Ok(())
    }

    pub async fn is_mic_muted(&self) -> bool {
        self.state.lock().await.muted_mic
    }

    pub async fn is_video_muted(&self) -> bool {
        self.state.lock().await.muted_video
    }

    /// Overwrite both flags, e.g. when restoring a recovered call.
    pub async fn set_muted(&self, mic: bool, video: bool) {
        let mut data = self.state.lock().await;
        data.muted_mic = mic;
        data.muted_video = video;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::testing::{FakeCall, Log};

    fn controls(with_call: bool) -> (CallControls, Log) {
        let log = Log::default();
        let mut data = SessionData::new(Credentials::new("pbx"));
        if with_call {
            data.call = Some(Arc::new(FakeCall::new("c1", log.clone())));
        }
        (CallControls::new(Arc::new(Mutex::new(data))), log)
    }

    #[tokio::test]
    async fn no_call_fails_without_touching_flags() {
        let (controls, log) = controls(false);
        assert_eq!(controls.dtmf("1").await, Err(PhoneError::NoActiveCall));
        assert_eq!(controls.mute_mic().await, Err(PhoneError::NoActiveCall));
        assert_eq!(controls.mute_video().await, Err(PhoneError::NoActiveCall));
        assert_eq!(controls.toggle_hold().await, Err(PhoneError::NoActiveCall));
        assert!(!controls.is_mic_muted().await);
        assert!(!controls.is_video_muted().await);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn mute_mic_twice_restores_flag() {
        let (controls, log) = controls(true);
        assert_eq!(controls.mute_mic().await, Ok(true));
        assert_eq!(controls.mute_mic().await, Ok(false));
        assert!(!controls.is_mic_muted().await);
        assert_eq!(log.entries(), vec!["call:c1:dtmf:0", "call:c1:dtmf:0"]);
    }

    #[tokio::test]
    async fn mute_video_sends_star_zero() {
        let (controls, log) = controls(true);
        assert_eq!(controls.mute_video().await, Ok(true));
        assert!(controls.is_video_muted().await);
        assert!(!controls.is_mic_muted().await);
        assert_eq!(log.entries(), vec!["call:c1:dtmf:*0"]);
    }

    #[tokio::test]
    async fn dtmf_and_hold_are_forwarded() {
        let (controls, log) = controls(true);
        controls.dtmf("5").await.unwrap();
        controls.toggle_hold().await.unwrap();
        assert_eq!(log.entries(), vec!["call:c1:dtmf:5", "call:c1:hold"]);
    }
}
