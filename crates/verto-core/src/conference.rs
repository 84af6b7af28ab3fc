//! Conference and live member array handling.
//!
//! Conferences are announced through private events on the signaling
//! channel; member changes arrive from the live array subscription.

use serde::Deserialize;
use serde_json::Value;

use crate::events::{EventEmitter, Member, PhoneEvent};
use crate::session::SessionData;
use crate::signaling::{ConferenceHandle, ConferenceOptions, LiveArrayChange, LiveArraySubscription};

pub(crate) const LIVE_ARRAY_JOIN: &str = "conference-liveArray-join";
pub(crate) const LIVE_ARRAY_PART: &str = "conference-liveArray-part";

/// Private event payload announcing a conference.
#[derive(Debug, Deserialize)]
struct PvtData {
    #[serde(rename = "laChannel", default)]
    la_channel: String,
    #[serde(rename = "laName", default)]
    la_name: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(rename = "chatID", default)]
    chat_id: Option<String>,
}

/// Moderator commands run against the active conference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConferenceCommand {
    Play(String),
    Stop,
    Record(String),
    StopRecord,
    Snapshot(String),
}

impl ConferenceCommand {
    pub(crate) fn apply(&self, conf: &dyn ConferenceHandle) {
        match self {
            Self::Play(file) => conf.play(file),
            Self::Stop => conf.stop(),
            Self::Record(file) => conf.record(file),
            Self::StopRecord => conf.stop_record(),
            Self::Snapshot(file) => conf.snapshot(file),
        }
    }
}

/// Attach a conference and its live array to the session.
pub(crate) fn start_conference(
    data: &mut SessionData,
    emitter: &EventEmitter,
    has_video: bool,
    dialog_call_id: Option<String>,
    pvt: &Value,
) {
    let Some(client) = data.client.clone() else {
        tracing::warn!("conference announced without a signaling client");
        return;
    };
    let info: PvtData = match serde_json::from_value(pvt.clone()) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!("malformed conference announcement: {e}");
            return;
        }
    };

    emitter.emit(PhoneEvent::CallVideo);
    data.chatting_with = info.chat_id;
    data.conf_role = info.role;

    let conf = client.new_conference(ConferenceOptions {
        dialog_call_id: dialog_call_id.clone(),
        has_video,
        live_array_data: pvt.clone(),
    });
    conf.list_video_layouts();
    data.conference = Some(conf);

    if let Some(previous) = data.live_array.take() {
        previous.destroy();
    }
    data.live_array = Some(client.new_live_array(
        &info.la_channel,
        &info.la_name,
        LiveArraySubscription {
            call_id: dialog_call_id,
        },
    ));
    tracing::info!("joined conference live array {}", info.la_name);
}

/// Drop the live array subscription after leaving a conference.
pub(crate) fn stop_conference(data: &mut SessionData, emitter: &EventEmitter) {
    match data.live_array.take() {
        Some(live_array) => {
            live_array.destroy();
            data.members.clear();
            emitter.emit(PhoneEvent::MembersClear);
        }
        None => tracing::debug!("conference part without a live array"),
    }
}

/// Destroy the live array, then the conference.
pub(crate) fn teardown(data: &mut SessionData) {
    let conference = data.conference.take();
    if let Some(live_array) = data.live_array.take() {
        live_array.destroy();
    }
    if let Some(conf) = conference {
        conf.destroy();
    }
}

pub(crate) fn handle_live_array_change(
    data: &mut SessionData,
    emitter: &EventEmitter,
    change: LiveArrayChange,
) {
    let keyed = |change: &LiveArrayChange| {
        let key = change.key.clone();
        if key.is_none() {
            tracing::warn!("live array '{}' without key", change.action);
        }
        key
    };

    match change.action.as_str() {
        "bootObj" => {
            let members = Member::from_boot(&change.data);
            if let Some(call) = &data.call {
                let call_id = call.call_id();
                if let Some(me) = members.iter().find(|m| m.call_id == call_id) {
                    data.muted_mic = me.status.audio_muted;
                    data.muted_video = me.status.video_muted;
                }
            }
            data.members.boot(members.clone());
            emitter.emit(PhoneEvent::MembersBoot(members));
        }
        "add" => {
            let Some(key) = keyed(&change) else { return };
            let member = Member::from_live_array(&key, &change.data);
            data.members.add_member(member.clone());
            emitter.emit(PhoneEvent::MembersAdd(member));
        }
        "del" => {
            let Some(key) = keyed(&change) else { return };
            data.members.remove_member(&key);
            emitter.emit(PhoneEvent::MembersDel(key));
        }
        "clear" => {
            data.members.clear();
            emitter.emit(PhoneEvent::MembersClear);
        }
        "modify" => {
            let Some(key) = keyed(&change) else { return };
            let member = Member::from_live_array(&key, &change.data);
            data.members.update_member(member.clone());
            emitter.emit(PhoneEvent::MembersUpdate(member));
        }
        other => tracing::debug!("live array action not implemented: {other}"),
    }
}

pub(crate) fn handle_broadcast(data: &mut SessionData, emitter: &EventEmitter, message: Value) {
    if message["action"].as_str() != Some("response") {
        tracing::debug!("ignoring conference broadcast: {message}");
        return;
    }
    if message["conf-command"].as_str() == Some("list-videoLayouts") {
        let mut layouts: Vec<String> = message["responseData"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        layouts.sort();
        data.conf_layouts = layouts;
    } else {
        emitter.emit(PhoneEvent::ConferenceBroadcast(message));
    }
}
