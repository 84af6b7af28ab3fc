use serde::Deserialize;
use serde_json::Value;

use crate::events::{Member, MemberStatus};

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    #[serde(default)]
    audio: RawAudio,
    #[serde(default)]
    video: RawVideo,
}

#[derive(Debug, Default, Deserialize)]
struct RawAudio {
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    talking: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawVideo {
    #[serde(default)]
    muted: bool,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Status travels as a JSON document embedded in a string.
fn parse_status(value: &Value) -> MemberStatus {
    let raw: RawStatus = match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_default(),
        Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
        _ => RawStatus::default(),
    };
    MemberStatus {
        audio_muted: raw.audio.muted,
        talking: raw.audio.talking,
        video_muted: raw.video.muted,
    }
}

impl Member {
    /// Build a member from a live array entry.
    ///
    /// `data` is `[member_id, number, name, email, status, ...]`.
    pub fn from_live_array(key: &str, data: &Value) -> Self {
        let field = |i: usize| data.get(i).map(value_to_string).unwrap_or_default();
        let email = field(3);
        Member {
            call_id: key.to_string(),
            member_id: field(0),
            number: field(1),
            name: field(2),
            email: if email.is_empty() { None } else { Some(email) },
            status: data.get(4).map(parse_status).unwrap_or_default(),
        }
    }

    /// Parse a `bootObj` payload: an array of `[key, data]` pairs.
    pub fn from_boot(data: &Value) -> Vec<Self> {
        data.as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let key = entry.get(0)?.as_str()?;
                        Some(Self::from_live_array(key, entry.get(1)?))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Conference members as mirrored from the live array.
///
/// Updated by the session event loop. Read by UI layers.
#[derive(Debug, Clone, Default)]
pub struct MemberRoster {
    members: Vec<Member>,
}

impl MemberRoster {
    pub fn new() -> Self {
        Self { members: Vec::new() }
    }

    pub fn boot(&mut self, members: Vec<Member>) {
        self.members = members;
    }

    pub fn add_member(&mut self, member: Member) {
        if !self.members.iter().any(|m| m.call_id == member.call_id) {
            self.members.push(member);
        }
    }

    /// Replace an existing entry, or add it when unknown.
    pub fn update_member(&mut self, member: Member) {
        match self.member_mut(&member.call_id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    pub fn remove_member(&mut self, call_id: &str) {
        self.members.retain(|m| m.call_id != call_id);
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, call_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.call_id == call_id)
    }

    pub fn member_mut(&mut self, call_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.call_id == call_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}
