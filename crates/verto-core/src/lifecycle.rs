//! Call lifecycle state machine.
//!
//! Maps the dialog states reported by the signaling client onto the
//! session's [`CallState`] and the side effects the session must apply.
//! The machine is pure: it never touches handles or emits events itself.

use std::fmt;
use std::str::FromStr;

/// Dialog states reported by the signaling client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogState {
    New,
    Requesting,
    Trying,
    Recovering,
    Ringing,
    Answering,
    Early,
    Active,
    Held,
    Hangup,
    Destroy,
    Purge,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Requesting => "requesting",
            Self::Trying => "trying",
            Self::Recovering => "recovering",
            Self::Ringing => "ringing",
            Self::Answering => "answering",
            Self::Early => "early",
            Self::Active => "active",
            Self::Held => "held",
            Self::Hangup => "hangup",
            Self::Destroy => "destroy",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialogState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => Self::New,
            "requesting" => Self::Requesting,
            "trying" => Self::Trying,
            "recovering" => Self::Recovering,
            "ringing" => Self::Ringing,
            "answering" => Self::Answering,
            "early" => Self::Early,
            "active" => Self::Active,
            "held" => Self::Held,
            "hangup" => Self::Hangup,
            "destroy" => Self::Destroy,
            "purge" => Self::Purge,
            other => return Err(format!("unknown dialog state '{other}'")),
        })
    }
}

/// Call state mirrored into the session record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallState {
    #[default]
    Idle,
    Trying,
    /// Inbound call waiting for the user to answer.
    Ringing,
    /// Early media or fully answered.
    Active,
    Hangup,
}

/// Plain data describing one dialog-state notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogInfo {
    pub call_id: String,
    pub state: DialogState,
    pub last_state: DialogState,
    pub caller_id_number: String,
    pub screen_share: bool,
    pub cause: Option<String>,
}

/// Side effects the session applies, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Store the dialog as the primary call.
    AdoptCall,
    /// Switch the UI to the in-call view.
    EnterCallScreen,
    Incoming { caller_id: String },
    Calling,
    Active { previous_state: DialogState },
    /// Release the screen-share leg.
    DestroyShareCall,
    /// Tear down the conference (if any) and release the primary call.
    DestroyCall,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub call_state: Option<CallState>,
    pub effects: Vec<Effect>,
}

/// Compute the transition for a dialog update.
///
/// `has_call` tells whether the session already holds a primary call.
pub fn transition(has_call: bool, info: &DialogInfo) -> Transition {
    if info.screen_share {
        // The share leg has its own lifecycle and never drives the primary call.
        let effects = match info.state {
            DialogState::Destroy => vec![Effect::DestroyShareCall],
            _ => Vec::new(),
        };
        return Transition { call_state: None, effects };
    }

    let mut effects = Vec::new();
    if !has_call {
        effects.push(Effect::AdoptCall);
        if info.state != DialogState::Ringing {
            effects.push(Effect::EnterCallScreen);
        }
    }

    let call_state = match info.state {
        DialogState::Ringing => {
            effects.push(Effect::Incoming {
                caller_id: info.caller_id_number.clone(),
            });
            Some(CallState::Ringing)
        }
        DialogState::Trying => Some(CallState::Trying),
        DialogState::Early => {
            effects.push(Effect::Calling);
            Some(CallState::Active)
        }
        DialogState::Active => {
            effects.push(Effect::Active {
                previous_state: info.last_state,
            });
            Some(CallState::Active)
        }
        DialogState::Hangup => Some(CallState::Hangup),
        DialogState::Destroy => {
            effects.push(Effect::DestroyCall);
            None
        }
        _ => None,
    };

    Transition { call_state, effects }
}
