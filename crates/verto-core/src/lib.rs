//! Verto softphone core.
//!
//! Session facade and call lifecycle for a Verto (FreeSWITCH) WebRTC
//! client. The signaling library itself sits behind the traits in
//! [`signaling`]; native UI shells plug in through [`controller::UiShell`].

pub mod auth;
pub mod chat;
pub mod conference;
pub mod controller;
pub mod controls;
pub mod devices;
pub mod errors;
pub mod events;
pub mod history;
pub mod lifecycle;
pub mod logging;
pub mod members;
pub mod preferences;
pub mod quality;
pub mod session;
pub mod signaling;

#[cfg(test)]
mod testing;

pub use auth::{AuthService, Credentials};
pub use chat::ChatService;
pub use conference::ConferenceCommand;
pub use controller::{CallController, NoticeLevel, UiShell, View};
pub use controls::CallControls;
pub use errors::PhoneError;
pub use events::{ChatMessage, Member, PhoneEvent, PhoneEventListener};
pub use history::{CallDirection, CallHistory};
pub use lifecycle::{CallState, DialogState};
pub use logging::init_logging;
pub use preferences::{Preferences, PreferencesStore};
pub use session::{SessionManager, SessionSnapshot};
