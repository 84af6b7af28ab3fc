use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("not connected to the signaling server")]
    NotConnected,
    #[error("there is no active call")]
    NoActiveCall,
    #[error("there is no screen share call")]
    NoShareCall,
    #[error("there is no active conference")]
    NoConference,
    #[error("no destination given")]
    MissingDestination,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("screen capture failed: {0}")]
    ScreenCapture(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("preferences error: {0}")]
    Preferences(String),
}
