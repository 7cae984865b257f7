//! Error types for the Remedia interaction pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The device classes the pipeline can acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Microphone,
    Camera,
    Speaker,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Microphone => write!(f, "microphone"),
            Self::Camera => write!(f, "camera"),
            Self::Speaker => write!(f, "speaker"),
        }
    }
}

/// A shared error type for the entire interaction pipeline.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Send-path failures carry a
/// user-legible summary (see [`RemediaError::user_summary`]) so the
/// orchestrator can append exactly one chat-facing error message.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RemediaError {
    /// The user refused device access (mic or camera)
    #[error("Permission denied for {device}")]
    PermissionDenied { device: DeviceKind },

    /// The device exists but could not be acquired (missing, busy, failed)
    #[error("{device} unavailable: {reason}")]
    DeviceUnavailable { device: DeviceKind, reason: String },

    /// The assistant service could not be reached at all
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The request deadline elapsed before a response arrived
    #[error("Request timed out")]
    RequestTimeout,

    /// The assistant service answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// A response payload could not be decoded (image/audio/JSON)
    #[error("Decode error in {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Image and audio may not be staged in the same draft
    #[error("A draft may carry an image or an audio clip, not both")]
    MediaConflict,

    /// A controller action was invoked outside its legal state
    #[error("Invalid transition: cannot {action} from {from}")]
    InvalidTransition { from: String, action: String },

    /// A patch targeted a message id that is not in the store
    #[error("Unknown message: {id}")]
    UnknownMessage { id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RemediaError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a PermissionDenied error
    pub fn permission_denied(device: DeviceKind) -> Self {
        Self::PermissionDenied { device }
    }

    /// Creates a DeviceUnavailable error
    pub fn device_unavailable(device: DeviceKind, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device,
            reason: reason.into(),
        }
    }

    /// Creates a NetworkUnreachable error
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::NetworkUnreachable(reason.into())
    }

    /// Creates a Remote error
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates a Decode error
    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidTransition error
    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    /// Creates an UnknownMessage error
    pub fn unknown_message(id: impl Into<String>) -> Self {
        Self::UnknownMessage { id: id.into() }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a device acquisition error (denied or unavailable)
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::DeviceUnavailable { .. }
        )
    }

    /// Check if this is a permission refusal
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if this error belongs to the send path (network, timeout, remote)
    pub fn is_send_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnreachable(_) | Self::RequestTimeout | Self::Remote { .. }
        )
    }

    /// Check if this is a decode error
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// A short, user-legible summary for chat-facing failure messages.
    ///
    /// The orchestrator appends this as the content of the single
    /// assistant-role error message after a failed exchange; internal detail
    /// stays in logs.
    pub fn user_summary(&self) -> String {
        match self {
            Self::NetworkUnreachable(_) => {
                "I couldn't reach the assistant service. Please check your connection and try again.".to_string()
            }
            Self::RequestTimeout => {
                "The assistant took too long to respond. Please try again.".to_string()
            }
            Self::Remote { status, .. } => {
                format!("The assistant service reported a problem (status {status}). Please try again.")
            }
            Self::PermissionDenied { device } => {
                format!("Access to the {device} was denied. Check your device permissions.")
            }
            Self::DeviceUnavailable { device, .. } => {
                format!("No usable {device} was found.")
            }
            _ => "Something went wrong while handling that message. Please try again.".to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for RemediaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for RemediaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            what: "json".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for RemediaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for RemediaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, RemediaError>`.
pub type Result<T> = std::result::Result<T, RemediaError>;
