//! Session lifecycle states

use std::fmt;

/// Lifecycle of one gateway session
///
/// `Disconnected → Connecting → AwaitingHello → Identifying | Resuming →
/// Connected → Disconnected`, with `Failed` terminal until the shard is relaunched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for HELLO
    AwaitingHello,
    /// IDENTIFY sent, waiting for READY
    Identifying,
    /// RESUME sent, waiting for RESUMED
    Resuming,
    /// READY or RESUMED received
    Connected,
    /// Handshake budget exhausted or the server refused the shard
    Failed,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// A handshake is in flight
    pub fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHello | Self::Identifying | Self::Resuming
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
