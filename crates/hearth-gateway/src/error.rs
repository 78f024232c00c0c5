//! Gateway error types

use tokio_tungstenite::tungstenite;

use crate::protocol::{CloseCode, OpCode};

/// Gateway error type
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// The websocket upgrade did not complete within the configured timeout
    #[error("Timed out opening the gateway socket")]
    ConnectTimeout,

    /// HELLO did not arrive within the configured timeout
    #[error("Timed out waiting for HELLO")]
    HelloTimeout,

    #[error("Expected {expected}, received {received}")]
    UnexpectedFrame { expected: OpCode, received: OpCode },

    /// Socket ended before the session was established
    #[error("Connection closed during handshake (code {0:?})")]
    ClosedDuringHandshake(Option<u16>),

    /// The server closed with a code the shard cannot recover from
    #[error("Fatal close: {0}")]
    FatalClose(CloseCode),

    /// No HEARTBEAT_ACK arrived between two heartbeats before the session was established
    #[error("Connection went silent during handshake")]
    Zombie,

    #[error("Gave up after {0} consecutive handshake failures")]
    HandshakeBudgetExhausted(u32),

    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Shard {0} is not running")]
    ShardNotRunning(u32),

    #[error("No shard handles guild {0}")]
    NoShardForGuild(hearth_core::Snowflake),
}

impl GatewayError {
    /// Restarting the shard cannot help: the server rejected the credentials
    /// or the shard/intents configuration
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::FatalClose(code) if code.is_fatal())
    }

    /// Counts toward the handshake failure budget
    pub(crate) fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_)
                | Self::ConnectTimeout
                | Self::HelloTimeout
                | Self::UnexpectedFrame { .. }
                | Self::ClosedDuringHandshake(_)
                | Self::Zombie
                | Self::Decode(_)
        )
    }
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_only_for_fatal_close() {
        assert!(GatewayError::FatalClose(CloseCode::AuthenticationFailed).is_permanent());
        assert!(GatewayError::FatalClose(CloseCode::DisallowedIntents).is_permanent());
        assert!(!GatewayError::HandshakeBudgetExhausted(5).is_permanent());
        assert!(!GatewayError::HelloTimeout.is_permanent());
    }

    #[test]
    fn test_handshake_failures() {
        assert!(GatewayError::HelloTimeout.is_handshake_failure());
        assert!(GatewayError::ConnectTimeout.is_handshake_failure());
        assert!(GatewayError::ClosedDuringHandshake(Some(1006)).is_handshake_failure());
        assert!(!GatewayError::FatalClose(CloseCode::InvalidShard).is_handshake_failure());
    }
}
