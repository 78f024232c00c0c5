//! Client error type

use hearth_common::{ConfigError, TokenError};
use hearth_gateway::GatewayError;
use hearth_rest::RestError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The token is malformed; nothing was sent
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// The service rejected the token
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Configuration error: {0}")]
    Config(ConfigError),

    #[error(transparent)]
    Rest(RestError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Client is already connected")]
    AlreadyConnected,

    #[error("Client is not connected")]
    NotConnected,
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidToken(err) => Self::InvalidToken(err),
            other => Self::Config(other),
        }
    }
}

impl From<RestError> for ClientError {
    fn from(err: RestError) -> Self {
        if err.is_unauthorized() {
            Self::AuthenticationFailed
        } else {
            Self::Rest(err)
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_authentication_failed() {
        let err: ClientError = RestError::from_status(401, br#"{"message":"401: Unauthorized","code":0}"#).into();
        assert!(matches!(err, ClientError::AuthenticationFailed));

        let err: ClientError = RestError::from_status(500, b"oops").into();
        assert!(matches!(err, ClientError::Rest(_)));
    }

    #[test]
    fn test_config_token_error_is_invalid_token() {
        let token_err = hearth_common::Token::parse("not-a-token").unwrap_err();
        let err: ClientError = ConfigError::InvalidToken(token_err).into();
        assert!(matches!(err, ClientError::InvalidToken(_)));

        let err: ClientError = ConfigError::MissingVar("HEARTH_TOKEN").into();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
