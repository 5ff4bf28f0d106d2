//! Source of bearer tokens for the transport.

use async_trait::async_trait;

use crate::error::ClientError;

/// Supplies and refreshes the bearer token attached to every request.
///
/// How tokens are obtained (login flow, refresh token, service account)
/// is up to the implementation.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The token to use for the next request.
    async fn token(&self) -> Result<String, ClientError>;

    /// Obtain a new token after the server rejected the current one.
    async fn refresh(&self) -> Result<String, ClientError>;
}

/// A fixed token that cannot be refreshed.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }

    async fn refresh(&self) -> Result<String, ClientError> {
        Err(ClientError::Auth("static token cannot be refreshed".into()))
    }
}
