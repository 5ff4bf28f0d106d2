//! Authenticated HTTP transport.
//!
//! Every request carries `Authorization: Bearer <token>`. When the server
//! answers 401 the transport asks its [`CredentialProvider`] for a new
//! token once and replays the request once; a second 401 is returned as
//! [`ClientError::Auth`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::credentials::CredentialProvider;
use crate::error::ClientError;

/// Shared HTTP plumbing for [`JobsClient`](crate::JobsClient).
#[derive(Clone)]
pub struct AuthenticatedTransport {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

/// The server's `{ "data": ... }` success envelope.
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

impl AuthenticatedTransport {
    /// * `base_url` - server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, credentials)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool,
    /// custom timeouts).
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request to `path` (relative to the base URL).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request with credentials attached.
    ///
    /// Returns the response for any status other than 401. On 401 the
    /// token is refreshed once and the request replayed once.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let replay = request.try_clone();
        self.send_with_replay(request, replay).await
    }

    /// Like [`send`](Self::send) for requests whose body cannot be cloned,
    /// such as multipart uploads: `build` is called again for the replay.
    pub async fn send_rebuilt<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.send_with_replay(build(), Some(build())).await
    }

    async fn send_with_replay(
        &self,
        request: RequestBuilder,
        replay: Option<RequestBuilder>,
    ) -> Result<Response, ClientError> {
        let token = self.credentials.token().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(replay) = replay else {
            return Err(ClientError::Auth(
                "credentials rejected and the request body cannot be replayed".into(),
            ));
        };

        tracing::debug!(url = %response.url(), "Received 401, refreshing credentials");
        let token = self.credentials.refresh().await?;
        let response = replay.bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(StatusCode::UNAUTHORIZED, &body));
        }
        Ok(response)
    }

    /// Send and decode a `{ "data": T }` success body. Non-2xx responses
    /// become the matching [`ClientError`].
    pub async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        Self::decode_data(self.send(request).await?).await
    }

    /// [`send_data`](Self::send_data) for bodies that must be rebuilt to be
    /// replayed.
    pub async fn send_data_rebuilt<T, F>(&self, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        Self::decode_data(self.send_rebuilt(build).await?).await
    }

    async fn decode_data<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }

    /// Send and discard the body of a successful response.
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        Self::ensure_success(self.send(request).await?).await?;
        Ok(())
    }

    /// Return the response unchanged on 2xx, otherwise the error its body
    /// describes.
    pub async fn ensure_success(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status, &body))
    }
}
