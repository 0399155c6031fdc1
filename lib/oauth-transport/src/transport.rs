//! The authenticating transport.

use std::sync::Arc;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::request::Parts;
use http::{HeaderValue, Request, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::credentials::{Credentials, SharedCredentials, Snapshot};
use crate::sender::{HttpSender, SendFuture};
use crate::{OAuthConfig, OAuthError};

/// Observable state of an [`AuthTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No credentials, requests fail without reaching the network.
    Unauthenticated,
    /// Credentials present and assumed valid.
    Authenticated,
    /// A rejected request is refreshing the credentials.
    Refreshing,
    /// The last refresh failed, the user must authorize again.
    Failed,
}

/// Sender that authenticates requests with OAuth2 credentials.
///
/// Every request gets an `Authorization: <scheme> <access token>` header and is
/// forwarded to the config's sender. When the provider answers
/// `401 Unauthorized`, the credentials are refreshed and the request is sent
/// again, once. Refreshes are serialized: concurrent requests rejected with
/// the same token share a single call to the token endpoint.
///
/// Refreshed credentials are written to the [`SharedCredentials`] in place, so
/// any clone of it held by the caller observes them.
///
/// # Example
///
/// ```rust,no_run
/// use bytes::Bytes;
/// use http::Request;
/// use oauth_transport::{AuthTransport, Credentials, OAuthConfig};
///
/// # async fn example() -> Result<(), oauth_transport::OAuthError> {
/// let config = OAuthConfig::builder(
///     "my-client",
///     "my-secret",
///     "https://accounts.example.com/o/oauth2/auth",
///     "https://accounts.example.com/o/oauth2/token",
/// )?
/// .build()?;
///
/// let transport = AuthTransport::with_credentials(
///     config,
///     Credentials::new("access").with_refresh_token("refresh"),
/// );
/// let request = Request::get("https://api.example.com/me")
///     .body(Bytes::new())
///     .expect("valid request");
/// let response = transport.send(request).await?;
///
/// // persist the possibly refreshed tokens
/// let credentials = transport.credentials().get().await;
/// # let _ = (response, credentials);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthTransport {
    config: Arc<OAuthConfig>,
    credentials: SharedCredentials,
}

impl AuthTransport {
    /// Creates a transport without credentials; use [`AuthTransport::exchange`] next.
    pub fn new(config: impl Into<Arc<OAuthConfig>>) -> Self {
        Self::with_shared(config, SharedCredentials::empty())
    }

    /// Creates a transport with previously obtained credentials.
    pub fn with_credentials(config: impl Into<Arc<OAuthConfig>>, credentials: Credentials) -> Self {
        Self::with_shared(config, SharedCredentials::new(credentials))
    }

    /// Creates a transport updating the given shared credentials.
    pub fn with_shared(config: impl Into<Arc<OAuthConfig>>, credentials: SharedCredentials) -> Self {
        Self {
            config: config.into(),
            credentials,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Returns the credentials slot this transport updates.
    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    /// Returns the URL the end-user should visit, see [`OAuthConfig::authorize_url`].
    pub fn authorize_url(&self) -> Url {
        self.config.authorize_url()
    }

    /// Exchanges an authorization code and installs the resulting credentials.
    ///
    /// # Errors
    ///
    /// See [`OAuthConfig::exchange`]. On error the current credentials are kept.
    pub async fn exchange(&self, code: &str) -> Result<Credentials, OAuthError> {
        let credentials = self.config.exchange(code).await?;
        self.credentials.set(credentials.clone()).await;
        Ok(credentials)
    }

    /// Installs caller-supplied credentials, leaving any failed state.
    pub async fn set_credentials(&self, credentials: Credentials) {
        self.credentials.set(credentials).await;
    }

    /// Refreshes the credentials now, e.g. to recover from [`TransportState::Failed`].
    ///
    /// # Errors
    ///
    /// [`OAuthError::ConfigurationError`] without credentials, otherwise see
    /// [`OAuthConfig::refresh`]. A missing refresh token leaves the state as is.
    pub async fn refresh(&self) -> Result<Credentials, OAuthError> {
        let _guard = self.credentials.lock_refresh().await;
        let current = self
            .credentials
            .get()
            .await
            .ok_or_else(|| OAuthError::configuration("no credentials supplied"))?;
        if current.refresh_token().is_none() {
            return Err(OAuthError::MissingRefreshToken);
        }
        self.refresh_locked(&current).await
    }

    /// Returns the current state.
    pub async fn state(&self) -> TransportState {
        if self.credentials.is_refreshing() {
            return TransportState::Refreshing;
        }
        let snapshot = self.credentials.snapshot().await;
        if snapshot.failure.is_some() {
            TransportState::Failed
        } else if snapshot.credentials.is_none() {
            TransportState::Unauthenticated
        } else {
            TransportState::Authenticated
        }
    }

    /// Sends an authenticated request, refreshing and retrying once on `401`.
    ///
    /// Any status other than `401` is returned as is, and so is the outcome of
    /// the retry.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::ConfigurationError`] without usable credentials (nothing is sent)
    /// - [`OAuthError::TransportError`] from the underlying sender, never retried
    /// - the refresh error when the request was rejected and refreshing failed
    pub async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, OAuthError> {
        self.execute(request).await
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, OAuthError> {
        let snapshot = self.credentials.snapshot().await;
        let credentials = usable(&snapshot)?;

        let (parts, body) = request.into_parts();
        if parts.headers.contains_key(AUTHORIZATION) {
            warn!(uri = %parts.uri, "overwriting caller supplied Authorization header");
        }

        let sender = self.config.sender();
        let request = self.authorize(&parts, &body, credentials.access_token())?;
        let response = sender.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(uri = %parts.uri, "access token rejected");
        let credentials = self.refresh_rejected(snapshot.generation).await?;
        let retry = self.authorize(&parts, &body, credentials.access_token())?;
        let response = sender.send(retry).await?;
        debug!(uri = %parts.uri, status = %response.status(), "retried with refreshed token");
        Ok(response)
    }

    /// Refreshes after a rejection, unless a peer did it since `seen_generation`.
    async fn refresh_rejected(&self, seen_generation: u64) -> Result<Credentials, OAuthError> {
        let _guard = self.credentials.lock_refresh().await;
        let Snapshot {
            credentials,
            generation,
            failure,
        } = self.credentials.snapshot().await;
        let credentials =
            credentials.ok_or_else(|| OAuthError::configuration("no credentials supplied"))?;

        if generation != seen_generation {
            if let Some(error) = failure {
                return Err(error);
            }
            debug!("credentials already refreshed by a concurrent request");
            return Ok(credentials);
        }
        self.refresh_locked(&credentials).await
    }

    /// Must be called with the refresh lock held.
    async fn refresh_locked(&self, current: &Credentials) -> Result<Credentials, OAuthError> {
        match self.config.refresh(current).await {
            Ok(refreshed) => {
                debug!(expiry = ?refreshed.expiry(), "credentials refreshed");
                self.credentials.set(refreshed.clone()).await;
                Ok(refreshed)
            }
            Err(error) => {
                warn!(%error, "token refresh failed");
                self.credentials.set_failure(error.clone()).await;
                Err(error)
            }
        }
    }

    fn authorize(
        &self,
        parts: &Parts,
        body: &Bytes,
        access_token: &str,
    ) -> Result<Request<Bytes>, OAuthError> {
        let mut value = HeaderValue::try_from(format!("{} {access_token}", self.config.auth_scheme))
            .map_err(|err| OAuthError::InvalidAccessToken {
                reason: err.to_string(),
            })?;
        value.set_sensitive(true);

        let mut request = Request::new(body.clone());
        *request.method_mut() = parts.method.clone();
        *request.uri_mut() = parts.uri.clone();
        *request.version_mut() = parts.version;
        *request.headers_mut() = parts.headers.clone();
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

fn usable(snapshot: &Snapshot) -> Result<&Credentials, OAuthError> {
    if let Some(failure) = &snapshot.failure {
        return Err(OAuthError::configuration(format!(
            "credentials must be renewed after a failed refresh ({failure})"
        )));
    }
    snapshot
        .credentials
        .as_ref()
        .ok_or_else(|| OAuthError::configuration("no credentials supplied"))
}

impl HttpSender for AuthTransport {
    fn send(&self, request: Request<Bytes>) -> SendFuture<'_> {
        Box::pin(self.execute(request))
    }

    fn is_authenticating(&self) -> bool {
        true
    }
}
