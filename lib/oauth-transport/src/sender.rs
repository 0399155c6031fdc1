//! The underlying request sender decorated by the transport.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use http::{Request, Response};
use tracing::debug;

use crate::OAuthError;

/// Future returned by [`HttpSender::send`].
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response<Bytes>, OAuthError>> + Send + 'a>>;

/// Sends one HTTP request and returns one response.
///
/// Bodies are fully buffered so a request can be replayed after a refresh.
/// Implementations never retry: a network failure is reported as
/// [`OAuthError::TransportError`].
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use http::{Request, Response, StatusCode};
/// use oauth_transport::{HttpSender, SendFuture};
///
/// #[derive(Debug)]
/// struct AlwaysTeapot;
///
/// impl HttpSender for AlwaysTeapot {
///     fn send(&self, _request: Request<Bytes>) -> SendFuture<'_> {
///         Box::pin(async {
///             let mut response = Response::new(Bytes::new());
///             *response.status_mut() = StatusCode::IM_A_TEAPOT;
///             Ok(response)
///         })
///     }
/// }
/// ```
pub trait HttpSender: Debug + Send + Sync {
    /// Executes a single HTTP exchange.
    fn send(&self, request: Request<Bytes>) -> SendFuture<'_>;

    /// Returns `true` if this sender adds OAuth2 credentials to requests.
    ///
    /// Such a sender must not be used to reach a token endpoint.
    fn is_authenticating(&self) -> bool {
        false
    }
}

/// Shared handle on a sender.
pub type SharedSender = Arc<dyn HttpSender>;

static DEFAULT_SENDER: LazyLock<SharedSender> =
    LazyLock::new(|| Arc::new(ReqwestSender::default()));

/// Returns the process-wide default sender, created on first use.
pub fn default_sender() -> SharedSender {
    Arc::clone(&DEFAULT_SENDER)
}

/// [`HttpSender`] backed by a [`reqwest::Client`].
///
/// Timeouts, proxies and TLS are configured on the client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    /// Creates a sender using the given client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, OAuthError> {
        let request = reqwest::Request::try_from(request).map_err(OAuthError::transport)?;
        debug!(method = %request.method(), url = %request.url(), "sending...");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(OAuthError::transport)?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        // keeps a non-canonical reason phrase, see `hyper::ext::ReasonPhrase`
        let extensions = response.extensions().clone();
        let body = response.bytes().await.map_err(OAuthError::transport)?;
        debug!(%status, "...receiving");

        let mut result = Response::new(body);
        *result.status_mut() = status;
        *result.version_mut() = version;
        *result.headers_mut() = headers;
        *result.extensions_mut() = extensions;
        Ok(result)
    }
}

impl From<reqwest::Client> for ReqwestSender {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

impl HttpSender for ReqwestSender {
    fn send(&self, request: Request<Bytes>) -> SendFuture<'_> {
        Box::pin(self.execute(request))
    }
}
