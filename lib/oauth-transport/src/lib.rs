//! # oauth-transport
//!
//! OAuth2 authorization-code client and an HTTP sender that authenticates
//! requests with the resulting tokens, refreshing them when the provider
//! rejects a request.
//!
//! ## Flow
//!
//! 1. Build an [`OAuthConfig`] with the client credentials and the provider endpoints.
//! 2. Send the user to [`OAuthConfig::authorize_url`] to obtain an authorization code.
//! 3. Exchange the code with [`AuthTransport::exchange`] (or [`OAuthConfig::exchange`]
//!    and [`AuthTransport::with_credentials`] when the tokens are stored elsewhere).
//! 4. Send requests through [`AuthTransport::send`].
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use http::Request;
//! use oauth_transport::{AuthTransport, OAuthConfig};
//!
//! # async fn example(code: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OAuthConfig::builder(
//!     "my-client",
//!     "my-secret",
//!     "https://accounts.example.com/o/oauth2/auth",
//!     "https://accounts.example.com/o/oauth2/token",
//! )?
//! .with_scope("https://www.example.com/auth/activities")
//! .with_redirect_url("http://localhost:8080/callback")
//! .build()?;
//!
//! let transport = AuthTransport::new(config);
//! println!("Visit {}", transport.authorize_url());
//!
//! // ... the user comes back with `code`
//! transport.exchange(code).await?;
//!
//! let request = Request::get("https://api.example.com/activities").body(Bytes::new())?;
//! let response = transport.send(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Refresh
//!
//! When a request is answered `401 Unauthorized`, the transport refreshes the
//! credentials with the refresh token and sends the request once more. The
//! outcome of that retry is returned whatever its status. Refreshes are
//! serialized per [`SharedCredentials`]: concurrent rejected requests wait for
//! the refresh in flight instead of starting their own. If the refresh fails,
//! its error is returned and the transport refuses further requests until new
//! credentials are installed.
//!
//! ## Underlying sender
//!
//! Requests go through an [`HttpSender`]: the one set with
//! [`OAuthConfigBuilder::with_sender`], or a process-wide [`ReqwestSender`].

mod authorize;
mod config;
mod credentials;
mod error;
mod exchange;
mod secret;
mod sender;
mod transport;

#[cfg(test)]
mod testing;

pub use self::config::{
    DEFAULT_AUTH_SCHEME, OAuthConfig, OAuthConfigBuilder, OUT_OF_BAND, RedirectTarget,
};
pub use self::credentials::{Credentials, SharedCredentials, TokenResponse};
pub use self::error::OAuthError;
pub use self::secret::SecureString;
pub use self::sender::{HttpSender, ReqwestSender, SendFuture, SharedSender, default_sender};
pub use self::transport::{AuthTransport, TransportState};
