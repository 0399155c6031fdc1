//! OAuth2 consumer configuration and builder.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::OAuthError;
use crate::secret::SecureString;
use crate::sender::{SharedSender, default_sender};

/// `redirect_uri` sent when no redirect URL is configured.
pub const OUT_OF_BAND: &str = "oob";

/// Authorization header scheme used unless configured otherwise.
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";

/// Where the provider sends the user back after consent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The provider displays the code to the user, who copies it by hand.
    #[default]
    OutOfBand,
    /// The provider redirects the user-agent to this URL.
    Url(String),
}

impl RedirectTarget {
    /// Returns the value of the `redirect_uri` parameter.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OutOfBand => OUT_OF_BAND,
            Self::Url(url) => url,
        }
    }
}

/// Configuration of an OAuth2 consumer.
///
/// Use [`OAuthConfig::builder`] to create instances. Endpoint URLs are
/// validated when the builder is created, so nothing derived from the
/// config can fail because of a malformed endpoint.
#[derive(Clone)]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: SecureString,
    pub(crate) scope: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect: RedirectTarget,
    pub(crate) auth_scheme: String,
    pub(crate) sender: Option<SharedSender>,
}

impl OAuthConfig {
    /// Creates a builder with the required parameters.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::MalformedEndpoint`] if either URL cannot be parsed
    /// as an absolute URL.
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<SecureString>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<OAuthConfigBuilder, OAuthError> {
        Ok(OAuthConfigBuilder {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: String::new(),
            auth_url: parse_endpoint(auth_url.as_ref())?,
            token_url: parse_endpoint(token_url.as_ref())?,
            redirect: RedirectTarget::OutOfBand,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            sender: None,
        })
    }

    /// Returns the client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the requested scope, as sent to the provider.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the authorization endpoint.
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Returns the token endpoint.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Returns the redirect target.
    pub fn redirect(&self) -> &RedirectTarget {
        &self.redirect
    }

    /// Returns the `redirect_uri` value, [`OUT_OF_BAND`] when none is configured.
    pub fn redirect_uri(&self) -> &str {
        self.redirect.as_str()
    }

    /// Returns the scheme token of the `Authorization` header.
    pub fn auth_scheme(&self) -> &str {
        &self.auth_scheme
    }

    /// Returns the configured sender, or the process-wide default.
    pub fn sender(&self) -> SharedSender {
        self.sender.clone().unwrap_or_else(default_sender)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("redirect", &self.redirect)
            .field("auth_scheme", &self.auth_scheme)
            .field("sender", &self.sender)
            .finish()
    }
}

fn parse_endpoint(url: &str) -> Result<Url, OAuthError> {
    let parsed = Url::parse(url).map_err(|err| OAuthError::MalformedEndpoint {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(OAuthError::MalformedEndpoint {
            url: url.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }
    Ok(parsed)
}

/// Builder for [`OAuthConfig`].
#[derive(Clone)]
pub struct OAuthConfigBuilder {
    client_id: String,
    client_secret: SecureString,
    scope: String,
    auth_url: Url,
    token_url: Url,
    redirect: RedirectTarget,
    auth_scheme: String,
    sender: Option<SharedSender>,
}

impl OAuthConfigBuilder {
    /// Sets the scope, space- or comma-separated as the provider expects.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the redirect URL. An empty URL means out-of-band.
    #[must_use]
    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        let redirect_url = redirect_url.into();
        self.redirect = if redirect_url.is_empty() {
            RedirectTarget::OutOfBand
        } else {
            RedirectTarget::Url(redirect_url)
        };
        self
    }

    /// Uses the out-of-band mode: the provider shows the code to the user.
    #[must_use]
    pub fn with_out_of_band(mut self) -> Self {
        self.redirect = RedirectTarget::OutOfBand;
        self
    }

    /// Sets the `Authorization` header scheme, e.g. `OAuth` for legacy providers.
    #[must_use]
    pub fn with_auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    /// Sets the sender used for token requests and by transports built on this config.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::ConfigurationError`] if the sender is itself an
    /// authenticating transport.
    pub fn with_sender(mut self, sender: SharedSender) -> Result<Self, OAuthError> {
        if sender.is_authenticating() {
            return Err(OAuthError::configuration(
                "an authenticating transport cannot be used as the underlying sender",
            ));
        }
        self.sender = Some(sender);
        Ok(self)
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::ConfigurationError`] if the client id is empty or
    /// the header scheme is not a single token.
    pub fn build(self) -> Result<OAuthConfig, OAuthError> {
        if self.client_id.is_empty() {
            return Err(OAuthError::configuration("missing client_id"));
        }
        if self.auth_scheme.is_empty() || self.auth_scheme.contains(char::is_whitespace) {
            return Err(OAuthError::configuration(format!(
                "invalid authorization scheme '{}'",
                self.auth_scheme
            )));
        }

        Ok(OAuthConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope,
            auth_url: self.auth_url,
            token_url: self.token_url,
            redirect: self.redirect,
            auth_scheme: self.auth_scheme,
            sender: self.sender,
        })
    }

    /// Builds the configuration wrapped in an [`Arc`], ready to share between transports.
    ///
    /// # Errors
    ///
    /// Same as [`OAuthConfigBuilder::build`].
    pub fn build_shared(self) -> Result<Arc<OAuthConfig>, OAuthError> {
        self.build().map(Arc::new)
    }
}

impl fmt::Debug for OAuthConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfigBuilder")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}
