//! Error kinds of the OAuth2 transport.

/// Errors that can occur while obtaining, attaching or refreshing tokens.
///
/// Payloads are owned strings so that a failed refresh can be handed to every
/// request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum OAuthError {
    /// The transport or config is missing something required for the call.
    ///
    /// Raised before any network call, e.g. when a request is sent without
    /// credentials or after a refresh has failed.
    #[display("OAuth2 configuration error: {reason}")]
    ConfigurationError {
        /// Description of the configuration issue.
        reason: String,
    },

    /// An authorization or token endpoint URL could not be parsed.
    #[display("Malformed endpoint URL '{url}': {reason}")]
    MalformedEndpoint {
        /// The URL that was provided.
        url: String,
        /// Description of why the URL is invalid.
        reason: String,
    },

    /// The token endpoint answered with a status other than `200 OK`.
    #[display("Token endpoint rejected the request: {status}")]
    ProviderRejected {
        /// The status line returned by the provider, verbatim.
        status: String,
    },

    /// The token endpoint answered `200 OK` with an undecodable body.
    #[display("Invalid token endpoint response: {reason}")]
    MalformedResponse {
        /// Description of the decoding failure.
        reason: String,
    },

    /// The underlying sender failed at the network layer.
    #[display("Transport error: {reason}")]
    TransportError {
        /// Description of the network error.
        reason: String,
    },

    /// A refresh was required but the credentials carry no refresh token.
    #[display("Access token was rejected and no refresh token is available")]
    MissingRefreshToken,

    /// The access token cannot be used as an HTTP header value.
    #[display("Access token contains invalid characters: {reason}")]
    InvalidAccessToken {
        /// Description of the invalid characters.
        reason: String,
    },
}

impl OAuthError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(error: impl std::fmt::Display) -> Self {
        Self::TransportError {
            reason: error.to_string(),
        }
    }

    /// Returns `true` when the token endpoint itself refused or garbled the exchange.
    ///
    /// `ProviderRejected` and `MalformedResponse` are handled the same way by callers:
    /// the user has to go through the authorization step again.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderRejected { .. } | Self::MalformedResponse { .. }
        )
    }
}
