//! Token endpoint requests: authorization-code exchange and refresh.

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use hyper::ext::ReasonPhrase;
use jiff::Timestamp;
use serde::Serialize;
use tracing::debug;

use crate::credentials::{Credentials, TokenResponse};
use crate::{OAuthConfig, OAuthError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Form body posted to the token endpoint.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

impl OAuthConfig {
    /// Exchanges an authorization code for credentials.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::TransportError`] if the token endpoint cannot be reached
    /// - [`OAuthError::ProviderRejected`] if it answers anything but `200 OK`
    /// - [`OAuthError::MalformedResponse`] if the body is not a token response
    pub async fn exchange(&self, code: &str) -> Result<Credentials, OAuthError> {
        let form = TokenRequest {
            grant_type: "authorization_code",
            client_id: &self.client_id,
            client_secret: self.client_secret.as_str(),
            redirect_uri: Some(self.redirect_uri()),
            scope: Some(&self.scope),
            code: Some(code),
            refresh_token: None,
        };
        let (response, now) = self.request_token(&form).await?;
        Ok(Credentials::from_response(response, now))
    }

    /// Obtains fresh credentials from the refresh token of `current`.
    ///
    /// `current` is not modified; the returned value keeps its refresh token
    /// when the provider does not send a new one.
    ///
    /// # Errors
    ///
    /// [`OAuthError::MissingRefreshToken`] without a refresh token (no request
    /// is made), otherwise the same errors as [`OAuthConfig::exchange`].
    pub async fn refresh(&self, current: &Credentials) -> Result<Credentials, OAuthError> {
        let refresh_token = current
            .refresh_token()
            .ok_or(OAuthError::MissingRefreshToken)?;
        let form = TokenRequest {
            grant_type: "refresh_token",
            client_id: &self.client_id,
            client_secret: self.client_secret.as_str(),
            redirect_uri: None,
            scope: None,
            code: None,
            refresh_token: Some(refresh_token),
        };
        let (response, now) = self.request_token(&form).await?;
        Ok(current.refreshed(response, now))
    }

    async fn request_token(
        &self,
        form: &TokenRequest<'_>,
    ) -> Result<(TokenResponse, Timestamp), OAuthError> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|err| OAuthError::configuration(format!("cannot encode token request: {err}")))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.token_url.as_str())
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(Bytes::from(body))
            .map_err(|err| OAuthError::configuration(format!("cannot build token request: {err}")))?;

        debug!(grant_type = form.grant_type, token_url = %self.token_url, "requesting token");
        let response = self.sender().send(request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, "token endpoint rejected the request");
            return Err(OAuthError::ProviderRejected {
                status: status_line(&response),
            });
        }

        let token = serde_json::from_slice::<TokenResponse>(response.body()).map_err(|err| {
            OAuthError::MalformedResponse {
                reason: err.to_string(),
            }
        })?;
        Ok((token, Timestamp::now()))
    }
}

/// Rebuilds the status line as the provider sent it, e.g. `400 Bad Request`.
///
/// The reason phrase read from the wire wins over the canonical one, and an
/// unregistered code without a phrase is reported as the bare number.
fn status_line(response: &Response<Bytes>) -> String {
    let status = response.status();
    let reason = response
        .extensions()
        .get::<ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .or_else(|| status.canonical_reason());
    match reason {
        Some(reason) => format!("{} {reason}", status.as_str()),
        None => status.as_str().to_owned(),
    }
}
