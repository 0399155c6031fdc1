//! Authorization URL building, the first step of the authorization-code flow.

use url::Url;

use crate::OAuthConfig;

impl OAuthConfig {
    /// Returns the URL the end-user should visit to obtain an authorization code.
    ///
    /// The `response_type`, `client_id`, `redirect_uri` and `scope` parameters are
    /// appended to any query the authorization endpoint already carries.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oauth_transport::OAuthConfig;
    ///
    /// # fn main() -> Result<(), oauth_transport::OAuthError> {
    /// let config = OAuthConfig::builder(
    ///     "my-client",
    ///     "my-secret",
    ///     "https://accounts.example.com/o/oauth2/auth",
    ///     "https://accounts.example.com/o/oauth2/token",
    /// )?
    /// .with_scope("read write")
    /// .build()?;
    ///
    /// assert_eq!(
    ///     config.authorize_url().as_str(),
    ///     "https://accounts.example.com/o/oauth2/auth?response_type=code&client_id=my-client&redirect_uri=oob&scope=read+write"
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn authorize_url(&self) -> Url {
        self.build_authorize_url(None)
    }

    /// Same as [`OAuthConfig::authorize_url`] with an opaque `state` value the
    /// provider echoes back on redirect.
    pub fn authorize_url_with_state(&self, state: &str) -> Url {
        self.build_authorize_url(Some(state))
    }

    fn build_authorize_url(&self, state: Option<&str>) -> Url {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", self.redirect_uri())
                .append_pair("scope", &self.scope);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }
}
