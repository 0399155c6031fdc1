//! End-user credentials and the shared slot the transport refreshes in place.

use std::fmt;
use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::OAuthError;
use crate::secret::SecureString;

/// An end-user's tokens.
///
/// This is the data a caller must store to skip the authorization step next time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    access_token: SecureString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<SecureString>,
    /// `None` means the provider did not give a lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    expiry: Option<Timestamp>,
}

impl Credentials {
    /// Creates credentials from an access token obtained elsewhere.
    pub fn new(access_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry: None,
        }
    }

    /// Sets the refresh token. An empty token is treated as no token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<SecureString>) -> Self {
        self.refresh_token = Some(refresh_token.into()).filter(|token| !token.is_empty());
        self
    }

    /// Sets the absolute expiry.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Builds credentials from a token endpoint response decoded at `now`.
    pub fn from_response(response: TokenResponse, now: Timestamp) -> Self {
        let TokenResponse {
            access_token,
            refresh_token,
            expires_in,
        } = response;

        let mut result = Self::new(access_token);
        if let Some(refresh_token) = refresh_token {
            result = result.with_refresh_token(refresh_token);
        }
        result.expiry = expires_in
            .filter(|secs| *secs != 0)
            .and_then(|secs| now.checked_add(SignedDuration::from_secs(secs)).ok());
        result
    }

    /// Builds the replacement of these credentials from a refresh response.
    ///
    /// Providers usually only return a new access token on refresh:
    /// the current refresh token is kept when the response has none.
    #[must_use]
    pub fn refreshed(&self, response: TokenResponse, now: Timestamp) -> Self {
        let mut result = Self::from_response(response, now);
        if result.refresh_token.is_none() {
            result.refresh_token.clone_from(&self.refresh_token);
        }
        result
    }

    /// Returns the access token.
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(SecureString::as_str)
    }

    /// Returns the absolute expiry, `None` meaning never.
    pub fn expiry(&self) -> Option<Timestamp> {
        self.expiry
    }

    /// Checks if the access token lifetime is over.
    ///
    /// Always `false` for credentials without expiry.
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| Timestamp::now() >= expiry)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Token endpoint JSON response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// The new access token.
    pub access_token: String,
    /// A new refresh token, if the provider rotates them.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Slot {
    credentials: Option<Credentials>,
    /// Bumped on every install or failure, used to detect a peer's refresh.
    generation: u64,
    failure: Option<OAuthError>,
}

/// A point-in-time view of a [`SharedCredentials`].
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) credentials: Option<Credentials>,
    pub(crate) generation: u64,
    pub(crate) failure: Option<OAuthError>,
}

/// Credentials shared between a transport and any other holder.
///
/// Cloning is cheap and every clone sees the same value: when the transport
/// refreshes, a caller keeping a clone can read and persist the new tokens.
/// Values are always replaced whole, readers never observe a partial update.
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    slot: Arc<RwLock<Slot>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl SharedCredentials {
    /// Creates an empty slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a slot holding the given credentials.
    pub fn new(credentials: Credentials) -> Self {
        let slot = Slot {
            credentials: Some(credentials),
            ..Slot::default()
        };
        Self {
            slot: Arc::new(RwLock::new(slot)),
            refresh_lock: Arc::default(),
        }
    }

    /// Returns a copy of the current credentials.
    pub async fn get(&self) -> Option<Credentials> {
        self.slot.read().await.credentials.clone()
    }

    /// Installs new credentials, clearing any previous refresh failure.
    pub async fn set(&self, credentials: Credentials) {
        let mut slot = self.slot.write().await;
        slot.credentials = Some(credentials);
        slot.failure = None;
        slot.generation += 1;
    }

    /// Returns `true` if both handles share the same slot.
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub(crate) async fn snapshot(&self) -> Snapshot {
        let slot = self.slot.read().await;
        Snapshot {
            credentials: slot.credentials.clone(),
            generation: slot.generation,
            failure: slot.failure.clone(),
        }
    }

    /// Records a failed refresh. The credentials themselves are left untouched.
    pub(crate) async fn set_failure(&self, error: OAuthError) {
        let mut slot = self.slot.write().await;
        slot.failure = Some(error);
        slot.generation += 1;
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }
}

impl From<Credentials> for SharedCredentials {
    fn from(credentials: Credentials) -> Self {
        Self::new(credentials)
    }
}
