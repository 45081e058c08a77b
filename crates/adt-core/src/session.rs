//! Authenticated session state and the header contract
//!
//! Every outbound request carries the credential header, the client id,
//! the language, and a session-type header forced to `stateful`: the remote
//! system ties lock lifetimes to the declared mode of the connection, not of
//! the single request. Once a CSRF token is held it rides along on every
//! request; writes without one are refused before anything is sent.

use crate::error::{AdtError, AdtResult};
use crate::profile::ConnectionProfile;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the CSRF token
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Sentinel value requesting a fresh token
pub const CSRF_FETCH: &str = "Fetch";

/// Header declaring the session mode
pub const SESSION_TYPE_HEADER: &str = "X-sap-adt-sessiontype";

/// Header carrying the client id
pub const CLIENT_HEADER: &str = "sap-client";

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("adt-workbench/", env!("CARGO_PKG_VERSION"));

/// Session mode of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Server keeps per-connection state such as held locks
    #[default]
    Stateful,
    /// Every request stands alone
    Stateless,
}

impl SessionMode {
    /// Wire value
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stateful => "stateful",
            Self::Stateless => "stateless",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept header, chosen per operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Source bodies
    PlainText,
    /// Metadata and listings
    Xml,
    /// Only the data-preview endpoint
    Json,
    /// Vendor-specific structured type
    Vendor(&'static str),
    /// Handshake requests
    Any,
}

impl Accept {
    /// Header value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Xml => "application/xml",
            Self::Json => "application/json",
            Self::Vendor(value) => value,
            Self::Any => "application/xml,application/json,*/*",
        }
    }
}

/// Ordered header list for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(Vec<(&'static str, String)>);

impl RequestHeaders {
    /// Create empty header list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set header, replacing any value under the same name
    pub fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Header value, case-insensitive lookup
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// Number of headers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Headers every request carries, without any CSRF token
///
/// Used directly by the login step, before a token exists.
#[must_use]
pub fn credential_headers(profile: &ConnectionProfile, accept: Accept) -> RequestHeaders {
    let credentials = base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        profile.username(),
        profile.secret().expose()
    ));

    let mut headers = RequestHeaders::new()
        .with("Authorization", format!("Basic {credentials}"))
        .with("Accept", accept.as_str())
        .with("User-Agent", USER_AGENT)
        .with("Cache-Control", "no-cache");

    if !profile.client().is_empty() {
        headers.insert(CLIENT_HEADER, profile.client());
    }
    if !profile.language().is_empty() {
        headers.insert("Accept-Language", profile.language().to_lowercase());
    }

    // Forced for reads too: lock lifetime follows the connection's mode.
    headers.insert(SESSION_TYPE_HEADER, SessionMode::Stateful.as_str());
    headers
}

/// Session established by the handshake
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    csrf_token: String,
    base_url: String,
    mode: SessionMode,
    authenticated: bool,
}

impl Session {
    /// Unauthenticated session for a base URL
    #[must_use]
    pub fn pending(base_url: impl Into<String>) -> Self {
        Self {
            csrf_token: String::new(),
            base_url: base_url.into(),
            mode: SessionMode::Stateful,
            authenticated: false,
        }
    }

    /// Record the token obtained during the handshake
    pub fn set_csrf_token(&mut self, token: impl Into<String>) {
        self.csrf_token = token.into();
    }

    /// Set the declared mode before authentication completes
    pub fn set_mode(&mut self, mode: SessionMode) {
        self.mode = mode;
    }

    /// Mark the handshake as complete
    ///
    /// # Errors
    /// - `AdtError::Protocol` if no token was obtained
    pub fn mark_authenticated(&mut self) -> AdtResult<()> {
        if self.csrf_token.is_empty() {
            return Err(AdtError::protocol(
                "cannot authenticate a session without a CSRF token",
            ));
        }
        self.authenticated = true;
        Ok(())
    }

    /// Whether the handshake completed with a token
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && !self.csrf_token.is_empty()
    }

    /// CSRF token, empty before the handshake
    #[inline]
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Resolved ADT base URL
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Declared session mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Absolute URL for a path below the base URL
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Headers for a read request
    #[must_use]
    pub fn headers(&self, profile: &ConnectionProfile, accept: Accept) -> RequestHeaders {
        let mut headers = credential_headers(profile, accept);
        if !self.csrf_token.is_empty() {
            headers.insert(CSRF_HEADER, self.csrf_token.clone());
        }
        headers
    }

    /// Headers for a state-changing request
    ///
    /// # Errors
    /// - `AdtError::MissingCsrfToken` if the handshake produced no token
    pub fn write_headers(
        &self,
        profile: &ConnectionProfile,
        accept: Accept,
    ) -> AdtResult<RequestHeaders> {
        if self.csrf_token.is_empty() {
            return Err(AdtError::MissingCsrfToken);
        }
        Ok(self.headers(profile, accept))
    }

    /// First characters of the token, for logs
    #[must_use]
    pub fn token_preview(&self) -> String {
        let preview: String = self.csrf_token.chars().take(10).collect();
        format!("{preview}...")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("csrf_token", &self.token_preview())
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("authenticated", &self.authenticated)
            .finish()
    }
}
