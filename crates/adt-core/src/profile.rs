//! Connection profiles
//!
//! A [`ConnectionProfile`] is the immutable description of one remote
//! system plus the credentials used against it. Its [`Fingerprint`] is the
//! equality key of the connection cache.

use crate::error::{AdtError, AdtResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Path every ADT service lives under
pub const ADT_ROOT_PATH: &str = "/sap/bc/adt";

/// Default client (mandant)
pub const DEFAULT_CLIENT: &str = "100";

/// Default logon language
pub const DEFAULT_LANGUAGE: &str = "EN";

/// Default connectivity probe timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for regular requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Password that never prints itself
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a plaintext secret
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext value, only for building the credential header
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if secret is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Everything needed to reach and log on to one system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    host: String,
    client: String,
    username: String,
    secret: Secret,
    language: String,
    allow_self_signed: bool,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ConnectionProfile {
    /// Create profile with default client, language and timeouts
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>, secret: Secret) -> Self {
        Self {
            host: host.into().trim().to_string(),
            client: DEFAULT_CLIENT.to_string(),
            username: username.into(),
            secret,
            language: DEFAULT_LANGUAGE.to_string(),
            allow_self_signed: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// With client id; empty keeps the default
    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        let client = client.into();
        if !client.trim().is_empty() {
            self.client = client.trim().to_string();
        }
        self
    }

    /// With logon language; empty keeps the default
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        if !language.trim().is_empty() {
            self.language = language.trim().to_uppercase();
        }
        self
    }

    /// Accept self-signed TLS certificates
    #[inline]
    #[must_use]
    pub fn with_self_signed(mut self, allow: bool) -> Self {
        self.allow_self_signed = allow;
        self
    }

    /// With connectivity probe timeout
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// With regular request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject profiles that cannot possibly authenticate
    ///
    /// # Errors
    /// - `AdtError::Config` naming the first missing field
    pub fn validate(&self) -> AdtResult<()> {
        if self.host.is_empty() {
            return Err(AdtError::Config("host not configured".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(AdtError::Config("username not configured".to_string()));
        }
        if self.secret.is_empty() {
            return Err(AdtError::Config("password not configured".to_string()));
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(AdtError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Host as configured
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Client id
    #[inline]
    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Logon user
    #[inline]
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Logon password
    #[inline]
    #[must_use]
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Logon language (upper case)
    #[inline]
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether self-signed certificates are accepted
    #[inline]
    #[must_use]
    pub fn allow_self_signed(&self) -> bool {
        self.allow_self_signed
    }

    /// Connectivity probe timeout
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Regular request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Normalized ADT base URL
    ///
    /// Adds `http://` when no scheme is given, strips trailing slashes and
    /// appends the ADT root path when missing.
    #[must_use]
    pub fn base_url(&self) -> String {
        let mut url = self.host.trim().trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            url = format!("http://{url}");
        }
        if !url.ends_with(ADT_ROOT_PATH) {
            url.push_str(ADT_ROOT_PATH);
        }
        url
    }

    /// Cache key for this profile
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            host: self.host.clone(),
            client: self.client.clone(),
            username: self.username.clone(),
            secret: self.secret.expose().to_string(),
        }
    }
}

/// Opaque equality key of a profile: host, client, user and secret
///
/// Not a security digest. `Debug` hides the secret part.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    host: String,
    client: String,
    username: String,
    secret: String,
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({}|{}|{}|<redacted>)",
            self.host, self.client, self.username
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("erp.local:8000", "DEVELOPER", Secret::new("s3cret"))
    }

    #[test]
    fn defaults_follow_remote_conventions() {
        let p = profile();
        assert_eq!(p.client(), "100");
        assert_eq!(p.language(), "EN");
        assert_eq!(p.connect_timeout(), Duration::from_secs(30));
        assert_eq!(p.request_timeout(), Duration::from_secs(60));
        assert!(!p.allow_self_signed());
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(profile().base_url(), "http://erp.local:8000/sap/bc/adt");

        let https = ConnectionProfile::new("https://erp.local/", "U", Secret::new("p"));
        assert_eq!(https.base_url(), "https://erp.local/sap/bc/adt");

        let full = ConnectionProfile::new("http://erp.local/sap/bc/adt", "U", Secret::new("p"));
        assert_eq!(full.base_url(), "http://erp.local/sap/bc/adt");
    }

    #[test]
    fn empty_overrides_keep_defaults() {
        let p = profile().with_client("  ").with_language("");
        assert_eq!(p.client(), "100");
        assert_eq!(p.language(), "EN");

        let p = profile().with_client("200").with_language("de");
        assert_eq!(p.client(), "200");
        assert_eq!(p.language(), "DE");
    }

    #[test]
    fn validation_names_missing_field() {
        let err = ConnectionProfile::new("", "U", Secret::new("p"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("host"));

        let err = ConnectionProfile::new("h", "U", Secret::new(""))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("password"));

        assert!(profile().validate().is_ok());
    }

    #[test]
    fn secret_never_printed() {
        let p = profile();
        assert!(!format!("{p:?}").contains("s3cret"));
        assert!(!format!("{:?}", p.fingerprint()).contains("s3cret"));
        assert_eq!(p.secret().to_string(), "<redacted>");
    }

    #[test]
    fn fingerprint_fields_do_not_bleed() {
        let a = ConnectionProfile::new("h:8000", "u|x", Secret::new("y"));
        let b = ConnectionProfile::new("h:8000", "u", Secret::new("x|y"));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            format!("{:?}", b.fingerprint()),
            "Fingerprint(h:8000|100|u|<redacted>)"
        );
    }

    proptest! {
        #[test]
        fn fingerprint_separates_usernames(a in "[A-Z]{1,12}", b in "[A-Z]{1,12}") {
            let pa = ConnectionProfile::new("h:8000", a.clone(), Secret::new("pw"));
            let pb = ConnectionProfile::new("h:8000", b.clone(), Secret::new("pw"));
            prop_assert_eq!(pa.fingerprint() == pb.fingerprint(), a == b);
        }

        #[test]
        fn fingerprint_ignores_timeouts(secs in 1u64..600) {
            let base = profile();
            let tuned = profile().with_request_timeout(Duration::from_secs(secs));
            prop_assert_eq!(base.fingerprint(), tuned.fingerprint());
        }
    }
}
