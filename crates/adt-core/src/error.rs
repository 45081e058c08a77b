//! Error types for ADT operations
//!
//! One taxonomy shared by the handshake, the lock coordinator, the source
//! mutation workflow and the connection cache:
//! - Connectivity failures, classified by cause with a diagnostic hint
//! - Authentication (401) and authorization (403) failures
//! - Missing artifacts, conflicts, unrecognized response shapes
//! - Server-side failures (5xx)
//!
//! Errors are `Clone` so a failed connection attempt can be handed to every
//! caller waiting on the same cache slot.

use std::fmt;

/// Cause of a failed connectivity probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityKind {
    /// TCP connection actively refused
    Refused,
    /// No answer within the connect timeout
    TimedOut,
    /// Hostname could not be resolved
    NameResolution,
    /// Server closed the connection before answering (EOF)
    ClosedImmediately,
    /// Anything the classifier does not recognize
    Other,
}

impl ConnectivityKind {
    /// Actionable hint for the operator
    #[must_use]
    pub fn hint(&self, host: &str) -> String {
        let hostname = hostname_of(host);
        match self {
            Self::Refused => format!(
                "possible issues:\n  1. system not running or unreachable\n  2. wrong hostname or port number\n  3. firewall blocking the connection\n  4. HTTP service not active\n  try: ping {hostname}\n  try: telnet {hostname} 8000"
            ),
            Self::TimedOut => "possible issues:\n  1. network connectivity problems\n  2. system overloaded or slow\n  3. firewall dropping packets\n  4. VPN connection issues".to_string(),
            Self::NameResolution => format!(
                "hostname '{hostname}' could not be resolved:\n  1. check the spelling of the hostname\n  2. DNS resolution problems\n  3. VPN not connected"
            ),
            Self::ClosedImmediately => format!(
                "this usually indicates:\n  1. wrong port number (HTTP is usually 8000, not {port})\n  2. ADT services not activated in SICF\n  3. system rejecting plain HTTP connections\n  try: export SAP_HOST=\"{hostname}:8000\"",
                port = port_of(host).unwrap_or("unknown"),
            ),
            Self::Other => "check host, port and TLS settings".to_string(),
        }
    }
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Refused => "connection refused",
            Self::TimedOut => "connection timed out",
            Self::NameResolution => "hostname resolution failed",
            Self::ClosedImmediately => "connection closed immediately",
            Self::Other => "connectivity failed",
        };
        f.write_str(label)
    }
}

/// Kind of remote conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Object with this name already exists
    AlreadyExists,
    /// Another session holds the exclusive lock
    AlreadyLocked,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => f.write_str("already exists"),
            Self::AlreadyLocked => f.write_str("already locked by another session"),
        }
    }
}

/// Main ADT error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdtError {
    /// Host unreachable
    #[error("{kind} to {host}: {detail}\n{}", hint_for(.kind, .host))]
    Connectivity {
        /// Classified cause
        kind: ConnectivityKind,
        /// Host and port that was probed
        host: String,
        /// Underlying transport message
        detail: String,
    },

    /// Invalid credentials (401)
    #[error("authentication failed (401): {0}")]
    Authentication(String),

    /// Missing authorization (403)
    #[error("access forbidden (403): {0}")]
    Authorization(String),

    /// Artifact or endpoint absent (404)
    #[error("{0} not found (404)")]
    NotFound(String),

    /// Object exists already or is locked elsewhere
    #[error("{target} {kind}: {detail}")]
    Conflict {
        /// Conflict classification
        kind: ConflictKind,
        /// Object that conflicted
        target: String,
        /// Server message
        detail: String,
    },

    /// Response shape not recognized
    #[error("protocol error: {message}")]
    Protocol {
        /// What was expected
        message: String,
        /// Raw payload for diagnosis
        raw: Option<String>,
    },

    /// Server-side failure (5xx)
    #[error("server error (HTTP {status}): {body}")]
    Server {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Status that fits no other category
    #[error("unexpected HTTP {status} from {context}: {body}")]
    UnexpectedStatus {
        /// HTTP status
        status: u16,
        /// Operation that received it
        context: String,
        /// Response body
        body: String,
    },

    /// Optional endpoint not deployed on this system
    #[error("service not available: {0}")]
    ServiceUnavailable(String),

    /// Request failed after the session was established
    #[error("request failed: {0}")]
    Transport(String),

    /// Write attempted without a CSRF token
    #[error("missing CSRF token: write requests require an authenticated session")]
    MissingCsrfToken,

    /// Operation attempted before authentication
    #[error("client not authenticated - authenticate first")]
    NotAuthenticated,

    /// Caller supplied unusable arguments
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Profile or client configuration is unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// Primary failure followed by a failed unlock
    #[error("{primary} (unlock also failed: {unlock})")]
    UnlockAlsoFailed {
        /// The error that aborted the mutation
        primary: Box<AdtError>,
        /// The secondary unlock failure
        unlock: Box<AdtError>,
    },
}

impl AdtError {
    /// Create protocol error without a payload
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            raw: None,
        }
    }

    /// Create protocol error carrying the raw response
    pub fn protocol_with_raw(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            raw: Some(raw.into()),
        }
    }

    /// Create connectivity error
    pub fn connectivity(
        kind: ConnectivityKind,
        host: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Connectivity {
            kind,
            host: host.into(),
            detail: detail.into(),
        }
    }

    /// Create conflict error
    pub fn conflict(
        kind: ConflictKind,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind,
            target: target.into(),
            detail: detail.into(),
        }
    }

    /// Append a failed unlock to this error without replacing it
    #[must_use]
    pub fn with_unlock_failure(self, unlock: AdtError) -> Self {
        Self::UnlockAlsoFailed {
            primary: Box::new(self),
            unlock: Box::new(unlock),
        }
    }

    /// The error that caused the failure, ignoring appended unlock failures
    #[must_use]
    pub fn primary(&self) -> &AdtError {
        match self {
            Self::UnlockAlsoFailed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Check if error is an authentication failure
    #[inline]
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self.primary(), Self::Authentication(_))
    }

    /// Check if another session holds the lock
    #[inline]
    #[must_use]
    pub fn is_already_locked(&self) -> bool {
        matches!(
            self.primary(),
            Self::Conflict {
                kind: ConflictKind::AlreadyLocked,
                ..
            }
        )
    }

    /// Check if re-running the operation might succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.primary(),
            Self::Connectivity { .. } | Self::Server { .. } | Self::Transport(_)
        )
    }
}

/// Result type alias for ADT operations
pub type AdtResult<T> = Result<T, AdtError>;

fn hint_for(kind: &ConnectivityKind, host: &str) -> String {
    kind.hint(host)
}

fn hostname_of(host: &str) -> &str {
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

fn port_of(host: &str) -> Option<&str> {
    host.rsplit_once(':').map(|(_, port)| port)
}
