//! ADT Client - session and object-locking protocol engine
//!
//! Establishes an authenticated, stateful connection to an ADT server and
//! drives the multi-step workflows on top of it:
//! - Four-step handshake producing a session with a CSRF token
//! - Exclusive object locks tolerant of both response encodings
//! - lock → PUT → unlock source mutation with unlock on every exit path
//! - Activation, search, package listings and the data preview
//! - A fingerprint-keyed connection cache with a liveness probe
//!
//! # Example
//!
//! ```rust,ignore
//! use adt_client::{AdtService, ConnectionCache};
//! use adt_core::{ConnectionProfile, ObjectKind, Secret};
//!
//! # async fn example() -> adt_core::AdtResult<()> {
//! let cache = ConnectionCache::new();
//! let profile = ConnectionProfile::new("erp.local:8000", "DEVELOPER", Secret::new("pw"));
//!
//! let client = cache.get_or_create(&profile).await?;
//! let source = client.get_object(ObjectKind::Program, "ZHELLO", &[]).await?;
//! println!("{}", source.source);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod auth;
pub mod cache;
pub mod client;
pub mod lock;
pub mod mutation;
pub mod service;
pub mod transport;
pub mod xml;

pub use auth::{Authenticator, DISCOVERY_PATHS};
pub use cache::{AdtConnector, CacheStats, ConnectionCache, Connector, DEFAULT_TTL};
pub use client::AdtClient;
pub use lock::LOCK_ACCEPT;
pub use service::AdtService;
pub use transport::{OutboundRequest, RawResponse, Transport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the ADT client
    pub use crate::{AdtClient, AdtService, ConnectionCache};
    pub use adt_core::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
