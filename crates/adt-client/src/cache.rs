//! Authenticated connection cache using moka
//!
//! Reuses a live client per profile fingerprint:
//! - Entries expire lazily after the TTL (default 30 minutes)
//! - A hit is only returned if the liveness probe succeeds
//! - Concurrent misses for one fingerprint run a single handshake
//! - Failed probes count as a miss; failed handshakes propagate
//!
//! The cache is an explicit object shared by `Arc`, cleared once at shutdown.

use crate::client::AdtClient;
use adt_core::{AdtError, AdtResult, ConnectionProfile, Fingerprint};
use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of a cached connection
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on distinct profiles held at once
const MAX_ENTRIES: u64 = 64;

/// Builds and probes connections for the cache
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type handed out by the cache
    type Connection: Send + Sync + 'static;

    /// Build an authenticated connection
    async fn connect(&self, profile: &ConnectionProfile) -> AdtResult<Self::Connection>;

    /// Liveness probe of a cached connection
    async fn is_alive(&self, connection: &Self::Connection) -> bool;
}

/// Connector driving the full handshake
#[derive(Debug, Clone, Copy, Default)]
pub struct AdtConnector;

#[async_trait]
impl Connector for AdtConnector {
    type Connection = AdtClient;

    async fn connect(&self, profile: &ConnectionProfile) -> AdtResult<AdtClient> {
        AdtClient::connect(profile.clone()).await
    }

    async fn is_alive(&self, connection: &AdtClient) -> bool {
        match connection.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("liveness probe failed: {}", e);
                false
            }
        }
    }
}

/// Cached connection with its creation time
#[derive(Debug)]
struct CachedConnection<T> {
    connection: Arc<T>,
    created_at: Instant,
}

impl<T> Clone for CachedConnection<T> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            created_at: self.created_at,
        }
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Approximate number of entries
    pub entry_count: u64,
    /// Hits that passed the liveness probe
    pub hits: u64,
    /// Handshakes performed
    pub connects: u64,
}

/// Connection cache keyed by profile fingerprint
pub struct ConnectionCache<C: Connector = AdtConnector> {
    connector: C,
    entries: Cache<Fingerprint, CachedConnection<C::Connection>>,
    hits: AtomicU64,
    connects: AtomicU64,
}

impl ConnectionCache<AdtConnector> {
    /// Create cache with the default TTL
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(AdtConnector, DEFAULT_TTL)
    }
}

impl Default for ConnectionCache<AdtConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> ConnectionCache<C> {
    /// Create cache with a custom connector and TTL
    #[must_use]
    pub fn with_connector(connector: C, ttl: Duration) -> Self {
        Self {
            connector,
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            connects: AtomicU64::new(0),
        }
    }

    /// Return a live cached connection or build a new one
    ///
    /// # Errors
    /// Any handshake failure; liveness failures only force a rebuild
    pub async fn get_or_create(
        &self,
        profile: &ConnectionProfile,
    ) -> AdtResult<Arc<C::Connection>> {
        let fingerprint = profile.fingerprint();

        if let Some(entry) = self.entries.get(&fingerprint).await {
            if self.connector.is_alive(&entry.connection).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "reusing connection for {:?} (age {:?})",
                    fingerprint,
                    entry.created_at.elapsed()
                );
                return Ok(entry.connection);
            }
            tracing::info!("cached connection for {} is stale, reconnecting", profile.host());
            self.evict_if_current(&fingerprint, &entry.connection).await;
        }

        let entry = self
            .entries
            .try_get_with(fingerprint, async {
                self.connects.fetch_add(1, Ordering::Relaxed);
                let connection = self.connector.connect(profile).await?;
                Ok::<_, AdtError>(CachedConnection {
                    connection: Arc::new(connection),
                    created_at: Instant::now(),
                })
            })
            .await
            .map_err(|e: Arc<AdtError>| (*e).clone())?;

        Ok(entry.connection)
    }

    /// Drop the entry only while it still holds `probed`
    ///
    /// A concurrent caller may already have replaced the dead connection;
    /// that replacement stays.
    async fn evict_if_current(&self, fingerprint: &Fingerprint, probed: &Arc<C::Connection>) {
        let result = self
            .entries
            .entry(fingerprint.clone())
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if Arc::ptr_eq(&current.value().connection, probed) => {
                        Op::Remove
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        if let CompResult::Removed(_) = result {
            tracing::debug!("evicted dead connection for {:?}", fingerprint);
        }
    }

    /// Drop one profile's entry
    pub async fn invalidate(&self, profile: &ConnectionProfile) {
        self.entries.invalidate(&profile.fingerprint()).await;
    }

    /// Drop all entries
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        tracing::debug!("connection cache cleared");
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
