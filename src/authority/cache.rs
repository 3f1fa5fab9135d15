// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! TTL cache over the authority client with request collapsing.
//!
//! Concurrent lookups of the same unknown application share one in-flight
//! fetch instead of stampeding the authority. Failures are surfaced to
//! every waiter but never cached, so the next caller triggers a fresh
//! fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{ApplicationInfo, AuthorityClient, AuthorityError};

type FetchFuture = Shared<BoxFuture<'static, Result<Arc<ApplicationInfo>, AuthorityError>>>;

struct ReadyEntry {
    info: Arc<ApplicationInfo>,
    expires_at: Instant,
}

struct CacheShared {
    client: AuthorityClient,
    default_ttl: Duration,
    ready: Mutex<HashMap<Uuid, ReadyEntry>>,
    in_flight: Mutex<HashMap<Uuid, FetchFuture>>,
}

/// Caching front for [`AuthorityClient`]. Cheap to clone; clones share
/// one cache.
#[derive(Clone)]
pub struct KeyCache {
    shared: Arc<CacheShared>,
}

impl KeyCache {
    pub fn new(client: AuthorityClient, default_ttl: Duration) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                client,
                default_ttl,
                ready: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Look up the registration record for `app_uuid`, fetching from the
    /// authority on a miss. Concurrent misses for the same UUID collapse
    /// into a single fetch.
    pub async fn resolve(&self, app_uuid: Uuid) -> Result<Arc<ApplicationInfo>, AuthorityError> {
        {
            let ready = self.shared.ready.lock().await;
            if let Some(entry) = ready.get(&app_uuid) {
                if entry.expires_at > Instant::now() {
                    return Ok(Arc::clone(&entry.info));
                }
            }
        }

        let fetch = {
            let mut in_flight = self.shared.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&app_uuid) {
                existing.clone()
            } else {
                let shared = Arc::clone(&self.shared);
                let fetch: FetchFuture = async move {
                    let outcome = shared.client.fetch_application_info(&app_uuid).await;
                    let result = match outcome {
                        Ok((info, ttl)) => {
                            let info = Arc::new(info);
                            let ttl = ttl.unwrap_or(shared.default_ttl);
                            debug!(app_uuid = %app_uuid, ttl_secs = ttl.as_secs(), "caching application record");
                            let mut ready = shared.ready.lock().await;
                            ready.insert(
                                app_uuid,
                                ReadyEntry {
                                    info: Arc::clone(&info),
                                    expires_at: Instant::now() + ttl,
                                },
                            );
                            Ok(info)
                        }
                        Err(e) => Err(e),
                    };
                    // Clear the collapse slot whether the fetch succeeded
                    // or not; failures must not pin future lookups.
                    shared.in_flight.lock().await.remove(&app_uuid);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(app_uuid, fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Drop any cached record for `app_uuid`. The next lookup refetches.
    pub async fn evict(&self, app_uuid: &Uuid) {
        self.shared.ready.lock().await.remove(app_uuid);
    }

    /// Whether a fresh record for `app_uuid` is currently cached.
    pub async fn contains(&self, app_uuid: &Uuid) -> bool {
        self.shared
            .ready
            .lock()
            .await
            .get(app_uuid)
            .map(|entry| entry.expires_at > Instant::now())
            .unwrap_or(false)
    }
}
