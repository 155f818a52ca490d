//! In-memory geocode cache.
//!
//! Memoizes both hits and misses per normalized query so repeated
//! addresses only reach the service once. Errors are never cached so a
//! later lookup retries them. Concurrent lookups of the same query wait
//! for the first one instead of reaching the service in parallel. The
//! cache can be seeded from a previous run's geocoded-site checkpoint.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use layoff_map_models::Coordinate;

use crate::address::normalize_query;
use crate::{AddressGeocoder, GeocodeError};

/// An [`AddressGeocoder`] that consults a cache before the inner lookup.
pub struct CachedGeocoder<G> {
    inner: G,
    entries: Mutex<BTreeMap<String, Option<Coordinate>>>,
    /// One lock per query currently being looked up.
    in_flight: Mutex<BTreeMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<G> CachedGeocoder<G> {
    #[must_use]
    pub const fn new(inner: G) -> Self {
        Self {
            inner,
            entries: Mutex::new(BTreeMap::new()),
            in_flight: Mutex::new(BTreeMap::new()),
        }
    }

    /// Records known coordinates for many queries at once.
    pub fn seed_all<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = (S, Coordinate)>,
        S: AsRef<str>,
    {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (query, coordinate) in entries {
            map.insert(normalize_query(query.as_ref()), Some(coordinate));
        }
    }

    /// Number of cached queries (hits and misses).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &str) -> Option<Option<Coordinate>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn query_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drops the query lock once no other lookup holds a handle to it.
    fn release_query_lock(&self, key: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(lock) <= 2 {
            in_flight.remove(key);
        }
    }
}

#[async_trait]
impl<G: AddressGeocoder> AddressGeocoder for CachedGeocoder<G> {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let key = normalize_query(query);

        if let Some(cached) = self.get(&key) {
            log::debug!("Cache hit for '{key}'");
            return Ok(cached);
        }

        let lock = self.query_lock(&key);
        let result = {
            let _guard = lock.lock().await;

            if let Some(cached) = self.get(&key) {
                log::debug!("Cache hit for '{key}' after waiting on a duplicate lookup");
                Ok(cached)
            } else {
                let result = self.inner.lookup(query).await;
                if let Ok(found) = &result {
                    self.entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(key.clone(), *found);
                }
                result
            }
        };
        self.release_query_lock(&key, &lock);

        result
    }
}
