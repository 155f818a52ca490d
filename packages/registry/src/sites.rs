//! Layoff site loading, validation, and geocoding.

use std::collections::BTreeMap;
use std::sync::Arc;

use layoff_map_geocoder::AddressGeocoder;
use layoff_map_geocoder::address::build_full_address;
use layoff_map_geocoder::progress::ProgressCallback;
use layoff_map_geocoder::retry::{RetryPolicy, lookup_with_retry};
use layoff_map_geocoder::service_registry::GeocoderConfig;
use layoff_map_models::{Site, SiteRecord};

use crate::RegistryError;

/// Validated, non-excluded layoff sites ordered by id.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRegistry {
    sites: Vec<Site>,
    excluded: usize,
}

/// How site lookups are retried and how many run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodeOptions {
    pub retry: RetryPolicy,
    /// Lookups in flight at once (at least one).
    pub concurrent_requests: usize,
}

impl GeocodeOptions {
    #[must_use]
    pub fn from_config(config: &GeocoderConfig) -> Self {
        Self {
            retry: config.retry_policy(),
            concurrent_requests: config.concurrent_requests,
        }
    }
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrent_requests: 1,
        }
    }
}

/// Sites after geocoding, with coverage counts.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedSites {
    /// Every non-excluded site, ordered by id. Sites that could not be
    /// located carry `coordinate: None`.
    pub sites: Vec<Site>,
    /// Rows dropped by the exclusion flag.
    pub excluded: usize,
    /// Lookups that returned no candidates.
    pub unresolved: usize,
    /// Lookups that failed after every retry.
    pub failed: usize,
}

impl SiteRegistry {
    /// Drops excluded rows, checks id uniqueness, and derives each site's
    /// full address.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSite`] on the first repeated id
    /// among non-excluded rows.
    pub fn load<I>(records: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = SiteRecord>,
    {
        let mut by_id: BTreeMap<i64, Site> = BTreeMap::new();
        let mut excluded = 0usize;

        for record in records {
            if record.excluded {
                excluded += 1;
                continue;
            }

            if by_id.contains_key(&record.id) {
                return Err(RegistryError::DuplicateSite { id: record.id });
            }

            let full_address =
                build_full_address(&record.address, &record.city, &record.state, &record.zip);

            by_id.insert(
                record.id,
                Site {
                    id: record.id,
                    address: record.address,
                    city: record.city,
                    state: record.state,
                    zip: record.zip,
                    full_address,
                    coordinate: None,
                },
            );
        }

        log::info!("Loaded {} sites ({excluded} excluded)", by_id.len());

        Ok(Self {
            sites: by_id.into_values().collect(),
            excluded,
        })
    }

    #[must_use]
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Number of rows dropped by the exclusion flag.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.excluded
    }

    /// Geocodes every site's full address, one lookup per site.
    ///
    /// Lookups run concurrently up to `options.concurrent_requests` and
    /// all of them finish before this returns. A lookup that finds
    /// nothing, or still fails after `options.retry`, leaves the site's
    /// coordinate `None` and never aborts the run.
    pub async fn geocode(
        self,
        geocoder: &dyn AddressGeocoder,
        options: &GeocodeOptions,
        progress: Option<&Arc<dyn ProgressCallback>>,
    ) -> GeocodedSites {
        use futures::stream::{self, StreamExt as _};

        let concurrency = options.concurrent_requests.max(1);

        if let Some(p) = progress {
            p.set_total(self.sites.len() as u64);
            p.set_message("Geocoding sites".to_string());
        }

        log::info!(
            "Geocoding {} sites (concurrency={concurrency})...",
            self.sites.len()
        );

        let results: Vec<_> = stream::iter(self.sites.iter().enumerate().map(|(idx, site)| {
            async move {
                let result = if site.full_address.is_empty() {
                    Ok(None)
                } else {
                    lookup_with_retry(geocoder, &site.full_address, &options.retry).await
                };
                if let Some(p) = progress {
                    p.inc(1);
                }
                (idx, result)
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut sites = self.sites;
        let mut unresolved = 0usize;
        let mut failed = 0usize;

        for (idx, result) in results {
            let site = &mut sites[idx];
            match result {
                Ok(Some(coordinate)) => site.coordinate = Some(coordinate),
                Ok(None) => {
                    log::debug!("No match for site {} ('{}')", site.id, site.full_address);
                    unresolved += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Geocoding failed for site {} ('{}'): {e}",
                        site.id,
                        site.full_address
                    );
                    failed += 1;
                }
            }
        }

        let located = sites.len() - unresolved - failed;
        log::info!(
            "Geocoded {located}/{} sites ({unresolved} not found, {failed} failed)",
            sites.len()
        );

        if let Some(p) = progress {
            p.finish(format!("Geocoded {located}/{} sites", sites.len()));
        }

        GeocodedSites {
            sites,
            excluded: self.excluded,
            unresolved,
            failed,
        }
    }
}
