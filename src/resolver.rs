use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::address::{Address, PostalCode};
use crate::cache::{CacheEntry, GeocodeStore, MemoryCache};
use crate::config::AppConfig;
use crate::distance::{GeoPoint, Located};
use crate::errors::{AppError, AppResult};
use crate::providers::{ForwardGeocoder, NominatimClient, PostalCodeLookup, ViaCepClient};
use crate::queue::RequestQueue;

const UNRESOLVED_MESSAGE: &str = "could not geocode address";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    PrimaryProvider,
    FallbackProvider,
    Cache,
    Error,
}

impl GeocodeSource {
    pub fn as_tag(&self) -> &'static str {
        match self {
            GeocodeSource::PrimaryProvider => "primary",
            GeocodeSource::FallbackProvider => "fallback",
            GeocodeSource::Cache => "cache",
            GeocodeSource::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(GeocodeSource::PrimaryProvider),
            "fallback" => Some(GeocodeSource::FallbackProvider),
            "cache" => Some(GeocodeSource::Cache),
            "error" => Some(GeocodeSource::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub address: Address,
    pub coordinates: Option<GeoPoint>,
    pub source: GeocodeSource,
    pub error_message: Option<String>,
}

impl GeocodeResult {
    fn resolved(address: Address, point: GeoPoint, source: GeocodeSource) -> Self {
        Self {
            address,
            coordinates: Some(point),
            source,
            error_message: None,
        }
    }

    pub fn failure(address: Address, message: impl Into<String>) -> Self {
        Self {
            address,
            coordinates: None,
            source: GeocodeSource::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }

    /// The view served on later lookups of the same address.
    fn as_cached(&self) -> Self {
        let mut cached = self.clone();
        if cached.is_resolved() {
            cached.source = GeocodeSource::Cache;
        }
        cached
    }
}

impl Located for GeocodeResult {
    fn location(&self) -> Option<GeoPoint> {
        self.coordinates
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeocodeStats {
    pub total: usize,
    pub cache_hits: usize,
    pub primary: usize,
    pub fallback: usize,
    pub failed: usize,
}

impl GeocodeStats {
    pub fn from_results(results: &[GeocodeResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.source {
                GeocodeSource::Cache => stats.cache_hits += 1,
                GeocodeSource::PrimaryProvider => stats.primary += 1,
                GeocodeSource::FallbackProvider => stats.fallback += 1,
                GeocodeSource::Error => stats.failed += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub country_name: String,
    pub min_interval: Duration,
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub batch_chunk_size: usize,
    pub batch_stagger: Duration,
    pub cache_max_age_days: u32,
}

impl ResolverSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            country_name: config.country_name.clone(),
            min_interval: config.min_interval(),
            primary_timeout: config.primary_timeout(),
            fallback_timeout: config.fallback_timeout(),
            batch_chunk_size: config.batch_chunk_size.max(1),
            batch_stagger: config.batch_stagger(),
            cache_max_age_days: config.cache_max_age_days,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            country_name: "Brasil".into(),
            min_interval: Duration::from_millis(1_100),
            primary_timeout: Duration::from_secs(8),
            fallback_timeout: Duration::from_secs(5),
            batch_chunk_size: 10,
            batch_stagger: Duration::from_millis(200),
            cache_max_age_days: 30,
        }
    }
}

/// Why the postal-code fallback could not produce coordinates.
enum FallbackMiss {
    InvalidPostalCode,
    NotFound,
    LookupFailed(AppError),
    CoordinatesUnavailable,
}

impl FallbackMiss {
    fn detail(&self) -> String {
        match self {
            FallbackMiss::InvalidPostalCode => "invalid postal code for fallback lookup".into(),
            FallbackMiss::NotFound => "postal code not found".into(),
            FallbackMiss::LookupFailed(err) => format!("postal code lookup failed: {err}"),
            FallbackMiss::CoordinatesUnavailable => {
                "postal code found but coordinates unavailable".into()
            }
        }
    }
}

/// Address-to-coordinate resolution over two caches and two providers.
///
/// Every outbound call to the forward geocoder goes through one shared
/// [`RequestQueue`], including the second search the postal-code fallback
/// triggers. The postal-code lookup itself bypasses the queue so a fallback
/// never waits on a lane it would then need again.
pub struct GeocodeResolver {
    memory: MemoryCache,
    store: Arc<dyn GeocodeStore>,
    queue: RequestQueue,
    primary: Arc<dyn ForwardGeocoder>,
    fallback: Arc<dyn PostalCodeLookup>,
    settings: ResolverSettings,
}

impl GeocodeResolver {
    pub fn new(store: Arc<dyn GeocodeStore>, config: &AppConfig) -> AppResult<Self> {
        let primary = NominatimClient::from_config(config)?;
        let fallback = ViaCepClient::from_config(config)?;
        Ok(Self::with_providers(
            store,
            Arc::new(primary),
            Arc::new(fallback),
            ResolverSettings::from_config(config),
        ))
    }

    pub fn with_providers(
        store: Arc<dyn GeocodeStore>,
        primary: Arc<dyn ForwardGeocoder>,
        fallback: Arc<dyn PostalCodeLookup>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            memory: MemoryCache::default(),
            store,
            queue: RequestQueue::new(settings.min_interval),
            primary,
            fallback,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn set_min_interval(&self, interval: Duration) {
        self.queue.set_min_interval(interval);
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn memory_entries(&self) -> usize {
        self.memory.len()
    }

    pub fn clear_memory_cache(&self) {
        self.memory.clear();
    }

    pub async fn persisted_entries(&self) -> AppResult<usize> {
        self.store.count().await
    }

    pub async fn geocode(&self, address: &Address) -> GeocodeResult {
        let key = address.cache_key();
        if let Some(hit) = self.memory.get(&key) {
            debug!(key = %key, "geocode served from memory cache");
            return hit;
        }

        match self.store.get(&key).await {
            Ok(Some(entry)) => {
                let result = entry.into_result();
                self.memory.insert(key, result.clone());
                return result;
            }
            Ok(None) => {}
            Err(err) => warn!(?err, key = %key, "geocode cache read failed, treating as miss"),
        }

        let result = self.resolve_uncached(address).await;
        self.remember(key, &result).await;
        result
    }

    /// Results keep input order; one failing address never affects the others.
    pub async fn batch_geocode(&self, addresses: &[Address]) -> Vec<GeocodeResult> {
        let mut results = Vec::with_capacity(addresses.len());
        let stagger = self.settings.batch_stagger;
        for chunk in addresses.chunks(self.settings.batch_chunk_size.max(1)) {
            let jobs = chunk.iter().enumerate().map(|(idx, address)| async move {
                if !stagger.is_zero() && idx > 0 {
                    sleep(stagger * idx as u32).await;
                }
                self.geocode(address).await
            });
            results.extend(join_all(jobs).await);
        }

        let stats = GeocodeStats::from_results(&results);
        info!(
            total = stats.total,
            cache_hits = stats.cache_hits,
            failed = stats.failed,
            "batch geocode finished"
        );
        results
    }

    pub async fn clear_old_cache(&self, days_old: u32) -> AppResult<usize> {
        let Some(cutoff) =
            Utc::now().checked_sub_signed(chrono::Duration::days(i64::from(days_old)))
        else {
            debug!(days_old, "cache age cutoff precedes representable dates");
            return Ok(0);
        };
        let removed = self.store.delete_older_than(cutoff).await?;
        info!(removed, days_old, "purged stale geocode cache entries");
        Ok(removed)
    }

    pub async fn clear_expired_cache(&self) -> AppResult<usize> {
        self.clear_old_cache(self.settings.cache_max_age_days).await
    }

    async fn resolve_uncached(&self, address: &Address) -> GeocodeResult {
        match self.search_primary(address.search_query(&self.settings.country_name)).await {
            Ok(Some(point)) => {
                return GeocodeResult::resolved(
                    address.clone(),
                    point,
                    GeocodeSource::PrimaryProvider,
                );
            }
            Ok(None) => debug!(text = %address.text, "primary geocoder found no match"),
            Err(err) => warn!(?err, text = %address.text, "primary geocoder failed"),
        }

        match self.resolve_via_postal_code(address).await {
            Ok(point) => {
                GeocodeResult::resolved(address.clone(), point, GeocodeSource::FallbackProvider)
            }
            Err(miss) => {
                let message = format!("{UNRESOLVED_MESSAGE}: {}", miss.detail());
                warn!(
                    text = %address.text,
                    postal_code = %address.postal_code,
                    reason = %message,
                    "address unresolved"
                );
                GeocodeResult::failure(address.clone(), message)
            }
        }
    }

    async fn resolve_via_postal_code(&self, address: &Address) -> Result<GeoPoint, FallbackMiss> {
        let postal_code =
            PostalCode::parse(&address.postal_code).map_err(|_| FallbackMiss::InvalidPostalCode)?;

        let lookup = timeout(
            self.settings.fallback_timeout,
            self.fallback.lookup(&postal_code),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::Timeout {
                provider: "postal code lookup",
                after_ms: self.settings.fallback_timeout.as_millis() as u64,
            })
        });

        let structured = match lookup {
            Ok(Some(structured)) => structured,
            Ok(None) => return Err(FallbackMiss::NotFound),
            Err(err) => return Err(FallbackMiss::LookupFailed(err)),
        };

        let improved = Address::new(structured.to_query(), address.postal_code.clone());
        debug!(query = %improved.text, "retrying primary geocoder with postal code address");
        match self.search_primary(improved.search_query(&self.settings.country_name)).await {
            Ok(Some(point)) => Ok(point),
            Ok(None) => Err(FallbackMiss::CoordinatesUnavailable),
            Err(err) => {
                warn!(?err, "primary geocoder failed for postal code address");
                Err(FallbackMiss::CoordinatesUnavailable)
            }
        }
    }

    async fn search_primary(&self, query: String) -> AppResult<Option<GeoPoint>> {
        let limit = self.settings.primary_timeout;
        let primary = &self.primary;
        let query = query.as_str();
        self.queue
            .run(move || async move {
                timeout(limit, primary.search(query))
                    .await
                    .unwrap_or_else(|_| {
                        Err(AppError::Timeout {
                            provider: "primary geocoder",
                            after_ms: limit.as_millis() as u64,
                        })
                    })
            })
            .await
    }

    async fn remember(&self, key: String, result: &GeocodeResult) {
        let entry = CacheEntry::from_result(key.clone(), result);
        if let Err(err) = self.store.set(entry).await {
            warn!(?err, key = %key, "failed to persist geocode result");
        }
        self.memory.insert(key, result.as_cached());
    }
}
