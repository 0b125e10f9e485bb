use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::trace;

use crate::address::Address;
use crate::distance::GeoPoint;
use crate::errors::{AppError, AppResult};
use crate::resolver::{GeocodeResult, GeocodeSource};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub address: Address,
    pub coordinates: Option<GeoPoint>,
    pub source: GeocodeSource,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_result(key: String, result: &GeocodeResult) -> Self {
        Self {
            key,
            address: result.address.clone(),
            coordinates: result.coordinates,
            source: result.source,
            error_message: result.error_message.clone(),
            created_at: Utc::now(),
        }
    }

    /// Cached hits report `Cache`; negative entries stay `Error`.
    pub fn into_result(self) -> GeocodeResult {
        let source = if self.coordinates.is_some() && self.source != GeocodeSource::Error {
            GeocodeSource::Cache
        } else {
            GeocodeSource::Error
        };
        GeocodeResult {
            address: self.address,
            coordinates: self.coordinates,
            source,
            error_message: self.error_message,
        }
    }
}

/// Durable cache keyed by address hash.
#[async_trait]
pub trait GeocodeStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<CacheEntry>>;
    async fn set(&self, entry: CacheEntry) -> AppResult<CacheEntry>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
    async fn count(&self) -> AppResult<usize>;
}

pub struct SqliteGeocodeStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteGeocodeStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let connection = crate::db::open_in_memory()?;
        Ok(Self::new(Arc::new(Mutex::new(connection))))
    }
}

#[async_trait]
impl GeocodeStore for SqliteGeocodeStore {
    async fn get(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT address_hash, address, postal_code, lat, lng, source, error_message, created_at
            FROM geocode_cache
            WHERE address_hash = ?1",
            [key],
            parse_cache_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    async fn set(&self, entry: CacheEntry) -> AppResult<CacheEntry> {
        {
            let conn = self.db.lock();
            conn.execute(
                "INSERT INTO geocode_cache
                    (address_hash, address, postal_code, lat, lng, source, error_message, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(address_hash) DO UPDATE SET
                    address = excluded.address,
                    postal_code = excluded.postal_code,
                    lat = excluded.lat,
                    lng = excluded.lng,
                    source = excluded.source,
                    error_message = excluded.error_message,
                    created_at = excluded.created_at",
                (
                    entry.key.as_str(),
                    entry.address.text.as_str(),
                    entry.address.postal_code.as_str(),
                    entry.coordinates.map(|p| p.latitude),
                    entry.coordinates.map(|p| p.longitude),
                    entry.source.as_tag(),
                    entry.error_message.as_deref(),
                    entry.created_at.timestamp_millis(),
                ),
            )?;
        }
        trace!(key = %entry.key, source = entry.source.as_tag(), "geocode cache entry written");
        Ok(entry)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let conn = self.db.lock();
        let removed = conn.execute(
            "DELETE FROM geocode_cache WHERE created_at < ?1",
            [cutoff.timestamp_millis()],
        )?;
        Ok(removed)
    }

    async fn count(&self) -> AppResult<usize> {
        let conn = self.db.lock();
        conn.query_row("SELECT COUNT(*) FROM geocode_cache", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|value| value as usize)
        .map_err(AppError::from)
    }
}

fn parse_cache_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let key: String = row.get(0)?;
    let text: String = row.get(1)?;
    let postal_code: String = row.get(2)?;
    let lat: Option<f64> = row.get(3)?;
    let lng: Option<f64> = row.get(4)?;
    let source: String = row.get(5)?;
    let error_message: Option<String> = row.get(6)?;
    let created_at: i64 = row.get(7)?;
    Ok(CacheEntry {
        key,
        address: Address::new(text, postal_code),
        coordinates: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::unchecked(lat, lng)),
            _ => None,
        },
        source: GeocodeSource::parse(&source).unwrap_or(GeocodeSource::Error),
        error_message,
        created_at: Utc
            .timestamp_millis_opt(created_at)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

/// Process-lifetime mirror of what the resolver wrote to the store.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, GeocodeResult>>,
}

impl MemoryCache {
    pub fn get(&self, key: &str) -> Option<GeocodeResult> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, result: GeocodeResult) {
        self.entries.lock().insert(key, result);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
