mod address;
mod cache;
mod config;
mod db;
mod distance;
mod errors;
mod health;
mod providers;
mod queue;
mod records;
mod resolver;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::SqliteGeocodeStore;
use crate::db::{bootstrap, DatabaseContext};

pub use address::{Address, PostalCode};
pub use cache::{CacheEntry, GeocodeStore, MemoryCache};
pub use config::{AppConfig, PublicAppConfig};
pub use distance::{
    distance_km, find_nearest, find_within_radius, nearby_sorted, round_km, GeoPoint, Located,
    Nearby, EARTH_RADIUS_KM,
};
pub use errors::{AppError, AppResult};
pub use health::ResolverHealth;
pub use providers::{
    ForwardGeocoder, NominatimClient, PostalAddress, PostalCodeLookup, ViaCepClient,
};
pub use queue::RequestQueue;
pub use records::{facilities_near, nearest_health_unit, Facility, FacilityKind, Patient};
pub use resolver::{
    GeocodeResolver, GeocodeResult, GeocodeSource, GeocodeStats, ResolverSettings,
};

/// Process-wide handle on the geocode cache database and the resolver.
pub struct GeoState {
    db_path: PathBuf,
    config: AppConfig,
    resolver: Arc<GeocodeResolver>,
}

impl GeoState {
    pub fn initialize(data_dir: impl AsRef<Path>) -> AppResult<Self> {
        init_tracing();
        Self::with_config(data_dir, AppConfig::from_env())
    }

    pub fn with_config(data_dir: impl AsRef<Path>, config: AppConfig) -> AppResult<Self> {
        let DatabaseContext { connection, path } =
            bootstrap(data_dir, &config.database_file_name)?;
        let store = Arc::new(SqliteGeocodeStore::new(Arc::new(Mutex::new(connection))));
        let resolver = GeocodeResolver::new(store, &config)?;

        info!(
            country = %config.country_code,
            min_interval_ms = config.min_interval_ms,
            "geocoding resolver ready"
        );
        Ok(Self {
            db_path: path,
            config,
            resolver: Arc::new(resolver),
        })
    }

    pub fn resolver(&self) -> Arc<GeocodeResolver> {
        Arc::clone(&self.resolver)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn health(&self) -> AppResult<ResolverHealth> {
        let persisted = self.resolver.persisted_entries().await?;
        Ok(ResolverHealth::new(
            self.db_path.to_string_lossy().to_string(),
            persisted,
            self.resolver.memory_entries(),
            self.resolver.queue_depth(),
            self.config.public_profile(),
        ))
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,georef=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
