//! Configuration surface and tunable constants.
//!
//! The host application (the CMS plugin shell) builds a [`GeoConfig`] from its
//! own settings store and hands it to [`crate::resolver::Resolver::from_config`].
//! Everything here is read-only to the core.

use std::path::PathBuf;
use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

// constants (fixed by convention, overridable through constructors in tests)

/// TTL for cached location records: 60 days.
pub const LOCATION_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 60);

/// Age beyond which the local geo database is considered stale: 7 days.
pub const DB_STALE_AFTER: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Filename of the local geo database inside the storage directory.
pub const DB_FILENAME: &str = "default.mmdb";

/// Key prefix for cached location records in the expiring store.
pub const LOCATION_CACHE_KEY_PREFIX: &str = "maps_ip_";

/// Store key for the download-pending flag.
pub const DB_UPDATE_FLAG_KEY: &str = "maps_db_updating";

/// TTL on the download-pending flag. The download job clears the flag itself;
/// the TTL is a backstop so a killed process cannot wedge refresh forever.
pub const DB_UPDATE_FLAG_TTL: Duration = Duration::from_secs(60 * 60);

/// Request timeout applied to the shared HTTP client.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum attempts for one database download invocation.
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Size cap on a downloaded database archive (128 MiB).
pub const MAX_DOWNLOAD_SIZE: usize = 128 * 1024 * 1024;

/// ipstack API base URL.
pub const IPSTACK_ENDPOINT: &str = "http://api.ipstack.com";

/// MaxMind GeoIP2 web service city endpoint.
pub const MAXMIND_CITY_ENDPOINT: &str = "https://geoip.maxmind.com/geoip/v2.1/city";

/// MaxMind database download base URL.
pub const MAXMIND_DOWNLOAD_BASE: &str = "https://download.maxmind.com/app/geoip_download";

/// Edition id of the downloadable database.
pub const GEOLITE_EDITION: &str = "GeoLite2-City";

/// Fallback language for localized provider responses.
pub const DEFAULT_LOCALE: &str = "en";

/// The selectable geolocation service modes.
///
/// String forms match the host configuration surface
/// (`none|ipstack|maxmind-lite|maxmind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
pub enum GeoService {
    /// Geolocation disabled.
    #[strum(serialize = "none")]
    None,
    /// ipstack HTTP lookup API (requires an access key).
    #[strum(serialize = "ipstack")]
    IpStack,
    /// Local GeoLite2 database with background refresh.
    #[strum(serialize = "maxmind-lite")]
    MaxMindLite,
    /// MaxMind GeoIP2 web service (requires account id + license key).
    #[strum(serialize = "maxmind")]
    MaxMind,
}

impl GeoService {
    /// Human-readable label for configuration UIs.
    pub fn label(self) -> &'static str {
        match self {
            GeoService::None => "None",
            GeoService::IpStack => "IPStack",
            GeoService::MaxMindLite => "MaxMind GeoLite2 (local database)",
            GeoService::MaxMind => "MaxMind GeoIP2 (web service)",
        }
    }

    /// Lists all service modes with their labels, for dropdown-style UIs.
    pub fn options() -> Vec<(GeoService, &'static str)> {
        GeoService::iter().map(|s| (s, s.label())).collect()
    }
}

/// The active service mode together with its credentials.
#[derive(Debug, Clone)]
pub enum ServiceConfig {
    /// Geolocation disabled; lookups always resolve to nothing.
    None,
    /// ipstack HTTP lookup.
    IpStack {
        /// API access key, sent as the `access_key` query parameter.
        access_key: String,
    },
    /// MaxMind GeoIP2 web service.
    MaxMind {
        /// MaxMind account id (basic auth username).
        account_id: String,
        /// MaxMind license key (basic auth password).
        license_key: String,
    },
    /// Local GeoLite2 database.
    MaxMindLite {
        /// License key used only by the download job. GeoLite2 downloads
        /// require a (free) key; lookups themselves need no credentials.
        /// With no key the database must be provisioned out of band.
        license_key: Option<String>,
    },
}

impl ServiceConfig {
    /// The mode this configuration selects.
    pub fn service(&self) -> GeoService {
        match self {
            ServiceConfig::None => GeoService::None,
            ServiceConfig::IpStack { .. } => GeoService::IpStack,
            ServiceConfig::MaxMind { .. } => GeoService::MaxMind,
            ServiceConfig::MaxMindLite { .. } => GeoService::MaxMindLite,
        }
    }
}

/// Full configuration consumed by the resolver.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Active service and credentials.
    pub service: ServiceConfig,
    /// Preferred language for localized place names, e.g. `"en"` or `"de"`.
    pub locale: String,
    /// Directory holding the local geo database asset.
    pub storage_dir: PathBuf,
    /// Whether the enclosing product edition includes geolocation. When
    /// false the resolver refuses to operate.
    pub edition_has_geolocation: bool,
}

impl GeoConfig {
    /// Configuration with geolocation switched off.
    pub fn disabled() -> Self {
        GeoConfig {
            service: ServiceConfig::None,
            locale: DEFAULT_LOCALE.to_string(),
            storage_dir: PathBuf::from("."),
            edition_has_geolocation: true,
        }
    }
}
