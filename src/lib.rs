//! geolocate: IP geolocation core for a CMS map-field plugin.
//!
//! Given an IP address and a configured provider, this library produces a
//! normalized location record, with result caching and a background refresh
//! mechanism for the offline GeoLite2 database. The host application
//! supplies configuration and an expiring key-value store and calls
//! [`Resolver::lookup`]; everything else (storage schema, UI, plugin
//! lifecycle) lives in the host.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use geolocate::{GeoConfig, LookupOutcome, MemoryStore, Resolver, ServiceConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GeoConfig {
//!     service: ServiceConfig::IpStack { access_key: "key".into() },
//!     ..GeoConfig::disabled()
//! };
//! let client = reqwest::Client::builder()
//!     .timeout(geolocate::config::HTTP_TIMEOUT)
//!     .build()?;
//! let resolver = Resolver::from_config(&config, client, Arc::new(MemoryStore::new()));
//!
//! match resolver.lookup("81.2.69.160").await? {
//!     LookupOutcome::Found(record) => println!("{}", record.address()),
//!     LookupOutcome::Absent => println!("no location"),
//!     LookupOutcome::NotReady => println!("database downloading, try later"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod asset;
pub mod cache;
pub mod config;
pub mod error_handling;
mod ip;
pub mod models;
pub mod providers;
pub mod resolver;

// Re-export public API
pub use cache::{ExpiringStore, LocationCache, MemoryStore};
pub use config::{GeoConfig, GeoService, ServiceConfig};
pub use error_handling::{GeoError, ProviderError};
pub use ip::validate_public_ip;
pub use models::{LocationParts, LocationRecord};
pub use providers::LocationProvider;
pub use resolver::{LookupOutcome, Resolver};
