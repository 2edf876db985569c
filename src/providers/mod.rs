//! Provider adapters: interchangeable strategies for resolving an IP.
//!
//! Each adapter normalizes its provider-specific response shape into a
//! [`LocationRecord`] with the common city/postcode/state/country parts. The
//! resolver holds exactly one adapter, chosen at configuration-load time.

mod ipstack;
mod local;
mod maxmind;

pub use ipstack::IpStackProvider;
pub use local::LocalDatabaseProvider;
pub use maxmind::MaxMindProvider;

use std::collections::BTreeMap;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::error_handling::ProviderError;
use crate::models::LocationRecord;

/// A strategy for resolving an IP address to a location.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolves `ip` to a location, or a reason it could not.
    async fn resolve(&self, ip: IpAddr) -> Result<LocationRecord, ProviderError>;
}

/// Picks a localized name from a MaxMind-style names map, trying each locale
/// in order. Works for both owned maps (web service JSON) and borrowed maps
/// (mmdb reader).
pub(crate) fn pick_name<K, V>(names: Option<&BTreeMap<K, V>>, locales: &[&str]) -> Option<String>
where
    K: std::borrow::Borrow<str> + Ord,
    V: AsRef<str>,
{
    let names = names?;
    locales
        .iter()
        .find_map(|locale| names.get(*locale))
        .map(|name| name.as_ref().to_string())
}
