//! Location data structures shared across providers, cache, and resolver.

use serde::{Deserialize, Serialize};

/// The named components of a resolved location.
///
/// All fields are optional: a provider fills in what it knows and leaves the
/// rest absent. Field order (city, postcode, state, country) is the order
/// used when composing the human-readable address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationParts {
    /// City name, e.g. "Bristol".
    pub city: Option<String>,
    /// Postal / ZIP code.
    pub postcode: Option<String>,
    /// State, region, or most specific subdivision name.
    pub state: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

impl LocationParts {
    fn ordered(&self) -> [Option<&str>; 4] {
        [
            self.city.as_deref(),
            self.postcode.as_deref(),
            self.state.as_deref(),
            self.country.as_deref(),
        ]
    }
}

/// A resolved geographic location for a single IP address.
///
/// Constructed only by a provider adapter on a successful lookup and
/// immutable afterwards. Serializable so the cache can hold it by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// The validated input address.
    pub ip: String,
    /// Latitude in floating-point degrees.
    pub latitude: f64,
    /// Longitude in floating-point degrees.
    pub longitude: f64,
    /// Named location components.
    pub parts: LocationParts,
}

impl LocationRecord {
    /// Composes the human-readable address by joining the non-empty parts
    /// with `", "`.
    ///
    /// Absent and empty-string parts are skipped entirely, so the output
    /// never contains empty segments or dangling separators.
    pub fn address(&self) -> String {
        self.parts
            .ordered()
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
