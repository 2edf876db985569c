//! Error taxonomy for the geolocation core.
//!
//! Normal operational trouble (bad input, network flakiness, a missing
//! database file) never surfaces as an error to the caller: providers return
//! [`ProviderError`], the resolver logs it and degrades to an absent result.
//! Only the licensing precondition is a hard stop ([`GeoError`]).

use thiserror::Error;

/// Hard failures the resolver raises to its caller.
#[derive(Error, Debug)]
pub enum GeoError {
    /// The enclosing product edition does not include geolocation. This is a
    /// precondition violation, not a runtime failure to recover from.
    #[error("geolocation is not included in this product edition")]
    NotLicensed,
}

/// Reasons a provider adapter failed to produce a location.
///
/// All variants except [`ProviderError::NotReady`] are treated identically by
/// the resolver: logged and converted to an absent result, never cached.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The local geo database is missing and a download has just been
    /// queued. Callers may surface this distinctly (e.g. as a retry-later
    /// hint) instead of a plain empty result.
    #[error("local geo database not ready; download queued")]
    NotReady,

    /// Transport-level HTTP failure, including request timeouts and
    /// undecodable response bodies.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered but reported a failure of its own (e.g. an
    /// ipstack body with `success: false`).
    #[error("provider reported failure: {0}")]
    Remote(String),

    /// The local geo database could not be opened or read, or holds no
    /// entry for the address.
    #[error("geo database error: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
}
