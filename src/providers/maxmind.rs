//! MaxMind GeoIP2 web service adapter (licensed database client).
//!
//! Issues a city lookup against the GeoIP2 Precision endpoint with HTTP
//! basic auth (`account_id:license_key`). Localized names resolve through
//! the configured locale, falling back to English; the state part comes from
//! the most specific subdivision, matching the web service's own convention.

use std::collections::BTreeMap;
use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{DEFAULT_LOCALE, MAXMIND_CITY_ENDPOINT};
use crate::error_handling::ProviderError;
use crate::models::{LocationParts, LocationRecord};
use crate::providers::{pick_name, LocationProvider};

/// Adapter for the MaxMind GeoIP2 city web service.
pub struct MaxMindProvider {
    client: reqwest::Client,
    account_id: String,
    license_key: String,
    locale: String,
}

impl MaxMindProvider {
    /// Adapter using the injected `client` and the configured account
    /// credentials and locale preference.
    pub fn new(
        client: reqwest::Client,
        account_id: String,
        license_key: String,
        locale: String,
    ) -> Self {
        MaxMindProvider {
            client,
            account_id,
            license_key,
            locale,
        }
    }

    fn locales(&self) -> [&str; 2] {
        [self.locale.as_str(), DEFAULT_LOCALE]
    }
}

#[derive(Debug, Deserialize)]
struct NamedEntity {
    names: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Postal {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CityResponse {
    city: Option<NamedEntity>,
    country: Option<NamedEntity>,
    subdivisions: Option<Vec<NamedEntity>>,
    postal: Option<Postal>,
    location: Option<Location>,
}

fn record_from_response(
    ip: IpAddr,
    response: CityResponse,
    locales: &[&str],
) -> Result<LocationRecord, ProviderError> {
    let (latitude, longitude) = match response.location {
        Some(Location {
            latitude: Some(lat),
            longitude: Some(lon),
        }) => (lat, lon),
        _ => {
            return Err(ProviderError::Remote(
                "response missing coordinates".to_string(),
            ))
        }
    };

    // Most specific subdivision is the last one.
    let state = response
        .subdivisions
        .as_ref()
        .and_then(|subs| subs.last())
        .and_then(|sub| pick_name(sub.names.as_ref(), locales));

    Ok(LocationRecord {
        ip: ip.to_string(),
        latitude,
        longitude,
        parts: LocationParts {
            city: response
                .city
                .as_ref()
                .and_then(|c| pick_name(c.names.as_ref(), locales)),
            postcode: response.postal.and_then(|p| p.code),
            state,
            country: response
                .country
                .as_ref()
                .and_then(|c| pick_name(c.names.as_ref(), locales)),
        },
    })
}

#[async_trait]
impl LocationProvider for MaxMindProvider {
    async fn resolve(&self, ip: IpAddr) -> Result<LocationRecord, ProviderError> {
        let url = format!("{}/{}", MAXMIND_CITY_ENDPOINT, ip);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.account_id, Some(&self.license_key))
            .send()
            .await?
            .error_for_status()?;

        let body: CityResponse = response.json().await?;
        record_from_response(ip, body, &self.locales())
    }
}
