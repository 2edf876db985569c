//! ipstack HTTP lookup adapter.
//!
//! Issues `GET http://api.ipstack.com/<ip>?access_key=..&language=..` and
//! maps the JSON body into a [`LocationRecord`]. ipstack reports its own
//! failures in-band with `success: false`; those become
//! [`ProviderError::Remote`], never a crash.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::IPSTACK_ENDPOINT;
use crate::error_handling::ProviderError;
use crate::models::{LocationParts, LocationRecord};
use crate::providers::LocationProvider;

/// Adapter for the ipstack lookup API.
pub struct IpStackProvider {
    client: reqwest::Client,
    access_key: String,
    locale: String,
    endpoint: String,
}

impl IpStackProvider {
    /// Adapter using the injected `client` (which carries the request
    /// timeout) and the configured access key and language hint.
    pub fn new(client: reqwest::Client, access_key: String, locale: String) -> Self {
        IpStackProvider {
            client,
            access_key,
            locale,
            endpoint: IPSTACK_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpStackResponse {
    success: Option<bool>,
    error: Option<IpStackError>,
    city: Option<String>,
    zip: Option<String>,
    region_name: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IpStackError {
    info: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Maps a decoded ipstack body into a record. Split from the transport so
/// the mapping is testable offline.
fn record_from_response(
    ip: IpAddr,
    response: IpStackResponse,
) -> Result<LocationRecord, ProviderError> {
    if response.success == Some(false) {
        let detail = response
            .error
            .and_then(|e| e.info.or(e.kind))
            .unwrap_or_else(|| "unspecified error".to_string());
        return Err(ProviderError::Remote(detail));
    }

    let (latitude, longitude) = match (response.latitude, response.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(ProviderError::Remote(
                "response missing coordinates".to_string(),
            ))
        }
    };

    Ok(LocationRecord {
        ip: ip.to_string(),
        latitude,
        longitude,
        parts: LocationParts {
            city: response.city,
            postcode: response.zip,
            state: response.region_name,
            country: response.country_name,
        },
    })
}

#[async_trait]
impl LocationProvider for IpStackProvider {
    async fn resolve(&self, ip: IpAddr) -> Result<LocationRecord, ProviderError> {
        let url = format!("{}/{}", self.endpoint, ip);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("language", self.locale.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: IpStackResponse = response.json().await?;
        record_from_response(ip, body).map_err(|err| {
            if let ProviderError::Remote(detail) = &err {
                log::warn!("IPStack lookup for {} failed: {}", ip, detail);
            }
            err
        })
    }
}
