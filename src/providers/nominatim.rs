use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::ForwardGeocoder;
use crate::config::AppConfig;
use crate::distance::GeoPoint;
use crate::errors::{AppError, AppResult};

/// OpenStreetMap Nominatim `/search`, restricted to one country and one hit.
pub struct NominatimClient {
    http: Client,
    base_url: String,
    country_code: String,
    contact_email: Option<String>,
}

#[derive(Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

impl NominatimClient {
    pub fn new(
        base_url: impl Into<String>,
        country_code: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country_code: country_code.into(),
            contact_email: None,
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let client = Self::new(
            config.nominatim_base_url.clone(),
            config.country_code.clone(),
            &config.user_agent,
            config.primary_timeout(),
        )?;
        Ok(client.with_contact_email(config.contact_email.clone()))
    }

    pub fn with_contact_email(mut self, email: Option<String>) -> Self {
        self.contact_email = email;
        self
    }

    fn search_url(&self, query: &str) -> AppResult<Url> {
        let mut params = vec![
            ("q", query),
            ("format", "json"),
            ("countrycodes", self.country_code.as_str()),
            ("limit", "1"),
        ];
        if let Some(email) = &self.contact_email {
            params.push(("email", email.as_str()));
        }
        Url::parse_with_params(&format!("{}/search", self.base_url), &params)
            .map_err(|err| AppError::Config(format!("invalid nominatim url: {err}")))
    }
}

#[async_trait]
impl ForwardGeocoder for NominatimClient {
    async fn search(&self, query: &str) -> AppResult<Option<GeoPoint>> {
        let url = self.search_url(query)?;
        debug!(query, "calling nominatim search");

        let hits: Vec<SearchHit> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        let latitude = parse_degrees(&hit.lat)?;
        let longitude = parse_degrees(&hit.lon)?;
        GeoPoint::new(latitude, longitude).map(Some)
    }
}

fn parse_degrees(value: &str) -> AppResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::Provider(format!("nominatim returned a non-numeric coordinate: {value}")))
}
