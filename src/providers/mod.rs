//! Outbound geocoding collaborators.
//!
//! The resolver only sees these traits; the HTTP clients are the shipped
//! implementations and tests substitute their own.

mod nominatim;
mod viacep;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::PostalCode;
use crate::distance::GeoPoint;
use crate::errors::AppResult;

pub use nominatim::NominatimClient;
pub use viacep::ViaCepClient;

/// Free-text search. `Ok(None)` means the provider answered with no match.
#[async_trait]
pub trait ForwardGeocoder: Send + Sync {
    async fn search(&self, query: &str) -> AppResult<Option<GeoPoint>>;
}

/// Postal-code lookup returning a structured address without coordinates.
#[async_trait]
pub trait PostalCodeLookup: Send + Sync {
    async fn lookup(&self, postal_code: &PostalCode) -> AppResult<Option<PostalAddress>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl PostalAddress {
    /// `"{street}, {neighborhood}, {city} - {state}"`, skipping blank parts.
    pub fn to_query(&self) -> String {
        let mut parts: Vec<String> = [&self.street, &self.neighborhood]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();

        let city = self.city.trim();
        let state = self.state.trim();
        match (city.is_empty(), state.is_empty()) {
            (false, false) => parts.push(format!("{city} - {state}")),
            (false, true) => parts.push(city.to_string()),
            (true, false) => parts.push(state.to_string()),
            (true, true) => {}
        }
        parts.join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.to_query().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_query_from_available_parts() {
        let full = PostalAddress {
            street: "QNM 34".into(),
            neighborhood: "Taguatinga Norte".into(),
            city: "Brasília".into(),
            state: "DF".into(),
        };
        assert_eq!(full.to_query(), "QNM 34, Taguatinga Norte, Brasília - DF");

        let city_only = PostalAddress {
            city: "Brasília".into(),
            state: "DF".into(),
            ..PostalAddress::default()
        };
        assert_eq!(city_only.to_query(), "Brasília - DF");
        assert!(PostalAddress::default().is_empty());
    }
}
