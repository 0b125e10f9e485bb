use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};

static CEP_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}$").expect("static CEP regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub text: String,
    pub postal_code: String,
}

impl Address {
    pub fn new(text: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Deterministic key shared by the memory and persistent caches.
    pub fn cache_key(&self) -> String {
        let material = format!(
            "{}|{}",
            normalize(&self.text),
            normalize(&self.postal_code)
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn search_query(&self, country_name: &str) -> String {
        format!(
            "{}, {}, {}",
            self.text.trim(),
            self.postal_code.trim(),
            country_name
        )
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Brazilian CEP reduced to its eight digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalCode(String);

impl PostalCode {
    pub fn parse(value: &str) -> AppResult<Self> {
        let digits: String = value.chars().filter(char::is_ascii_digit).collect();
        if CEP_PATTERN.is_match(&digits) {
            Ok(Self(digits))
        } else {
            Err(AppError::InvalidPostalCode(value.to_string()))
        }
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// `NNNNN-NNN`
    pub fn formatted(&self) -> String {
        format!("{}-{}", &self.0[..5], &self.0[5..])
    }
}
