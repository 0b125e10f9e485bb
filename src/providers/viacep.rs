use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{PostalAddress, PostalCodeLookup};
use crate::address::PostalCode;
use crate::config::AppConfig;
use crate::errors::AppResult;

/// ViaCEP `/ws/{cep}/json/`.
pub struct ViaCepClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    uf: Option<String>,
    #[serde(default)]
    erro: Option<Value>,
}

impl LookupResponse {
    // ViaCEP has shipped both `true` and `"true"` for this flag
    fn not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn into_address(self) -> PostalAddress {
        PostalAddress {
            street: self.logradouro.unwrap_or_default(),
            neighborhood: self.bairro.unwrap_or_default(),
            city: self.localidade.unwrap_or_default(),
            state: self.uf.unwrap_or_default(),
        }
    }
}

impl ViaCepClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::new(
            config.viacep_base_url.clone(),
            &config.user_agent,
            config.fallback_timeout(),
        )
    }

    fn lookup_url(&self, postal_code: &PostalCode) -> String {
        format!("{}/ws/{}/json/", self.base_url, postal_code.digits())
    }
}

#[async_trait]
impl PostalCodeLookup for ViaCepClient {
    async fn lookup(&self, postal_code: &PostalCode) -> AppResult<Option<PostalAddress>> {
        let url = self.lookup_url(postal_code);
        debug!(postal_code = postal_code.digits(), "calling viacep lookup");

        let response: LookupResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.not_found() {
            return Ok(None);
        }
        let address = response.into_address();
        if address.is_empty() {
            return Ok(None);
        }
        Ok(Some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_not_found_flag_variants() {
        let as_bool: LookupResponse = serde_json::from_str(r#"{"erro": true}"#).unwrap();
        let as_text: LookupResponse = serde_json::from_str(r#"{"erro": "true"}"#).unwrap();
        let found: LookupResponse = serde_json::from_str(
            r#"{"cep":"72145-450","logradouro":"QNM 34","bairro":"Taguatinga Norte","localidade":"Brasília","uf":"DF"}"#,
        )
        .unwrap();
        assert!(as_bool.not_found());
        assert!(as_text.not_found());
        assert!(!found.not_found());
        assert_eq!(found.into_address().city, "Brasília");
    }

    #[test]
    fn builds_lookup_url_from_digits() {
        let client =
            ViaCepClient::new("https://viacep.example/", "georef-test", Duration::from_secs(5))
                .unwrap();
        let cep = PostalCode::parse("72145-450").unwrap();
        assert_eq!(
            client.lookup_url(&cep),
            "https://viacep.example/ws/72145450/json/"
        );
    }
}
