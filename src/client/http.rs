use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::{ClientError, RiskApi};
use crate::config::Config;
use crate::logging::{self, obj, v_int, v_str, Domain, ProfileScope};
use crate::model::{Address, RiskAssessment};

pub struct HttpRiskClient {
    client: Client,
    base: String,
}

impl HttpRiskClient {
    pub fn new(cfg: &Config) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: cfg.api_base.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, label: &'static str) -> Result<T, ClientError> {
        let _scope = ProfileScope::new(Domain::Http, label).with_context(obj(&[("path", v_str(url.path()))]));
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        check_status(resp.status())?;

        let body = resp.text().await.map_err(|e| ClientError::Transport(e.to_string()))?;
        logging::debug(
            Domain::Http,
            label,
            obj(&[("path", v_str(url.path())), ("bytes", v_int(body.len() as u64))]),
        );
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn check_status(status: StatusCode) -> Result<(), ClientError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Http { status: status.as_u16() })
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url, ClientError> {
    Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

/// `GET {base}/api/search?q=<query>`
pub fn search_url(base: &str, query: &str) -> Result<Url, ClientError> {
    let mut url = endpoint(base, "/api/search")?;
    url.query_pairs_mut().append_pair("q", query);
    Ok(url)
}

/// `GET {base}/api/risk?lat&lon&knr&text&kommune`
pub fn risk_url(base: &str, address: &Address) -> Result<Url, ClientError> {
    let mut url = endpoint(base, "/api/risk")?;
    url.query_pairs_mut()
        .append_pair("lat", &address.latitude.to_string())
        .append_pair("lon", &address.longitude.to_string())
        .append_pair("knr", &address.kommunenummer)
        .append_pair("text", &address.text)
        .append_pair("kommune", address.kommunenavn.as_deref().unwrap_or(""));
    Ok(url)
}

#[async_trait]
impl RiskApi for HttpRiskClient {
    async fn search(&self, query: &str) -> Result<Vec<Address>, ClientError> {
        let url = search_url(&self.base, query)?;
        self.get_json(url, "search").await
    }

    async fn risk_for(&self, address: &Address) -> Result<RiskAssessment, ClientError> {
        let url = risk_url(&self.base, address)?;
        self.get_json(url, "risk").await
    }
}
