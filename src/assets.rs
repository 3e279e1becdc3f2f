//! Asset upload client.
//!
//! Deposit-proof screenshots are pushed to a hosted endpoint which
//! answers with a public URL; the ledger treats that URL as opaque.

use reqwest::multipart;
use serde::Deserialize;

use crate::error::AssetError;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

pub struct AssetClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl AssetClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Build a client from `ASSET_UPLOAD_URL` / `ASSET_UPLOAD_KEY`.
    pub fn from_env() -> Result<Self, AssetError> {
        let endpoint = std::env::var("ASSET_UPLOAD_URL")
            .map_err(|_| AssetError::Config("ASSET_UPLOAD_URL not set".to_string()))?;
        let api_key = std::env::var("ASSET_UPLOAD_KEY").ok();
        Ok(Self::new(endpoint, api_key))
    }

    /// Upload a file, returning its hosted URL.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AssetError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AssetError::Rejected(format!(
                "endpoint answered {}",
                response.status()
            )));
        }
        let body: UploadResponse = response.json().await?;
        Ok(body.url)
    }
}
