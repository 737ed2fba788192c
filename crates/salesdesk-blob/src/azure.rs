//! Blob store backed by the storage account's REST API.
//!
//! Requests are authorised with a shared access signature appended to the
//! query string. Without one, only publicly readable containers work.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use salesdesk_core::config::BlobConfig;

use crate::error::BlobError;
use crate::store::{BlobObject, BlobStore};

const API_VERSION: &str = "2021-08-06";

/// Characters left unescaped inside one path segment of a blob name.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct AzureBlobStore {
    client: Client,
    base_url: String,
    sas_token: Option<String>,
}

impl AzureBlobStore {
    pub fn new(
        base_url: impl Into<String>,
        sas_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BlobError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sas_token: sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &BlobConfig) -> Result<Self, BlobError> {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", config.account));
        Self::new(
            base_url,
            config.sas_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        let encoded: Vec<String> = name
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        let mut url = format!("{}/{}/{}", self.base_url, container, encoded.join("/"));
        if let Some(sas) = &self.sas_token {
            url.push('?');
            url.push_str(sas);
        }
        url
    }

    fn with_version(builder: RequestBuilder) -> RequestBuilder {
        builder.header("x-ms-version", API_VERSION)
    }

    async fn append_block(&self, url: &str, data: &[u8]) -> Result<Response, BlobError> {
        let response = Self::with_version(self.client.put(url))
            .query(&[("comp", "appendblock")])
            .body(data.to_vec())
            .send()
            .await?;
        Ok(response)
    }

    async fn create_append_blob(&self, url: &str) -> Result<(), BlobError> {
        let response = Self::with_version(self.client.put(url))
            .header("x-ms-blob-type", "AppendBlob")
            .header("content-length", "0")
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn get(&self, container: &str, name: &str) -> Result<Option<BlobObject>, BlobError> {
        let url = self.blob_url(container, name);
        let response = Self::with_version(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(container, name, "Blob not found");
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(BlobObject {
            bytes,
            content_type,
        }))
    }

    async fn append(&self, container: &str, name: &str, data: &[u8]) -> Result<(), BlobError> {
        let url = self.blob_url(container, name);
        let response = self.append_block(&url, data).await?;
        if response.status() != StatusCode::NOT_FOUND {
            ensure_success(response).await?;
            return Ok(());
        }

        debug!(container, name, "Creating append blob");
        self.create_append_blob(&url).await?;
        let response = self.append_block(&url, data).await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, BlobError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read blob error body".to_string());
    Err(BlobError::Status {
        status: status.as_u16(),
        message,
    })
}
