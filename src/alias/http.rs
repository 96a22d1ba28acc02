use super::{AliasConfig, AliasDirectory, AliasRecord};
use crate::error::{GatewayError, Result};
use crate::session::Credentials;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Alias directory reached over HTTP.
///
/// - `GET    {uri}/aliases/{name}`      -> `{name, uuid}` or 404
/// - `GET    {uri}/aliases?uuid={uuid}` -> `[{name, uuid}]`
/// - `POST   {uri}/aliases`             body `{name, uuid}`
/// - `DELETE {uri}/aliases/{name}`
///
/// Mutations carry `meshblu_auth_uuid` / `meshblu_auth_token` headers.
pub struct HttpAliasDirectory {
    client: reqwest::Client,
    base_uri: String,
}

impl HttpAliasDirectory {
    pub fn new(config: &AliasConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, &config.server_uri))
    }

    pub fn with_client(client: reqwest::Client, base_uri: &str) -> Self {
        Self {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    fn alias_url(&self, name: &str) -> String {
        format!("{}/aliases/{}", self.base_uri, urlencoding::encode(name))
    }

    fn with_auth(request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        request
            .header("meshblu_auth_uuid", &credentials.uuid)
            .header("meshblu_auth_token", &credentials.token)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            warn!(error = %e, "Alias directory unreachable");
            GatewayError::bad_gateway()
        })
    }

    /// Turn a non-2xx response into an error carrying its status and body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("Alias directory error").to_string()
        } else {
            body
        };
        Err(GatewayError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl AliasDirectory for HttpAliasDirectory {
    async fn lookup(&self, name: &str) -> Result<Option<String>> {
        let response = Self::send(self.client.get(self.alias_url(name))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: AliasRecord = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|_| GatewayError::bad_gateway())?;
        Ok(Some(record.uuid))
    }

    async fn reverse_lookup(&self, uuid: &str) -> Result<Vec<String>> {
        let url = format!("{}/aliases", self.base_uri);
        let response = Self::send(self.client.get(url).query(&[("uuid", uuid)])).await?;
        let records: Vec<AliasRecord> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|_| GatewayError::bad_gateway())?;
        Ok(records.into_iter().map(|r| r.name).collect())
    }

    async fn create(&self, credentials: &Credentials, name: &str, uuid: &str) -> Result<()> {
        let url = format!("{}/aliases", self.base_uri);
        let body = AliasRecord {
            name: name.to_string(),
            uuid: uuid.to_string(),
        };
        debug!(alias = %name, "POST alias");
        let request = Self::with_auth(self.client.post(url), credentials).json(&body);
        Self::check(Self::send(request).await?).await?;
        Ok(())
    }

    async fn remove(&self, credentials: &Credentials, name: &str) -> Result<()> {
        debug!(alias = %name, "DELETE alias");
        let request = Self::with_auth(self.client.delete(self.alias_url(name)), credentials);
        Self::check(Self::send(request).await?).await?;
        Ok(())
    }
}
