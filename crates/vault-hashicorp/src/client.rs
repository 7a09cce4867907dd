//  Copyright (c) 2026 Metaform Systems, Inc
//
//  This program and the accompanying materials are made available under the
//  terms of the Apache License, Version 2.0 which is available at
//  https://www.apache.org/licenses/LICENSE-2.0
//
//  SPDX-License-Identifier: Apache-2.0
//
//  Contributors:
//       Metaform Systems, Inc. - initial API and implementation
//
use crate::auth::{VAULT_REQUEST_HEADER, VAULT_TOKEN_HEADER, handle_error_response};
use crate::config::HashicorpVaultConfig;
use crate::registry::AuthRegistry;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use vault_auth_core::vault::{SecretVersion, VaultClient, VaultError};

const CONTENT_KEY: &str = "content";
const DATA_ENTRY: &str = "data";
const METADATA_ENTRY: &str = "metadata";

/// Secret client for the Vault KV v2 engine.
///
/// Every authenticated call resolves the configured auth method and attaches the strategy's
/// current token; the client never manages token renewal itself.
pub struct HashicorpVaultClient {
    config: HashicorpVaultConfig,
    http_client: Client,
    registry: Arc<AuthRegistry>,
}

impl HashicorpVaultClient {
    pub fn new(config: HashicorpVaultConfig, http_client: Client, registry: Arc<AuthRegistry>) -> Self {
        Self {
            config,
            http_client,
            registry,
        }
    }

    /// Builds an HTTP client with the configured request timeout.
    pub fn http_client_for(config: &HashicorpVaultConfig) -> Result<Client, VaultError> {
        Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VaultError::ConfigurationError(format!("Failed to create HTTP client: {}", e)))
    }

    pub fn config(&self) -> &HashicorpVaultConfig {
        &self.config
    }

    async fn authenticated(&self, method: Method, url: Url) -> Result<RequestBuilder, VaultError> {
        let strategy = self.registry.resolve(self.config.auth_method())?;
        let token = strategy.current_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .header(VAULT_REQUEST_HEADER, "true")
            .header(VAULT_TOKEN_HEADER, token))
    }

    fn health_check_url(&self) -> Result<Url, VaultError> {
        let mut url = self.config.vault_url().clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| VaultError::ConfigurationError("Vault url cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.extend(non_empty_segments(self.config.health_check_path()));
        }

        // standbyok/perfstandbyok make standby nodes answer with the active status code
        let standby_ok = if self.config.health_standby_ok() { "true" } else { "false" };
        url.query_pairs_mut()
            .append_pair("standbyok", standby_ok)
            .append_pair("perfstandbyok", standby_ok);
        Ok(url)
    }

    /// URL of `key` below the secrets engine; `/` in keys addresses sub-folders.
    fn secret_url(&self, key: &str, entry_type: &str) -> Result<Url, VaultError> {
        let mut url = self.config.vault_url().clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| VaultError::ConfigurationError("Vault url cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.extend(non_empty_segments(self.config.secret_path()));
            segments.push(entry_type);
            if let Some(folder) = self.config.folder_path() {
                segments.extend(non_empty_segments(folder));
            }
            segments.extend(non_empty_segments(key));
        }
        Ok(url)
    }
}

fn non_empty_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn health_status_reason(status: StatusCode) -> String {
    match status.as_u16() {
        429 => "Vault is in standby".to_string(),
        472 => "Vault is in recovery mode".to_string(),
        473 => "Vault is in performance standby".to_string(),
        501 => "Vault is not initialized".to_string(),
        503 => "Vault is sealed".to_string(),
        code => format!("Vault returned unspecified code {}", code),
    }
}

#[async_trait]
impl VaultClient for HashicorpVaultClient {
    async fn health_check(&self) -> Result<(), VaultError> {
        let response = self
            .http_client
            .get(self.health_check_url()?)
            .header(VAULT_REQUEST_HEADER, "true")
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to perform healthcheck with reason: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(VaultError::Unavailable(format!(
            "Vault is not available. Reason: {}, additional information: {}",
            health_status_reason(status),
            body
        )))
    }

    async fn resolve_secret(&self, key: &str) -> Result<String, VaultError> {
        let url = self.secret_url(key, DATA_ENTRY)?;
        let response = self
            .authenticated(Method::GET, url)
            .await?
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to get secret with reason: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VaultError::SecretNotFound(key.to_string()));
        }

        if !response.status().is_success() {
            return Err(handle_error_response(response, "Failed to get secret").await);
        }

        let read_response: KvV2ReadResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidData(format!("Failed to parse secret response: {}", e)))?;

        read_response
            .data
            .data
            .get(CONTENT_KEY)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| VaultError::InvalidData("Content field not found or not a string".to_string()))
    }

    async fn store_secret(&self, key: &str, secret: &str) -> Result<SecretVersion, VaultError> {
        let url = self.secret_url(key, DATA_ENTRY)?;
        let request = KvV2WriteRequest {
            data: HashMap::from([(CONTENT_KEY, secret)]),
        };

        let response = self
            .authenticated(Method::POST, url)
            .await?
            .json(&request)
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to set secret with reason: {}", e)))?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, &format!("Failed to set secret {}", key)).await);
        }

        let write_response: KvV2WriteResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidData(format!("Failed to parse set secret response: {}", e)))?;

        debug!("Stored version {} of secret {}", write_response.data.version, key);
        Ok(write_response.data)
    }

    async fn remove_secret(&self, key: &str) -> Result<(), VaultError> {
        let url = self.secret_url(key, METADATA_ENTRY)?;
        let response = self
            .authenticated(Method::DELETE, url)
            .await?
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to destroy secret with reason: {}", e)))?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(handle_error_response(response, &format!("Failed to destroy secret {}", key)).await)
    }
}

/// Vault KV v2 write request
#[derive(Debug, Serialize)]
struct KvV2WriteRequest<'a> {
    data: HashMap<&'a str, &'a str>,
}

/// Vault KV v2 write response
#[derive(Debug, Deserialize)]
struct KvV2WriteResponse {
    data: SecretVersion,
}

/// Vault KV v2 read response
#[derive(Debug, Deserialize)]
struct KvV2ReadResponse {
    data: KvV2Data,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: serde_json::Map<String, serde_json::Value>,
}
