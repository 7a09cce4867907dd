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
use super::{AuthStrategy, IssuedToken, LoginResponse, VAULT_REQUEST_HEADER, handle_error_response};
use crate::config::{KubernetesAuthConfig, vault_endpoint};
use crate::state::{AuthState, SharedAuthState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use vault_auth_core::util::Clock;
use vault_auth_core::vault::VaultError;

/// Registry name of the Kubernetes auth method.
pub const KUBERNETES_AUTH_METHOD: &str = "kubernetes";

const KUBERNETES_LOGIN_PATH: &str = "v1/auth/kubernetes/login";

/// Performs the Vault Kubernetes auth login exchange.
#[derive(Clone)]
pub struct KubernetesAuthClient {
    http_client: Client,
    login_url: String,
}

impl KubernetesAuthClient {
    pub fn new(http_client: Client, vault_url: &url::Url) -> Self {
        Self {
            http_client,
            login_url: vault_endpoint(vault_url, KUBERNETES_LOGIN_PATH),
        }
    }

    /// Exchanges a service account JWT for a Vault token.
    pub async fn login(&self, role: &str, jwt: &str) -> Result<IssuedToken, VaultError> {
        let request = KubernetesLoginRequest { role, jwt };

        let response = self
            .http_client
            .post(&self.login_url)
            .header(VAULT_REQUEST_HEADER, "true")
            .json(&request)
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to reach Vault for Kubernetes login: {}", e)))?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, "Kubernetes login failed").await);
        }

        let login_response: LoginResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidData(format!("Failed to parse Kubernetes login response: {}", e)))?;

        Ok(login_response.into())
    }
}

/// Vault Kubernetes login request
#[derive(Serialize)]
struct KubernetesLoginRequest<'a> {
    role: &'a str,
    jwt: &'a str,
}

/// Source of the Kubernetes service account JWT.
///
/// The token file is read on every login because projected service account tokens are rotated
/// by the kubelet. An inline token, if configured, is used when the file cannot be read.
pub struct ServiceAccountToken {
    path: PathBuf,
    inline: Option<String>,
}

impl ServiceAccountToken {
    /// Fails if neither the token file exists nor an inline token is configured.
    pub fn new(path: impl Into<PathBuf>, inline: Option<String>) -> Result<Self, VaultError> {
        let path = path.into();
        if inline.is_none() && !path.exists() {
            return Err(VaultError::ConfigurationError(format!(
                "Service account token file {} does not exist and no service account token is configured",
                path.display()
            )));
        }
        Ok(Self { path, inline })
    }

    pub async fn read(&self) -> Result<String, VaultError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    return Err(VaultError::ServiceAccountTokenError(format!(
                        "Service account token file {} is empty",
                        self.path.display()
                    )));
                }
                Ok(token.to_string())
            }
            Err(e) => match &self.inline {
                Some(token) => {
                    warn!(
                        "Failed reading service account token from local path [{}]: {}. Using configured token",
                        self.path.display(),
                        e
                    );
                    Ok(token.clone())
                }
                None => Err(VaultError::ServiceAccountTokenError(format!(
                    "Failed to read service account token file {}: {}",
                    self.path.display(),
                    e
                ))),
            },
        }
    }
}

/// Obtains Vault tokens by logging in with the workload's Kubernetes service account.
pub struct KubernetesAuth {
    role: String,
    client: KubernetesAuthClient,
    service_account_token: ServiceAccountToken,
    state: SharedAuthState,
}

impl KubernetesAuth {
    /// Creates the strategy without contacting Vault. The first token is obtained by
    /// [`login`](AuthStrategy::login) or lazily by the first [`current_token`](AuthStrategy::current_token).
    pub fn new(config: &KubernetesAuthConfig, http_client: Client, clock: Arc<dyn Clock>) -> Result<Self, VaultError> {
        let service_account_token = ServiceAccountToken::new(
            config.service_account_token_path(),
            config.service_account_token().map(str::to_string),
        )?;

        Ok(Self {
            role: config.role().to_string(),
            client: KubernetesAuthClient::new(http_client, config.vault_url()),
            service_account_token,
            state: SharedAuthState::new(clock, config.expiration_threshold_seconds()),
        })
    }

    /// True if no login has succeeded yet or the token is within the expiration threshold.
    pub async fn should_renew(&self) -> bool {
        self.state.should_renew().await
    }

    /// Expiry of the current token, or `None` before the first successful login.
    pub async fn token_expiration_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.snapshot().await.lease().and_then(|lease| lease.expires_at())
    }

    pub async fn status(&self) -> Arc<AuthState> {
        self.state.snapshot().await
    }

    async fn login_unguarded(&self) -> Result<IssuedToken, VaultError> {
        let result = match self.service_account_token.read().await {
            Ok(jwt) => self.client.login(&self.role, &jwt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(issued) => {
                let lease = self
                    .state
                    .record_success(issued.client_token.clone(), issued.lease_duration)
                    .await;
                debug!(
                    "Kubernetes login succeeded for role '{}', token expires at {:?}",
                    self.role,
                    lease.expires_at()
                );
                Ok(issued)
            }
            Err(e) => {
                warn!("Failed login with Kubernetes service account token: ({})", e);
                self.state.record_failure(&e).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AuthStrategy for KubernetesAuth {
    async fn login(&self) -> Result<IssuedToken, VaultError> {
        let seen = self.state.snapshot().await;
        let _guard = self.state.lock_login().await;
        // Join a login that completed while this one waited for the guard
        if let Some(lease) = self.state.succeeded_since(&seen).await {
            debug!("Using the token from a concurrent Kubernetes login");
            return Ok(IssuedToken::new(lease.token(), lease.lease_duration()));
        }
        self.login_unguarded().await
    }

    async fn current_token(&self) -> Result<String, VaultError> {
        if self.state.should_renew().await {
            let _guard = self.state.lock_login().await;
            // Another caller may have logged in while this one waited
            if self.state.should_renew().await && self.login_unguarded().await.is_err() {
                debug!("Serving the previous Vault token until a login succeeds");
            }
        }

        let snapshot = self.state.snapshot().await;
        snapshot.token().map(str::to_string).ok_or_else(|| {
            VaultError::AuthenticationError(format!(
                "No Vault token has been obtained with Kubernetes auth: {}",
                snapshot.last_error().unwrap_or("login has not been attempted")
            ))
        })
    }
}
