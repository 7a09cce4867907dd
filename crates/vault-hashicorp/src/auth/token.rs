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
use super::{AuthStrategy, IssuedToken, LoginResponse, VAULT_REQUEST_HEADER, VAULT_TOKEN_HEADER, handle_error_response};
use crate::config::{DEFAULT_TOKEN_TTL, TokenAuthConfig, vault_endpoint};
use crate::state::{AuthState, SharedAuthState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use vault_auth_core::util::Clock;
use vault_auth_core::vault::VaultError;

/// Registry name of the token-based auth method.
pub const TOKEN_AUTH_METHOD: &str = "token-based";

const RENEW_SELF_PATH: &str = "v1/auth/token/renew-self";

/// Serves a pre-issued Vault token and extends its lease in place via `renew-self`.
pub struct RenewableTokenAuth {
    http_client: Client,
    renew_url: String,
    token: String,
    ttl: u64,
    state: SharedAuthState,
}

impl RenewableTokenAuth {
    pub fn new(config: &TokenAuthConfig, http_client: Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            http_client,
            renew_url: vault_endpoint(config.vault_url(), RENEW_SELF_PATH),
            token: config.token().to_string(),
            ttl: config.renewal().ttl().unwrap_or(DEFAULT_TOKEN_TTL),
            state: SharedAuthState::new(clock, config.renewal().renew_buffer()),
        }
    }

    /// Expiry reported by the last successful renewal.
    pub async fn token_expiration_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.snapshot().await.lease().and_then(|lease| lease.expires_at())
    }

    pub async fn status(&self) -> Arc<AuthState> {
        self.state.snapshot().await
    }

    async fn renew_self(&self) -> Result<IssuedToken, VaultError> {
        let request = TokenRenewRequest {
            increment: format!("{}s", self.ttl),
        };

        let response = self
            .http_client
            .post(&self.renew_url)
            .header(VAULT_REQUEST_HEADER, "true")
            .header(VAULT_TOKEN_HEADER, &self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| VaultError::NetworkError(format!("Failed to renew token: {}", e)))?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, "Token renewal failed").await);
        }

        let renew_response: LoginResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidData(format!("Failed to parse token renewal response: {}", e)))?;

        Ok(renew_response.into())
    }
}

#[async_trait]
impl AuthStrategy for RenewableTokenAuth {
    async fn login(&self) -> Result<IssuedToken, VaultError> {
        let _guard = self.state.lock_login().await;
        match self.renew_self().await {
            Ok(issued) => {
                let lease = self
                    .state
                    .record_success(issued.client_token.clone(), issued.lease_duration)
                    .await;
                debug!("Vault token renewed, expires at {:?}", lease.expires_at());
                Ok(issued)
            }
            Err(e) => {
                warn!("Failed to renew Vault token: ({})", e);
                self.state.record_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn current_token(&self) -> Result<String, VaultError> {
        // Renewal extends the configured token rather than replacing it
        Ok(self.token.clone())
    }
}

/// Vault token renewal request
#[derive(Debug, Serialize)]
struct TokenRenewRequest {
    increment: String,
}
