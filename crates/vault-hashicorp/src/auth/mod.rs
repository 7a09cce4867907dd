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
mod kubernetes;
mod static_token;
mod token;

pub use kubernetes::{KUBERNETES_AUTH_METHOD, KubernetesAuth, KubernetesAuthClient, ServiceAccountToken};
pub use static_token::StaticTokenAuth;
pub use token::{RenewableTokenAuth, TOKEN_AUTH_METHOD};

use async_trait::async_trait;
use serde::Deserialize;
use vault_auth_core::vault::VaultError;

pub(crate) const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";
pub(crate) const VAULT_REQUEST_HEADER: &str = "X-Vault-Request";

/// A strategy for obtaining the Vault token that authenticates outgoing requests.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Authenticates with Vault (or renews the held token) and returns the issued token.
    ///
    /// On failure the previously obtained token, if any, stays current.
    async fn login(&self) -> Result<IssuedToken, VaultError>;

    /// Returns the token to attach to a request.
    ///
    /// Strategies with expiring tokens log in first when the token is due for renewal, so this
    /// call may wait on a network round trip to Vault. A failed renewal is logged and the stale
    /// token is returned; an error is returned only if no token has ever been obtained.
    async fn current_token(&self) -> Result<String, VaultError>;
}

/// A token issued by Vault together with its lease duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub client_token: String,
    /// Lease duration in seconds; `None` for tokens that never expire.
    pub lease_duration: Option<u64>,
}

impl IssuedToken {
    pub fn new(client_token: impl Into<String>, lease_duration: Option<u64>) -> Self {
        Self {
            client_token: client_token.into(),
            lease_duration,
        }
    }
}

/// Vault login response
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    auth: AuthInfo,
}

#[derive(Debug, Deserialize)]
struct AuthInfo {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

impl From<LoginResponse> for IssuedToken {
    fn from(response: LoginResponse) -> Self {
        // Vault reports a zero lease for tokens without expiry (e.g. root tokens)
        let lease_duration = Some(response.auth.lease_duration).filter(|secs| *secs > 0);
        IssuedToken::new(response.auth.client_token, lease_duration)
    }
}

/// Helper to extract error details from an HTTP response.
pub(crate) async fn handle_error_response(response: reqwest::Response, context: &str) -> VaultError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} with status {}: {}", context, status.as_u16(), body);

    match status.as_u16() {
        400 | 404 => VaultError::InvalidData(message),
        401 => VaultError::AuthenticationError(message),
        403 => VaultError::PermissionDenied(message),
        _ => VaultError::NetworkError(message),
    }
}
