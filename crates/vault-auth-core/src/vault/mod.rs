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

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// A client for reading and writing secrets in a vault.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Checks that the vault is reachable and able to serve requests.
    async fn health_check(&self) -> Result<(), VaultError>;

    async fn resolve_secret(&self, key: &str) -> Result<String, VaultError>;

    /// Stores `secret` under `key`, returning the metadata of the version that was written.
    async fn store_secret(&self, key: &str, secret: &str) -> Result<SecretVersion, VaultError>;

    /// Removes every version of the secret stored under `key`. Removing a missing key succeeds.
    async fn remove_secret(&self, key: &str) -> Result<(), VaultError>;
}

/// Metadata of a secret version as reported by a versioned key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretVersion {
    pub created_time: String,
    #[serde(default)]
    pub deletion_time: String,
    #[serde(default)]
    pub destroyed: bool,
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("No auth method registered under name: {0}")]
    UnknownAuthMethod(String),

    #[error("Service account token error: {0}")]
    ServiceAccountTokenError(String),

    #[error("Vault unavailable: {0}")]
    Unavailable(String),
}

impl VaultError {
    /// Whether repeating the failed call later may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            VaultError::NetworkError(_) | VaultError::AuthenticationError(_) | VaultError::Unavailable(_)
        )
    }
}
