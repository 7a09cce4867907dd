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
//! Loads the Vault settings from the host's flat key/value configuration.

use crate::config::{HashicorpVaultConfig, KubernetesAuthConfig, RenewalPolicy, TokenAuthConfig};
use crate::services::HashicorpVaultSetup;
use std::collections::HashMap;
use std::str::FromStr;
use vault_auth_core::vault::VaultError;

pub const VAULT_URL: &str = "edc.vault.hashicorp.url";
pub const VAULT_AUTH_METHOD: &str = "edc.vault.hashicorp.auth.method";
pub const VAULT_FALLBACK_TOKEN: &str = "edc.vault.hashicorp.fallbackToken";
pub const VAULT_HEALTH_CHECK_ENABLED: &str = "edc.vault.hashicorp.health.check.enabled";
pub const VAULT_HEALTH_CHECK_PATH: &str = "edc.vault.hashicorp.api.health.check.path";
pub const VAULT_HEALTH_CHECK_STANDBY_OK: &str = "edc.vault.hashicorp.health.check.standby.ok";
pub const VAULT_SECRET_PATH: &str = "edc.vault.hashicorp.api.secret.path";
pub const VAULT_FOLDER_PATH: &str = "edc.vault.hashicorp.folder";
pub const VAULT_REQUEST_TIMEOUT_SECONDS: &str = "edc.vault.hashicorp.request.timeout.seconds";

pub const VAULT_KUBERNETES_AUTH_ROLE: &str = "edc.vault.hashicorp.auth.kubernetes.role";
pub const VAULT_SERVICE_ACCOUNT_TOKEN: &str = "edc.vault.hashicorp.auth.kubernetes.service.account.token";
pub const VAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str = "edc.vault.hashicorp.auth.kubernetes.service.account.token.path";
pub const VAULT_KUBERNETES_EXPIRATION_THRESHOLD_SECONDS: &str =
    "edc.vault.hashicorp.auth.kubernetes.expiration.threshold.seconds";
pub const VAULT_KUBERNETES_RENEW_ENABLED: &str = "edc.vault.hashicorp.auth.kubernetes.renew.enabled";
pub const VAULT_KUBERNETES_RENEW_BUFFER: &str = "edc.vault.hashicorp.auth.kubernetes.renew-buffer";

pub const VAULT_TOKEN: &str = "edc.vault.hashicorp.token";
pub const VAULT_TOKEN_SCHEDULED_RENEW_ENABLED: &str = "edc.vault.hashicorp.token.scheduled-renew-enabled";
pub const VAULT_TOKEN_TTL: &str = "edc.vault.hashicorp.token.ttl";
pub const VAULT_TOKEN_RENEW_BUFFER: &str = "edc.vault.hashicorp.token.renew-buffer";
pub const VAULT_RENEW_MAX_RETRIES: &str = "edc.vault.hashicorp.renew.max-retries";

/// Typed, read-only view over configuration properties.
pub struct VaultProperties<'a> {
    values: &'a HashMap<String, String>,
}

impl<'a> VaultProperties<'a> {
    pub fn new(values: &'a HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Builds the complete setup. Kubernetes auth is configured when a role is present, token
    /// auth when a token is present.
    pub fn setup(&self) -> Result<HashicorpVaultSetup, VaultError> {
        Ok(HashicorpVaultSetup::builder()
            .vault(self.vault_config()?)
            .maybe_kubernetes(self.kubernetes_auth_config()?)
            .maybe_token(self.token_auth_config()?)
            .build())
    }

    pub fn vault_config(&self) -> Result<HashicorpVaultConfig, VaultError> {
        HashicorpVaultConfig::builder()
            .vault_url(self.required(VAULT_URL)?)
            .maybe_auth_method(self.string(VAULT_AUTH_METHOD))
            .maybe_fallback_token(self.string(VAULT_FALLBACK_TOKEN))
            .maybe_health_check_enabled(self.parsed(VAULT_HEALTH_CHECK_ENABLED)?)
            .maybe_health_check_path(self.string(VAULT_HEALTH_CHECK_PATH))
            .maybe_health_standby_ok(self.parsed(VAULT_HEALTH_CHECK_STANDBY_OK)?)
            .maybe_secret_path(self.string(VAULT_SECRET_PATH))
            .maybe_folder_path(self.string(VAULT_FOLDER_PATH))
            .maybe_request_timeout(self.parsed(VAULT_REQUEST_TIMEOUT_SECONDS)?.map(std::time::Duration::from_secs))
            .build()
    }

    pub fn kubernetes_auth_config(&self) -> Result<Option<KubernetesAuthConfig>, VaultError> {
        let Some(role) = self.string(VAULT_KUBERNETES_AUTH_ROLE) else {
            return Ok(None);
        };

        let renewal = RenewalPolicy::builder()
            .maybe_enabled(self.parsed(VAULT_KUBERNETES_RENEW_ENABLED)?)
            .maybe_renew_buffer(self.parsed(VAULT_KUBERNETES_RENEW_BUFFER)?)
            .maybe_max_retries(self.parsed(VAULT_RENEW_MAX_RETRIES)?)
            .build()?;

        KubernetesAuthConfig::builder()
            .vault_url(self.required(VAULT_URL)?)
            .role(role)
            .maybe_service_account_token(self.string(VAULT_SERVICE_ACCOUNT_TOKEN))
            .maybe_service_account_token_path(self.string(VAULT_SERVICE_ACCOUNT_TOKEN_PATH))
            .maybe_expiration_threshold_seconds(self.parsed(VAULT_KUBERNETES_EXPIRATION_THRESHOLD_SECONDS)?)
            .renewal(renewal)
            .build()
            .map(Some)
    }

    pub fn token_auth_config(&self) -> Result<Option<TokenAuthConfig>, VaultError> {
        let Some(token) = self.string(VAULT_TOKEN) else {
            return Ok(None);
        };

        let renewal = RenewalPolicy::builder()
            .maybe_enabled(self.parsed(VAULT_TOKEN_SCHEDULED_RENEW_ENABLED)?)
            .maybe_ttl(self.parsed(VAULT_TOKEN_TTL)?)
            .maybe_renew_buffer(self.parsed(VAULT_TOKEN_RENEW_BUFFER)?)
            .maybe_max_retries(self.parsed(VAULT_RENEW_MAX_RETRIES)?)
            .build()?;

        TokenAuthConfig::builder()
            .vault_url(self.required(VAULT_URL)?)
            .token(token)
            .renewal(renewal)
            .build()
            .map(Some)
    }

    /// Returns the trimmed value of `key`, treating blank values as absent.
    fn string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn required(&self, key: &str) -> Result<String, VaultError> {
        self.string(key)
            .ok_or_else(|| VaultError::ConfigurationError(format!("Missing required setting {}", key)))
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, VaultError> {
        self.string(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| VaultError::ConfigurationError(format!("Invalid value '{}' for setting {}", value, key)))
            })
            .transpose()
    }
}
