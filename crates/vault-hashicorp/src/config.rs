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
use crate::registry::FALLBACK_AUTH_METHOD;
use bon::bon;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use vault_auth_core::vault::VaultError;

pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/v1/sys/health";
pub const DEFAULT_SECRET_PATH: &str = "/v1/secret";
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

// Default values for configurable parameters
pub const DEFAULT_EXPIRATION_THRESHOLD_SECONDS: u64 = 30;
pub const DEFAULT_TOKEN_TTL: u64 = 300;
pub const MIN_TOKEN_TTL: u64 = 5;
pub const DEFAULT_RENEW_BUFFER: u64 = 30;
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration of the secret client and of the auth method it uses.
#[derive(Clone)]
pub struct HashicorpVaultConfig {
    vault_url: Url,
    auth_method: String,
    fallback_token: Option<String>,
    health_check_enabled: bool,
    health_check_path: String,
    health_standby_ok: bool,
    secret_path: String,
    folder_path: Option<String>,
    request_timeout: Duration,
}

#[bon]
impl HashicorpVaultConfig {
    /// Validates and creates the configuration.
    ///
    /// Fails if the Vault URL does not parse, or if the fallback auth method is selected without
    /// a fallback token to serve.
    #[builder]
    pub fn new(
        /// The Vault server URL (e.g., "https://vault.example.com:8200")
        #[builder(into)]
        vault_url: String,
        /// Name of the registered auth method whose token is attached to requests
        #[builder(into, default = FALLBACK_AUTH_METHOD.to_string())]
        auth_method: String,
        /// Static token served by the fallback auth method
        #[builder(into)]
        fallback_token: Option<String>,
        /// Whether the startup routine checks Vault health
        #[builder(default = true)]
        health_check_enabled: bool,
        #[builder(into, default = DEFAULT_HEALTH_CHECK_PATH.to_string())]
        health_check_path: String,
        /// Report standby nodes as active in health checks
        #[builder(default)]
        health_standby_ok: bool,
        /// Path of the KV v2 secrets engine
        #[builder(into, default = DEFAULT_SECRET_PATH.to_string())]
        secret_path: String,
        /// Optional folder below the secrets engine that holds all keys
        #[builder(into)]
        folder_path: Option<String>,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
        request_timeout: Duration,
    ) -> Result<Self, VaultError> {
        let vault_url = parse_vault_url(&vault_url)?;

        if auth_method.is_empty() {
            return Err(VaultError::ConfigurationError("Vault auth method must not be empty".to_string()));
        }

        if auth_method == FALLBACK_AUTH_METHOD && fallback_token.as_deref().is_none_or(str::is_empty) {
            return Err(VaultError::ConfigurationError(
                "Vault fallback token must be set when no other auth method is configured".to_string(),
            ));
        }

        Ok(Self {
            vault_url,
            auth_method,
            fallback_token,
            health_check_enabled,
            health_check_path,
            health_standby_ok,
            secret_path,
            folder_path: folder_path.filter(|folder| !folder.trim_matches('/').is_empty()),
            request_timeout,
        })
    }
}

impl HashicorpVaultConfig {
    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    pub fn auth_method(&self) -> &str {
        &self.auth_method
    }

    pub fn fallback_token(&self) -> Option<&str> {
        self.fallback_token.as_deref()
    }

    pub fn health_check_enabled(&self) -> bool {
        self.health_check_enabled
    }

    pub fn health_check_path(&self) -> &str {
        &self.health_check_path
    }

    pub fn health_standby_ok(&self) -> bool {
        self.health_standby_ok
    }

    pub fn secret_path(&self) -> &str {
        &self.secret_path
    }

    pub fn folder_path(&self) -> Option<&str> {
        self.folder_path.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl std::fmt::Debug for HashicorpVaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashicorpVaultConfig")
            .field("vault_url", &self.vault_url.as_str())
            .field("auth_method", &self.auth_method)
            .field("fallback_token", &self.fallback_token.as_ref().map(|_| "***"))
            .field("health_check_enabled", &self.health_check_enabled)
            .field("health_check_path", &self.health_check_path)
            .field("health_standby_ok", &self.health_standby_ok)
            .field("secret_path", &self.secret_path)
            .field("folder_path", &self.folder_path)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// When and how a renewal scheduler renews a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalPolicy {
    ttl: Option<u64>,
    renew_buffer: u64,
    enabled: bool,
    max_retries: u32,
    retry_delay: Duration,
}

#[bon]
impl RenewalPolicy {
    #[builder]
    pub fn new(
        /// Token TTL in seconds requested on renewal (minimum 5). Unset when Vault decides the
        /// lease, as for Kubernetes logins.
        ttl: Option<u64>,
        /// Seconds before expiry at which the token is renewed; must be less than `ttl` when set
        #[builder(default = DEFAULT_RENEW_BUFFER)]
        renew_buffer: u64,
        /// Whether a background scheduler renews the token
        #[builder(default = true)]
        enabled: bool,
        /// Retries after a failed renewal before the schedule ends (0 disables retrying)
        #[builder(default)]
        max_retries: u32,
        /// Base delay of the exponential retry backoff
        #[builder(default = DEFAULT_RETRY_DELAY)]
        retry_delay: Duration,
    ) -> Result<Self, VaultError> {
        if let Some(ttl) = ttl {
            if ttl < MIN_TOKEN_TTL {
                return Err(VaultError::ConfigurationError(format!(
                    "Vault token ttl minimum value is {}",
                    MIN_TOKEN_TTL
                )));
            }
            if renew_buffer >= ttl {
                return Err(VaultError::ConfigurationError(
                    "Vault token renew buffer value must be less than ttl value".to_string(),
                ));
            }
        }

        Ok(Self {
            ttl,
            renew_buffer,
            enabled,
            max_retries,
            retry_delay,
        })
    }
}

impl RenewalPolicy {
    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn renew_buffer(&self) -> u64 {
        self.renew_buffer
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns this policy with `ttl` filled in when unset, validated like any other policy.
    fn or_ttl(self, ttl: u64) -> Result<Self, VaultError> {
        if self.ttl.is_some() {
            return Ok(self);
        }
        Self::builder()
            .ttl(ttl)
            .renew_buffer(self.renew_buffer)
            .enabled(self.enabled)
            .max_retries(self.max_retries)
            .retry_delay(self.retry_delay)
            .build()
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            ttl: None,
            renew_buffer: DEFAULT_RENEW_BUFFER,
            enabled: true,
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Configuration of the Kubernetes auth method.
#[derive(Clone)]
pub struct KubernetesAuthConfig {
    vault_url: Url,
    role: String,
    service_account_token: Option<String>,
    service_account_token_path: PathBuf,
    expiration_threshold_seconds: u64,
    renewal: RenewalPolicy,
}

#[bon]
impl KubernetesAuthConfig {
    #[builder]
    pub fn new(
        #[builder(into)]
        vault_url: String,
        /// Vault role requested during the Kubernetes login
        #[builder(into)]
        role: String,
        /// Inline service account token, used when the token file cannot be read. Demo/testing only.
        #[builder(into)]
        service_account_token: Option<String>,
        #[builder(into, default = PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH))]
        service_account_token_path: PathBuf,
        /// Seconds before expiry at which a token read triggers a new login
        #[builder(default = DEFAULT_EXPIRATION_THRESHOLD_SECONDS)]
        expiration_threshold_seconds: u64,
        #[builder(default)]
        renewal: RenewalPolicy,
    ) -> Result<Self, VaultError> {
        let vault_url = parse_vault_url(&vault_url)?;

        if role.trim().is_empty() {
            return Err(VaultError::ConfigurationError(
                "Kubernetes auth role must not be empty".to_string(),
            ));
        }

        Ok(Self {
            vault_url,
            role,
            service_account_token: service_account_token.filter(|token| !token.trim().is_empty()),
            service_account_token_path,
            expiration_threshold_seconds,
            renewal,
        })
    }
}

impl KubernetesAuthConfig {
    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn service_account_token(&self) -> Option<&str> {
        self.service_account_token.as_deref()
    }

    pub fn service_account_token_path(&self) -> &Path {
        &self.service_account_token_path
    }

    pub fn expiration_threshold_seconds(&self) -> u64 {
        self.expiration_threshold_seconds
    }

    pub fn renewal(&self) -> &RenewalPolicy {
        &self.renewal
    }
}

impl std::fmt::Debug for KubernetesAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesAuthConfig")
            .field("vault_url", &self.vault_url.as_str())
            .field("role", &self.role)
            .field("service_account_token", &self.service_account_token.as_ref().map(|_| "***"))
            .field("service_account_token_path", &self.service_account_token_path)
            .field("expiration_threshold_seconds", &self.expiration_threshold_seconds)
            .field("renewal", &self.renewal)
            .finish()
    }
}

/// Configuration of the token-based auth method, which renews a pre-issued Vault token in place.
#[derive(Clone)]
pub struct TokenAuthConfig {
    vault_url: Url,
    token: String,
    renewal: RenewalPolicy,
}

#[bon]
impl TokenAuthConfig {
    #[builder]
    pub fn new(
        #[builder(into)]
        vault_url: String,
        #[builder(into)]
        token: String,
        /// Renewal policy; its ttl defaults to 300 seconds
        #[builder(default)]
        renewal: RenewalPolicy,
    ) -> Result<Self, VaultError> {
        let vault_url = parse_vault_url(&vault_url)?;

        if token.trim().is_empty() {
            return Err(VaultError::ConfigurationError("Vault token must not be empty".to_string()));
        }

        let renewal = renewal.or_ttl(DEFAULT_TOKEN_TTL)?;

        Ok(Self {
            vault_url,
            token,
            renewal,
        })
    }
}

impl TokenAuthConfig {
    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn renewal(&self) -> &RenewalPolicy {
        &self.renewal
    }
}

impl std::fmt::Debug for TokenAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthConfig")
            .field("vault_url", &self.vault_url.as_str())
            .field("token", &"***")
            .field("renewal", &self.renewal)
            .finish()
    }
}

fn parse_vault_url(url: &str) -> Result<Url, VaultError> {
    let parsed = Url::parse(url).map_err(|_| VaultError::ConfigurationError("Vault url must be valid".to_string()))?;
    if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(VaultError::ConfigurationError("Vault url must be valid".to_string()));
    }
    Ok(parsed)
}

/// Joins an API path onto the Vault base URL, keeping any path prefix of the base.
pub(crate) fn vault_endpoint(base: &Url, api_path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), api_path.trim_start_matches('/'))
}
