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
use crate::auth::{AuthStrategy, KUBERNETES_AUTH_METHOD, KubernetesAuth, RenewableTokenAuth, TOKEN_AUTH_METHOD};
use crate::client::HashicorpVaultClient;
use crate::config::{HashicorpVaultConfig, KubernetesAuthConfig, RenewalPolicy, TokenAuthConfig};
use crate::registry::AuthRegistry;
use crate::renewal::{ErrorCallback, TokenRenewalScheduler};
use bon::Builder;
use log::{info, warn};
use std::sync::Arc;
use vault_auth_core::util::{Clock, default_clock};
use vault_auth_core::vault::{VaultClient, VaultError};

/// Everything the startup routine needs to wire the Vault services.
#[derive(Builder, Clone, Debug)]
pub struct HashicorpVaultSetup {
    pub vault: HashicorpVaultConfig,
    pub kubernetes: Option<KubernetesAuthConfig>,
    pub token: Option<TokenAuthConfig>,
}

/// The wired Vault services: the auth registry, the secret client and the renewal schedulers.
pub struct HashicorpVaultServices {
    registry: Arc<AuthRegistry>,
    client: Arc<HashicorpVaultClient>,
    schedulers: Vec<TokenRenewalScheduler>,
}

impl HashicorpVaultServices {
    pub async fn start(setup: HashicorpVaultSetup) -> Result<Self, VaultError> {
        Self::start_with(setup, default_clock(), None).await
    }

    /// Wires and starts the services.
    ///
    /// Registers the configured auth methods, obtains the first Kubernetes token and then starts
    /// a renewal scheduler for each auth method whose renewal is enabled. The Kubernetes
    /// scheduler's first renewal is timed from that initial token. Fails if the initial login
    /// fails, if the configured auth method is not registered, or if any setting is invalid. A
    /// failed health check is only logged.
    pub async fn start_with(
        setup: HashicorpVaultSetup,
        clock: Arc<dyn Clock>,
        on_renewal_error: Option<ErrorCallback>,
    ) -> Result<Self, VaultError> {
        let http_client = HashicorpVaultClient::http_client_for(&setup.vault)?;
        let registry = Arc::new(AuthRegistry::new(setup.vault.fallback_token().unwrap_or_default()));

        let token_scheduler = match &setup.token {
            Some(token_config) => {
                let auth = Arc::new(RenewableTokenAuth::new(token_config, http_client.clone(), Arc::clone(&clock)));
                registry.register(TOKEN_AUTH_METHOD, auth.clone());
                scheduler_for(TOKEN_AUTH_METHOD, auth, token_config.renewal(), &on_renewal_error)
            }
            None => None,
        };

        let kubernetes = match &setup.kubernetes {
            Some(kubernetes_config) => {
                let auth = Arc::new(KubernetesAuth::new(kubernetes_config, http_client.clone(), Arc::clone(&clock))?);
                registry.register(KUBERNETES_AUTH_METHOD, auth.clone());
                let scheduler = scheduler_for(
                    KUBERNETES_AUTH_METHOD,
                    auth.clone(),
                    kubernetes_config.renewal(),
                    &on_renewal_error,
                );
                Some((auth, scheduler))
            }
            None => None,
        };

        registry.resolve(setup.vault.auth_method())?;

        let mut schedulers = Vec::new();

        if let Some((auth, scheduler)) = kubernetes {
            // No worker is running yet, so this is the only login in flight
            let issued = auth.login().await.map_err(|e| {
                VaultError::AuthenticationError(format!("Initial Kubernetes login failed: {}", e))
            })?;
            if let Some(scheduler) = scheduler {
                scheduler.start_from(&issued);
                schedulers.push(scheduler);
            }
        }

        if let Some(scheduler) = token_scheduler {
            scheduler.start();
            schedulers.push(scheduler);
        }

        let client = Arc::new(HashicorpVaultClient::new(setup.vault, http_client, Arc::clone(&registry)));

        if client.config().health_check_enabled() {
            match client.health_check().await {
                Ok(()) => info!("Vault health check succeeded"),
                Err(e) => warn!("Vault health check failed: {}", e),
            }
        }

        Ok(Self {
            registry,
            client,
            schedulers,
        })
    }

    pub fn client(&self) -> Arc<HashicorpVaultClient> {
        Arc::clone(&self.client)
    }

    pub fn registry(&self) -> Arc<AuthRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn schedulers(&self) -> &[TokenRenewalScheduler] {
        &self.schedulers
    }

    /// Stops every renewal scheduler.
    pub async fn shutdown(&self) {
        for scheduler in &self.schedulers {
            scheduler.stop().await;
        }
    }
}

fn scheduler_for(
    name: &str,
    strategy: Arc<dyn AuthStrategy>,
    policy: &RenewalPolicy,
    on_renewal_error: &Option<ErrorCallback>,
) -> Option<TokenRenewalScheduler> {
    policy.enabled().then(|| {
        TokenRenewalScheduler::builder()
            .name(name)
            .strategy(strategy)
            .policy(policy.clone())
            .maybe_on_renewal_error(on_renewal_error.clone())
            .build()
    })
}
