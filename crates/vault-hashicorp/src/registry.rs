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
use crate::auth::{AuthStrategy, StaticTokenAuth};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use vault_auth_core::vault::VaultError;

/// Name under which the static fallback token is always registered.
pub const FALLBACK_AUTH_METHOD: &str = "fallbackToken";

/// Maps auth method names to the strategies that produce Vault tokens for them.
///
/// The fallback strategy is registered at construction, so resolving [`FALLBACK_AUTH_METHOD`]
/// always succeeds. Names are case-sensitive.
pub struct AuthRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn AuthStrategy>>>,
}

impl AuthRegistry {
    pub fn new(fallback_token: impl Into<String>) -> Self {
        let mut strategies: HashMap<String, Arc<dyn AuthStrategy>> = HashMap::new();
        strategies.insert(
            FALLBACK_AUTH_METHOD.to_string(),
            Arc::new(StaticTokenAuth::new(fallback_token)),
        );
        Self {
            strategies: RwLock::new(strategies),
        }
    }

    /// Registers `strategy` under `method`, replacing any strategy registered under that name.
    pub fn register(&self, method: impl Into<String>, strategy: Arc<dyn AuthStrategy>) {
        let method = method.into();
        debug!("Registering Vault auth method '{}'", method);
        self.strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, strategy);
    }

    pub fn resolve(&self, method: &str) -> Result<Arc<dyn AuthStrategy>, VaultError> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
            .ok_or_else(|| VaultError::UnknownAuthMethod(method.to_string()))
    }

    pub fn has_service(&self, method: &str) -> bool {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(method)
    }
}
