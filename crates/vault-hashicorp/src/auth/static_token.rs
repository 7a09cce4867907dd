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
use super::{AuthStrategy, IssuedToken};
use async_trait::async_trait;
use vault_auth_core::vault::VaultError;

/// Serves a fixed, pre-shared token. Used as the registry fallback.
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl AuthStrategy for StaticTokenAuth {
    async fn login(&self) -> Result<IssuedToken, VaultError> {
        Ok(IssuedToken::new(self.token.clone(), None))
    }

    async fn current_token(&self) -> Result<String, VaultError> {
        Ok(self.token.clone())
    }
}
