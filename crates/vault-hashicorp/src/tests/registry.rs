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
use crate::registry::{AuthRegistry, FALLBACK_AUTH_METHOD};
use std::sync::Arc;
use vault_auth_core::vault::VaultError;

#[tokio::test]
async fn test_fallback_is_always_registered() {
    let registry = AuthRegistry::new("fallback-token");

    assert!(registry.has_service(FALLBACK_AUTH_METHOD));
    let strategy = registry.resolve(FALLBACK_AUTH_METHOD).unwrap();
    assert_eq!(strategy.current_token().await.unwrap(), "fallback-token");
}

#[test]
fn test_unknown_method_fails() {
    let registry = AuthRegistry::new("fallback-token");

    let result = registry.resolve("unknown");

    assert!(matches!(result, Err(VaultError::UnknownAuthMethod(name)) if name == "unknown"));
    assert!(!registry.has_service("unknown"));
}

#[tokio::test]
async fn test_register_replaces_existing_entry() {
    let registry = AuthRegistry::new("fallback-token");

    registry.register("custom", Arc::new(StaticTokenAuth::new("first")));
    registry.register("custom", Arc::new(StaticTokenAuth::new("second")));

    let strategy = registry.resolve("custom").unwrap();
    assert_eq!(strategy.current_token().await.unwrap(), "second");
}

#[tokio::test]
async fn test_fallback_can_be_overridden() {
    let registry = AuthRegistry::new("fallback-token");

    registry.register(FALLBACK_AUTH_METHOD, Arc::new(StaticTokenAuth::new("replacement")));

    let strategy = registry.resolve(FALLBACK_AUTH_METHOD).unwrap();
    assert_eq!(strategy.current_token().await.unwrap(), "replacement");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_and_registrations() {
    let registry = Arc::new(AuthRegistry::new("fallback-token"));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.register(format!("method-{}", i), Arc::new(StaticTokenAuth::new(format!("token-{}", i))));
                let fallback = registry.resolve(FALLBACK_AUTH_METHOD).unwrap();
                assert_eq!(fallback.current_token().await.unwrap(), "fallback-token");
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    for i in 0..16 {
        assert!(registry.has_service(&format!("method-{}", i)));
    }
}
