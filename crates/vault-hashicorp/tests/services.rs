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

//! Startup wiring of the Vault services.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use vault_auth_core::util::MockClock;
use vault_auth_core::vault::{VaultClient, VaultError};
use vault_hashicorp::auth::{AuthStrategy, KUBERNETES_AUTH_METHOD, TOKEN_AUTH_METHOD};
use vault_hashicorp::{
    ErrorCallback, FALLBACK_AUTH_METHOD, HashicorpVaultConfig, HashicorpVaultServices, HashicorpVaultSetup,
    KubernetesAuthConfig, RenewalPolicy, TokenAuthConfig,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"jwt").expect("Failed to write token file");
    file
}

async fn mount_health(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer, status: u16) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": {"client_token": "abc", "lease_duration": 3600}
        }))
    } else {
        ResponseTemplate::new(status).set_body_string("login rejected")
    };
    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn kubernetes_setup(server: &MockServer, token_file: &NamedTempFile) -> HashicorpVaultSetup {
    HashicorpVaultSetup::builder()
        .vault(
            HashicorpVaultConfig::builder()
                .vault_url(server.uri())
                .auth_method(KUBERNETES_AUTH_METHOD)
                .build()
                .unwrap(),
        )
        .kubernetes(
            KubernetesAuthConfig::builder()
                .vault_url(server.uri())
                .role("role")
                .service_account_token_path(token_file.path())
                .build()
                .unwrap(),
        )
        .build()
}

#[tokio::test]
async fn test_fallback_only_startup() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/my-key"))
        .and(header("X-Vault-Token", "root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"data": {"content": "value"}}
        })))
        .mount(&server)
        .await;

    let setup = HashicorpVaultSetup::builder()
        .vault(
            HashicorpVaultConfig::builder()
                .vault_url(server.uri())
                .fallback_token("root")
                .build()
                .unwrap(),
        )
        .build();

    let services = HashicorpVaultServices::start(setup).await.unwrap();

    assert!(services.registry().has_service(FALLBACK_AUTH_METHOD));
    assert!(services.schedulers().is_empty());
    assert_eq!(services.client().resolve_secret("my-key").await.unwrap(), "value");
    services.shutdown().await;
}

#[tokio::test]
async fn test_kubernetes_startup_obtains_token_and_schedules_renewal() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "auth": {"client_token": "abc", "lease_duration": 3600}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/my-key"))
        .and(header("X-Vault-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"data": {"content": "value"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = token_file();
    let services = HashicorpVaultServices::start(kubernetes_setup(&server, &file)).await.unwrap();

    assert!(services.registry().has_service(KUBERNETES_AUTH_METHOD));
    assert_eq!(services.schedulers().len(), 1);
    assert!(services.schedulers()[0].is_running());
    assert_eq!(services.client().resolve_secret("my-key").await.unwrap(), "value");

    services.shutdown().await;
    assert!(!services.schedulers()[0].is_running());
}

#[tokio::test]
async fn test_initial_kubernetes_login_failure_aborts_startup() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    mount_login(&server, 403).await;

    let file = token_file();
    let result = HashicorpVaultServices::start(kubernetes_setup(&server, &file)).await;

    assert!(matches!(result, Err(VaultError::AuthenticationError(msg)) if msg.contains("403")));
}

#[tokio::test]
async fn test_unregistered_auth_method_aborts_startup() {
    let server = MockServer::start().await;
    let setup = HashicorpVaultSetup::builder()
        .vault(
            HashicorpVaultConfig::builder()
                .vault_url(server.uri())
                .auth_method(KUBERNETES_AUTH_METHOD)
                .build()
                .unwrap(),
        )
        .build();

    let result = HashicorpVaultServices::start(setup).await;

    assert!(matches!(result, Err(VaultError::UnknownAuthMethod(name)) if name == KUBERNETES_AUTH_METHOD));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_health_check_does_not_abort_startup() {
    let server = MockServer::start().await;
    mount_health(&server, 503).await;
    mount_login(&server, 200).await;

    let file = token_file();
    let services = HashicorpVaultServices::start(kubernetes_setup(&server, &file)).await;

    assert!(services.is_ok());
}

#[tokio::test]
async fn test_disabled_renewal_starts_no_scheduler() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    mount_login(&server, 200).await;

    let file = token_file();
    let mut setup = kubernetes_setup(&server, &file);
    setup.kubernetes = Some(
        KubernetesAuthConfig::builder()
            .vault_url(server.uri())
            .role("role")
            .service_account_token_path(file.path())
            .renewal(RenewalPolicy::builder().enabled(false).build().unwrap())
            .build()
            .unwrap(),
    );

    let services = HashicorpVaultServices::start(setup).await.unwrap();

    assert!(services.schedulers().is_empty());
    assert_eq!(
        services
            .registry()
            .resolve(KUBERNETES_AUTH_METHOD)
            .unwrap()
            .current_token()
            .await
            .unwrap(),
        "abc"
    );
}

#[tokio::test]
async fn test_token_auth_renewal_failure_reaches_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let setup = HashicorpVaultSetup::builder()
        .vault(
            HashicorpVaultConfig::builder()
                .vault_url(server.uri())
                .auth_method(TOKEN_AUTH_METHOD)
                .health_check_enabled(false)
                .build()
                .unwrap(),
        )
        .token(
            TokenAuthConfig::builder()
                .vault_url(server.uri())
                .token("s.token")
                .build()
                .unwrap(),
        )
        .build();

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let callback: ErrorCallback = Arc::new(move |_: &VaultError| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let services = HashicorpVaultServices::start_with(setup, Arc::new(MockClock::at_epoch_seconds(0)), Some(callback))
        .await
        .unwrap();

    // The renewal worker ends after reporting the failure
    for _ in 0..50 {
        if failures.load(Ordering::SeqCst) > 0 && !services.schedulers()[0].is_running() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(!services.schedulers()[0].is_running());
    services.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transient_initial_login_failure_never_leaves_renewal_stopped() {
    for _ in 0..10 {
        let server = MockServer::start().await;
        mount_health(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/kubernetes/login"))
            .respond_with(ResponseTemplate::new(500).set_body_string("temporarily unavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_login(&server, 200).await;

        let file = token_file();
        let first = HashicorpVaultServices::start(kubernetes_setup(&server, &file)).await;
        assert!(matches!(first, Err(VaultError::AuthenticationError(msg)) if msg.contains("500")));

        let services = HashicorpVaultServices::start(kubernetes_setup(&server, &file)).await.unwrap();
        assert_eq!(services.schedulers().len(), 1);
        assert!(services.schedulers()[0].is_running(), "Renewal must be active after a successful start");
        services.shutdown().await;
    }
}
