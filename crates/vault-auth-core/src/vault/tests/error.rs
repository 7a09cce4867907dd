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
use crate::vault::{SecretVersion, VaultError};

#[test]
fn test_transport_and_auth_errors_are_retriable() {
    assert!(VaultError::NetworkError("connection refused".to_string()).is_retriable());
    assert!(VaultError::AuthenticationError("Call unsuccessful: 401".to_string()).is_retriable());
    assert!(VaultError::Unavailable("Vault is sealed".to_string()).is_retriable());
}

#[test]
fn test_configuration_errors_are_not_retriable() {
    assert!(!VaultError::ConfigurationError("Vault url must be valid".to_string()).is_retriable());
    assert!(!VaultError::UnknownAuthMethod("unknown".to_string()).is_retriable());
    assert!(!VaultError::SecretNotFound("key".to_string()).is_retriable());
}

#[test]
fn test_error_messages_carry_detail() {
    let error = VaultError::UnknownAuthMethod("kubernetes".to_string());

    assert_eq!(error.to_string(), "No auth method registered under name: kubernetes");
}

#[test]
fn test_secret_version_tolerates_missing_optional_fields() {
    let version: SecretVersion = serde_json::from_str(
        r#"{"created_time": "2018-03-22T02:24:06.945319214Z", "version": 3}"#,
    )
    .unwrap();

    assert_eq!(version.version, 3);
    assert!(!version.destroyed);
    assert!(version.deletion_time.is_empty());
}
