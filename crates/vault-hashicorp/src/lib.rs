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
//! HashiCorp Vault token lifecycle management.
//!
//! Auth strategies obtain Vault tokens, the [`AuthRegistry`] selects the strategy whose token the
//! [`HashicorpVaultClient`] attaches to requests, and [`TokenRenewalScheduler`]s renew tokens in
//! the background before they expire. [`HashicorpVaultServices`] wires these together.

pub mod auth;
mod client;
pub mod config;
pub mod properties;
pub mod registry;
pub mod renewal;
mod services;
mod state;

#[cfg(test)]
mod tests;

pub use client::HashicorpVaultClient;
pub use config::{HashicorpVaultConfig, KubernetesAuthConfig, RenewalPolicy, TokenAuthConfig};
pub use registry::{AuthRegistry, FALLBACK_AUTH_METHOD};
pub use renewal::{ErrorCallback, TokenRenewalScheduler};
pub use services::{HashicorpVaultServices, HashicorpVaultSetup};
pub use state::{AuthState, HEALTH_THRESHOLD, TokenLease};
