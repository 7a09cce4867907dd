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
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use vault_auth_core::util::Clock;
use vault_auth_core::vault::VaultError;

/// Number of consecutive login failures after which a strategy reports itself unhealthy.
pub const HEALTH_THRESHOLD: u32 = 3;

/// A token together with the expiry Vault reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLease {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenLease {
    /// Creates a lease issued at `issued_at`. A `lease_duration` of `None` never expires.
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, lease_duration: Option<u64>) -> Self {
        let expires_at = lease_duration
            .and_then(seconds_to_delta)
            .and_then(|lease| issued_at.checked_add_signed(lease));
        Self {
            token: token.into(),
            issued_at,
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Lease duration in whole seconds, `None` for non-expiring tokens.
    pub fn lease_duration(&self) -> Option<u64> {
        self.expires_at
            .and_then(|expires_at| u64::try_from((expires_at - self.issued_at).num_seconds()).ok())
    }

    /// True once `now` has reached `expires_at - threshold`.
    pub fn is_due(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(threshold)
                .is_none_or(|renew_at| now >= renew_at),
            None => false,
        }
    }
}

/// Immutable snapshot of a strategy's authentication state.
///
/// Readers always receive a whole snapshot, so the token and its expiry are never observed
/// half-updated. A failed login keeps the previous lease.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    lease: Option<TokenLease>,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl AuthState {
    pub fn lease(&self) -> Option<&TokenLease> {
        self.lease.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.lease.as_ref().map(TokenLease::token)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < HEALTH_THRESHOLD
    }

    fn succeeded(lease: TokenLease) -> Self {
        Self {
            lease: Some(lease),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    fn failed(&self, error: &VaultError) -> Self {
        Self {
            lease: self.lease.clone(),
            consecutive_failures: self.consecutive_failures.saturating_add(1),
            last_error: Some(error.to_string()),
        }
    }
}

/// Authentication state shared between request tasks and the renewal worker.
pub(crate) struct SharedAuthState {
    state: RwLock<Arc<AuthState>>,
    login_guard: Mutex<()>,
    clock: Arc<dyn Clock>,
    renewal_threshold: TimeDelta,
}

impl SharedAuthState {
    pub fn new(clock: Arc<dyn Clock>, renewal_threshold_seconds: u64) -> Self {
        Self {
            state: RwLock::new(Arc::new(AuthState::default())),
            login_guard: Mutex::new(()),
            clock,
            renewal_threshold: seconds_to_delta(renewal_threshold_seconds).unwrap_or(TimeDelta::MAX),
        }
    }

    pub async fn snapshot(&self) -> Arc<AuthState> {
        Arc::clone(&*self.state.read().await)
    }

    /// True if no login has ever succeeded or the current lease is within the renewal threshold.
    pub async fn should_renew(&self) -> bool {
        let snapshot = self.snapshot().await;
        match snapshot.lease() {
            Some(lease) => lease.is_due(self.clock.now(), self.renewal_threshold),
            None => true,
        }
    }

    pub async fn record_success(&self, token: impl Into<String>, lease_duration: Option<u64>) -> TokenLease {
        let lease = TokenLease::new(token, self.clock.now(), lease_duration);
        *self.state.write().await = Arc::new(AuthState::succeeded(lease.clone()));
        lease
    }

    pub async fn record_failure(&self, error: &VaultError) {
        let mut state = self.state.write().await;
        let next = state.failed(error);
        *state = Arc::new(next);
    }

    /// Returns the lease of a login that succeeded after `seen` was taken, if the state has
    /// changed since and its last login succeeded.
    pub async fn succeeded_since(&self, seen: &Arc<AuthState>) -> Option<TokenLease> {
        let current = self.snapshot().await;
        if Arc::ptr_eq(seen, &current) || current.consecutive_failures() > 0 {
            return None;
        }
        current.lease().cloned()
    }

    /// Serializes logins so concurrent callers trigger a single exchange with Vault.
    pub async fn lock_login(&self) -> MutexGuard<'_, ()> {
        self.login_guard.lock().await
    }
}

fn seconds_to_delta(seconds: u64) -> Option<TimeDelta> {
    i64::try_from(seconds).ok().and_then(TimeDelta::try_seconds)
}
