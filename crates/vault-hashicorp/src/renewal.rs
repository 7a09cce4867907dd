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
use crate::auth::{AuthStrategy, IssuedToken};
use crate::config::RenewalPolicy;
use bon::Builder;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vault_auth_core::util::backoff::{BackoffConfig, calculate_backoff_interval};
use vault_auth_core::vault::VaultError;

/// Lower bound on the delay between renewals, so a TTL shorter than the renew buffer cannot
/// make the worker spin against Vault.
pub const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(1);

/// Type alias for the error callback function
pub type ErrorCallback = Arc<dyn Fn(&VaultError) + Send + Sync>;

/// Handle for managing the renewal task lifecycle.
///
/// Dropping this handle will signal the renewal task to stop and abort it.
pub(crate) struct RenewalHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: Option<JoinHandle<()>>,
}

impl RenewalHandle {
    pub(crate) fn new(shutdown_tx: watch::Sender<bool>, task_handle: JoinHandle<()>) -> Self {
        Self {
            shutdown_tx,
            task_handle: Some(task_handle),
        }
    }

    fn is_finished(&self) -> bool {
        self.task_handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the task to stop, aborts it and waits until it is gone.
    ///
    /// Aborting drops any in-flight login future, which cancels its pending HTTP request.
    async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task_handle) = self.task_handle.take() {
            task_handle.abort();
            // Completes with a cancellation error once the task has been dropped
            let _ = task_handle.await;
        }
    }
}

impl Drop for RenewalHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task_handle) = &self.task_handle {
            task_handle.abort();
        }
    }
}

/// Renews a strategy's token in a background task, shortly before each token expires.
///
/// After each successful renewal the next one is scheduled `lease_duration - renew_buffer`
/// seconds later. A failed renewal is logged and, once the policy's retries are used up, ends
/// the schedule until [`start`](Self::start) is called again.
#[derive(Builder)]
#[builder(on(String, into))]
pub struct TokenRenewalScheduler {
    /// Name used in log messages
    name: String,
    strategy: Arc<dyn AuthStrategy>,
    policy: RenewalPolicy,
    on_renewal_error: Option<ErrorCallback>,
    #[builder(skip)]
    handle: Mutex<Option<RenewalHandle>>,
}

impl TokenRenewalScheduler {
    /// Spawns the renewal worker, which immediately attempts a first renewal.
    ///
    /// Does nothing if the worker is already running. Must be called within a Tokio runtime.
    pub fn start(&self) {
        self.spawn_worker(None);
    }

    /// Spawns the renewal worker for a token that was just issued, scheduling the first renewal
    /// `lease_duration - renew_buffer` from now instead of renewing immediately.
    ///
    /// Does nothing if the worker is already running or the token does not expire.
    pub fn start_from(&self, issued: &IssuedToken) {
        match issued.lease_duration {
            Some(lease_duration) => {
                self.spawn_worker(Some(next_renewal_delay(lease_duration, self.policy.renew_buffer())))
            }
            None => debug!("Token for {} does not expire, no renewal scheduled", self.name),
        }
    }

    fn spawn_worker(&self, first_delay: Option<Duration>) {
        let mut handle = self.lock_handle();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Token renewal for {} is already running", self.name);
            return;
        }

        let worker = RenewalWorker {
            name: self.name.clone(),
            strategy: Arc::clone(&self.strategy),
            policy: self.policy.clone(),
            on_renewal_error: self.on_renewal_error.clone(),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task_handle = tokio::spawn(worker.run(shutdown_rx, first_delay));
        *handle = Some(RenewalHandle::new(shutdown_tx, task_handle));
        info!("Started token renewal for {}", self.name);
    }

    /// Stops the renewal worker, interrupting a renewal in progress.
    ///
    /// When this returns the worker no longer runs and will not run again until restarted.
    /// Does nothing if the worker is not running.
    pub async fn stop(&self) {
        let handle = self.lock_handle().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            info!("Stopped token renewal for {}", self.name);
        }
    }

    /// True while the worker is alive, i.e. started and neither stopped nor ended by a failure.
    pub fn is_running(&self) -> bool {
        self.lock_handle().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<RenewalHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Delay until the next renewal: the TTL minus the renew buffer, but at least [`MIN_RENEWAL_DELAY`].
pub fn next_renewal_delay(lease_duration: u64, renew_buffer: u64) -> Duration {
    Duration::from_secs(lease_duration.saturating_sub(renew_buffer)).max(MIN_RENEWAL_DELAY)
}

struct RenewalWorker {
    name: String,
    strategy: Arc<dyn AuthStrategy>,
    policy: RenewalPolicy,
    on_renewal_error: Option<ErrorCallback>,
}

impl RenewalWorker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>, first_delay: Option<Duration>) {
        let mut next_delay = first_delay;
        loop {
            if let Some(delay) = next_delay {
                debug!("Next token renewal for {} in {:?}", self.name, delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }

            next_delay = tokio::select! {
                next_delay = self.renew() => next_delay,
                _ = shutdown_rx.changed() => break,
            };

            if next_delay.is_none() {
                break;
            }
        }
        debug!("Token renewal loop for {} exited", self.name);
    }

    /// Renews the token, retrying per policy. Returns the delay until the next renewal, or
    /// `None` if nothing more should be scheduled.
    async fn renew(&self) -> Option<Duration> {
        let mut attempt = 0;
        loop {
            match self.strategy.login().await {
                Ok(issued) => return self.delay_after(&issued),
                Err(e) => {
                    error!("Scheduled token renewal for {} failed: {}", self.name, e);
                    if let Some(callback) = &self.on_renewal_error {
                        callback(&e);
                    }

                    if attempt >= self.policy.max_retries() {
                        error!(
                            "Token renewal for {} stopped after {} failed attempt(s). Restart to resume renewal",
                            self.name,
                            attempt + 1
                        );
                        return None;
                    }

                    let backoff = calculate_backoff_interval(self.policy.retry_delay(), attempt, &BackoffConfig::default());
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn delay_after(&self, issued: &IssuedToken) -> Option<Duration> {
        match issued.lease_duration {
            Some(lease_duration) => Some(next_renewal_delay(lease_duration, self.policy.renew_buffer())),
            None => {
                debug!("Token for {} does not expire, no further renewal scheduled", self.name);
                None
            }
        }
    }
}
