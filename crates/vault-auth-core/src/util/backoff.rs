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

use log::debug;
use std::time::Duration;

/// Exponential backoff parameters for renewal retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Factor applied per failed attempt
    pub multiplier: u32,
    /// Cap on the exponent so the delay stays bounded (2^5 = 32x by default)
    pub max_exponent: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max_exponent: 5,
        }
    }
}

impl BackoffConfig {
    pub fn new(multiplier: u32, max_exponent: u32) -> Self {
        Self {
            multiplier,
            max_exponent,
        }
    }
}

/// Returns `base_delay * multiplier ^ min(attempt, max_exponent)`.
///
/// `attempt` is zero-based: the first retry waits exactly `base_delay`.
pub fn calculate_backoff_interval(base_delay: Duration, attempt: u32, config: &BackoffConfig) -> Duration {
    let exponent = attempt.min(config.max_exponent);
    let factor = config.multiplier.max(1).saturating_pow(exponent);
    let interval = base_delay.saturating_mul(factor);

    if exponent > 0 {
        debug!("Retry backoff {}x after {} failed attempt(s): {:?}", factor, attempt, interval);
    }

    interval
}
