// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff with jitter for retrying RPC calls.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

/// Upper bound on the random jitter added to each delay.
const MAX_JITTER: Duration = Duration::from_millis(250);

/// Configuration for an exponential backoff strategy.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExponentialBackoffConfig {
    /// The delay before the first retry.
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "min_backoff_millis", default = "defaults::min_backoff")]
    pub min_backoff: Duration,
    /// The maximum delay between two retries.
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "max_backoff_millis", default = "defaults::max_backoff")]
    pub max_backoff: Duration,
    /// The maximum number of retries, unbounded if `None`.
    #[serde(default = "defaults::max_retries")]
    pub max_retries: Option<u32>,
}

impl ExponentialBackoffConfig {
    /// Creates a new configuration.
    pub fn new(min_backoff: Duration, max_backoff: Duration, max_retries: Option<u32>) -> Self {
        Self {
            min_backoff,
            max_backoff,
            max_retries,
        }
    }

    /// Returns a fresh strategy seeded with `seed`.
    pub fn get_strategy(&self, seed: u64) -> ExponentialBackoff<StdRng> {
        ExponentialBackoff::new_with_seed(
            self.min_backoff,
            self.max_backoff,
            self.max_retries,
            seed,
        )
    }
}

impl Default for ExponentialBackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff: defaults::min_backoff(),
            max_backoff: defaults::max_backoff(),
            max_retries: defaults::max_retries(),
        }
    }
}

mod defaults {
    use std::time::Duration;

    pub fn min_backoff() -> Duration {
        Duration::from_millis(500)
    }

    pub fn max_backoff() -> Duration {
        Duration::from_secs(10)
    }

    pub fn max_retries() -> Option<u32> {
        Some(5)
    }
}

/// An iterator over retry delays that doubles on every step, capped at a maximum.
///
/// Yields `None` once the configured number of retries is exhausted.
#[derive(Debug)]
pub struct ExponentialBackoff<R> {
    next_delay: Duration,
    max_backoff: Duration,
    remaining: Option<u32>,
    rng: R,
}

impl ExponentialBackoff<StdRng> {
    /// Creates a strategy whose jitter is drawn from an RNG seeded with `seed`.
    pub fn new_with_seed(
        min_backoff: Duration,
        max_backoff: Duration,
        max_retries: Option<u32>,
        seed: u64,
    ) -> Self {
        Self {
            next_delay: min_backoff,
            max_backoff,
            remaining: max_retries,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> ExponentialBackoff<R> {
    fn jitter(&mut self) -> Duration {
        let max_millis = u64::try_from(MAX_JITTER.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.rng.gen_range(0..=max_millis))
    }
}

impl<R: Rng> Iterator for ExponentialBackoff<R> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let delay = self.next_delay;
        self.next_delay = self.next_delay.saturating_mul(2).min(self.max_backoff);
        let delay = delay.saturating_add(self.jitter()).min(self.max_backoff);
        tracing::trace!(?delay, "computed next backoff delay");
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_max_retries() {
        let strategy = ExponentialBackoffConfig::new(
            Duration::from_millis(10),
            Duration::from_secs(1),
            Some(3),
        )
        .get_strategy(42);

        assert_eq!(strategy.count(), 3);
    }

    #[test]
    fn delays_grow_and_are_capped() {
        let max_backoff = Duration::from_secs(2);
        let delays: Vec<_> = ExponentialBackoffConfig::new(
            Duration::from_millis(500),
            max_backoff,
            Some(8),
        )
        .get_strategy(7)
        .collect();

        assert!(delays[0] >= Duration::from_millis(500));
        assert!(delays[0] <= Duration::from_millis(750));
        assert!(delays.iter().all(|delay| *delay <= max_backoff));
        assert_eq!(delays.last().copied(), Some(max_backoff));
    }

    #[test]
    fn unbounded_strategy_keeps_yielding() {
        let mut strategy =
            ExponentialBackoffConfig::new(Duration::from_millis(1), Duration::from_millis(8), None)
                .get_strategy(1);

        for _ in 0..100 {
            assert!(strategy.next().is_some());
        }
    }

    #[test]
    fn deserializes_with_defaults() -> Result<(), serde_yaml::Error> {
        let config: ExponentialBackoffConfig = serde_yaml::from_str("max_retries: 2")?;

        assert_eq!(config.max_retries, Some(2));
        assert_eq!(config.min_backoff, defaults::min_backoff());
        assert_eq!(config.max_backoff, defaults::max_backoff());
        Ok(())
    }
}
