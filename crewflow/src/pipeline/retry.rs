//! Retry utilities with configurable backoff and jitter strategies.
//!
//! Only transient provider errors are retried, and only up to the stage's
//! `max_retries`. The delay schedule is shared by every stage of a run.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Delay schedule between retries of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A schedule with no waiting at all, handy in tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_strategy: BackoffStrategy::Constant,
            jitter_strategy: JitterStrategy::None,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// State tracking for the retries of one stage.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Retries performed so far.
    pub attempt: usize,
    /// Previous delay, for decorrelated jitter.
    previous_delay: Option<u64>,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the delay for the current attempt.
    #[must_use]
    pub fn calculate_delay(&mut self, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let attempt = u32::try_from(self.attempt).unwrap_or(u32::MAX);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(attempt)).min(max),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt) + 1).min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = self.previous_delay.unwrap_or(base);
                let upper = prev.saturating_mul(3).min(max);
                let new_delay = if upper <= base {
                    base.min(max)
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                };
                self.previous_delay = Some(new_delay);
                new_delay
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Decides whether a failed attempt should be retried, advancing `state`.
#[must_use]
pub fn should_retry(
    state: &mut RetryState,
    config: &RetryConfig,
    max_retries: usize,
    retryable: bool,
) -> RetryDecision {
    if !retryable {
        return RetryDecision::NotRetryable;
    }
    if state.attempt >= max_retries {
        return RetryDecision::GiveUp;
    }

    let delay = state.calculate_delay(config);
    state.attempt += 1;

    RetryDecision::Retry(delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_strategy_default() {
        assert_eq!(BackoffStrategy::default(), BackoffStrategy::Exponential);
    }

    #[test]
    fn test_jitter_strategy_default() {
        assert_eq!(JitterStrategy::default(), JitterStrategy::Full);
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_base_delay_ms(500)
            .with_max_delay_ms(10000)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);

        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Linear);
        assert_eq!(config.jitter_strategy, JitterStrategy::None);
    }

    #[test]
    fn test_retry_config_from_toml() {
        let config: RetryConfig =
            toml::from_str("base_delay_ms = 250\nbackoff_strategy = \"linear\"").unwrap();
        assert_eq!(config.base_delay_ms, 250);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Linear);
        assert_eq!(config.max_delay_ms, 30000);
    }

    #[test]
    fn test_calculate_delay_exponential_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Exponential)
            .with_jitter(JitterStrategy::None);

        let mut state = RetryState::new();

        state.attempt = 0;
        assert_eq!(state.calculate_delay(&config), Duration::from_millis(100));

        state.attempt = 1;
        assert_eq!(state.calculate_delay(&config), Duration::from_millis(200));

        state.attempt = 2;
        assert_eq!(state.calculate_delay(&config), Duration::from_millis(400));
    }

    #[test]
    fn test_calculate_delay_linear_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);

        let mut state = RetryState::new();

        state.attempt = 2;
        assert_eq!(state.calculate_delay(&config), Duration::from_millis(300));
    }

    #[test]
    fn test_calculate_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_backoff(BackoffStrategy::Exponential)
            .with_jitter(JitterStrategy::None);

        let mut state = RetryState::new();

        state.attempt = 10;
        assert_eq!(state.calculate_delay(&config), Duration::from_millis(5000));
    }

    #[test]
    fn test_calculate_delay_full_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant)
            .with_jitter(JitterStrategy::Full);

        let mut state = RetryState::new();
        for _ in 0..10 {
            assert!(state.calculate_delay(&config) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let config = RetryConfig::immediate();
        let mut state = RetryState::new();

        assert_eq!(
            should_retry(&mut state, &config, 2, true),
            RetryDecision::Retry(Duration::ZERO)
        );
        assert_eq!(
            should_retry(&mut state, &config, 2, true),
            RetryDecision::Retry(Duration::ZERO)
        );
        assert_eq!(should_retry(&mut state, &config, 2, true), RetryDecision::GiveUp);
        assert_eq!(state.attempt, 2);
    }

    #[test]
    fn test_should_retry_not_retryable() {
        let mut state = RetryState::new();
        assert_eq!(
            should_retry(&mut state, &RetryConfig::immediate(), 5, false),
            RetryDecision::NotRetryable
        );
        assert_eq!(state.attempt, 0);
    }
}
