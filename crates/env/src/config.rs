//! Environment configuration.
//!
//! Hosts usually embed this in their own settings file:
//!
//! ```toml
//! poll-interval-ms = 1000
//! polling = true
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Tunables for one [`Environment`](crate::Environment).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EnvConfig {
	/// Period of the backstop poll run for every watched module.
	poll_interval_ms: u64,
	/// Whether watches run the polling backstop next to the host event.
	polling: bool,
}

impl Default for EnvConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			polling: true,
		}
	}
}

impl EnvConfig {
	/// Parses a TOML document.
	pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		if config.poll_interval_ms == 0 {
			return Err(ConfigError::InvalidPollInterval);
		}
		Ok(config)
	}

	/// Sets the backstop poll period. Sub-millisecond periods round up to 1ms.
	#[must_use]
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
		self
	}

	/// Enables or disables the polling backstop.
	#[must_use]
	pub fn with_polling(mut self, polling: bool) -> Self {
		self.polling = polling;
		self
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn polling(&self) -> bool {
		self.polling
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn defaults_poll_once_per_second() {
		let config = EnvConfig::default();
		assert_eq!(config.poll_interval(), Duration::from_secs(1));
		assert!(config.polling());
	}

	#[rstest]
	#[case("", 1_000, true)]
	#[case("poll-interval-ms = 250", 250, true)]
	#[case("polling = false", 1_000, false)]
	#[case("poll-interval-ms = 50\npolling = false", 50, false)]
	fn parses_toml(#[case] text: &str, #[case] interval_ms: u64, #[case] polling: bool) {
		let config = EnvConfig::from_toml(text).expect("valid config");
		assert_eq!(config.poll_interval(), Duration::from_millis(interval_ms));
		assert_eq!(config.polling(), polling);
	}

	#[test]
	fn rejects_zero_interval() {
		assert!(matches!(EnvConfig::from_toml("poll-interval-ms = 0"), Err(ConfigError::InvalidPollInterval)));
	}

	#[test]
	fn rejects_unknown_keys() {
		assert!(matches!(EnvConfig::from_toml("poll-every = 3"), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn builder_rounds_up_sub_millisecond_interval() {
		let config = EnvConfig::default().with_poll_interval(Duration::from_micros(10));
		assert_eq!(config.poll_interval(), Duration::from_millis(1));
	}
}
