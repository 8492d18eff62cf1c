use crate::config::ReconnectConfig;
use std::time::Duration;

/// Fixed-delay reconnect budget. One instance lives as long as the client.
#[derive(Debug)]
pub struct ReconnectPolicy {
	config: ReconnectConfig,
	attempts: u32,
}

impl ReconnectPolicy {
	pub const fn new(config: ReconnectConfig) -> Self {
		Self { config, attempts: 0 }
	}

	/// Count one more attempt and return how long to wait before it, or
	/// `None` once the budget is spent.
	pub fn next_delay(&mut self) -> Option<Duration> {
		if !self.config.enabled || self.attempts >= self.config.max_attempts {
			tracing::debug!("Reconnect budget exhausted after {} attempts", self.attempts);
			return None;
		}

		self.attempts += 1;
		Some(self.config.delay)
	}

	pub const fn attempts(&self) -> u32 {
		self.attempts
	}

	pub const fn max_attempts(&self) -> u32 {
		self.config.max_attempts
	}

	pub const fn enabled(&self) -> bool {
		self.config.enabled
	}

	pub fn reset(&mut self) {
		self.attempts = 0;
	}
}
