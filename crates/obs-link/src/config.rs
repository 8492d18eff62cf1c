use crate::messages::EventSubscription;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("host must not be empty")]
	EmptyHost,

	#[error("host {0:?} must not contain a scheme, port, path or whitespace")]
	MalformedHost(String),

	#[error("port must be non-zero")]
	ZeroPort,

	#[error("{0} must be greater than zero")]
	ZeroDuration(&'static str),
}

/// Parameters for one connection to an OBS instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ObsConfig {
	pub host: String,
	pub port: u16,
	#[serde(default)]
	pub password: Option<String>,
	#[serde(default = "default_connect_timeout", with = "millis")]
	pub connect_timeout: Duration,
	#[serde(default = "default_request_timeout", with = "millis")]
	pub request_timeout: Duration,
	#[serde(default = "default_event_subscriptions")]
	pub event_subscriptions: u32,
}

impl ObsConfig {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_password(mut self, password: impl Into<String>) -> Self {
		let password = password.into();
		self.password = if password.is_empty() { None } else { Some(password) };
		self
	}

	#[must_use]
	pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	#[must_use]
	pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn url(&self) -> String {
		if self.host.parse::<Ipv6Addr>().is_ok() {
			return format!("ws://[{}]:{}", self.host, self.port);
		}
		format!("ws://{}:{}", self.host, self.port)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.host.is_empty() {
			return Err(ConfigError::EmptyHost);
		}
		if self.host.contains('/') || self.host.chars().any(char::is_whitespace) {
			return Err(ConfigError::MalformedHost(self.host.clone()));
		}
		if self.host.contains(':') && !is_ipv6_literal(&self.host) {
			return Err(ConfigError::MalformedHost(self.host.clone()));
		}
		if self.port == 0 {
			return Err(ConfigError::ZeroPort);
		}
		if self.connect_timeout.is_zero() {
			return Err(ConfigError::ZeroDuration("connect_timeout"));
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroDuration("request_timeout"));
		}
		Ok(())
	}
}

impl Default for ObsConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			port: 4455,
			password: None,
			connect_timeout: default_connect_timeout(),
			request_timeout: default_request_timeout(),
			event_subscriptions: default_event_subscriptions(),
		}
	}
}

impl std::fmt::Debug for ObsConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObsConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
			.field("connect_timeout", &self.connect_timeout)
			.field("request_timeout", &self.request_timeout)
			.field("event_subscriptions", &self.event_subscriptions)
			.finish()
	}
}

/// Automatic reconnection after an unexpected close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
	pub enabled: bool,
	pub max_attempts: u32,
	#[serde(with = "millis")]
	pub delay: Duration,
}

impl ReconnectConfig {
	pub const fn disabled() -> Self {
		Self {
			enabled: false,
			max_attempts: 0,
			delay: Duration::from_millis(3000),
		}
	}
}

impl Default for ReconnectConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			max_attempts: 5,
			delay: Duration::from_millis(3000),
		}
	}
}

/// `::1` or `[::1]`.
fn is_ipv6_literal(host: &str) -> bool {
	let bare = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
	bare.parse::<Ipv6Addr>().is_ok()
}

const fn default_connect_timeout() -> Duration {
	Duration::from_millis(5000)
}

const fn default_request_timeout() -> Duration {
	Duration::from_secs(10)
}

const fn default_event_subscriptions() -> u32 {
	EventSubscription::SCENE_SWITCHER
}

mod millis {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	#[allow(clippy::cast_possible_truncation)]
	pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(duration.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
