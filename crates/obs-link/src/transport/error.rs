use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	#[error("Connection timeout after {}ms", timeout.as_millis())]
	ConnectTimeout { timeout: Duration },

	#[error("Connection refused by {url}: {reason}")]
	ConnectionRefused { url: String, reason: String },

	#[error("Not connected")]
	NotConnected,

	#[error("Send failed: {reason}")]
	SendFailed { reason: String },
}
