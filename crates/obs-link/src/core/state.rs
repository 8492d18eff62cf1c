use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Lifecycle of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPhase {
	Idle,
	Connecting,
	AwaitingHello,
	AwaitingIdentified,
	Ready,
	Closed,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
	StartConnecting,
	TransportOpened,
	IdentifySent,
	Identified,
	ConnectionLost,
	HandshakeFailed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
	#[error("Invalid state transition: {from:?} -> {transition:?}")]
	InvalidTransition { from: ConnectionPhase, transition: PhaseTransition },
}

impl ConnectionPhase {
	/// Validate a transition and return the phase it leads to.
	pub const fn apply(self, transition: PhaseTransition) -> Result<Self, StateError> {
		let next = match (self, transition) {
			(Self::Idle, PhaseTransition::StartConnecting) => Self::Connecting,
			(Self::Connecting, PhaseTransition::TransportOpened) => Self::AwaitingHello,
			(Self::AwaitingHello, PhaseTransition::IdentifySent) => Self::AwaitingIdentified,
			(Self::AwaitingIdentified, PhaseTransition::Identified) => Self::Ready,
			(Self::Connecting | Self::AwaitingHello | Self::AwaitingIdentified, PhaseTransition::HandshakeFailed) => Self::Failed,
			(Self::Connecting | Self::AwaitingHello | Self::AwaitingIdentified | Self::Ready, PhaseTransition::ConnectionLost) => Self::Closed,
			(from, transition) => return Err(StateError::InvalidTransition { from, transition }),
		};
		Ok(next)
	}

	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Closed | Self::Failed)
	}
}

/// Client-level state reported by [`ObsClient::status`](crate::ObsClient::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkState {
	Idle,
	Connecting,
	Connected,
	Reconnecting,
	ReconnectExhausted,
	Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
	pub state: LinkState,
	pub reconnect_attempts: u32,
	pub max_reconnect_attempts: u32,
	pub negotiated_rpc_version: Option<u32>,
	pub connected_at: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
}

impl ConnectionStatus {
	pub(crate) const fn idle(max_reconnect_attempts: u32) -> Self {
		Self {
			state: LinkState::Idle,
			reconnect_attempts: 0,
			max_reconnect_attempts,
			negotiated_rpc_version: None,
			connected_at: None,
			last_error: None,
		}
	}

	pub const fn connected(&self) -> bool {
		matches!(self.state, LinkState::Connected)
	}

	pub const fn connecting(&self) -> bool {
		matches!(self.state, LinkState::Connecting | LinkState::Reconnecting)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn happy_path_reaches_ready() {
		let phase = ConnectionPhase::Idle
			.apply(PhaseTransition::StartConnecting)
			.and_then(|p| p.apply(PhaseTransition::TransportOpened))
			.and_then(|p| p.apply(PhaseTransition::IdentifySent))
			.and_then(|p| p.apply(PhaseTransition::Identified));
		assert_eq!(phase, Ok(ConnectionPhase::Ready));
	}

	#[test]
	fn terminal_phases_accept_nothing() {
		for phase in [ConnectionPhase::Closed, ConnectionPhase::Failed] {
			assert!(phase.is_terminal());
			assert!(phase.apply(PhaseTransition::StartConnecting).is_err());
			assert!(phase.apply(PhaseTransition::ConnectionLost).is_err());
		}
	}

	#[test]
	fn cannot_skip_hello() {
		assert_eq!(
			ConnectionPhase::Connecting.apply(PhaseTransition::Identified),
			Err(StateError::InvalidTransition {
				from: ConnectionPhase::Connecting,
				transition: PhaseTransition::Identified
			})
		);
	}

	#[test]
	fn status_serializes_camel_case() {
		let status = ConnectionStatus::idle(5);
		let value = serde_json::to_value(&status).unwrap();
		assert_eq!(value["state"], "idle");
		assert_eq!(value["maxReconnectAttempts"], 5);
		assert!(!status.connected());
		assert!(!status.connecting());
	}
}
