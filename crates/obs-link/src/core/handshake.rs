use super::{ConnectError, ConnectionPhase, PhaseTransition};
use crate::auth::authentication_response;
use crate::messages::{Frame, HelloData, IdentifiedData, IdentifyData, RPC_VERSION};
use crate::transport::CloseInfo;
use tracing::{debug, trace, warn};

/// OBS closes the socket with this code when Identify carries a bad secret.
pub const AUTHENTICATION_FAILED_CLOSE_CODE: u16 = 4009;

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeStep {
	Send(Frame),
	Ready { negotiated_rpc_version: u32 },
	Fail(ConnectError),
	Ignore,
}

/// Hello / Identify / Identified sequencing for one socket. Performs no I/O.
pub struct Handshake {
	phase: ConnectionPhase,
	password: Option<String>,
	event_subscriptions: u32,
}

impl Handshake {
	pub fn new(password: Option<String>, event_subscriptions: u32) -> Self {
		Self {
			phase: ConnectionPhase::Idle,
			password: password.filter(|p| !p.is_empty()),
			event_subscriptions,
		}
	}

	pub const fn phase(&self) -> ConnectionPhase {
		self.phase
	}

	pub fn start(&mut self) {
		self.advance(PhaseTransition::StartConnecting);
	}

	pub fn on_transport_open(&mut self) {
		self.advance(PhaseTransition::TransportOpened);
	}

	pub fn on_frame(&mut self, frame: Frame) -> HandshakeStep {
		match (self.phase, frame) {
			(ConnectionPhase::AwaitingHello, Frame::Hello(hello)) => self.on_hello(hello),
			(ConnectionPhase::AwaitingIdentified, Frame::Identified(identified)) => self.on_identified(identified),
			(phase, frame) => {
				trace!("Ignoring {:?} frame during {:?}", frame.op_code(), phase);
				HandshakeStep::Ignore
			}
		}
	}

	/// Translate a close that arrived before the handshake finished.
	pub fn on_close(&mut self, info: &CloseInfo) -> ConnectError {
		let awaiting_identified = self.phase == ConnectionPhase::AwaitingIdentified;
		self.advance(PhaseTransition::HandshakeFailed);

		if awaiting_identified && info.code == Some(AUTHENTICATION_FAILED_CLOSE_CODE) {
			return ConnectError::AuthenticationFailed {
				reason: info.reason.clone().unwrap_or_else(|| "Authentication failed".to_string()),
			};
		}

		ConnectError::ClosedDuringHandshake {
			code: info.code,
			reason: info.reason.clone(),
		}
	}

	fn on_hello(&mut self, hello: HelloData) -> HandshakeStep {
		debug!(
			"Hello from obs-websocket {} (rpc {})",
			hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
			hello.rpc_version
		);

		let authentication = match (hello.authentication, self.password.as_deref()) {
			(Some(challenge), Some(password)) => Some(authentication_response(password, &challenge.salt, &challenge.challenge)),
			(Some(_), None) => {
				warn!("Server requires authentication but no password is configured");
				self.advance(PhaseTransition::HandshakeFailed);
				return HandshakeStep::Fail(ConnectError::AuthenticationRequired);
			}
			(None, _) => None,
		};

		self.advance(PhaseTransition::IdentifySent);
		HandshakeStep::Send(Frame::Identify(IdentifyData {
			rpc_version: RPC_VERSION,
			authentication,
			event_subscriptions: Some(self.event_subscriptions),
		}))
	}

	fn on_identified(&mut self, identified: IdentifiedData) -> HandshakeStep {
		if let Some(reason) = identified.error {
			warn!("Identify rejected: {}", reason);
			self.advance(PhaseTransition::HandshakeFailed);
			return HandshakeStep::Fail(ConnectError::AuthenticationFailed { reason });
		}

		self.advance(PhaseTransition::Identified);
		HandshakeStep::Ready {
			negotiated_rpc_version: identified.negotiated_rpc_version,
		}
	}

	fn advance(&mut self, transition: PhaseTransition) {
		match self.phase.apply(transition) {
			Ok(next) => self.phase = next,
			Err(e) => debug!("{}", e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::messages::{AuthChallenge, EventSubscription};

	fn opened(password: Option<&str>) -> Handshake {
		let mut handshake = Handshake::new(password.map(str::to_string), EventSubscription::SCENE_SWITCHER);
		handshake.start();
		handshake.on_transport_open();
		handshake
	}

	fn hello(authentication: Option<AuthChallenge>) -> Frame {
		Frame::Hello(HelloData {
			obs_web_socket_version: Some("5.0.0".into()),
			rpc_version: 1,
			authentication,
		})
	}

	fn challenge() -> AuthChallenge {
		AuthChallenge {
			challenge: "challenge".into(),
			salt: "salt".into(),
		}
	}

	#[test]
	fn open_server_identifies_without_secret() {
		let mut handshake = opened(None);
		assert_eq!(handshake.phase(), ConnectionPhase::AwaitingHello);

		let HandshakeStep::Send(Frame::Identify(identify)) = handshake.on_frame(hello(None)) else {
			panic!("expected Identify");
		};
		assert_eq!(identify.authentication, None);
		assert_eq!(identify.event_subscriptions, Some(EventSubscription::SCENE_SWITCHER));
		assert_eq!(handshake.phase(), ConnectionPhase::AwaitingIdentified);

		let step = handshake.on_frame(Frame::Identified(IdentifiedData {
			negotiated_rpc_version: 1,
			error: None,
		}));
		assert_eq!(step, HandshakeStep::Ready { negotiated_rpc_version: 1 });
		assert_eq!(handshake.phase(), ConnectionPhase::Ready);
	}

	#[test]
	fn challenge_is_answered_with_derived_secret() {
		let mut handshake = opened(Some("correct"));
		let HandshakeStep::Send(Frame::Identify(identify)) = handshake.on_frame(hello(Some(challenge()))) else {
			panic!("expected Identify");
		};
		assert_eq!(identify.authentication.as_deref(), Some("cISp6Ke/7kij8hHddTJ3KKN8jzFrOVBqfeSd6PJcJNk="));
	}

	#[test]
	fn challenge_without_password_fails_before_identify() {
		let mut handshake = opened(Some(""));
		assert_eq!(handshake.on_frame(hello(Some(challenge()))), HandshakeStep::Fail(ConnectError::AuthenticationRequired));
		assert_eq!(handshake.phase(), ConnectionPhase::Failed);
	}

	#[test]
	fn identified_with_error_is_auth_failure() {
		let mut handshake = opened(Some("wrong"));
		handshake.on_frame(hello(Some(challenge())));
		let step = handshake.on_frame(Frame::Identified(IdentifiedData {
			negotiated_rpc_version: 1,
			error: Some("Authentication failed".into()),
		}));
		assert!(matches!(step, HandshakeStep::Fail(ConnectError::AuthenticationFailed { .. })));
	}

	#[test]
	fn close_4009_while_identifying_is_auth_failure() {
		let mut handshake = opened(Some("wrong"));
		handshake.on_frame(hello(Some(challenge())));
		let error = handshake.on_close(&CloseInfo::remote(Some(4009), Some("Authentication failed.".into())));
		assert!(matches!(error, ConnectError::AuthenticationFailed { ref reason } if reason == "Authentication failed."));
	}

	#[test]
	fn other_close_is_reported_verbatim() {
		let mut handshake = opened(None);
		let error = handshake.on_close(&CloseInfo::remote(Some(1011), None));
		assert_eq!(error, ConnectError::ClosedDuringHandshake { code: Some(1011), reason: None });
	}

	#[test]
	fn frames_out_of_order_are_ignored() {
		let mut handshake = opened(None);
		let early = handshake.on_frame(Frame::Identified(IdentifiedData {
			negotiated_rpc_version: 1,
			error: None,
		}));
		assert_eq!(early, HandshakeStep::Ignore);
		assert_eq!(handshake.phase(), ConnectionPhase::AwaitingHello);
	}
}
